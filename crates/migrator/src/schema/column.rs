//! Column definitions used inside table migrations

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use super::SchemaOp;

/// Logical column type; the adapter decides the physical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Id,
    BigId,
    Bool,
    SmallInt,
    Int,
    BigInt,
    Float,
    Decimal,
    String,
    Text,
    /// Falls back to `Text` when the adapter has no JSON type
    Json,
    Date,
    DateTime,
    Time,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Id => "ID",
            ColumnType::BigId => "BIGID",
            ColumnType::Bool => "BOOL",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Int => "INT",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Float => "FLOAT",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::String => "STRING",
            ColumnType::Text => "TEXT",
            ColumnType::Json => "JSON",
            ColumnType::Date => "DATE",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Time => "TIME",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column operation within a table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub op: SchemaOp,
    pub name: String,
    /// Absent for rename and drop
    pub column_type: Option<ColumnType>,
    /// Target name for rename
    pub rename: Option<String>,
    pub primary: bool,
    pub unique: bool,
    pub required: bool,
    pub unsigned: bool,
    pub limit: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub default: Option<JsonValue>,
    pub comment: Option<String>,
    pub options: Option<String>,
}

impl Column {
    fn with_op(op: SchemaOp, name: &str) -> Self {
        Self {
            op,
            name: name.to_string(),
            column_type: None,
            rename: None,
            primary: false,
            unique: false,
            required: false,
            unsigned: false,
            limit: None,
            precision: None,
            scale: None,
            default: None,
            comment: None,
            options: None,
        }
    }

    pub(crate) fn create(name: &str, column_type: ColumnType) -> Self {
        let mut column = Self::with_op(SchemaOp::Create, name);
        column.column_type = Some(column_type);
        column
    }

    pub(crate) fn alter(name: &str, column_type: ColumnType) -> Self {
        let mut column = Self::with_op(SchemaOp::Alter, name);
        column.column_type = Some(column_type);
        column
    }

    pub(crate) fn rename(name: &str, new_name: &str) -> Self {
        let mut column = Self::with_op(SchemaOp::Rename, name);
        column.rename = Some(new_name.to_string());
        column
    }

    pub(crate) fn drop(name: &str) -> Self {
        Self::with_op(SchemaOp::Drop, name)
    }

    /// Mark the column as the primary key
    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    /// Disallow null values
    pub fn required(&mut self) -> &mut Self {
        self.required = true;
        self
    }

    pub fn unsigned(&mut self) -> &mut Self {
        self.unsigned = true;
        self
    }

    pub fn limit(&mut self, limit: u32) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Total number of digits for decimal columns
    pub fn precision(&mut self, precision: u32) -> &mut Self {
        self.precision = Some(precision);
        self
    }

    /// Digits after the decimal point for decimal columns
    pub fn scale(&mut self, scale: u32) -> &mut Self {
        self.scale = Some(scale);
        self
    }

    pub fn default_value(&mut self, value: impl Into<JsonValue>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    pub fn comment(&mut self, comment: &str) -> &mut Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Adapter-specific trailing options, passed through verbatim
    pub fn options(&mut self, options: &str) -> &mut Self {
        self.options = Some(options.to_string());
        self
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} column {}", self.op, self.name)?;
        if let Some(column_type) = &self.column_type {
            write!(f, " {}", column_type)?;
        }
        if let Some(rename) = &self.rename {
            write!(f, " to {}", rename)?;
        }
        Ok(())
    }
}
