//! Table definitions: create, alter, rename and drop

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};

use super::column::{Column, ColumnType};
use super::SchemaOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    Primary,
    Unique,
    Foreign,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Primary => write!(f, "primary key"),
            KeyType::Unique => write!(f, "unique key"),
            KeyType::Foreign => write!(f, "foreign key"),
        }
    }
}

/// Referenced side of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignReference {
    pub table: String,
    pub columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

/// Table-level key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub key_type: KeyType,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub reference: Option<ForeignReference>,
}

impl Key {
    pub fn primary(columns: &[&str]) -> Self {
        Self::new(KeyType::Primary, columns)
    }

    pub fn unique(columns: &[&str]) -> Self {
        Self::new(KeyType::Unique, columns)
    }

    pub fn foreign(column: &str, ref_table: &str, ref_column: &str) -> Self {
        let mut key = Self::new(KeyType::Foreign, &[column]);
        key.reference = Some(ForeignReference {
            table: ref_table.to_string(),
            columns: vec![ref_column.to_string()],
            on_delete: None,
            on_update: None,
        });
        key
    }

    fn new(key_type: KeyType, columns: &[&str]) -> Self {
        Self {
            key_type,
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            reference: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Only meaningful for foreign keys
    pub fn on_delete(mut self, action: &str) -> Self {
        if let Some(reference) = self.reference.as_mut() {
            reference.on_delete = Some(action.to_string());
        }
        self
    }

    /// Only meaningful for foreign keys
    pub fn on_update(mut self, action: &str) -> Self {
        if let Some(reference) = self.reference.as_mut() {
            reference.on_update = Some(action.to_string());
        }
        self
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key_type, self.columns.join(", "))?;
        if let Some(reference) = &self.reference {
            write!(
                f,
                " references {} ({})",
                reference.table,
                reference.columns.join(", ")
            )?;
        }
        Ok(())
    }
}

/// One entry of a table definition, kept in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableDefinition {
    Column(Column),
    Key(Key),
    /// Raw fragment appended to the table body
    Fragment(String),
}

impl fmt::Display for TableDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableDefinition::Column(column) => write!(f, "{}", column),
            TableDefinition::Key(key) => write!(f, "{}", key),
            TableDefinition::Fragment(fragment) => write!(f, "fragment {}", fragment),
        }
    }
}

/// Table migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub op: SchemaOp,
    pub name: String,
    pub new_name: Option<String>,
    pub definitions: Vec<TableDefinition>,
    /// Create only when missing
    pub if_not_exists: bool,
    /// Drop only when present
    pub optional: bool,
    pub comment: Option<String>,
    pub options: Option<String>,
}

impl Table {
    pub(crate) fn new(op: SchemaOp, name: &str) -> Self {
        Self {
            op,
            name: name.to_string(),
            new_name: None,
            definitions: Vec::new(),
            if_not_exists: false,
            optional: false,
            comment: None,
            options: None,
        }
    }

    pub(crate) fn renamed(name: &str, new_name: &str) -> Self {
        let mut table = Self::new(SchemaOp::Rename, name);
        table.new_name = Some(new_name.to_string());
        table
    }

    /// Add a column and return it for further options
    pub fn column(&mut self, name: &str, column_type: ColumnType) -> &mut Column {
        self.push_column(Column::create(name, column_type))
    }

    pub(crate) fn push_column(&mut self, column: Column) -> &mut Column {
        self.definitions.push(TableDefinition::Column(column));
        match self.definitions.last_mut() {
            Some(TableDefinition::Column(column)) => column,
            _ => unreachable!("a column definition was just pushed"),
        }
    }

    /// Adapter-assigned identifier column
    pub fn id(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::Id).primary()
    }

    pub fn big_id(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::BigId).primary()
    }

    pub fn bool(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::Bool)
    }

    pub fn small_int(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::SmallInt)
    }

    pub fn int(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::Int)
    }

    pub fn big_int(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::BigInt)
    }

    pub fn float(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::Float)
    }

    pub fn decimal(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::Decimal)
    }

    pub fn string(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::String)
    }

    pub fn text(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::Text)
    }

    pub fn json(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::Json)
    }

    pub fn date(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::Date)
    }

    pub fn date_time(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::DateTime)
    }

    pub fn time(&mut self, name: &str) -> &mut Column {
        self.column(name, ColumnType::Time)
    }

    /// Add `created_at` and `updated_at` columns
    pub fn timestamps(&mut self) -> &mut Self {
        self.date_time("created_at");
        self.date_time("updated_at");
        self
    }

    pub fn primary_key(&mut self, column: &str) -> &mut Self {
        self.primary_keys(&[column])
    }

    /// Composite primary key
    pub fn primary_keys(&mut self, columns: &[&str]) -> &mut Self {
        self.key(Key::primary(columns))
    }

    pub fn unique(&mut self, columns: &[&str]) -> &mut Self {
        self.key(Key::unique(columns))
    }

    pub fn foreign_key(&mut self, column: &str, ref_table: &str, ref_column: &str) -> &mut Self {
        self.key(Key::foreign(column, ref_table, ref_column))
    }

    pub fn key(&mut self, key: Key) -> &mut Self {
        self.definitions.push(TableDefinition::Key(key));
        self
    }

    pub fn fragment(&mut self, fragment: &str) -> &mut Self {
        self.definitions
            .push(TableDefinition::Fragment(fragment.to_string()));
        self
    }

    pub fn set_comment(&mut self, comment: &str) -> &mut Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn set_options(&mut self, options: &str) -> &mut Self {
        self.options = Some(options.to_string());
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.definitions.iter().filter_map(|definition| match definition {
            TableDefinition::Column(column) => Some(column),
            _ => None,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.definitions.iter().filter_map(|definition| match definition {
            TableDefinition::Key(key) => Some(key),
            _ => None,
        })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} table {}", self.op, self.name)?;
        if let Some(new_name) = &self.new_name {
            write!(f, " to {}", new_name)?;
        }
        if !self.definitions.is_empty() {
            let definitions: Vec<String> =
                self.definitions.iter().map(|d| d.to_string()).collect();
            write!(f, " ({})", definitions.join(", "))?;
        }
        Ok(())
    }
}

/// Table being altered; adds column rename, alter and drop on top of [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    table: Table,
}

impl AlterTable {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            table: Table::new(SchemaOp::Alter, name),
        }
    }

    pub fn rename_column(&mut self, name: &str, new_name: &str) -> &mut Column {
        self.table.push_column(Column::rename(name, new_name))
    }

    pub fn alter_column(&mut self, name: &str, column_type: ColumnType) -> &mut Column {
        self.table.push_column(Column::alter(name, column_type))
    }

    pub fn drop_column(&mut self, name: &str) -> &mut Column {
        self.table.push_column(Column::drop(name))
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}

impl Deref for AlterTable {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.table
    }
}

impl DerefMut for AlterTable {
    fn deref_mut(&mut self) -> &mut Table {
        &mut self.table
    }
}
