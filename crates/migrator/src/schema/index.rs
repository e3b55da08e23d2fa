//! Index definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use super::SchemaOp;

/// Index migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub op: SchemaOp,
    pub table: String,
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
    /// Skip instead of failing when the index is already in the requested state
    pub optional: bool,
    pub comment: Option<String>,
}

impl Index {
    pub(crate) fn create(table: &str, name: &str, columns: &[&str]) -> Self {
        Self {
            op: SchemaOp::Create,
            table: table.to_string(),
            name: name.to_string(),
            unique: false,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            optional: false,
            comment: None,
        }
    }

    pub(crate) fn drop(table: &str, name: &str) -> Self {
        Self {
            op: SchemaOp::Drop,
            table: table.to_string(),
            name: name.to_string(),
            unique: false,
            columns: Vec::new(),
            optional: false,
            comment: None,
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.unique { "unique index" } else { "index" };
        write!(f, "{} {} {} on {}", self.op, kind, self.name, self.table)?;
        if !self.columns.is_empty() {
            write!(f, " ({})", self.columns.join(", "))?;
        }
        Ok(())
    }
}
