//! Migration steps and persisted version records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{Column, ColumnType, Key, Schema, SchemaOp, Table, TableDefinition};

/// Migration version key, typically a timestamp such as `20240101120000`
pub type Version = i64;

/// Store-assigned identifier of a version record
pub type RecordId = i64;

/// Name of the version-tracking table. Reserved, not configurable.
pub const VERSION_TABLE: &str = "elif_schema_versions";

/// A registered migration step
#[derive(Debug, Clone)]
pub struct Step {
    version: Version,
    up: Schema,
    down: Schema,
}

impl Step {
    pub(crate) fn new(version: Version, up: Schema, down: Schema) -> Self {
        Self { version, up, down }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn up(&self) -> &Schema {
        &self.up
    }

    pub fn down(&self) -> &Schema {
        &self.down
    }
}

/// Persisted proof that a step has been applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: RecordId,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn new(id: RecordId, version: Version) -> Self {
        let now = Utc::now();
        Self {
            id,
            version,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Default field descriptors of the version-tracking table
pub fn default_version_columns() -> Vec<TableDefinition> {
    let mut id = Column::create("id", ColumnType::Id);
    id.primary();

    let mut version = Column::create("version", ColumnType::BigInt);
    version.unique().required();

    vec![
        TableDefinition::Column(id),
        TableDefinition::Column(version),
        TableDefinition::Column(Column::create("created_at", ColumnType::DateTime)),
        TableDefinition::Column(Column::create("updated_at", ColumnType::DateTime)),
        TableDefinition::Key(Key::primary(&["id"])),
        TableDefinition::Key(Key::unique(&["version"])),
    ]
}

/// Create-if-not-exists definition of the version-tracking table
pub fn version_table(columns: Vec<TableDefinition>) -> Table {
    let mut table = Table::new(SchemaOp::Create, VERSION_TABLE);
    table.if_not_exists = true;
    table.definitions = columns;
    table
}
