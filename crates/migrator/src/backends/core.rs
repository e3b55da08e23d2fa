//! Core Migration Backend Traits
//!
//! A backend persists version records, runs transactions and physically
//! applies schema operations. The migrator only talks to these traits.

use async_trait::async_trait;

use crate::error::{MigrationError, MigrationResult};
use crate::schema::{Index, Table, TableDefinition};
use crate::step::{default_version_columns, RecordId, Version, VersionRecord};

/// Store holding the version-tracking table and the user schema
#[async_trait]
pub trait MigrationBackend: Send + Sync {
    /// Apply a table definition outside of any step transaction.
    ///
    /// Used for the version-tracking table, which arrives with `if_not_exists` set.
    async fn apply_table(&self, table: &Table) -> MigrationResult<()>;

    /// All version records, ascending by version
    async fn find_versions(&self) -> MigrationResult<Vec<VersionRecord>>;

    /// Begin a transaction. Dropping it without `commit` must discard its work.
    async fn begin(&self) -> MigrationResult<Box<dyn MigrationTransaction>>;

    /// Field descriptors for the version-tracking table.
    ///
    /// Backends override this to adjust physical types; the table name stays fixed.
    fn version_columns(&self) -> Vec<TableDefinition> {
        default_version_columns()
    }
}

/// Open transaction on a [`MigrationBackend`]
#[async_trait]
pub trait MigrationTransaction: Send {
    /// Record `version` as applied; the store assigns the id and timestamps
    async fn insert_version(&mut self, version: Version) -> MigrationResult<()>;

    async fn delete_version(&mut self, id: RecordId) -> MigrationResult<()>;

    async fn apply_table(&mut self, table: &Table) -> MigrationResult<()>;

    async fn apply_index(&mut self, index: &Index) -> MigrationResult<()> {
        Err(MigrationError::Unsupported(format!(
            "backend cannot apply index migrations ({})",
            index
        )))
    }

    /// Execute a raw statement, returning the affected row count
    async fn exec(&mut self, statement: &str) -> MigrationResult<u64> {
        Err(MigrationError::Unsupported(format!(
            "backend cannot execute raw statements ({})",
            statement
        )))
    }

    async fn commit(self: Box<Self>) -> MigrationResult<()>;

    async fn rollback(self: Box<Self>) -> MigrationResult<()>;
}
