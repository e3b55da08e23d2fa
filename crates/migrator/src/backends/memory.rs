//! In-memory migration backend for development and testing
//!
//! Keeps a catalog of tables and indexes, a log of raw statements and the
//! version records. A transaction works on a private copy of the state and
//! publishes it on commit, so dropped or rolled back transactions leave no
//! trace. Commits fail when another transaction committed in between.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::core::{MigrationBackend, MigrationTransaction};
use crate::error::{MigrationError, MigrationResult};
use crate::schema::{Column, Index, SchemaOp, Table, TableDefinition};
use crate::step::{RecordId, Version, VersionRecord, VERSION_TABLE};

#[derive(Debug, Clone, Default)]
struct TableState {
    columns: Vec<Column>,
    definitions: Vec<TableDefinition>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: BTreeMap<String, TableState>,
    indexes: BTreeMap<String, Index>,
    statements: Vec<String>,
    versions: Vec<VersionRecord>,
    next_id: RecordId,
    generation: u64,
}

impl MemoryState {
    fn apply_table(&mut self, table: &Table) -> MigrationResult<()> {
        match table.op {
            SchemaOp::Create => {
                if self.tables.contains_key(&table.name) {
                    if table.if_not_exists {
                        return Ok(());
                    }
                    return Err(MigrationError::Store(format!(
                        "table '{}' already exists",
                        table.name
                    )));
                }

                let mut state = TableState::default();
                for definition in &table.definitions {
                    match definition {
                        TableDefinition::Column(column) => add_column(&table.name, &mut state, column)?,
                        other => state.definitions.push(other.clone()),
                    }
                }
                self.tables.insert(table.name.clone(), state);
            }
            SchemaOp::Alter => {
                let state = self.tables.get_mut(&table.name).ok_or_else(|| {
                    MigrationError::Store(format!("table '{}' does not exist", table.name))
                })?;

                for definition in &table.definitions {
                    match definition {
                        TableDefinition::Column(column) => alter_column(&table.name, state, column)?,
                        other => state.definitions.push(other.clone()),
                    }
                }
            }
            SchemaOp::Rename => {
                let new_name = table.new_name.as_deref().ok_or_else(|| {
                    MigrationError::Store(format!("rename of '{}' has no new name", table.name))
                })?;
                if self.tables.contains_key(new_name) {
                    return Err(MigrationError::Store(format!(
                        "table '{}' already exists",
                        new_name
                    )));
                }
                let state = self.tables.remove(&table.name).ok_or_else(|| {
                    MigrationError::Store(format!("table '{}' does not exist", table.name))
                })?;
                self.tables.insert(new_name.to_string(), state);

                for index in self.indexes.values_mut() {
                    if index.table == table.name {
                        index.table = new_name.to_string();
                    }
                }
            }
            SchemaOp::Drop => {
                if self.tables.remove(&table.name).is_none() && !table.optional {
                    return Err(MigrationError::Store(format!(
                        "table '{}' does not exist",
                        table.name
                    )));
                }
                self.indexes.retain(|_, index| index.table != table.name);
            }
        }

        Ok(())
    }

    fn apply_index(&mut self, index: &Index) -> MigrationResult<()> {
        match index.op {
            SchemaOp::Create => {
                if self.indexes.contains_key(&index.name) {
                    if index.optional {
                        return Ok(());
                    }
                    return Err(MigrationError::Store(format!(
                        "index '{}' already exists",
                        index.name
                    )));
                }
                let table = self.tables.get(&index.table).ok_or_else(|| {
                    MigrationError::Store(format!("table '{}' does not exist", index.table))
                })?;
                if let Some(missing) = index
                    .columns
                    .iter()
                    .find(|name| !table.columns.iter().any(|c| &c.name == *name))
                {
                    return Err(MigrationError::Store(format!(
                        "column '{}' does not exist on '{}'",
                        missing, index.table
                    )));
                }
                self.indexes.insert(index.name.clone(), index.clone());
            }
            SchemaOp::Drop => {
                if self.indexes.remove(&index.name).is_none() && !index.optional {
                    return Err(MigrationError::Store(format!(
                        "index '{}' does not exist",
                        index.name
                    )));
                }
            }
            SchemaOp::Alter | SchemaOp::Rename => {
                return Err(MigrationError::Unsupported(format!(
                    "{} index is not supported by the memory backend",
                    index.op
                )));
            }
        }

        Ok(())
    }

    fn insert_version(&mut self, version: Version) -> MigrationResult<()> {
        self.require_version_table()?;
        if self.versions.iter().any(|record| record.version == version) {
            return Err(MigrationError::Store(format!(
                "duplicate key value violates unique constraint on {}.version ({})",
                VERSION_TABLE, version
            )));
        }

        self.next_id += 1;
        self.versions.push(VersionRecord::new(self.next_id, version));
        Ok(())
    }

    fn delete_version(&mut self, id: RecordId) -> MigrationResult<()> {
        self.require_version_table()?;
        let position = self
            .versions
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| MigrationError::Store(format!("version record {} not found", id)))?;
        self.versions.remove(position);
        Ok(())
    }

    fn require_version_table(&self) -> MigrationResult<()> {
        if self.tables.contains_key(VERSION_TABLE) {
            Ok(())
        } else {
            Err(MigrationError::Store(format!(
                "table '{}' does not exist",
                VERSION_TABLE
            )))
        }
    }
}

fn add_column(table: &str, state: &mut TableState, column: &Column) -> MigrationResult<()> {
    if state.columns.iter().any(|c| c.name == column.name) {
        return Err(MigrationError::Store(format!(
            "column '{}' already exists on '{}'",
            column.name, table
        )));
    }
    state.columns.push(column.clone());
    Ok(())
}

fn alter_column(table: &str, state: &mut TableState, column: &Column) -> MigrationResult<()> {
    if column.op == SchemaOp::Create {
        return add_column(table, state, column);
    }

    let position = state
        .columns
        .iter()
        .position(|c| c.name == column.name)
        .ok_or_else(|| {
            MigrationError::Store(format!(
                "column '{}' does not exist on '{}'",
                column.name, table
            ))
        })?;

    match column.op {
        SchemaOp::Alter => {
            let existing = &mut state.columns[position];
            existing.column_type = column.column_type;
            existing.required = column.required;
            existing.unique = column.unique;
            existing.default = column.default.clone();
        }
        SchemaOp::Rename => {
            let new_name = column.rename.clone().ok_or_else(|| {
                MigrationError::Store(format!(
                    "rename of column '{}' on '{}' has no new name",
                    column.name, table
                ))
            })?;
            if state.columns.iter().any(|c| c.name == new_name) {
                return Err(MigrationError::Store(format!(
                    "column '{}' already exists on '{}'",
                    new_name, table
                )));
            }
            state.columns[position].name = new_name;
        }
        SchemaOp::Drop => {
            state.columns.remove(position);
        }
        SchemaOp::Create => {}
    }

    Ok(())
}

/// In-memory migration backend
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.state.read().tables.contains_key(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state.read().tables.keys().cloned().collect()
    }

    /// Column names of `table` in definition order
    pub fn columns(&self, table: &str) -> Option<Vec<String>> {
        self.state
            .read()
            .tables
            .get(table)
            .map(|state| state.columns.iter().map(|c| c.name.clone()).collect())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.state.read().indexes.contains_key(name)
    }

    /// Raw statements executed so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.state.read().statements.clone()
    }

    /// Version records ascending by version
    pub fn versions(&self) -> Vec<VersionRecord> {
        let mut versions = self.state.read().versions.clone();
        versions.sort_by_key(|record| record.version);
        versions
    }
}

#[async_trait]
impl MigrationBackend for MemoryBackend {
    async fn apply_table(&self, table: &Table) -> MigrationResult<()> {
        let mut state = self.state.write();
        state.apply_table(table)?;
        state.generation += 1;
        Ok(())
    }

    async fn find_versions(&self) -> MigrationResult<Vec<VersionRecord>> {
        self.state.read().require_version_table()?;
        Ok(self.versions())
    }

    async fn begin(&self) -> MigrationResult<Box<dyn MigrationTransaction>> {
        let staged = self.state.read().clone();
        Ok(Box::new(MemoryTransaction {
            shared: self.state.clone(),
            base_generation: staged.generation,
            staged,
        }))
    }
}

/// Transaction over a private copy of the backend state
struct MemoryTransaction {
    shared: Arc<RwLock<MemoryState>>,
    staged: MemoryState,
    base_generation: u64,
}

#[async_trait]
impl MigrationTransaction for MemoryTransaction {
    async fn insert_version(&mut self, version: Version) -> MigrationResult<()> {
        self.staged.insert_version(version)
    }

    async fn delete_version(&mut self, id: RecordId) -> MigrationResult<()> {
        self.staged.delete_version(id)
    }

    async fn apply_table(&mut self, table: &Table) -> MigrationResult<()> {
        self.staged.apply_table(table)
    }

    async fn apply_index(&mut self, index: &Index) -> MigrationResult<()> {
        self.staged.apply_index(index)
    }

    async fn exec(&mut self, statement: &str) -> MigrationResult<u64> {
        self.staged.statements.push(statement.to_string());
        Ok(0)
    }

    async fn commit(self: Box<Self>) -> MigrationResult<()> {
        let MemoryTransaction {
            shared,
            mut staged,
            base_generation,
        } = *self;

        let mut state = shared.write();
        if state.generation != base_generation {
            return Err(MigrationError::Store(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }

        staged.generation = base_generation + 1;
        *state = staged;
        debug!("Committed memory transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrationResult<()> {
        debug!("Rolled back memory transaction");
        Ok(())
    }
}
