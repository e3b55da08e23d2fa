//! Schema definitions
//!
//! A [`Schema`] accumulates the operations of one migration direction. The
//! callbacks given to `Migrator::register` receive a `&mut Schema` and describe
//! tables, indexes, raw statements and data migrations with it. The migrator
//! never inspects the operations beyond dispatching each one to the backend.

pub mod column;
pub mod index;
pub mod table;

pub use column::{Column, ColumnType};
pub use index::Index;
pub use table::{AlterTable, ForeignReference, Key, KeyType, Table, TableDefinition};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::backends::MigrationTransaction;
use crate::error::MigrationResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Kind of change a table, column or index operation makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaOp {
    Create,
    Alter,
    Rename,
    Drop,
}

impl fmt::Display for SchemaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaOp::Create => write!(f, "create"),
            SchemaOp::Alter => write!(f, "alter"),
            SchemaOp::Rename => write!(f, "rename"),
            SchemaOp::Drop => write!(f, "drop"),
        }
    }
}

type DataMigrationFn = dyn for<'a> Fn(&'a mut dyn MigrationTransaction) -> BoxFuture<'a, MigrationResult<()>>
    + Send
    + Sync;

/// Data migration run inside the step's transaction
#[derive(Clone)]
pub struct DataMigration(Arc<DataMigrationFn>);

impl DataMigration {
    pub async fn run(&self, tx: &mut dyn MigrationTransaction) -> MigrationResult<()> {
        (self.0)(tx).await
    }
}

impl fmt::Debug for DataMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataMigration")
    }
}

/// A single schema operation
#[derive(Debug, Clone)]
pub enum Migration {
    Table(Table),
    Index(Index),
    /// Raw statement handed to the backend as-is
    Raw(String),
    Do(DataMigration),
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Migration::Table(table) => write!(f, "{}", table),
            Migration::Index(index) => write!(f, "{}", index),
            Migration::Raw(statement) => write!(f, "exec {}", statement),
            Migration::Do(_) => write!(f, "run data migration"),
        }
    }
}

/// Schema accumulator
#[derive(Debug, Clone, Default)]
pub struct Schema {
    migrations: Vec<Migration>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    fn push(&mut self, migration: Migration) -> &mut Self {
        self.migrations.push(migration);
        self
    }

    pub fn create_table<F>(&mut self, name: &str, callback: F) -> &mut Self
    where
        F: FnOnce(&mut Table),
    {
        let mut table = Table::new(SchemaOp::Create, name);
        callback(&mut table);
        self.push(Migration::Table(table))
    }

    pub fn create_table_if_not_exists<F>(&mut self, name: &str, callback: F) -> &mut Self
    where
        F: FnOnce(&mut Table),
    {
        let mut table = Table::new(SchemaOp::Create, name);
        table.if_not_exists = true;
        callback(&mut table);
        self.push(Migration::Table(table))
    }

    pub fn alter_table<F>(&mut self, name: &str, callback: F) -> &mut Self
    where
        F: FnOnce(&mut AlterTable),
    {
        let mut table = AlterTable::new(name);
        callback(&mut table);
        self.push(Migration::Table(table.into_table()))
    }

    pub fn rename_table(&mut self, name: &str, new_name: &str) -> &mut Self {
        self.push(Migration::Table(Table::renamed(name, new_name)))
    }

    pub fn drop_table(&mut self, name: &str) -> &mut Self {
        self.push(Migration::Table(Table::new(SchemaOp::Drop, name)))
    }

    pub fn drop_table_if_exists(&mut self, name: &str) -> &mut Self {
        let mut table = Table::new(SchemaOp::Drop, name);
        table.optional = true;
        self.push(Migration::Table(table))
    }

    pub fn add_column(&mut self, table: &str, name: &str, column_type: ColumnType) -> &mut Self {
        self.alter_table(table, |t| {
            t.column(name, column_type);
        })
    }

    pub fn alter_column(&mut self, table: &str, name: &str, column_type: ColumnType) -> &mut Self {
        self.alter_table(table, |t| {
            t.alter_column(name, column_type);
        })
    }

    pub fn rename_column(&mut self, table: &str, name: &str, new_name: &str) -> &mut Self {
        self.alter_table(table, |t| {
            t.rename_column(name, new_name);
        })
    }

    pub fn drop_column(&mut self, table: &str, name: &str) -> &mut Self {
        self.alter_table(table, |t| {
            t.drop_column(name);
        })
    }

    pub fn create_index(&mut self, table: &str, name: &str, columns: &[&str]) -> &mut Self {
        self.push(Migration::Index(Index::create(table, name, columns)))
    }

    pub fn create_unique_index(&mut self, table: &str, name: &str, columns: &[&str]) -> &mut Self {
        let mut index = Index::create(table, name, columns);
        index.unique = true;
        self.push(Migration::Index(index))
    }

    pub fn drop_index(&mut self, table: &str, name: &str) -> &mut Self {
        self.push(Migration::Index(Index::drop(table, name)))
    }

    pub fn drop_index_if_exists(&mut self, table: &str, name: &str) -> &mut Self {
        let mut index = Index::drop(table, name);
        index.optional = true;
        self.push(Migration::Index(index))
    }

    /// Raw statement, executed by the backend within the step's transaction
    pub fn exec(&mut self, statement: &str) -> &mut Self {
        self.push(Migration::Raw(statement.to_string()))
    }

    /// Data migration with access to the step's open transaction.
    ///
    /// ```ignore
    /// schema.run(|tx| Box::pin(async move {
    ///     tx.exec("UPDATE users SET active = true").await?;
    ///     Ok(())
    /// }));
    /// ```
    pub fn run<F>(&mut self, callback: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut dyn MigrationTransaction) -> BoxFuture<'a, MigrationResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.push(Migration::Do(DataMigration(Arc::new(callback))))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptions: Vec<String> = self.migrations.iter().map(|m| m.to_string()).collect();
        f.write_str(&descriptions.join("; "))
    }
}
