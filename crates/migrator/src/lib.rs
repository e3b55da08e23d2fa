//! # elif-migrator
//!
//! Versioned schema migrations for the elif.rs framework.
//!
//! ## Features
//!
//! - **Versioned steps**: Each step carries an up and a down schema, keyed by version
//! - **Reconciliation**: Registered steps are matched against persisted version records
//! - **Transactional steps**: Every step runs in its own backend transaction
//! - **Pluggable backends**: The migrator only talks to the backend traits
//! - **Instrumentation**: Optional observer for migrate, rollback and apply operations
//!
//! ## Quick Start
//!
//! ```rust
//! use elif_migrator::{MemoryBackend, Migrator};
//!
//! # tokio_test::block_on(async {
//! let mut migrator = Migrator::new(MemoryBackend::new());
//!
//! migrator.register(
//!     20240101120000,
//!     |schema| {
//!         schema.create_table("users", |t| {
//!             t.id("id");
//!             t.string("email").required();
//!             t.timestamps();
//!         });
//!     },
//!     |schema| {
//!         schema.drop_table("users");
//!     },
//! );
//!
//! // Apply every pending step
//! let result = migrator.migrate().await.unwrap();
//! assert_eq!(result.applied_versions, vec![20240101120000]);
//!
//! // Undo the most recent one
//! let rollback = migrator.rollback().await.unwrap();
//! assert_eq!(rollback.rolled_back, Some(20240101120000));
//! # });
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod instrumentation;
pub mod migrator;
pub mod reconcile;
pub mod registry;
pub mod schema;
pub mod step;

pub use backends::{MemoryBackend, MigrationBackend, MigrationTransaction};
pub use config::*;
pub use error::{MigrationError, MigrationResult};
pub use instrumentation::{default_logger, Finish, Instrumenter};
pub use migrator::{MigrationRunResult, Migrator, RollbackResult, StepStatus};
pub use reconcile::{reconcile, ReconciledStep, StepState};
pub use registry::StepRegistry;
pub use schema::{
    AlterTable, BoxFuture, Column, ColumnType, DataMigration, ForeignReference, Index, Key,
    KeyType, Migration, Schema, SchemaOp, Table, TableDefinition,
};
pub use step::{RecordId, Step, Version, VersionRecord, VERSION_TABLE};
