//! Error types for the migrator
//!
//! Every failure is surfaced to the caller of `migrate`, `rollback` or
//! `status`. Nothing in this crate retries.

use thiserror::Error;

use crate::step::Version;

/// Migration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    /// A persisted version has no matching registered step
    #[error("Missing local migration: version {version} is applied but not registered in order")]
    InconsistentState { version: Version },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Failed to apply migration {version}: {message}")]
    Apply { version: Version, message: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Migration configuration error: {0}")]
    Configuration(String),

    /// Raised by data migrations registered with `Schema::run`
    #[error("Data migration failed: {0}")]
    Data(String),
}

impl MigrationError {
    /// Attribute a store failure that happened while applying a step's schema.
    ///
    /// Errors that already carry their own meaning pass through unchanged.
    pub(crate) fn during_apply(self, version: Version) -> Self {
        match self {
            MigrationError::Store(message) => MigrationError::Apply { version, message },
            other => other,
        }
    }
}

/// Result type for migrator operations
pub type MigrationResult<T> = Result<T, MigrationError>;
