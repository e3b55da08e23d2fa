//! Migrator configuration types and builders

use serde::{Deserialize, Serialize};
use service_builder::builder;

/// Configuration for the migrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[builder]
pub struct MigratorConfig {
    /// Create the version-tracking table (if not exists) before reconciling
    #[builder(default = "true", getter)]
    pub ensure_version_table: bool,

    /// Reject duplicate registered versions instead of letting them reconcile ambiguously
    #[builder(default = "false", getter)]
    pub strict_versions: bool,

    /// Log through `tracing` when no custom instrumenter is installed
    #[builder(default = "false", getter)]
    pub log_operations: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            ensure_version_table: true,
            strict_versions: false,
            log_operations: false,
        }
    }
}

impl MigratorConfigBuilder {
    /// Development configuration: operations are logged
    pub fn development() -> Self {
        MigratorConfigBuilder::new()
            .ensure_version_table(true)
            .log_operations(true)
    }

    /// Production configuration: operations are logged and duplicate versions rejected
    pub fn production() -> Self {
        MigratorConfigBuilder::new()
            .ensure_version_table(true)
            .strict_versions(true)
            .log_operations(true)
    }

    /// Testing configuration with minimal overhead
    pub fn testing() -> Self {
        MigratorConfigBuilder::new()
            .ensure_version_table(true)
            .strict_versions(true)
            .log_operations(false)
    }
}
