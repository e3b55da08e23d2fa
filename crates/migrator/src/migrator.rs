//! Migrator - applies and rolls back registered steps
//!
//! Every call first reconciles the registry against the version records, then
//! works through the steps in ascending version order. Each step runs in its
//! own transaction: the version record change comes first, then the step's
//! schema operations. A failing step is rolled back and aborts the call; steps
//! committed earlier in the same call stay applied.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backends::{MigrationBackend, MigrationTransaction};
use crate::config::MigratorConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::instrumentation::Instrumenter;
use crate::reconcile::{reconcile, ReconciledStep};
use crate::registry::StepRegistry;
use crate::schema::{Migration, Schema};
use crate::step::{version_table, RecordId, Step, Version};

/// Result of running migrations
#[derive(Debug, Clone)]
pub struct MigrationRunResult {
    /// Number of steps that were applied
    pub applied_count: usize,
    /// Versions that were applied, in order
    pub applied_versions: Vec<Version>,
    /// Number of steps that were already applied
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Result of rolling back
#[derive(Debug, Clone)]
pub struct RollbackResult {
    /// Version that was rolled back; `None` when nothing was applied
    pub rolled_back: Option<Version>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Applied state of one registered step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStatus {
    pub version: Version,
    pub applied: bool,
    pub record_id: Option<RecordId>,
}

/// Migration manager
pub struct Migrator<B: MigrationBackend> {
    backend: B,
    registry: StepRegistry,
    config: MigratorConfig,
    instrumenter: Instrumenter,
    version_table_ready: AtomicBool,
}

impl<B: MigrationBackend> Migrator<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, MigratorConfig::default())
    }

    pub fn with_config(backend: B, config: MigratorConfig) -> Self {
        let instrumenter = if *config.get_log_operations() {
            Instrumenter::logger()
        } else {
            Instrumenter::default()
        };

        Self {
            backend,
            registry: StepRegistry::new(),
            config,
            instrumenter,
            version_table_ready: AtomicBool::new(false),
        }
    }

    /// Replace the instrumenter
    pub fn instrumentation(&mut self, instrumenter: Instrumenter) {
        self.instrumenter = instrumenter;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Register a migration step
    pub fn register<U, D>(&mut self, version: Version, up: U, down: D)
    where
        U: FnOnce(&mut Schema),
        D: FnOnce(&mut Schema),
    {
        self.registry.register(version, up, down);
    }

    /// Apply every pending step in ascending version order
    pub async fn migrate(&self) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();
        let steps = self.sync().await?;

        let mut applied_versions = Vec::new();
        let mut skipped_count = 0;

        for entry in &steps {
            if entry.is_applied() {
                skipped_count += 1;
                continue;
            }

            let step = entry.step();
            let finish = self
                .instrumenter
                .observe("migrate", &format!("{} {}", step.version(), step.up()));

            let result = self.migrate_step(step).await;
            finish(result.as_ref().err());
            result?;

            info!("Applied migration {}", step.version());
            applied_versions.push(step.version());
        }

        Ok(MigrationRunResult {
            applied_count: applied_versions.len(),
            applied_versions,
            skipped_count,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Roll back the highest applied step, and only that one
    pub async fn rollback(&self) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();
        let steps = self.sync().await?;

        let target = steps
            .iter()
            .rev()
            .find_map(|entry| entry.record_id().map(|id| (entry.step(), id)));

        let Some((step, record_id)) = target else {
            debug!("No applied migration to roll back");
            return Ok(RollbackResult {
                rolled_back: None,
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        };

        let finish = self
            .instrumenter
            .observe("rollback", &format!("{} {}", step.version(), step.down()));

        let result = self.rollback_step(step, record_id).await;
        finish(result.as_ref().err());
        result?;

        info!("Rolled back migration {}", step.version());

        Ok(RollbackResult {
            rolled_back: Some(step.version()),
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Applied state of every registered step, ascending by version
    pub async fn status(&self) -> MigrationResult<Vec<StepStatus>> {
        let steps = self.sync().await?;

        Ok(steps
            .iter()
            .map(|entry| StepStatus {
                version: entry.version(),
                applied: entry.is_applied(),
                record_id: entry.record_id(),
            })
            .collect())
    }

    /// Reconcile the registry against the persisted version records
    async fn sync(&self) -> MigrationResult<Vec<ReconciledStep<'_>>> {
        if *self.config.get_strict_versions() {
            let duplicates = self.registry.duplicate_versions();
            if !duplicates.is_empty() {
                return Err(MigrationError::Configuration(format!(
                    "duplicate migration versions registered: {:?}",
                    duplicates
                )));
            }
        }

        self.ensure_version_table().await?;

        let records = self.backend.find_versions().await?;
        let steps = reconcile(self.registry.steps(), &records)?;

        debug!(
            "Reconciled {} migrations against {} applied versions",
            steps.len(),
            records.len()
        );

        Ok(steps)
    }

    async fn ensure_version_table(&self) -> MigrationResult<()> {
        if !*self.config.get_ensure_version_table()
            || self.version_table_ready.load(Ordering::Acquire)
        {
            return Ok(());
        }

        let table = version_table(self.backend.version_columns());
        self.backend.apply_table(&table).await?;
        self.version_table_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn migrate_step(&self, step: &Step) -> MigrationResult<()> {
        let mut tx = self.backend.begin().await?;

        let result = async {
            tx.insert_version(step.version()).await?;
            self.run(&mut *tx, step.version(), step.up()).await
        }
        .await;

        finish_transaction(tx, result).await
    }

    async fn rollback_step(&self, step: &Step, record_id: RecordId) -> MigrationResult<()> {
        let mut tx = self.backend.begin().await?;

        let result = async {
            tx.delete_version(record_id).await?;
            self.run(&mut *tx, step.version(), step.down()).await
        }
        .await;

        finish_transaction(tx, result).await
    }

    async fn run(
        &self,
        tx: &mut dyn MigrationTransaction,
        version: Version,
        schema: &Schema,
    ) -> MigrationResult<()> {
        for migration in schema.migrations() {
            let finish = self.instrumenter.observe("apply", &migration.to_string());

            let result = match migration {
                Migration::Table(table) => tx.apply_table(table).await,
                Migration::Index(index) => tx.apply_index(index).await,
                Migration::Raw(statement) => tx.exec(statement).await.map(|_| ()),
                Migration::Do(data) => data.run(&mut *tx).await,
            }
            .map_err(|err| match migration {
                Migration::Do(_) => err,
                _ => err.during_apply(version),
            });

            finish(result.as_ref().err());
            result?;
        }

        Ok(())
    }
}

/// Commit on success; otherwise roll back and return the original error.
async fn finish_transaction(
    tx: Box<dyn MigrationTransaction>,
    result: MigrationResult<()>,
) -> MigrationResult<()> {
    match result {
        Ok(()) => tx.commit().await,
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Failed to roll back migration transaction: {}", rollback_err);
            }
            Err(err)
        }
    }
}
