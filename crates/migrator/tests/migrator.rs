use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use elif_migrator::{
    Finish, Instrumenter, MigrationBackend, MigrationError, MigrationResult, MigrationTransaction,
    Migrator, RecordId, StepStatus, Table, Version, VersionRecord,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    EnsureTable(String),
    FindAll,
    Begin,
    Insert(Version),
    Delete(RecordId),
    ApplyTable(String),
    Exec(String),
    Commit,
    Rollback,
}

#[derive(Default)]
struct Shared {
    calls: Vec<Call>,
    records: Vec<VersionRecord>,
    next_id: RecordId,
    fail_table: Option<String>,
    fail_insert: Option<Version>,
    fail_delete: bool,
    fail_commit: bool,
}

/// Backend that records every call and keeps version records in memory
#[derive(Clone, Default)]
struct RecordingBackend {
    shared: Arc<Mutex<Shared>>,
}

impl RecordingBackend {
    fn with_records(versions: &[Version]) -> Self {
        let backend = Self::default();
        {
            let mut shared = backend.shared.lock();
            for version in versions {
                shared.next_id += 1;
                let id = shared.next_id;
                shared.records.push(VersionRecord::new(id, *version));
            }
        }
        backend
    }

    fn fail_on_table(&self, name: &str) {
        self.shared.lock().fail_table = Some(name.to_string());
    }

    fn fail_insert_of(&self, version: Version) {
        self.shared.lock().fail_insert = Some(version);
    }

    fn fail_deletes(&self) {
        self.shared.lock().fail_delete = true;
    }

    fn fail_commits(&self) {
        self.shared.lock().fail_commit = true;
    }

    fn calls(&self) -> Vec<Call> {
        self.shared.lock().calls.clone()
    }

    fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    fn versions(&self) -> Vec<Version> {
        self.shared.lock().records.iter().map(|r| r.version).collect()
    }

    fn record_id(&self, version: Version) -> RecordId {
        self.shared
            .lock()
            .records
            .iter()
            .find(|r| r.version == version)
            .map(|r| r.id)
            .unwrap()
    }

    fn push(&self, call: Call) {
        self.shared.lock().calls.push(call);
    }
}

#[async_trait]
impl MigrationBackend for RecordingBackend {
    async fn apply_table(&self, table: &Table) -> MigrationResult<()> {
        self.push(Call::EnsureTable(table.name.clone()));
        Ok(())
    }

    async fn find_versions(&self) -> MigrationResult<Vec<VersionRecord>> {
        self.push(Call::FindAll);
        let mut records = self.shared.lock().records.clone();
        records.sort_by_key(|r| r.version);
        Ok(records)
    }

    async fn begin(&self) -> MigrationResult<Box<dyn MigrationTransaction>> {
        self.push(Call::Begin);
        Ok(Box::new(RecordingTransaction {
            backend: self.clone(),
            inserted: Vec::new(),
            deleted: Vec::new(),
        }))
    }
}

/// Stages version record changes until commit. Index support is left to the trait default.
struct RecordingTransaction {
    backend: RecordingBackend,
    inserted: Vec<Version>,
    deleted: Vec<RecordId>,
}

#[async_trait]
impl MigrationTransaction for RecordingTransaction {
    async fn insert_version(&mut self, version: Version) -> MigrationResult<()> {
        self.backend.push(Call::Insert(version));
        if self.backend.shared.lock().fail_insert == Some(version) {
            return Err(MigrationError::Store(format!(
                "duplicate key value for version {}",
                version
            )));
        }
        self.inserted.push(version);
        Ok(())
    }

    async fn delete_version(&mut self, id: RecordId) -> MigrationResult<()> {
        self.backend.push(Call::Delete(id));
        if self.backend.shared.lock().fail_delete {
            return Err(MigrationError::Store(format!("cannot delete record {}", id)));
        }
        self.deleted.push(id);
        Ok(())
    }

    async fn apply_table(&mut self, table: &Table) -> MigrationResult<()> {
        self.backend
            .push(Call::ApplyTable(format!("{} {}", table.op, table.name)));
        if self.backend.shared.lock().fail_table.as_deref() == Some(table.name.as_str()) {
            return Err(MigrationError::Store(format!("cannot apply {}", table.name)));
        }
        Ok(())
    }

    async fn exec(&mut self, statement: &str) -> MigrationResult<u64> {
        self.backend.push(Call::Exec(statement.to_string()));
        Ok(1)
    }

    async fn commit(self: Box<Self>) -> MigrationResult<()> {
        self.backend.push(Call::Commit);

        let mut shared = self.backend.shared.lock();
        if shared.fail_commit {
            return Err(MigrationError::Store("commit failed".to_string()));
        }
        shared.records.retain(|r| !self.deleted.contains(&r.id));
        for version in &self.inserted {
            shared.next_id += 1;
            let id = shared.next_id;
            shared.records.push(VersionRecord::new(id, *version));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrationResult<()> {
        self.backend.push(Call::Rollback);
        Ok(())
    }
}

fn table_step(migrator: &mut Migrator<RecordingBackend>, version: Version) {
    let name = format!("t{}", version);
    let down_name = name.clone();
    migrator.register(
        version,
        move |schema| {
            schema.create_table(&name, |t| {
                t.id("id");
            });
        },
        move |schema| {
            schema.drop_table(&down_name);
        },
    );
}

fn migrator_with(backend: RecordingBackend, versions: &[Version]) -> Migrator<RecordingBackend> {
    let mut migrator = Migrator::new(backend);
    for version in versions {
        table_step(&mut migrator, *version);
    }
    migrator
}

#[tokio::test]
async fn test_status_with_no_records() {
    let backend = RecordingBackend::default();
    let migrator = migrator_with(backend.clone(), &[]);

    assert!(migrator.status().await.unwrap().is_empty());
    assert_eq!(
        backend.calls(),
        vec![
            Call::EnsureTable("elif_schema_versions".to_string()),
            Call::FindAll
        ]
    );
}

#[tokio::test]
async fn test_status_marks_recorded_steps_applied() {
    let backend = RecordingBackend::with_records(&[1, 2]);
    let migrator = migrator_with(backend.clone(), &[3, 1, 2]);

    let status = migrator.status().await.unwrap();
    assert_eq!(
        status,
        vec![
            StepStatus {
                version: 1,
                applied: true,
                record_id: Some(1)
            },
            StepStatus {
                version: 2,
                applied: true,
                record_id: Some(2)
            },
            StepStatus {
                version: 3,
                applied: false,
                record_id: None
            },
        ]
    );
}

#[tokio::test]
async fn test_unknown_record_aborts_before_any_transaction() {
    let backend = RecordingBackend::with_records(&[99]);
    let migrator = migrator_with(backend.clone(), &[1, 2]);

    let err = migrator.migrate().await.unwrap_err();
    assert_eq!(err, MigrationError::InconsistentState { version: 99 });

    let err = migrator.rollback().await.unwrap_err();
    assert_eq!(err, MigrationError::InconsistentState { version: 99 });

    assert!(!backend.calls().contains(&Call::Begin));
    assert_eq!(backend.versions(), vec![99]);
}

#[tokio::test]
async fn test_migrate_applies_pending_steps_in_order() {
    let backend = RecordingBackend::with_records(&[3]);
    let migrator = migrator_with(backend.clone(), &[2, 3, 1]);

    let result = migrator.migrate().await.unwrap();
    assert_eq!(result.applied_versions, vec![1, 2]);
    assert_eq!(result.applied_count, 2);
    assert_eq!(result.skipped_count, 1);

    assert_eq!(
        backend.calls(),
        vec![
            Call::EnsureTable("elif_schema_versions".to_string()),
            Call::FindAll,
            Call::Begin,
            Call::Insert(1),
            Call::ApplyTable("create t1".to_string()),
            Call::Commit,
            Call::Begin,
            Call::Insert(2),
            Call::ApplyTable("create t2".to_string()),
            Call::Commit,
        ]
    );
    assert_eq!(backend.versions(), vec![3, 1, 2]);
}

#[tokio::test]
async fn test_second_migrate_is_a_noop() {
    let backend = RecordingBackend::default();
    let migrator = migrator_with(backend.clone(), &[1, 2]);

    migrator.migrate().await.unwrap();
    backend.clear_calls();

    let result = migrator.migrate().await.unwrap();
    assert_eq!(result.applied_count, 0);
    assert_eq!(result.skipped_count, 2);
    // The version table is only ensured once per migrator
    assert_eq!(backend.calls(), vec![Call::FindAll]);
}

#[tokio::test]
async fn test_rollback_undoes_highest_applied_step_only() {
    let backend = RecordingBackend::with_records(&[1, 2]);
    let migrator = migrator_with(backend.clone(), &[1, 2, 3]);
    let id_of_two = backend.record_id(2);

    let result = migrator.rollback().await.unwrap();
    assert_eq!(result.rolled_back, Some(2));
    assert_eq!(
        backend.calls(),
        vec![
            Call::EnsureTable("elif_schema_versions".to_string()),
            Call::FindAll,
            Call::Begin,
            Call::Delete(id_of_two),
            Call::ApplyTable("drop t2".to_string()),
            Call::Commit,
        ]
    );
    assert_eq!(backend.versions(), vec![1]);

    let result = migrator.rollback().await.unwrap();
    assert_eq!(result.rolled_back, Some(1));
    assert!(backend.versions().is_empty());

    backend.clear_calls();
    let result = migrator.rollback().await.unwrap();
    assert_eq!(result.rolled_back, None);
    assert_eq!(backend.calls(), vec![Call::FindAll]);
}

#[tokio::test]
async fn test_failing_step_is_rolled_back_and_stops_migrate() {
    let backend = RecordingBackend::default();
    backend.fail_on_table("t2");
    let migrator = migrator_with(backend.clone(), &[1, 2, 3]);

    let err = migrator.migrate().await.unwrap_err();
    assert_eq!(
        err,
        MigrationError::Apply {
            version: 2,
            message: "cannot apply t2".to_string()
        }
    );

    let calls = backend.calls();
    assert_eq!(
        &calls[calls.len() - 4..],
        &[
            Call::Begin,
            Call::Insert(2),
            Call::ApplyTable("create t2".to_string()),
            Call::Rollback,
        ]
    );
    assert!(!calls.contains(&Call::Insert(3)));
    assert_eq!(backend.versions(), vec![1]);
}

#[tokio::test]
async fn test_failing_version_insert_skips_schema_and_stops_migrate() {
    let backend = RecordingBackend::default();
    backend.fail_insert_of(2);
    let migrator = migrator_with(backend.clone(), &[1, 2, 3]);

    let err = migrator.migrate().await.unwrap_err();
    assert_eq!(
        err,
        MigrationError::Store("duplicate key value for version 2".to_string())
    );

    let calls = backend.calls();
    assert_eq!(
        &calls[calls.len() - 3..],
        &[Call::Begin, Call::Insert(2), Call::Rollback]
    );
    assert!(!calls.contains(&Call::ApplyTable("create t2".to_string())));
    assert!(!calls.contains(&Call::Insert(3)));
    assert_eq!(backend.versions(), vec![1]);
}

#[tokio::test]
async fn test_failing_version_delete_keeps_record() {
    let backend = RecordingBackend::with_records(&[1, 2]);
    backend.fail_deletes();
    let migrator = migrator_with(backend.clone(), &[1, 2]);
    let id_of_two = backend.record_id(2);

    let err = migrator.rollback().await.unwrap_err();
    assert_eq!(
        err,
        MigrationError::Store(format!("cannot delete record {}", id_of_two))
    );

    let calls = backend.calls();
    assert_eq!(
        &calls[calls.len() - 3..],
        &[Call::Begin, Call::Delete(id_of_two), Call::Rollback]
    );
    assert!(!calls.contains(&Call::ApplyTable("drop t2".to_string())));
    assert_eq!(backend.versions(), vec![1, 2]);
}

#[tokio::test]
async fn test_commit_failure_is_returned() {
    let backend = RecordingBackend::default();
    backend.fail_commits();
    let migrator = migrator_with(backend.clone(), &[1, 2]);

    let err = migrator.migrate().await.unwrap_err();
    assert_eq!(err, MigrationError::Store("commit failed".to_string()));
    assert!(!backend.calls().contains(&Call::Insert(2)));
    assert!(backend.versions().is_empty());
}

#[tokio::test]
async fn test_index_without_backend_support_is_unsupported() {
    let backend = RecordingBackend::default();
    let mut migrator = Migrator::new(backend.clone());
    migrator.register(
        1,
        |schema| {
            schema.create_index("users", "users_email", &["email"]);
        },
        |schema| {
            schema.drop_index("users", "users_email");
        },
    );

    let err = migrator.migrate().await.unwrap_err();
    assert!(matches!(err, MigrationError::Unsupported(_)));
    assert_eq!(backend.calls().last(), Some(&Call::Rollback));
    assert!(backend.versions().is_empty());
}

#[tokio::test]
async fn test_data_migration_runs_inside_step_transaction() {
    let backend = RecordingBackend::default();
    let mut migrator = Migrator::new(backend.clone());
    migrator.register(
        1,
        |schema| {
            schema
                .exec("ALTER TABLE users ADD COLUMN active BOOLEAN")
                .run(|tx| {
                    Box::pin(async move {
                        tx.exec("UPDATE users SET active = true").await?;
                        Ok::<(), MigrationError>(())
                    })
                });
        },
        |schema| {
            schema.run(|_| {
                Box::pin(async move { Err::<(), _>(MigrationError::Data("irreversible".to_string())) })
            });
        },
    );

    migrator.migrate().await.unwrap();
    assert_eq!(
        &backend.calls()[2..],
        &[
            Call::Begin,
            Call::Insert(1),
            Call::Exec("ALTER TABLE users ADD COLUMN active BOOLEAN".to_string()),
            Call::Exec("UPDATE users SET active = true".to_string()),
            Call::Commit,
        ]
    );

    let err = migrator.rollback().await.unwrap_err();
    assert_eq!(err, MigrationError::Data("irreversible".to_string()));
    assert_eq!(backend.calls().last(), Some(&Call::Rollback));
    assert_eq!(backend.versions(), vec![1]);
}

#[tokio::test]
async fn test_instrumenter_observes_operations() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let backend = RecordingBackend::default();
    backend.fail_on_table("t2");
    let mut migrator = migrator_with(backend, &[1, 2]);
    migrator.instrumentation(Instrumenter::new(move |op, message| -> Finish {
        sink.lock().push(format!("{}: {}", op, message));
        let sink = sink.clone();
        let op = op.to_string();
        Box::new(move |err: Option<&MigrationError>| {
            if err.is_some() {
                sink.lock().push(format!("{} failed", op));
            }
        })
    }));

    assert!(migrator.migrate().await.is_err());
    assert_eq!(
        *seen.lock(),
        vec![
            "migrate: 1 create table t1 (create column id ID)".to_string(),
            "apply: create table t1 (create column id ID)".to_string(),
            "migrate: 2 create table t2 (create column id ID)".to_string(),
            "apply: create table t2 (create column id ID)".to_string(),
            "apply failed".to_string(),
            "migrate failed".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_round_trip_with_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("elif_migrator=debug")
        .with_test_writer()
        .try_init();

    let backend = RecordingBackend::default();
    let config = elif_migrator::MigratorConfigBuilder::development()
        .build()
        .expect("Failed to build config");
    let mut migrator = Migrator::with_config(backend.clone(), config);
    for version in [20240102000000, 20240101000000] {
        table_step(&mut migrator, version);
    }

    migrator.migrate().await.unwrap();
    assert_eq!(backend.versions(), vec![20240101000000, 20240102000000]);

    migrator.rollback().await.unwrap();
    migrator.rollback().await.unwrap();
    assert!(backend.versions().is_empty());

    let status = migrator.status().await.unwrap();
    assert!(status.iter().all(|s| !s.applied));
}
