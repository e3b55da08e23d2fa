//! Instrumentation hook
//!
//! An instrumenter is called when an operation starts and returns a finisher
//! that receives the outcome. It observes only: the migrator ignores whatever
//! it does and never changes control flow because of it.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::error::MigrationError;

/// Completion callback returned by an instrumenter
pub type Finish = Box<dyn FnOnce(Option<&MigrationError>) + Send>;

type ObserveFn = dyn Fn(&str, &str) -> Finish + Send + Sync;

/// Optional observer for migrate, rollback and apply operations
#[derive(Clone, Default)]
pub struct Instrumenter {
    observer: Option<Arc<ObserveFn>>,
}

impl Instrumenter {
    pub fn new<F>(observer: F) -> Self
    where
        F: Fn(&str, &str) -> Finish + Send + Sync + 'static,
    {
        Self {
            observer: Some(Arc::new(observer)),
        }
    }

    /// Instrumenter that logs through `tracing`, see [`default_logger`]
    pub fn logger() -> Self {
        Self::new(default_logger)
    }

    pub fn is_set(&self) -> bool {
        self.observer.is_some()
    }

    /// Start observing `op`; call the returned finisher with the outcome.
    pub fn observe(&self, op: &str, message: &str) -> Finish {
        match &self.observer {
            Some(observer) => observer(op, message),
            None => Box::new(|_: Option<&MigrationError>| {}),
        }
    }
}

impl fmt::Debug for Instrumenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumenter")
            .field("set", &self.is_set())
            .finish()
    }
}

/// Logs every finished operation with its duration
pub fn default_logger(op: &str, message: &str) -> Finish {
    let started = Instant::now();
    let op = op.to_string();
    let message = message.to_string();

    Box::new(move |err: Option<&MigrationError>| {
        let duration = started.elapsed();
        match err {
            Some(err) => tracing::warn!(
                op = %op,
                duration_ms = duration.as_millis() as u64,
                error = %err,
                "{}",
                message
            ),
            None => tracing::info!(
                op = %op,
                duration_ms = duration.as_millis() as u64,
                "{}",
                message
            ),
        }
    })
}
