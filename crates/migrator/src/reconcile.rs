//! Reconciliation of registered steps against persisted version records
//!
//! [`reconcile`] is a pure function: it sorts the steps by version and walks
//! them once, left to right, alongside the records (which the store returns in
//! ascending version order). A step is applied when it matches the next
//! unconsumed record. Gaps are allowed; a record that is never consumed is not.

use crate::error::{MigrationError, MigrationResult};
use crate::step::{RecordId, Step, Version, VersionRecord};

/// Applied state of a step, derived from the version records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Applied { record_id: RecordId },
}

/// A registered step with its derived state
#[derive(Debug, Clone, Copy)]
pub struct ReconciledStep<'a> {
    step: &'a Step,
    state: StepState,
}

impl<'a> ReconciledStep<'a> {
    pub fn step(&self) -> &'a Step {
        self.step
    }

    pub fn version(&self) -> Version {
        self.step.version()
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.state, StepState::Applied { .. })
    }

    /// Id of the matching version record, when applied
    pub fn record_id(&self) -> Option<RecordId> {
        match self.state {
            StepState::Applied { record_id } => Some(record_id),
            StepState::Pending => None,
        }
    }
}

/// Match `steps` against `records`, returning the steps in ascending version order.
///
/// Fails with [`MigrationError::InconsistentState`] naming the first record
/// left unmatched after the walk.
pub fn reconcile<'a>(
    steps: &'a [Step],
    records: &[VersionRecord],
) -> MigrationResult<Vec<ReconciledStep<'a>>> {
    let mut sorted: Vec<&'a Step> = steps.iter().collect();
    sorted.sort_by_key(|step| step.version());

    let mut vi = 0;
    let mut reconciled = Vec::with_capacity(sorted.len());

    for step in sorted {
        let state = match records.get(vi) {
            Some(record) if record.version == step.version() => {
                vi += 1;
                StepState::Applied {
                    record_id: record.id,
                }
            }
            _ => StepState::Pending,
        };

        reconciled.push(ReconciledStep { step, state });
    }

    if let Some(record) = records.get(vi) {
        return Err(MigrationError::InconsistentState {
            version: record.version,
        });
    }

    Ok(reconciled)
}
