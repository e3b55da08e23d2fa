//! Step registry
//!
//! Holds steps in registration order. Execution order is decided by version
//! alone, see [`crate::reconcile`].

use std::collections::BTreeMap;

use crate::schema::Schema;
use crate::step::{Step, Version};

#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    steps: Vec<Step>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step. Both callbacks run immediately.
    ///
    /// Duplicate versions are accepted here; see `MigratorConfig::strict_versions`.
    pub fn register<U, D>(&mut self, version: Version, up: U, down: D)
    where
        U: FnOnce(&mut Schema),
        D: FnOnce(&mut Schema),
    {
        let mut up_schema = Schema::new();
        let mut down_schema = Schema::new();

        up(&mut up_schema);
        down(&mut down_schema);

        self.steps.push(Step::new(version, up_schema, down_schema));
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Versions registered more than once, ascending
    pub fn duplicate_versions(&self) -> Vec<Version> {
        let mut counts: BTreeMap<Version, usize> = BTreeMap::new();
        for step in &self.steps {
            *counts.entry(step.version()).or_default() += 1;
        }

        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(version, _)| version)
            .collect()
    }
}
