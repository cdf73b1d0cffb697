// SPDX-License-Identifier: MIT

//! Dependency gate for fan-in steps
//!
//! A prerequisite counts as satisfied once it has completed at least once and
//! is not scheduled to run again. A looping step therefore only releases its
//! dependents after its router stops re-enabling it.

use super::graph::CompiledGraph;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct DependencyGate {
    prerequisites: HashMap<String, Vec<String>>,
    completed: HashMap<String, u32>,
    started: HashMap<String, u32>,
    /// Activated but not yet completed (pending or running)
    scheduled: HashSet<String>,
}

impl DependencyGate {
    pub fn new(graph: &CompiledGraph) -> Self {
        Self::with_prerequisites(
            graph
                .steps()
                .map(|step| (step.name.clone(), step.after.clone())),
        )
    }

    pub fn with_prerequisites<I>(prerequisites: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        Self {
            prerequisites: prerequisites.into_iter().collect(),
            ..Default::default()
        }
    }

    /// True when every prerequisite of `step` has settled
    pub fn is_eligible(&self, step: &str) -> bool {
        self.prerequisites_of(step)
            .iter()
            .all(|prerequisite| self.is_settled(prerequisite))
    }

    /// Prerequisites still holding `step` back
    pub fn unmet(&self, step: &str) -> Vec<String> {
        self.prerequisites_of(step)
            .iter()
            .filter(|prerequisite| !self.is_settled(prerequisite))
            .cloned()
            .collect()
    }

    pub fn is_scheduled(&self, step: &str) -> bool {
        self.scheduled.contains(step)
    }

    pub fn has_started(&self, step: &str) -> bool {
        self.started.contains_key(step)
    }

    pub fn completions(&self, step: &str) -> u32 {
        self.completed.get(step).copied().unwrap_or(0)
    }

    /// Record that `step` was activated and will run
    pub fn mark_scheduled(&mut self, step: &str) {
        self.scheduled.insert(step.to_string());
    }

    /// Record a start; returns the 1-based iteration
    pub fn mark_started(&mut self, step: &str) -> u32 {
        let count = self.started.entry(step.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Record a completion; returns how many times `step` has completed
    pub fn mark_completed(&mut self, step: &str) -> u32 {
        self.scheduled.remove(step);
        let count = self.completed.entry(step.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn prerequisites_of(&self, step: &str) -> &[String] {
        self.prerequisites
            .get(step)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    fn is_settled(&self, step: &str) -> bool {
        self.completions(step) > 0 && !self.scheduled.contains(step)
    }
}
