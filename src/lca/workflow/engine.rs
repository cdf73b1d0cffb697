// SPDX-License-Identifier: MIT

//! Graph workflow executor
//!
//! Steps run as independent tasks on a `JoinSet`. Every merge, gate update and
//! routing decision happens on the coordinating loop in [`Engine::run`], so
//! merges are applied one at a time in completion order.

use super::error::{StepError, WorkflowError};
use super::gate::DependencyGate;
use super::graph::{CompiledGraph, EdgeSpec, Target};
use super::state::{StateUpdate, WorkflowState};
use super::step::StepContext;
use crate::adk::agent::LoopPolicy;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One merged step output
#[derive(Debug, Clone)]
pub struct Completion {
    pub step: String,
    pub iteration: u32,
    pub completed_at: DateTime<Utc>,
}

/// Result of a run that reached completion
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub state: WorkflowState,
    /// Completions in merge order
    pub completions: Vec<Completion>,
}

impl WorkflowRun {
    pub fn completions_of(&self, step: &str) -> usize {
        self.completions.iter().filter(|c| c.step == step).count()
    }

    /// Merge index of the first completion of `step`
    pub fn position(&self, step: &str) -> Option<usize> {
        self.completions.iter().position(|c| c.step == step)
    }

    /// Decode the final state into a typed result
    pub fn output<T: DeserializeOwned>(&self) -> Result<T, WorkflowError> {
        Ok(serde_json::from_value(self.state.to_json())?)
    }
}

struct Finished {
    step: String,
    iteration: u32,
    /// `Err` when the step panicked
    outcome: Result<Result<StateUpdate, StepError>, ()>,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    default_policy: LoopPolicy,
}

impl Engine {
    pub fn new(default_policy: LoopPolicy) -> Self {
        Self { default_policy }
    }

    /// Run `graph` from `seed` until no step is running or eligible
    pub async fn run(
        &self,
        graph: &CompiledGraph,
        seed: StateUpdate,
        cancel: &CancellationToken,
    ) -> Result<WorkflowRun, WorkflowError> {
        let run_id = Uuid::new_v4();
        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        log::info!(
            "Starting run {} of '{}' with seed fields {:?}",
            run_id,
            graph.name(),
            seed.fields().collect::<Vec<_>>()
        );

        let mut state = WorkflowState::new(graph.schema());
        state.seed(seed);

        let mut scheduler = Scheduler {
            graph,
            gate: DependencyGate::new(graph),
            pending: Vec::new(),
            tasks: JoinSet::new(),
            cancel: cancel.child_token(),
            default_policy: self.default_policy,
        };
        let mut completions = Vec::new();

        for entry in graph.entries() {
            scheduler.activate(entry);
        }

        loop {
            scheduler.start_ready(&state);
            if scheduler.tasks.is_empty() {
                break;
            }

            // join_next only yields None on an empty set
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                joined = scheduler.tasks.join_next() => joined,
            };

            let finished = match next {
                None => {
                    log::warn!("Run {} cancelled", run_id);
                    scheduler.abort().await;
                    return Err(WorkflowError::Cancelled);
                }
                Some(Ok(finished)) => finished,
                Some(Err(err)) => {
                    log::error!("Step task failed to join: {}", err);
                    scheduler.abort().await;
                    return Err(WorkflowError::StepPanicked(err.to_string()));
                }
            };

            let Finished {
                step,
                iteration,
                outcome,
            } = finished;
            let Some(descriptor) = graph.step(&step) else {
                continue;
            };

            // A failed optional step leaves the state as its router last saw it
            let mut routed = true;
            match outcome {
                Err(()) => {
                    log::error!("Step '{}' panicked", step);
                    scheduler.abort().await;
                    return Err(WorkflowError::StepPanicked(step));
                }
                Ok(Err(StepError::Cancelled)) => {
                    scheduler.abort().await;
                    return Err(WorkflowError::Cancelled);
                }
                Ok(Err(err)) if descriptor.optional => {
                    log::warn!(
                        "Optional step '{}' failed, continuing without its output: {}",
                        step,
                        err
                    );
                    scheduler.gate.mark_completed(&step);
                    routed = false;
                }
                Ok(Err(err)) => {
                    log::error!("Step '{}' failed: {}", step, err);
                    scheduler.abort().await;
                    return Err(WorkflowError::StepFailed { step, source: err });
                }
                Ok(Ok(update)) => {
                    if update.is_empty() {
                        log::debug!("Step '{}' returned an empty update", step);
                    }
                    if let Err(err) = state.merge(&step, &descriptor.outputs, update) {
                        log::error!("{}", err);
                        scheduler.abort().await;
                        return Err(err);
                    }
                    scheduler.gate.mark_completed(&step);
                    log::info!("Step '{}' completed (iteration {})", step, iteration);
                    completions.push(Completion {
                        step: step.clone(),
                        iteration,
                        completed_at: Utc::now(),
                    });
                }
            }

            scheduler.follow_edges(&step, &state, routed);
        }

        // A router-gated step no router chose is a skipped branch
        let never_completed: Vec<String> = graph
            .steps()
            .filter(|s| !s.optional && scheduler.gate.completions(&s.name) == 0)
            .filter(|s| scheduler.gate.is_scheduled(&s.name) || !graph.is_router_gated(&s.name))
            .map(|s| s.name.clone())
            .collect();
        let waiting = scheduler.pending;

        if !never_completed.is_empty() || !waiting.is_empty() {
            for step in &waiting {
                log::error!(
                    "Step '{}' still waiting on {:?}",
                    step,
                    scheduler.gate.unmet(step)
                );
            }
            return Err(WorkflowError::IncompleteWorkflow {
                never_completed,
                waiting,
            });
        }

        log::info!(
            "Run {} finished after {} step completions",
            run_id,
            completions.len()
        );

        Ok(WorkflowRun {
            run_id,
            state,
            completions,
        })
    }
}

/// Per-run scheduling state owned by the coordinating loop
struct Scheduler<'g> {
    graph: &'g CompiledGraph,
    gate: DependencyGate,
    /// Activated steps waiting on the gate, in activation order
    pending: Vec<String>,
    tasks: JoinSet<Finished>,
    /// Handed to steps; cancelled when the run aborts
    cancel: CancellationToken,
    default_policy: LoopPolicy,
}

impl<'g> Scheduler<'g> {
    fn activate(&mut self, step: &str) {
        if self.gate.is_scheduled(step) {
            log::debug!("Step '{}' is already scheduled", step);
            return;
        }
        self.gate.mark_scheduled(step);
        self.pending.push(step.to_string());
    }

    fn start_ready(&mut self, state: &WorkflowState) {
        let (ready, waiting): (Vec<String>, Vec<String>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|step| self.gate.is_eligible(step));
        self.pending = waiting;

        for step in ready {
            self.spawn(&step, state);
        }
    }

    fn spawn(&mut self, name: &str, state: &WorkflowState) {
        let Some(step) = self.graph.step(name) else {
            return;
        };
        let iteration = self.gate.mark_started(name);
        let ctx = StepContext {
            snapshot: state.snapshot(&step.inputs),
            policy: step.policy.unwrap_or(self.default_policy),
            cancel: self.cancel.clone(),
            iteration,
        };
        let work = step.work.clone();
        let step_name = name.to_string();

        log::info!("Starting step '{}' (iteration {})", name, iteration);
        self.tasks.spawn(async move {
            let outcome = AssertUnwindSafe(work.invoke(ctx))
                .catch_unwind()
                .await
                .map_err(|_| ());
            Finished {
                step: step_name,
                iteration,
                outcome,
            }
        });
    }

    /// Activate the successors of a completed step.
    ///
    /// Static edges never restart a step that already ran; routers may.
    /// With `routed` unset only static edges are followed.
    fn follow_edges(&mut self, step: &str, state: &WorkflowState, routed: bool) {
        let graph = self.graph;
        for edge in graph.outgoing(step) {
            match edge {
                EdgeSpec::Static {
                    to: Target::Step(to),
                    ..
                } => {
                    if self.gate.has_started(to) {
                        log::debug!("Ignoring static re-activation of '{}'", to);
                    } else {
                        self.activate(to);
                    }
                }
                EdgeSpec::Static {
                    to: Target::End, ..
                } => {}
                EdgeSpec::Conditional(_) if !routed => {
                    log::debug!("Skipping router on failed step '{}'", step);
                }
                EdgeSpec::Conditional(router) => {
                    let targets = router.route(state);
                    log::debug!("Router on '{}' chose {:?}", step, targets);
                    for target in targets {
                        if let Target::Step(to) = target {
                            self.activate(&to);
                        }
                    }
                }
            }
        }
    }

    /// Cancel running steps and discard whatever they return
    async fn abort(&mut self) {
        self.cancel.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            if let Ok(finished) = joined {
                log::debug!("Discarding output of step '{}'", finished.step);
            }
        }
    }
}
