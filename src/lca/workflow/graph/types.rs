// SPDX-License-Identifier: MIT

//! Graph edge definitions
//!
//! Conditional edges are typed: a router returns values of its own outcome
//! enum, and every outcome is mapped to a [`Target`] when the edge is built.
//! `compile` rejects routers with unmapped outcomes or unknown targets, so a
//! mistyped step name never survives until run time.

use crate::lca::workflow::state::WorkflowState;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Where control goes after a step completes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Step(String),
    /// Terminal sentinel: this branch is done
    End,
}

impl Target {
    pub fn step(name: &str) -> Self {
        Target::Step(name.to_string())
    }

    pub fn step_name(&self) -> Option<&str> {
        match self {
            Target::Step(name) => Some(name),
            Target::End => None,
        }
    }
}

/// Closed set of outcomes a router can produce
pub trait RouteOutcome: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Every outcome the router may return
    fn all() -> &'static [Self];
}

type RouteFn = Arc<dyn Fn(&WorkflowState) -> Vec<Target> + Send + Sync>;

/// Router-mediated edge, evaluated once per completion of `from`
#[derive(Clone)]
pub struct ConditionalEdge {
    pub from: String,
    /// Outcome label and its mapped target (`None` when unmapped)
    pub routes: Vec<(String, Option<Target>)>,
    route: RouteFn,
}

impl ConditionalEdge {
    /// Evaluate the router against the merged state
    pub fn route(&self, state: &WorkflowState) -> Vec<Target> {
        (self.route)(state)
    }

    /// Every target this edge can lead to
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.routes.iter().filter_map(|(_, target)| target.as_ref())
    }
}

impl fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("from", &self.from)
            .field("routes", &self.routes)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum EdgeSpec {
    /// `from` is always followed by `to`
    Static { from: String, to: Target },
    Conditional(ConditionalEdge),
}

impl EdgeSpec {
    pub fn fixed(from: &str, to: Target) -> Self {
        EdgeSpec::Static {
            from: from.to_string(),
            to,
        }
    }

    /// Build a conditional edge from a typed router and its route table
    pub fn conditional<O, R>(from: &str, router: R, routes: &[(O, Target)]) -> Self
    where
        O: RouteOutcome,
        R: Fn(&WorkflowState) -> Vec<O> + Send + Sync + 'static,
    {
        let table: HashMap<O, Target> = routes.iter().cloned().collect();
        let declared = O::all()
            .iter()
            .map(|outcome| (format!("{:?}", outcome), table.get(outcome).cloned()))
            .collect();

        let route: RouteFn = Arc::new(move |state: &WorkflowState| {
            router(state)
                .into_iter()
                .filter_map(|outcome| table.get(&outcome).cloned())
                .collect()
        });

        EdgeSpec::Conditional(ConditionalEdge {
            from: from.to_string(),
            routes: declared,
            route,
        })
    }

    pub fn from(&self) -> &str {
        match self {
            EdgeSpec::Static { from, .. } => from,
            EdgeSpec::Conditional(edge) => &edge.from,
        }
    }
}
