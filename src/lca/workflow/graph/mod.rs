// SPDX-License-Identifier: MIT

//! Workflow graph definition and validation

mod compile;
mod types;

pub use compile::{compile, CompiledGraph, GraphBuilder};
pub use types::{ConditionalEdge, EdgeSpec, RouteOutcome, Target};
