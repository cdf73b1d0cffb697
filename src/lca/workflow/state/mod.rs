// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateSchema` - declares the merge policy of each workflow field
//! - `WorkflowState` - runtime state storage with reducer support
//! - `StateUpdate` / `StateSnapshot` - what steps return and what they read

mod schema;
mod store;

pub use schema::{ReducerType, StateFieldDef, StateSchema};
pub use store::{StateSnapshot, StateUpdate, WorkflowState};
