// SPDX-License-Identifier: MIT

//! Product life-cycle analysis on top of the workflow core

pub mod agents;
pub mod config;
pub mod pipeline;
pub mod service;
pub mod tools;
pub mod types;
pub mod workflow;
