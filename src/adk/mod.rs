// SPDX-License-Identifier: MIT

//! Agent development kit: models, tools and the tool-call loop

pub mod agent;
pub mod error;
pub mod model;
pub mod reference;
pub mod tool;
