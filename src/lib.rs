// SPDX-License-Identifier: MIT

//! Life-cycle assessment research agents orchestrated as a workflow graph.

pub mod adk;
pub mod lca;
