// SPDX-License-Identifier: MIT

//! Agent module - the reusable tool-call loop
//!
//! - `ToolCallLoop` - bounded reasoning/lookup cycle with a final structured
//!   extraction, shared by every research step

mod tool_loop;

pub use tool_loop::{
    LoopError, LoopOutcome, LoopPolicy, ToolCallLoop, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_TURNS,
};
