// SPDX-License-Identifier: MIT

//! Lookup tools available to research steps

pub mod search;

pub use search::{TavilySearchTool, TAVILY_SEARCH_TOOL};
