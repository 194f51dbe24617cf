//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and clearing the in-memory
//! query cache.

pub mod clear;
pub mod stats;
