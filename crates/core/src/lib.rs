//! projgraph Core Library
//!
//! Discovers the build-dependency graph of an MSBuild source tree, filters out
//! test and binary-only modules, merges team ownership metadata and exports
//! the result as GraphML.

pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod export;
pub mod filter;
pub mod graph;
pub mod overlay;
pub mod parser;

// Re-export commonly used types
pub use graph::{Module, ModuleId, ModuleRegistry, OutputType};
