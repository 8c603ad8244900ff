// ABOUTME: Library root for whaler - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod build;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod registry;
pub mod runtime;
pub mod types;
