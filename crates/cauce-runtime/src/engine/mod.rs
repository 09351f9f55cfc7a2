//! Flow execution engine.
//!
//! This module provides the interpreter for conversational flows:
//! - [`FlowEngine`]: The per-flow interpreter
//! - [`EngineConfig`]: Configuration options
//! - [`RunOutcome`]: How a run ended

mod config;
mod executor;

pub use config::EngineConfig;
pub use executor::{FlowEngine, RunOutcome};
