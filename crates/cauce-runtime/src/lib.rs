#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod condition;
pub mod engine;
mod error;
mod event;
pub mod graph;
pub mod node;
pub mod state;
pub mod template;

#[doc(hidden)]
pub mod prelude;

pub use error::{EngineError, EngineResult};
pub use event::InboundEvent;

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "cauce_runtime";
