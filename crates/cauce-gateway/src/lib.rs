#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
pub mod llm;
pub mod messaging;
pub mod rest;
pub mod types;

pub use error::{GatewayError, GatewayResult};

/// Tracing target for gateway operations.
pub const TRACING_TARGET: &str = "cauce_gateway";
