//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use cauce_runtime::prelude::*;
//! ```

pub use crate::engine::{EngineConfig, FlowEngine, RunOutcome};
pub use crate::error::{EngineError, EngineResult};
pub use crate::event::InboundEvent;
pub use crate::graph::{Edge, FlowDefinition, FlowGraph, Node, NodeData, NodeId};
pub use crate::node::{NodeHandlers, NodeOutput, RunContext, StepEffect};
pub use crate::state::{ConversationState, ConversationStore, MemoryStore, StateLease};
