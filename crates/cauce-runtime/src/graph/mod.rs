//! Flow graph structures and node types.
//!
//! This module provides the graph representation for conversational flows:
//! - [`FlowDefinition`]: Serializable flow document (JSON-friendly)
//! - [`FlowGraph`]: Validated runtime representation with ordered routing
//! - [`NodeId`]: Stable string identifier for nodes
//! - [`Node`] / [`NodeData`]: A node and its capability variant
//! - [`Edge`] / [`EdgeData`]: Directed, optionally conditioned connections

mod edge;
mod flow;
mod node;

pub use edge::{Edge, EdgeData};
pub use flow::{FlowDefinition, FlowGraph};
pub use node::{
    ChannelSendConfig, HttpCallConfig, LlmConverseConfig, LlmExtractConfig, Node, NodeData,
    NodeId, RouterConfig, TriggerConfig, TriggerMode,
};
