//! Engine error types.

use thiserror::Error;

use crate::graph::NodeId;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while loading or running a flow.
///
/// Adapter failures are deliberately absent: an external call that fails
/// is recorded on the node's output as an error flag so the flow can
/// branch on it (retries are expressed as flow edges, never implicitly).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Flow definition is structurally invalid.
    #[error("invalid flow definition: {0}")]
    InvalidFlow(String),

    /// Node configuration is invalid.
    #[error("invalid config for node {node_id}: {message}")]
    InvalidNodeConfig {
        /// ID of the node with invalid config.
        node_id: NodeId,
        /// Error message.
        message: String,
    },

    /// The flow exists but is switched off.
    #[error("flow {0} is not active")]
    FlowInactive(String),

    /// A node was revisited more times than the cycle guard allows
    /// within a single inbound-event run.
    #[error("node {node_id} exceeded the cycle bound of {limit} visits in one run")]
    CycleLimitExceeded {
        /// Node at which the bound was hit.
        node_id: NodeId,
        /// Configured visit bound.
        limit: u32,
    },

    /// The contact already has an active run and queueing was declined.
    #[error("contact {0} already has an active run")]
    ContactBusy(String),

    /// The owning inbound-event context was cancelled.
    #[error("run cancelled")]
    Cancelled,

    /// Conversation state store failure.
    #[error("state store error: {0}")]
    State(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
