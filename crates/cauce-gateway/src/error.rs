//! Gateway error types.

use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by external gateway adapters.
///
/// Adapter failures are typed so the engine can record them on a node
/// output instead of crashing the run.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Adapter configuration is invalid.
    #[error("invalid adapter config: {0}")]
    InvalidConfig(String),

    /// The referenced endpoint is not registered.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// HTTP transport failed before a response was received.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A URL could not be parsed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The provider rejected the request.
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider responded with a payload the adapter cannot interpret.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
