//! LLM adapter: structured extraction and free-form conversation.

mod openai;

use serde_json::{Map, Value};

pub use openai::{OpenAiChatAdapter, OpenAiConfig};

use crate::error::GatewayResult;
use crate::types::{HistoryTurn, VariableSpec};

/// Per-call provider tuning forwarded from node configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmOptions {
    /// Model override; adapter default when unset.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Completion token cap.
    pub max_tokens: Option<u32>,
}

/// Result of a structured extraction call.
#[derive(Debug, Clone)]
pub struct LlmExtraction {
    /// One entry per requested variable the model produced.
    pub values: Map<String, Value>,
    /// Raw model output, kept for diagnostics.
    pub raw: String,
}

/// Result of a free-form conversation call.
#[derive(Debug, Clone)]
pub struct LlmReply {
    /// Generated text.
    pub text: String,
}

/// Adapter for LLM-backed nodes.
///
/// Failures surface as [`crate::GatewayError`], never as panics; the
/// engine maps them onto node-output error flags.
#[async_trait::async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Extracts the requested variables from accumulated conversation text.
    ///
    /// The adapter asks the provider for a JSON object with one key per
    /// variable spec; absent or unknown values come back as null.
    async fn extract(
        &self,
        system_prompt: &str,
        variables: &[VariableSpec],
        conversation: &str,
        options: &LlmOptions,
    ) -> GatewayResult<LlmExtraction>;

    /// Generates a free-form reply from a system prompt and recent history.
    async fn converse(
        &self,
        system_prompt: &str,
        history: &[HistoryTurn],
        options: &LlmOptions,
    ) -> GatewayResult<LlmReply>;
}
