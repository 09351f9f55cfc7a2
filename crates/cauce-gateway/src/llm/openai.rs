//! OpenAI-compatible chat completions adapter.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use super::{LlmAdapter, LlmExtraction, LlmOptions, LlmReply};
use crate::error::{GatewayError, GatewayResult};
use crate::types::{HistoryTurn, TurnRole, VariableSpec};

/// Tracing target for LLM adapter operations.
pub const TRACING_TARGET: &str = "cauce_gateway::llm";

/// Default completion model.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default base URL for the OpenAI API.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the OpenAI-compatible adapter.
///
/// Works against any provider exposing the chat-completions wire format
/// by overriding `base_url`.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL of the API.
    pub base_url: String,
    /// Default model when the node does not override it.
    pub model: String,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Creates a configuration with the given API key and defaults.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Reqwest-backed [`LlmAdapter`] speaking the chat-completions protocol.
pub struct OpenAiChatAdapter {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl std::fmt::Debug for OpenAiChatAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatAdapter")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiChatAdapter {
    /// Creates a new adapter with the given configuration.
    pub fn new(config: OpenAiConfig) -> GatewayResult<Self> {
        if config.api_key.is_empty() {
            return Err(GatewayError::InvalidConfig("api_key must not be empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, config })
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> GatewayResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        tracing::debug!(
            target: TRACING_TARGET,
            model = request.model,
            messages = request.messages.len(),
            "Dispatching chat completion"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown provider failure");
            return Err(GatewayError::Provider(format!("{status}: {message}")));
        }

        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| GatewayError::MalformedResponse("missing choices[0].message.content".into()))
    }

    fn model<'a>(&'a self, options: &'a LlmOptions) -> &'a str {
        options.model.as_deref().unwrap_or(&self.config.model)
    }
}

#[async_trait::async_trait]
impl LlmAdapter for OpenAiChatAdapter {
    async fn extract(
        &self,
        system_prompt: &str,
        variables: &[VariableSpec],
        conversation: &str,
        options: &LlmOptions,
    ) -> GatewayResult<LlmExtraction> {
        let system = extraction_prompt(system_prompt, variables);
        let messages = vec![
            ChatMessage { role: "system", content: system },
            ChatMessage { role: "user", content: conversation.to_string() },
        ];

        let request = ChatRequest {
            model: self.model(options),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };

        let raw = self.complete(&request).await?;
        let values = parse_json_object(&raw)?;

        Ok(LlmExtraction { values, raw })
    }

    async fn converse(
        &self,
        system_prompt: &str,
        history: &[HistoryTurn],
        options: &LlmOptions,
    ) -> GatewayResult<LlmReply> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage { role: "system", content: system_prompt.to_string() });
        for turn in history {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
            };
            messages.push(ChatMessage { role, content: turn.text.clone() });
        }

        let request = ChatRequest {
            model: self.model(options),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: None,
        };

        let text = self.complete(&request).await?;
        Ok(LlmReply { text })
    }
}

/// Builds the extraction system prompt: caller prompt plus a schema block
/// describing the requested variables.
fn extraction_prompt(system_prompt: &str, variables: &[VariableSpec]) -> String {
    let mut prompt = String::from(system_prompt);
    prompt.push_str(
        "\n\nRespond with a single JSON object containing exactly these keys. \
         Use null for anything not present in the conversation; never invent values.\n",
    );
    for spec in variables {
        let requirement = if spec.required { "required" } else { "optional" };
        prompt.push_str(&format!(
            "- \"{}\": {} ({})",
            spec.name, spec.value_type, requirement
        ));
        if let Some(description) = &spec.description {
            prompt.push_str(&format!(": {description}"));
        }
        prompt.push('\n');
    }
    prompt
}

/// Parses the model output as a JSON object, tolerating code fences.
fn parse_json_object(raw: &str) -> GatewayResult<Map<String, Value>> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(GatewayError::MalformedResponse(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(GatewayError::MalformedResponse(format!(
            "invalid JSON in model output: {e}"
        ))),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariableType;

    #[test]
    fn test_extraction_prompt_lists_variables() {
        let variables = [
            VariableSpec::required("titulo", VariableType::Text),
            VariableSpec::optional("edicion", VariableType::Text)
                .with_description("edition, if mentioned"),
        ];
        let prompt = extraction_prompt("Extract book data.", &variables);
        assert!(prompt.contains("\"titulo\": text (required)"));
        assert!(prompt.contains("\"edicion\": text (optional)"));
        assert!(prompt.contains("edition, if mentioned"));
    }

    #[test]
    fn test_parse_json_object_strips_fences() {
        let raw = "```json\n{\"titulo\": \"X\"}\n```";
        let map = parse_json_object(raw).unwrap();
        assert_eq!(map.get("titulo").unwrap(), "X");
    }

    #[test]
    fn test_parse_json_object_rejects_non_object() {
        assert!(parse_json_object("[1, 2]").is_err());
        assert!(parse_json_object("not json").is_err());
    }

    #[test]
    fn test_adapter_rejects_empty_api_key() {
        assert!(OpenAiChatAdapter::new(OpenAiConfig::new("")).is_err());
    }
}
