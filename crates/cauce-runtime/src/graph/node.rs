//! Node identifier, node wrapper, and per-variant configuration structs.

use std::collections::BTreeMap;

use cauce_gateway::rest::HttpMethod;
use cauce_gateway::types::VariableSpec;
use derive_more::{Debug, Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display as StrumDisplay, EnumString};

/// Stable identifier for a node in a flow.
///
/// IDs are author-chosen strings (e.g. `"gpt-formateador"`), never array
/// positions: edits to a flow must not silently renumber references.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A flow node: stable ID plus capability variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable node identifier.
    pub id: NodeId,
    /// Capability variant and its configuration.
    #[serde(flatten)]
    pub data: NodeData,
}

impl Node {
    /// Creates a node with the given ID and data.
    pub fn new(id: impl Into<NodeId>, data: impl Into<NodeData>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }
}

/// Capability variant of a flow node.
///
/// The set is closed: flow documents carrying an unknown `type` fail at
/// load time, not mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum NodeData {
    /// Entry point; passes the inbound event through.
    Trigger(TriggerConfig),
    /// Multi-branch conditional routing over outgoing edges.
    Router(RouterConfig),
    /// LLM-backed structured variable extraction.
    LlmExtract(LlmExtractConfig),
    /// LLM-backed free-form reply generation.
    LlmConverse(LlmConverseConfig),
    /// Call to a registered REST endpoint.
    HttpCall(HttpCallConfig),
    /// Outbound message on the conversational channel; suspends the run.
    ChannelSend(ChannelSendConfig),
}

impl NodeData {
    /// Returns whether this is the trigger node.
    pub const fn is_trigger(&self) -> bool {
        matches!(self, NodeData::Trigger(_))
    }

    /// Returns whether this is a router node.
    pub const fn is_router(&self) -> bool {
        matches!(self, NodeData::Router(_))
    }

    /// Returns whether executing this node suspends the run until the
    /// next inbound message.
    pub const fn suspends_run(&self) -> bool {
        matches!(self, NodeData::ChannelSend(_))
    }

    /// Returns the variant name as it appears on the wire.
    pub const fn kind(&self) -> &'static str {
        match self {
            NodeData::Trigger(_) => "trigger",
            NodeData::Router(_) => "router",
            NodeData::LlmExtract(_) => "llm_extract",
            NodeData::LlmConverse(_) => "llm_converse",
            NodeData::HttpCall(_) => "http_call",
            NodeData::ChannelSend(_) => "channel_send",
        }
    }
}

/// When a trigger starts or resumes a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(StrumDisplay, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerMode {
    /// Any inbound message.
    #[default]
    Message,
    /// Only messages containing the configured keyword.
    Keyword,
    /// Unconditionally, including non-message channel events.
    Always,
}

/// Trigger node configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Activation mode.
    #[serde(default)]
    pub mode: TriggerMode,
    /// Keyword for [`TriggerMode::Keyword`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

/// Router node configuration.
///
/// Routing itself lives on the outgoing edges; the config only fixes the
/// precedence of named handles. An empty list means plain edge order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Source handles in declared precedence order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handles: Vec<String>,
}

/// LLM extraction node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmExtractConfig {
    /// Model override; adapter default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// System prompt framing the extraction.
    pub system_prompt: String,
    /// Variables to extract into the global-variable map.
    pub variables: Vec<VariableSpec>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Default number of history turns forwarded to conversation nodes.
const fn default_history_turns() -> usize {
    10
}

/// LLM conversation node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConverseConfig {
    /// Model override; adapter default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// System prompt (template, resolved per run).
    pub system_prompt: String,
    /// Number of most-recent history turns forwarded to the model.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// HTTP call node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpCallConfig {
    /// Endpoint reference resolved through the engine's registry.
    pub endpoint: String,
    /// HTTP method.
    #[serde(default)]
    pub method: HttpMethod,
    /// Parameter mapping; values are templates resolved per run.
    /// Ordered map so query strings are deterministic.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    /// Dotted path used to unwrap an array from the response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unwrap_path: Option<String>,
}

/// Channel send node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSendConfig {
    /// Message template.
    pub message: String,
    /// Recipient template; defaults to the inbound contact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}
