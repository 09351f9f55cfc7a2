//! Node outputs: the JSON objects nodes leave behind for routing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output object recorded for a node after it executes.
///
/// Downstream conditions and templates address fields of this object
/// through the node's ID (`{{api.status}}`). Well-known field names are
/// exposed as constants; nodes are free to add their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeOutput(Map<String, Value>);

impl NodeOutput {
    /// Extraction completeness flag.
    pub const COMPLETE: &'static str = "complete";
    /// Names of required variables still missing after extraction.
    pub const MISSING: &'static str = "missing";
    /// Failure flag set when an external call did not succeed.
    pub const ERROR: &'static str = "error";
    /// Human-readable failure description.
    pub const ERROR_MESSAGE: &'static str = "error_message";
    /// Generated reply text of a conversation node.
    pub const RESPONSE: &'static str = "response";
    /// Handle of the branch a router selected.
    pub const BRANCH: &'static str = "branch";
    /// HTTP status code of a call node.
    pub const STATUS: &'static str = "status";
    /// Raw response body of a call node.
    pub const BODY: &'static str = "body";
    /// Unwrapped payload of a call node.
    pub const DATA: &'static str = "data";
    /// Provider message ID of a sent message.
    pub const MESSAGE_ID: &'static str = "message_id";

    /// Creates an empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a failure output carrying the given description.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut output = Self::new();
        output.insert(Self::ERROR, Value::Bool(true));
        output.insert(Self::ERROR_MESSAGE, Value::String(message.into()));
        output
    }

    /// Inserts a field.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Inserts a field, builder style.
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.insert(field, value);
        self
    }

    /// Returns a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns whether the failure flag is set.
    pub fn is_failure(&self) -> bool {
        matches!(self.0.get(Self::ERROR), Some(Value::Bool(true)))
    }

    /// Returns the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for NodeOutput {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<NodeOutput> for Map<String, Value> {
    fn from(output: NodeOutput) -> Self {
        output.0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_failure_output() {
        let output = NodeOutput::failure("timeout after 30s");
        assert!(output.is_failure());
        assert_eq!(
            output.get(NodeOutput::ERROR_MESSAGE),
            Some(&json!("timeout after 30s"))
        );
    }

    #[test]
    fn test_serializes_transparent() {
        let output = NodeOutput::new().with("status", json!(200));
        assert_eq!(serde_json::to_value(&output).unwrap(), json!({"status": 200}));
    }
}
