//! Edges: directed, optionally conditioned connections between nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// A directed connection between two nodes.
///
/// Edges from the same source (and handle) are evaluated in declared
/// array order; the interpreter takes the first whose condition holds.
/// Flow authors rely on this ordering as branch precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Stable edge identifier.
    pub id: String,
    /// Source node.
    pub source: NodeId,
    /// Target node.
    pub target: NodeId,
    /// Handle on the source node, for multi-branch routers.
    #[serde(
        default,
        rename = "sourceHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
    /// Condition and mapping data.
    #[serde(default, skip_serializing_if = "EdgeData::is_empty")]
    pub data: EdgeData,
}

impl Edge {
    /// Creates an unconditioned edge between two nodes.
    pub fn new(id: impl Into<String>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            data: EdgeData::default(),
        }
    }

    /// Sets the condition expression.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.data.condition = Some(condition.into());
        self
    }

    /// Sets the source handle.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    /// Adds an output-to-variable mapping entry.
    pub fn with_mapping(mut self, variable: impl Into<String>, template: impl Into<String>) -> Self {
        self.data.mapping.insert(variable.into(), template.into());
        self
    }

    /// Returns whether the edge is unconditioned.
    ///
    /// The literal condition `"default"` is the flow-authoring idiom for
    /// a fall-through branch and counts as unconditioned.
    pub fn is_unconditioned(&self) -> bool {
        match self.data.condition.as_deref() {
            None => true,
            Some(expr) => expr.trim().is_empty() || expr.trim() == "default",
        }
    }
}

/// Data stored on an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Condition expression (`{{expr}} <op> <literal>` form).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Templates written into global variables when the edge is taken,
    /// keyed by variable name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mapping: BTreeMap<String, String>,
}

impl EdgeData {
    /// Returns whether the edge carries no condition and no mapping.
    pub fn is_empty(&self) -> bool {
        self.condition.is_none() && self.mapping.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_wire_form() {
        let edge = Edge::new("e1", "router", "buscar")
            .with_handle("route-buscar")
            .with_condition("{{intencion}} equals buscar");
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["source"], "router");
        assert_eq!(json["sourceHandle"], "route-buscar");
        assert_eq!(json["data"]["condition"], "{{intencion}} equals buscar");
    }

    #[test]
    fn test_default_condition_counts_as_unconditioned() {
        let plain = Edge::new("e1", "a", "b");
        let fallthrough = Edge::new("e2", "a", "c").with_condition("default");
        let conditioned = Edge::new("e3", "a", "d").with_condition("{{x}} equals 1");
        assert!(plain.is_unconditioned());
        assert!(fallthrough.is_unconditioned());
        assert!(!conditioned.is_unconditioned());
    }
}
