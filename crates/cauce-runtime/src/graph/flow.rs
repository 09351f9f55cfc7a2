//! Flow documents and their validated runtime representation.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};

use super::edge::Edge;
use super::node::{Node, NodeData, NodeId};
use crate::error::{EngineError, EngineResult};

/// Tracing target for flow loading.
const TRACING_TARGET: &str = "cauce_runtime::graph";

/// Serializable flow document.
///
/// Authored by an external tool; the engine only reads it. Use
/// [`FlowDefinition::into_graph`] to validate and obtain the runtime
/// representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Flow identifier.
    pub id: String,
    /// Whether the flow may be executed.
    #[serde(default = "default_active", alias = "activo")]
    pub active: bool,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning tenant reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Nodes in declared order.
    pub nodes: Vec<Node>,
    /// Edges in declared order (routing precedence).
    #[serde(default)]
    pub edges: Vec<Edge>,
}

const fn default_active() -> bool {
    true
}

impl FlowDefinition {
    /// Validates this definition into a runtime flow graph.
    pub fn into_graph(self) -> EngineResult<FlowGraph> {
        FlowGraph::from_definition(self)
    }
}

impl TryFrom<FlowDefinition> for FlowGraph {
    type Error = EngineError;

    fn try_from(definition: FlowDefinition) -> Result<Self, Self::Error> {
        Self::from_definition(definition)
    }
}

/// Validated runtime representation of a flow.
///
/// Nodes and edges are stored by stable ID, never by array position.
/// The declared edge list is the routing source of truth (ordered
/// first-match); a petgraph mirror backs the structural checks.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    id: String,
    active: bool,
    trigger: NodeId,
    nodes: HashMap<NodeId, NodeData>,
    edges: Vec<Edge>,
    /// Outgoing edge positions per node, in declared order.
    outgoing: HashMap<NodeId, Vec<usize>>,
}

impl FlowGraph {
    /// Validates a flow definition and builds the runtime graph.
    ///
    /// Checks performed at load time (never mid-run):
    /// - node IDs are unique and edge endpoints exist
    /// - exactly one node has no incoming edge, and it is the trigger
    /// - router edges only use handles the router declares
    pub fn from_definition(definition: FlowDefinition) -> EngineResult<Self> {
        if definition.nodes.is_empty() {
            return Err(EngineError::InvalidFlow(
                "flow must have at least one node".into(),
            ));
        }

        let mut nodes = HashMap::with_capacity(definition.nodes.len());
        for node in definition.nodes {
            if nodes.insert(node.id.clone(), node.data).is_some() {
                return Err(EngineError::InvalidFlow(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
        }

        let mut outgoing: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (position, edge) in definition.edges.iter().enumerate() {
            if !nodes.contains_key(&edge.source) {
                return Err(EngineError::InvalidFlow(format!(
                    "edge {} references missing source node {}",
                    edge.id, edge.source
                )));
            }
            if !nodes.contains_key(&edge.target) {
                return Err(EngineError::InvalidFlow(format!(
                    "edge {} references missing target node {}",
                    edge.id, edge.target
                )));
            }
            outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(position);
        }

        // Handles referenced by edges must be declared on the router.
        for edge in &definition.edges {
            let (Some(handle), Some(NodeData::Router(config))) =
                (&edge.source_handle, nodes.get(&edge.source))
            else {
                continue;
            };
            if !config.handles.is_empty() && !config.handles.contains(handle) {
                return Err(EngineError::InvalidNodeConfig {
                    node_id: edge.source.clone(),
                    message: format!("edge {} uses undeclared handle {handle}", edge.id),
                });
            }
        }

        let trigger = Self::find_trigger(&nodes, &definition.edges)?;

        let graph = Self {
            id: definition.id,
            active: definition.active,
            trigger,
            nodes,
            edges: definition.edges,
            outgoing,
        };
        graph.check_reachability();

        Ok(graph)
    }

    /// Finds the unique entry node and checks it is the trigger.
    fn find_trigger(
        nodes: &HashMap<NodeId, NodeData>,
        edges: &[Edge],
    ) -> EngineResult<NodeId> {
        let mut entries: Vec<&NodeId> = nodes
            .keys()
            .filter(|id| !edges.iter().any(|e| e.target == **id))
            .collect();
        entries.sort();

        match entries.as_slice() {
            [] => Err(EngineError::InvalidFlow(
                "flow has no entry node (every node has an incoming edge)".into(),
            )),
            [entry] => {
                if !nodes[entry].is_trigger() {
                    return Err(EngineError::InvalidFlow(format!(
                        "entry node {entry} is not a trigger"
                    )));
                }
                Ok((*entry).clone())
            }
            many => Err(EngineError::InvalidFlow(format!(
                "flow has {} entry nodes, expected exactly one",
                many.len()
            ))),
        }
    }

    /// Warns about nodes unreachable from the trigger.
    ///
    /// Unreachable nodes are legal (authors park disabled branches) but
    /// usually indicate a broken edit, so they are logged at load time.
    fn check_reachability(&self) {
        let mut graph: DiGraph<(), ()> = DiGraph::new();
        let mut indices: HashMap<&NodeId, NodeIndex> = HashMap::new();
        for id in self.nodes.keys() {
            indices.insert(id, graph.add_node(()));
        }
        for edge in &self.edges {
            graph.add_edge(indices[&edge.source], indices[&edge.target], ());
        }

        let mut reached = 0usize;
        let mut bfs = Bfs::new(&graph, indices[&self.trigger]);
        while bfs.next(&graph).is_some() {
            reached += 1;
        }

        if reached < self.nodes.len() {
            tracing::warn!(
                target: TRACING_TARGET,
                flow_id = %self.id,
                unreachable = self.nodes.len() - reached,
                "Flow contains nodes unreachable from the trigger"
            );
        }
    }

    /// Returns the flow identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns whether the flow is active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the trigger node ID.
    pub fn trigger(&self) -> &NodeId {
        &self.trigger
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns a node's data.
    pub fn get_node(&self, id: &NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Returns whether a node exists.
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns the outgoing edges of a node in declared order.
    pub fn outgoing_edges(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|position| &self.edges[*position])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{ChannelSendConfig, RouterConfig, TriggerConfig};

    fn send(message: &str) -> ChannelSendConfig {
        ChannelSendConfig {
            message: message.into(),
            recipient: None,
        }
    }

    fn two_node_flow() -> FlowDefinition {
        FlowDefinition {
            id: "f1".into(),
            active: true,
            name: None,
            owner: None,
            nodes: vec![
                Node::new("start", TriggerConfig::default()),
                Node::new("saludo", send("¡Hola!")),
            ],
            edges: vec![Edge::new("e1", "start", "saludo")],
        }
    }

    #[test]
    fn test_valid_flow_loads() {
        let graph = two_node_flow().into_graph().unwrap();
        assert_eq!(graph.trigger().as_str(), "start");
        assert_eq!(graph.node_count(), 2);
        assert!(graph.is_active());
    }

    #[test]
    fn test_edge_order_is_preserved() {
        let mut definition = two_node_flow();
        definition.nodes.push(Node::new("alt", send("alt")));
        definition
            .edges
            .insert(0, Edge::new("e0", "start", "alt").with_condition("{{x}} equals 1"));

        let graph = definition.into_graph().unwrap();
        let trigger = NodeId::from("start");
        let ids: Vec<&str> = graph
            .outgoing_edges(&trigger)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, ["e0", "e1"]);
    }

    #[test]
    fn test_missing_edge_target_is_rejected() {
        let mut definition = two_node_flow();
        definition.edges.push(Edge::new("e2", "saludo", "nope"));
        assert!(matches!(
            definition.into_graph(),
            Err(EngineError::InvalidFlow(_))
        ));
    }

    #[test]
    fn test_two_entry_nodes_are_rejected() {
        let mut definition = two_node_flow();
        definition
            .nodes
            .push(Node::new("otro", TriggerConfig::default()));
        assert!(matches!(
            definition.into_graph(),
            Err(EngineError::InvalidFlow(_))
        ));
    }

    #[test]
    fn test_non_trigger_entry_is_rejected() {
        let definition = FlowDefinition {
            id: "f2".into(),
            active: true,
            name: None,
            owner: None,
            nodes: vec![Node::new("solo", send("hola"))],
            edges: vec![],
        };
        assert!(matches!(
            definition.into_graph(),
            Err(EngineError::InvalidFlow(_))
        ));
    }

    #[test]
    fn test_undeclared_router_handle_is_rejected() {
        let definition = FlowDefinition {
            id: "f3".into(),
            active: true,
            name: None,
            owner: None,
            nodes: vec![
                Node::new("start", TriggerConfig::default()),
                Node::new(
                    "router",
                    RouterConfig {
                        handles: vec!["si".into(), "no".into()],
                    },
                ),
                Node::new("fin", send("chau")),
            ],
            edges: vec![
                Edge::new("e1", "start", "router"),
                Edge::new("e2", "router", "fin").with_handle("quizas"),
            ],
        };
        assert!(matches!(
            definition.into_graph(),
            Err(EngineError::InvalidNodeConfig { .. })
        ));
    }

    #[test]
    fn test_activo_alias_is_accepted() {
        let json = r#"{
            "id": "f4",
            "activo": false,
            "nodes": [{"id": "start", "type": "trigger", "config": {}}],
            "edges": []
        }"#;
        let definition: FlowDefinition = serde_json::from_str(json).unwrap();
        assert!(!definition.active);
    }
}
