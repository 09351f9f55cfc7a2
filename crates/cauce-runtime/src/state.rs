//! Per-contact conversation state and its store.
//!
//! One [`ConversationState`] exists per contact. The engine takes an
//! exclusive [`StateLease`] on it for the whole run, so two events for
//! the same contact can never interleave node executions.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use cauce_gateway::types::HistoryTurn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{EngineError, EngineResult};
use crate::graph::NodeId;
use crate::node::NodeOutput;

/// Tracing target for state operations.
const TRACING_TARGET: &str = "cauce_runtime::state";

/// Durable conversation state for one contact.
///
/// Serialized with camelCase keys to match the flow-document wire
/// conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    /// Contact this state belongs to.
    pub contact_id: String,
    /// Node the run is positioned at; `None` when no run is in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<NodeId>,
    /// Whether the run is suspended waiting for an inbound message.
    #[serde(default)]
    pub awaiting_input: bool,
    /// Variables shared across the whole conversation.
    #[serde(default)]
    pub global_variables: Map<String, Value>,
    /// Last recorded output per node.
    #[serde(default)]
    pub node_outputs: HashMap<NodeId, NodeOutput>,
    /// Message history, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

impl ConversationState {
    /// Creates empty state for a contact.
    pub fn new(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            current_node_id: None,
            awaiting_input: false,
            global_variables: Map::new(),
            node_outputs: HashMap::new(),
            history: Vec::new(),
        }
    }

    /// Returns whether no run is in flight for this contact.
    pub fn is_idle(&self) -> bool {
        self.current_node_id.is_none()
    }

    /// Positions the run at a node.
    pub fn set_current(&mut self, node_id: NodeId, awaiting_input: bool) {
        self.current_node_id = Some(node_id);
        self.awaiting_input = awaiting_input;
    }

    /// Ends the run, keeping variables, outputs, and history so a later
    /// run of the same conversation still sees them.
    pub fn finish_run(&mut self) {
        self.current_node_id = None;
        self.awaiting_input = false;
    }

    /// Writes a global variable.
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.global_variables.insert(name.into(), value);
    }

    /// Records a node's output, replacing any previous one.
    pub fn record_output(&mut self, node_id: NodeId, output: NodeOutput) {
        self.node_outputs.insert(node_id, output);
    }

    /// Appends a history turn, trimming the oldest past `limit`.
    pub fn push_history(&mut self, turn: HistoryTurn, limit: usize) {
        self.history.push(turn);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }
}

/// Exclusive lease on a contact's conversation state.
///
/// Mutations through the lease are visible to the store immediately;
/// dropping the lease releases the contact for the next event. Holding
/// it across a whole run is what guarantees at-most-one run per contact.
#[derive(Debug)]
pub struct StateLease {
    guard: OwnedMutexGuard<ConversationState>,
}

impl Deref for StateLease {
    type Target = ConversationState;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for StateLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Store of per-contact conversation state.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Leases a contact's state, waiting if another run holds it.
    async fn lease(&self, contact_id: &str) -> EngineResult<StateLease>;

    /// Leases a contact's state, failing with
    /// [`EngineError::ContactBusy`] if another run holds it.
    async fn try_lease(&self, contact_id: &str) -> EngineResult<StateLease>;

    /// Returns a point-in-time copy of a contact's state.
    async fn snapshot(&self, contact_id: &str) -> Option<ConversationState>;

    /// Discards a contact's state entirely.
    async fn reset(&self, contact_id: &str);
}

/// In-memory conversation store.
///
/// Per-contact `Arc<Mutex<_>>` entries; leasing queues on the contact's
/// own mutex so unrelated contacts never contend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    contacts: Mutex<HashMap<String, Arc<Mutex<ConversationState>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, contact_id: &str) -> Arc<Mutex<ConversationState>> {
        let mut contacts = self.contacts.lock().await;
        contacts
            .entry(contact_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new(contact_id))))
            .clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn lease(&self, contact_id: &str) -> EngineResult<StateLease> {
        let entry = self.entry(contact_id).await;
        let guard = entry.lock_owned().await;
        tracing::debug!(
            target: TRACING_TARGET,
            contact_id,
            "Leased conversation state"
        );
        Ok(StateLease { guard })
    }

    async fn try_lease(&self, contact_id: &str) -> EngineResult<StateLease> {
        let entry = self.entry(contact_id).await;
        match entry.try_lock_owned() {
            Ok(guard) => Ok(StateLease { guard }),
            Err(_) => Err(EngineError::ContactBusy(contact_id.to_string())),
        }
    }

    async fn snapshot(&self, contact_id: &str) -> Option<ConversationState> {
        let contacts = self.contacts.lock().await;
        let entry = contacts.get(contact_id)?.clone();
        drop(contacts);
        Some(entry.lock().await.clone())
    }

    async fn reset(&self, contact_id: &str) {
        let mut contacts = self.contacts.lock().await;
        if contacts.remove(contact_id).is_some() {
            tracing::debug!(
                target: TRACING_TARGET,
                contact_id,
                "Reset conversation state"
            );
        }
    }
}
