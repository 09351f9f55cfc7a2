//! Execution context handed to node handlers.

use serde_json::Value;

use crate::event::InboundEvent;
use crate::state::ConversationState;
use crate::template::Scope;

/// Mutable view of one run, scoped to the current inbound event.
///
/// Handlers read templates through [`RunContext::scope`] and write
/// results back into the leased conversation state.
#[derive(Debug)]
pub struct RunContext<'a> {
    /// Leased conversation state.
    pub state: &'a mut ConversationState,
    /// Event that started or resumed the run.
    pub inbound: &'a InboundEvent,
    inbound_value: Value,
}

impl<'a> RunContext<'a> {
    /// Creates a context over leased state and the triggering event.
    pub fn new(state: &'a mut ConversationState, inbound: &'a InboundEvent) -> Self {
        let inbound_value = inbound.to_value();
        Self {
            state,
            inbound,
            inbound_value,
        }
    }

    /// Returns the template scope for the current position of the run.
    pub fn scope(&self) -> Scope<'_> {
        Scope::new(
            &self.state.global_variables,
            &self.state.node_outputs,
            &self.inbound_value,
        )
    }
}
