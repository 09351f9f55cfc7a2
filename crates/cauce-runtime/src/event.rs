//! Inbound conversational events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound message on the conversational channel.
///
/// Each inbound event triggers exactly one interpreter run for its
/// contact. `raw` carries the channel's original payload untouched so
/// templates can reach provider-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    /// Identity of the contact the conversation belongs to.
    pub contact_id: String,
    /// Channel the message arrived on (e.g. "whatsapp").
    pub channel: String,
    /// Message text.
    pub text: String,
    /// Raw channel payload.
    #[serde(default)]
    pub raw: Value,
}

impl InboundEvent {
    /// Creates an event with the given contact, channel, and text.
    pub fn new(
        contact_id: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            contact_id: contact_id.into(),
            channel: channel.into(),
            text: text.into(),
            raw: Value::Null,
        }
    }

    /// Sets the raw channel payload.
    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    /// Returns the event as a JSON value, for template resolution under
    /// the `inbound` root.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "contactId": self.contact_id,
            "channel": self.channel,
            "text": self.text,
            "raw": self.raw,
        })
    }
}
