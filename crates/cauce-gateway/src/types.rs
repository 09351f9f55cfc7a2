//! Shared wire types consumed by adapters and node configurations.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Specification of one variable an extraction node must capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name, used as the global-variable key.
    pub name: String,
    /// Expected value type, used to steer the extraction prompt.
    #[serde(rename = "type", default)]
    pub value_type: VariableType,
    /// Whether the variable is required for completeness.
    #[serde(default)]
    pub required: bool,
    /// Human description forwarded to the LLM prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableSpec {
    /// Creates a required variable of the given name and type.
    pub fn required(name: impl Into<String>, value_type: VariableType) -> Self {
        Self {
            name: name.into(),
            value_type,
            required: true,
            description: None,
        }
    }

    /// Creates an optional variable of the given name and type.
    pub fn optional(name: impl Into<String>, value_type: VariableType) -> Self {
        Self {
            name: name.into(),
            value_type,
            required: false,
            description: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Value types an extraction variable can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VariableType {
    /// Free-form text.
    #[default]
    Text,
    /// Numeric value.
    Number,
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// Calendar date.
    Date,
    /// Boolean flag.
    Boolean,
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// Who produced the turn.
    pub role: TurnRole,
    /// Message text.
    pub text: String,
}

impl HistoryTurn {
    /// Creates a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    /// Creates an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }
}

/// Role of a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnRole {
    /// The contact on the messaging channel.
    User,
    /// The flow (LLM or templated send).
    Assistant,
}
