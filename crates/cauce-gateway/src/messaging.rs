//! Messaging adapter: outbound sends on the conversational channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::rest::AuthScheme;

/// Tracing target for messaging adapter operations.
pub const TRACING_TARGET: &str = "cauce_gateway::messaging";

/// Receipt returned by a successful send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Channel-assigned message identifier.
    pub message_id: String,
}

/// Adapter for the messaging channel (WhatsApp, SMS, chat widget, ...).
#[async_trait::async_trait]
pub trait MessagingAdapter: Send + Sync {
    /// Sends a message to the given recipient.
    async fn send(&self, recipient: &str, message: &str) -> GatewayResult<SendReceipt>;
}

/// Configuration for the webhook-based messenger.
#[derive(Debug, Clone)]
pub struct WebhookMessengerConfig {
    /// Delivery URL of the channel gateway.
    pub url: Url,
    /// Authentication applied to each delivery.
    pub auth: AuthScheme,
    /// Per-send timeout.
    pub timeout: Duration,
}

impl WebhookMessengerConfig {
    /// Creates a configuration for the given delivery URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            auth: AuthScheme::None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the auth scheme.
    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }
}

/// [`MessagingAdapter`] that POSTs `{to, message}` to a channel gateway.
#[derive(Debug, Clone)]
pub struct WebhookMessenger {
    http: reqwest::Client,
    config: WebhookMessengerConfig,
}

impl WebhookMessenger {
    /// Creates a new messenger with the given configuration.
    pub fn new(config: WebhookMessengerConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl MessagingAdapter for WebhookMessenger {
    async fn send(&self, recipient: &str, message: &str) -> GatewayResult<SendReceipt> {
        tracing::debug!(
            target: TRACING_TARGET,
            recipient,
            length = message.len(),
            "Delivering channel message"
        );

        let request = self
            .http
            .post(self.config.url.clone())
            .json(&json!({ "to": recipient, "message": message }));

        let response = self.config.auth.apply(request).send().await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(GatewayError::Provider(format!(
                "channel gateway returned {status}"
            )));
        }

        let message_id = body
            .get("messageId")
            .or_else(|| body.get("message_id"))
            .or_else(|| body.get("id"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                GatewayError::MalformedResponse("delivery response lacks a message id".into())
            })?;

        tracing::debug!(
            target: TRACING_TARGET,
            %message_id,
            "Channel message delivered"
        );

        Ok(SendReceipt { message_id })
    }
}
