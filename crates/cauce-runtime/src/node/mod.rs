//! Node execution: one handler per capability variant.
//!
//! [`NodeHandlers`] owns the external adapters and dispatches a node's
//! configuration to the matching handler. External failures (provider
//! errors, timeouts) become failure outputs that edges can route on;
//! only configuration mistakes abort the run.

mod context;
mod output;

use std::sync::Arc;
use std::time::Duration;

use cauce_gateway::llm::{LlmAdapter, LlmOptions};
use cauce_gateway::messaging::MessagingAdapter;
use cauce_gateway::rest::{EndpointRegistry, RestAdapter};
use cauce_gateway::types::HistoryTurn;
use serde_json::{Map, Value};

pub use context::RunContext;
pub use output::NodeOutput;

use crate::error::{EngineError, EngineResult};
use crate::graph::{
    ChannelSendConfig, HttpCallConfig, LlmConverseConfig, LlmExtractConfig, NodeData, NodeId,
};
use crate::template::get_path;

/// Tracing target for node execution.
const TRACING_TARGET: &str = "cauce_runtime::node";

/// What the interpreter does after a node executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEffect {
    /// Follow the node's outgoing edges.
    Continue,
    /// Suspend the run until the contact's next inbound message.
    Suspend,
}

/// Adapter set and per-call policy for node execution.
pub struct NodeHandlers {
    llm: Arc<dyn LlmAdapter>,
    messaging: Arc<dyn MessagingAdapter>,
    rest: Arc<dyn RestAdapter>,
    endpoints: EndpointRegistry,
    call_timeout: Duration,
    history_limit: usize,
}

impl NodeHandlers {
    /// Creates handlers over the given adapters.
    pub fn new(
        llm: Arc<dyn LlmAdapter>,
        messaging: Arc<dyn MessagingAdapter>,
        rest: Arc<dyn RestAdapter>,
    ) -> Self {
        Self {
            llm,
            messaging,
            rest,
            endpoints: EndpointRegistry::new(),
            call_timeout: Duration::from_secs(30),
            history_limit: 20,
        }
    }

    /// Sets the endpoint registry for HTTP call nodes.
    pub fn with_endpoints(mut self, endpoints: EndpointRegistry) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Sets the per-call timeout for external adapters.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Sets the retained history length.
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// Executes one node and returns its output and effect.
    pub async fn execute(
        &self,
        node_id: &NodeId,
        data: &NodeData,
        ctx: &mut RunContext<'_>,
    ) -> EngineResult<(NodeOutput, StepEffect)> {
        tracing::debug!(
            target: TRACING_TARGET,
            node_id = %node_id,
            kind = data.kind(),
            "Executing node"
        );

        match data {
            NodeData::Trigger(_) => Ok((self.run_trigger(ctx), StepEffect::Continue)),
            NodeData::Router(_) => Ok((NodeOutput::new(), StepEffect::Continue)),
            NodeData::LlmExtract(config) => {
                Ok((self.run_extract(config, ctx).await, StepEffect::Continue))
            }
            NodeData::LlmConverse(config) => {
                Ok((self.run_converse(config, ctx).await, StepEffect::Continue))
            }
            NodeData::HttpCall(config) => {
                let output = self.run_http_call(node_id, config, ctx).await?;
                Ok((output, StepEffect::Continue))
            }
            NodeData::ChannelSend(config) => {
                Ok((self.run_channel_send(config, ctx).await, StepEffect::Suspend))
            }
        }
    }

    /// Passes the inbound event through as the trigger's output, so
    /// downstream templates can address it by the trigger's node ID as
    /// well as through the `inbound` root.
    fn run_trigger(&self, ctx: &RunContext<'_>) -> NodeOutput {
        NodeOutput::new()
            .with("message", Value::String(ctx.inbound.text.clone()))
            .with("channel", Value::String(ctx.inbound.channel.clone()))
            .with("contactId", Value::String(ctx.inbound.contact_id.clone()))
            .with("raw", ctx.inbound.raw.clone())
    }

    /// Extracts variables from the conversation and merges them into the
    /// global map.
    async fn run_extract(&self, config: &LlmExtractConfig, ctx: &mut RunContext<'_>) -> NodeOutput {
        let system_prompt = ctx.scope().render(&config.system_prompt);
        let conversation = transcript(&ctx.state.history);
        let options = LlmOptions {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        let extraction = match self
            .bounded(self.llm.extract(&system_prompt, &config.variables, &conversation, &options))
            .await
        {
            Ok(extraction) => extraction,
            Err(message) => return NodeOutput::failure(message),
        };

        // Merge incrementally: a value the model did not produce this
        // turn must not erase one captured on an earlier turn.
        let mut extracted = Map::new();
        for spec in &config.variables {
            let Some(value) = extraction.values.get(&spec.name) else {
                continue;
            };
            if is_meaningful(value) {
                ctx.state.set_global(&spec.name, value.clone());
                extracted.insert(spec.name.clone(), value.clone());
            }
        }

        let missing: Vec<Value> = config
            .variables
            .iter()
            .filter(|spec| spec.required)
            .filter(|spec| {
                !ctx.state
                    .global_variables
                    .get(&spec.name)
                    .is_some_and(is_meaningful)
            })
            .map(|spec| Value::String(spec.name.clone()))
            .collect();

        let mut output = NodeOutput::from(extracted);
        output.insert(NodeOutput::COMPLETE, Value::Bool(missing.is_empty()));
        output.insert(NodeOutput::MISSING, Value::Array(missing));
        output
    }

    /// Generates a reply from recent history; the reply is not sent
    /// here, a downstream send node delivers it.
    async fn run_converse(
        &self,
        config: &LlmConverseConfig,
        ctx: &mut RunContext<'_>,
    ) -> NodeOutput {
        let system_prompt = ctx.scope().render(&config.system_prompt);
        let history = &ctx.state.history;
        let window = &history[history.len().saturating_sub(config.history_turns)..];
        let options = LlmOptions {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        match self
            .bounded(self.llm.converse(&system_prompt, window, &options))
            .await
        {
            Ok(reply) => NodeOutput::new().with(NodeOutput::RESPONSE, Value::String(reply.text)),
            Err(message) => NodeOutput::failure(message),
        }
    }

    /// Calls a registered REST endpoint with template-resolved params.
    ///
    /// An unregistered endpoint name is a configuration mistake and
    /// aborts the run; transport failures and non-2xx statuses land on
    /// the output for edges to route on.
    async fn run_http_call(
        &self,
        node_id: &NodeId,
        config: &HttpCallConfig,
        ctx: &mut RunContext<'_>,
    ) -> EngineResult<NodeOutput> {
        let endpoint = self.endpoints.get(&config.endpoint).map_err(|_| {
            EngineError::InvalidNodeConfig {
                node_id: node_id.clone(),
                message: format!("unknown endpoint {}", config.endpoint),
            }
        })?;

        let scope = ctx.scope();
        let mut params = Map::new();
        for (name, value) in &config.params {
            let resolved = match value {
                Value::String(template) => scope.resolve_value(template),
                other => other.clone(),
            };
            params.insert(name.clone(), resolved);
        }

        let response = match self
            .bounded(self.rest.call(&endpoint, config.method, &params))
            .await
        {
            Ok(response) => response,
            Err(message) => return Ok(NodeOutput::failure(message)),
        };

        let mut output = NodeOutput::new()
            .with(NodeOutput::STATUS, Value::from(response.status))
            .with(NodeOutput::BODY, response.body.clone());
        if !response.is_success() {
            output.insert(NodeOutput::ERROR, Value::Bool(true));
            output.insert(
                NodeOutput::ERROR_MESSAGE,
                Value::String(format!("endpoint returned status {}", response.status)),
            );
        }
        if let Some(path) = &config.unwrap_path {
            let unwrapped = get_path(&response.body, path).unwrap_or(Value::Null);
            output.insert(NodeOutput::DATA, unwrapped);
        }
        Ok(output)
    }

    /// Sends the rendered message on the conversational channel.
    ///
    /// The run suspends after this node either way; a delivery failure
    /// is recorded on the output so the resumed run can route on it.
    async fn run_channel_send(
        &self,
        config: &ChannelSendConfig,
        ctx: &mut RunContext<'_>,
    ) -> NodeOutput {
        let scope = ctx.scope();
        let message = scope.render(&config.message);
        let recipient = config
            .recipient
            .as_deref()
            .map(|template| scope.render(template))
            .filter(|rendered| !rendered.is_empty())
            .unwrap_or_else(|| ctx.inbound.contact_id.clone());

        match self.bounded(self.messaging.send(&recipient, &message)).await {
            Ok(receipt) => {
                ctx.state
                    .push_history(HistoryTurn::assistant(&message), self.history_limit);
                NodeOutput::new()
                    .with("message", Value::String(message))
                    .with(NodeOutput::MESSAGE_ID, Value::String(receipt.message_id))
            }
            Err(error_message) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    %recipient,
                    %error_message,
                    "Outbound message failed"
                );
                let mut output = NodeOutput::failure(error_message);
                output.insert("message", Value::String(message));
                output
            }
        }
    }

    /// Awaits an adapter call under the configured timeout, flattening
    /// both failure shapes into a message for the node output.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = cauce_gateway::GatewayResult<T>>,
    ) -> Result<T, String> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(error.to_string()),
            Err(_) => Err(format!(
                "call timed out after {}s",
                self.call_timeout.as_secs()
            )),
        }
    }
}

impl std::fmt::Debug for NodeHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandlers")
            .field("call_timeout", &self.call_timeout)
            .field("history_limit", &self.history_limit)
            .finish_non_exhaustive()
    }
}

/// Role-prefixed transcript handed to extraction calls.
fn transcript(history: &[HistoryTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether an extracted value carries information worth keeping.
fn is_meaningful(value: &Value) -> bool {
    !matches!(value, Value::Null) && value.as_str() != Some("")
}
