//! Flow interpreter: drives one run per inbound event.

use std::collections::HashMap;
use std::sync::Arc;

use cauce_gateway::types::HistoryTurn;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::EngineConfig;
use crate::condition;
use crate::error::{EngineError, EngineResult};
use crate::event::InboundEvent;
use crate::graph::{Edge, FlowGraph, NodeData, NodeId, TriggerConfig, TriggerMode};
use crate::node::{NodeHandlers, NodeOutput, RunContext, StepEffect};
use crate::state::ConversationStore;
use crate::template::Scope;

/// Tracing target for engine operations.
const TRACING_TARGET: &str = "cauce_runtime::engine";

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run reached a node with no matching outgoing edge.
    Completed {
        /// Last node executed.
        last: NodeId,
    },
    /// The run suspended at a send node and waits for the contact.
    AwaitingInput {
        /// Node the run is parked at.
        at: NodeId,
    },
    /// The trigger did not match; no run was started.
    Ignored,
}

/// Interpreter for one flow.
///
/// Each inbound event drives exactly one run: either a fresh run from
/// the trigger or the continuation of a suspended one. The engine holds
/// the contact's state lease for the whole run, so a contact never has
/// two runs in flight.
pub struct FlowEngine {
    flow: FlowGraph,
    store: Arc<dyn ConversationStore>,
    handlers: NodeHandlers,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl FlowEngine {
    /// Creates an engine for a flow.
    ///
    /// The handlers' call timeout and history limit are taken from the
    /// engine configuration.
    pub fn new(
        flow: FlowGraph,
        store: Arc<dyn ConversationStore>,
        handlers: NodeHandlers,
        config: EngineConfig,
    ) -> Self {
        let handlers = handlers
            .with_call_timeout(config.call_timeout)
            .with_history_limit(config.history_limit);

        tracing::info!(
            target: TRACING_TARGET,
            flow_id = flow.id(),
            node_count = flow.node_count(),
            max_node_visits = config.max_node_visits,
            "Flow engine initialized"
        );

        Self {
            flow,
            store,
            handlers,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a token that cancels in-flight runs when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handles one inbound event for its contact.
    ///
    /// Fails with [`EngineError::ContactBusy`] when another run already
    /// holds the contact, and with [`EngineError::FlowInactive`] when
    /// the flow is switched off. Partial progress survives every exit
    /// path: the state mutated so far stays in the store.
    pub async fn handle_event(&self, event: &InboundEvent) -> EngineResult<RunOutcome> {
        if !self.flow.is_active() {
            return Err(EngineError::FlowInactive(self.flow.id().to_string()));
        }

        let mut lease = self.store.try_lease(&event.contact_id).await?;

        if !event.text.is_empty() {
            lease.push_history(HistoryTurn::user(&event.text), self.config.history_limit);
        }

        let start = match (&lease.current_node_id, lease.awaiting_input) {
            // Fresh run: the trigger decides whether this event starts one.
            (None, _) => {
                let Some(NodeData::Trigger(trigger)) = self.flow.get_node(self.flow.trigger())
                else {
                    return Err(EngineError::State(format!(
                        "flow {} lost its trigger node",
                        self.flow.id()
                    )));
                };
                if !trigger_matches(trigger, event) {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        flow_id = self.flow.id(),
                        contact_id = %event.contact_id,
                        "Trigger did not match, ignoring event"
                    );
                    return Ok(RunOutcome::Ignored);
                }
                self.flow.trigger().clone()
            }
            // Suspended run: advance past the node that sent the question;
            // its edges may route on the reply that just arrived.
            (Some(parked), true) => {
                let parked = parked.clone();
                let data = self.node_data(&parked)?;
                let mut ctx = RunContext::new(&mut lease, event);
                match self.take_edge(&parked, data, &mut ctx)? {
                    Some(next) => next,
                    None => {
                        ctx.state.finish_run();
                        return Ok(RunOutcome::Completed { last: parked });
                    }
                }
            }
            // Run interrupted mid-node (crash or cancellation): replay it.
            (Some(parked), false) => parked.clone(),
        };

        tracing::debug!(
            target: TRACING_TARGET,
            flow_id = self.flow.id(),
            contact_id = %event.contact_id,
            start = %start,
            "Starting run"
        );

        let mut ctx = RunContext::new(&mut lease, event);
        self.run(start, &mut ctx).await
    }

    /// Interprets nodes from `start` until the run suspends or completes.
    async fn run(&self, start: NodeId, ctx: &mut RunContext<'_>) -> EngineResult<RunOutcome> {
        let mut visits: HashMap<NodeId, u32> = HashMap::new();
        let mut current = start;

        loop {
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let seen = visits.entry(current.clone()).or_insert(0);
            *seen += 1;
            if *seen > self.config.max_node_visits {
                return Err(EngineError::CycleLimitExceeded {
                    node_id: current,
                    limit: self.config.max_node_visits,
                });
            }

            let data = self.node_data(&current)?;
            ctx.state.set_current(current.clone(), false);

            let (output, effect) = self.handlers.execute(&current, data, ctx).await?;
            ctx.state.record_output(current.clone(), output);

            if effect == StepEffect::Suspend {
                ctx.state.set_current(current.clone(), true);
                tracing::debug!(
                    target: TRACING_TARGET,
                    flow_id = self.flow.id(),
                    node_id = %current,
                    "Run suspended awaiting input"
                );
                return Ok(RunOutcome::AwaitingInput { at: current });
            }

            match self.take_edge(&current, data, ctx)? {
                Some(next) => current = next,
                None => {
                    ctx.state.finish_run();
                    tracing::debug!(
                        target: TRACING_TARGET,
                        flow_id = self.flow.id(),
                        node_id = %current,
                        "Run completed"
                    );
                    return Ok(RunOutcome::Completed { last: current });
                }
            }
        }
    }

    /// Routes out of a node: picks the first matching edge, applies its
    /// variable mapping, and records the branch on router outputs.
    fn take_edge(
        &self,
        node_id: &NodeId,
        data: &NodeData,
        ctx: &mut RunContext<'_>,
    ) -> EngineResult<Option<NodeId>> {
        let scope = ctx.scope();
        let Some(edge) = self.select_edge(node_id, data, &scope) else {
            return Ok(None);
        };

        let assignments: Vec<(String, Value)> = edge
            .data
            .mapping
            .iter()
            .map(|(variable, template)| (variable.clone(), scope.resolve_value(template)))
            .collect();

        for (variable, value) in assignments {
            ctx.state.set_global(variable, value);
        }

        if data.is_router() {
            let branch = edge
                .source_handle
                .clone()
                .unwrap_or_else(|| edge.id.clone());
            let mut output = ctx
                .state
                .node_outputs
                .get(node_id)
                .cloned()
                .unwrap_or_default();
            output.insert(NodeOutput::BRANCH, Value::String(branch));
            ctx.state.record_output(node_id.clone(), output);
        }

        Ok(Some(edge.target.clone()))
    }

    /// Picks the first outgoing edge whose condition holds.
    ///
    /// Edges are tried in declared order. A router that declares handle
    /// precedence overrides declared order: its handles are tried in
    /// config order, handleless edges last.
    fn select_edge(&self, node_id: &NodeId, data: &NodeData, scope: &Scope<'_>) -> Option<&Edge> {
        let edges: Vec<&Edge> = self.flow.outgoing_edges(node_id).collect();
        let matches = |edge: &Edge| edge.is_unconditioned() || matches_condition(edge, scope);

        if let NodeData::Router(config) = data {
            if !config.handles.is_empty() {
                for handle in &config.handles {
                    let found = edges
                        .iter()
                        .copied()
                        .filter(|edge| edge.source_handle.as_deref() == Some(handle))
                        .find(|edge| matches(edge));
                    if let Some(edge) = found {
                        return Some(edge);
                    }
                }
                return edges
                    .iter()
                    .copied()
                    .filter(|edge| edge.source_handle.is_none())
                    .find(|edge| matches(edge));
            }
        }

        edges.into_iter().find(|edge| matches(edge))
    }

    fn node_data(&self, node_id: &NodeId) -> EngineResult<&NodeData> {
        self.flow.get_node(node_id).ok_or_else(|| {
            EngineError::State(format!("node {node_id} is gone from flow {}", self.flow.id()))
        })
    }
}

fn matches_condition(edge: &Edge, scope: &Scope<'_>) -> bool {
    edge.data
        .condition
        .as_deref()
        .is_some_and(|expression| condition::evaluate(expression, scope))
}

/// Whether an inbound event activates the trigger.
fn trigger_matches(config: &TriggerConfig, event: &InboundEvent) -> bool {
    match config.mode {
        TriggerMode::Always => true,
        TriggerMode::Message => !event.text.is_empty(),
        TriggerMode::Keyword => match &config.keyword {
            Some(keyword) => event
                .text
                .to_lowercase()
                .contains(&keyword.to_lowercase()),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use cauce_gateway::llm::{LlmAdapter, LlmExtraction, LlmOptions, LlmReply};
    use cauce_gateway::messaging::{MessagingAdapter, SendReceipt};
    use cauce_gateway::rest::{
        Endpoint, EndpointRegistry, HttpMethod, RestAdapter, RestResponse,
    };
    use cauce_gateway::types::{VariableSpec, VariableType};
    use cauce_gateway::GatewayResult;
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::graph::{
        ChannelSendConfig, Edge, FlowDefinition, HttpCallConfig, LlmConverseConfig,
        LlmExtractConfig, Node, RouterConfig,
    };
    use crate::state::MemoryStore;

    /// Extraction results are served per call, in order; the last one
    /// repeats once the script runs out.
    struct ScriptedLlm {
        extractions: Vec<Value>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(extractions: Vec<Value>) -> Self {
            Self {
                extractions,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmAdapter for ScriptedLlm {
        async fn extract(
            &self,
            _system_prompt: &str,
            _variables: &[VariableSpec],
            _conversation: &str,
            _options: &LlmOptions,
        ) -> GatewayResult<LlmExtraction> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self
                .extractions
                .get(call)
                .or_else(|| self.extractions.last())
                .cloned()
                .unwrap_or(json!({}));
            let Value::Object(values) = scripted else {
                unreachable!()
            };
            Ok(LlmExtraction {
                raw: String::new(),
                values,
            })
        }

        async fn converse(
            &self,
            _system_prompt: &str,
            _history: &[cauce_gateway::types::HistoryTurn],
            _options: &LlmOptions,
        ) -> GatewayResult<LlmReply> {
            Ok(LlmReply {
                text: "claro, te ayudo".into(),
            })
        }
    }

    #[derive(Default)]
    struct CountingMessenger {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl MessagingAdapter for CountingMessenger {
        async fn send(&self, _recipient: &str, _message: &str) -> GatewayResult<SendReceipt> {
            let n = self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(SendReceipt {
                message_id: format!("m-{n}"),
            })
        }
    }

    struct FixedRest {
        status: u16,
        body: Value,
    }

    #[async_trait]
    impl RestAdapter for FixedRest {
        async fn call(
            &self,
            _endpoint: &Endpoint,
            _method: HttpMethod,
            _params: &Map<String, Value>,
        ) -> GatewayResult<RestResponse> {
            Ok(RestResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    struct Harness {
        engine: FlowEngine,
        store: Arc<MemoryStore>,
        messenger: Arc<CountingMessenger>,
    }

    fn harness(definition: FlowDefinition, extractions: Vec<Value>) -> Harness {
        harness_with_rest(
            definition,
            extractions,
            FixedRest {
                status: 200,
                body: json!({"items": [{"title": "Rayuela"}]}),
            },
        )
    }

    fn harness_with_rest(
        definition: FlowDefinition,
        extractions: Vec<Value>,
        rest: FixedRest,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let messenger = Arc::new(CountingMessenger::default());
        let mut endpoints = EndpointRegistry::new();
        let url = "https://tienda.example/api/books".parse().unwrap();
        endpoints.register("libreria", Endpoint::new(url));

        let handlers = NodeHandlers::new(
            Arc::new(ScriptedLlm::new(extractions)),
            messenger.clone(),
            Arc::new(rest),
        )
        .with_endpoints(endpoints);

        let engine = FlowEngine::new(
            definition.into_graph().unwrap(),
            store.clone(),
            handlers,
            EngineConfig::default(),
        );
        Harness {
            engine,
            store,
            messenger,
        }
    }

    fn event(text: &str) -> InboundEvent {
        InboundEvent::new("c-1", "whatsapp", text)
    }

    fn send_node(id: &str, message: &str) -> Node {
        Node::new(
            id,
            ChannelSendConfig {
                message: message.into(),
                recipient: None,
            },
        )
    }

    fn converse_node(id: &str) -> Node {
        Node::new(
            id,
            LlmConverseConfig {
                model: None,
                system_prompt: "Sos un asistente de la librería.".into(),
                history_turns: 10,
                temperature: None,
                max_tokens: None,
            },
        )
    }

    fn definition(id: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> FlowDefinition {
        FlowDefinition {
            id: id.into(),
            active: true,
            name: None,
            owner: None,
            nodes,
            edges,
        }
    }

    fn linear_definition() -> FlowDefinition {
        definition(
            "lineal",
            vec![
                Node::new("start", crate::graph::TriggerConfig::default()),
                converse_node("gpt"),
            ],
            vec![Edge::new("e1", "start", "gpt")],
        )
    }

    #[tokio::test]
    async fn test_linear_flow_completes() {
        let h = harness(linear_definition(), vec![]);
        let outcome = h.engine.handle_event(&event("hola")).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                last: NodeId::from("gpt")
            }
        );

        let state = h.store.snapshot("c-1").await.unwrap();
        assert!(state.is_idle());
        assert_eq!(
            state.node_outputs[&NodeId::from("gpt")].get("response"),
            Some(&json!("claro, te ayudo"))
        );
    }

    #[tokio::test]
    async fn test_router_takes_first_matching_edge() {
        let def = definition(
            "rutas",
            vec![
                Node::new("start", crate::graph::TriggerConfig::default()),
                Node::new("router", RouterConfig::default()),
                send_node("buscar", "Buscando..."),
                send_node("otro", "No entendí."),
            ],
            vec![
                Edge::new("e1", "start", "router"),
                Edge::new("e2", "router", "buscar")
                    .with_condition("{{inbound.text}} contains libro"),
                Edge::new("e3", "router", "otro").with_condition("default"),
            ],
        );
        let h = harness(def, vec![]);

        let outcome = h.engine.handle_event(&event("quiero un libro")).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::AwaitingInput {
                at: NodeId::from("buscar")
            }
        );

        let state = h.store.snapshot("c-1").await.unwrap();
        assert_eq!(
            state.node_outputs[&NodeId::from("router")].get("branch"),
            Some(&json!("e2"))
        );
    }

    #[tokio::test]
    async fn test_router_falls_through_to_default() {
        let def = definition(
            "rutas",
            vec![
                Node::new("start", crate::graph::TriggerConfig::default()),
                Node::new("router", RouterConfig::default()),
                send_node("buscar", "Buscando..."),
                send_node("otro", "No entendí."),
            ],
            vec![
                Edge::new("e1", "start", "router"),
                Edge::new("e2", "router", "buscar").with_condition("{{inbound.text}} contains libro"),
                Edge::new("e3", "router", "otro").with_condition("default"),
            ],
        );
        let h = harness(def, vec![]);

        let outcome = h.engine.handle_event(&event("buen día")).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::AwaitingInput {
                at: NodeId::from("otro")
            }
        );
    }

    #[tokio::test]
    async fn test_suspension_and_resume_do_not_resend() {
        let def = definition(
            "pregunta",
            vec![
                Node::new("start", crate::graph::TriggerConfig::default()),
                send_node("preguntar", "¿Qué libro buscás?"),
                converse_node("gpt"),
            ],
            vec![
                Edge::new("e1", "start", "preguntar"),
                Edge::new("e2", "preguntar", "gpt"),
            ],
        );
        let h = harness(def, vec![]);

        let first = h.engine.handle_event(&event("hola")).await.unwrap();
        assert_eq!(
            first,
            RunOutcome::AwaitingInput {
                at: NodeId::from("preguntar")
            }
        );
        assert_eq!(h.messenger.sent.load(Ordering::SeqCst), 1);

        let state = h.store.snapshot("c-1").await.unwrap();
        assert!(state.awaiting_input);
        assert_eq!(state.current_node_id, Some(NodeId::from("preguntar")));

        // The reply resumes past the send node, not from the trigger.
        let second = h.engine.handle_event(&event("rayuela")).await.unwrap();
        assert_eq!(
            second,
            RunOutcome::Completed {
                last: NodeId::from("gpt")
            }
        );
        assert_eq!(h.messenger.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extraction_accumulates_across_turns() {
        let extract = Node::new(
            "datos",
            LlmExtractConfig {
                model: None,
                system_prompt: "Extraé título y editorial.".into(),
                variables: vec![
                    VariableSpec::required("titulo", VariableType::Text),
                    VariableSpec::required("editorial", VariableType::Text),
                ],
                temperature: None,
                max_tokens: None,
            },
        );
        let def = definition(
            "pedido",
            vec![
                Node::new("start", crate::graph::TriggerConfig::default()),
                extract,
                send_node("faltan", "¿De qué editorial?"),
                send_node("listo", "Anotado: {{titulo}} de {{editorial}}."),
            ],
            vec![
                Edge::new("e1", "start", "datos"),
                Edge::new("e2", "datos", "listo").with_condition("{{datos.complete}} equals true"),
                Edge::new("e3", "datos", "faltan").with_condition("default"),
                Edge::new("e4", "faltan", "datos"),
            ],
        );
        let h = harness(
            def,
            vec![
                json!({"titulo": "Rayuela", "editorial": null}),
                json!({"titulo": null, "editorial": "Sudamericana"}),
            ],
        );

        let first = h.engine.handle_event(&event("quiero rayuela")).await.unwrap();
        assert_eq!(
            first,
            RunOutcome::AwaitingInput {
                at: NodeId::from("faltan")
            }
        );

        let second = h.engine.handle_event(&event("sudamericana")).await.unwrap();
        assert_eq!(
            second,
            RunOutcome::AwaitingInput {
                at: NodeId::from("listo")
            }
        );

        // The second turn kept the first turn's capture.
        let state = h.store.snapshot("c-1").await.unwrap();
        assert_eq!(state.global_variables["titulo"], "Rayuela");
        assert_eq!(state.global_variables["editorial"], "Sudamericana");
        assert_eq!(
            state.node_outputs[&NodeId::from("listo")].get("message"),
            Some(&json!("Anotado: Rayuela de Sudamericana."))
        );
    }

    #[tokio::test]
    async fn test_cycle_guard_aborts_looping_run() {
        let def = definition(
            "bucle",
            vec![
                Node::new("start", crate::graph::TriggerConfig::default()),
                converse_node("a"),
                converse_node("b"),
                converse_node("c"),
            ],
            vec![
                Edge::new("e1", "start", "a"),
                Edge::new("e2", "a", "b"),
                Edge::new("e3", "b", "c"),
                Edge::new("e4", "c", "a"),
            ],
        );
        let h = harness(def, vec![]);

        let result = h.engine.handle_event(&event("hola")).await;
        assert!(matches!(
            result,
            Err(EngineError::CycleLimitExceeded { limit: 10, .. })
        ));

        // Partial progress survived the abort.
        let state = h.store.snapshot("c-1").await.unwrap();
        assert!(state.node_outputs.contains_key(&NodeId::from("a")));
    }

    #[tokio::test]
    async fn test_busy_contact_is_rejected() {
        let h = harness(linear_definition(), vec![]);
        let held = h.store.lease("c-1").await.unwrap();

        let result = h.engine.handle_event(&event("hola")).await;
        assert!(matches!(result, Err(EngineError::ContactBusy(_))));
        drop(held);

        assert!(h.engine.handle_event(&event("hola")).await.is_ok());
    }

    #[tokio::test]
    async fn test_inactive_flow_never_runs() {
        let mut def = linear_definition();
        def.active = false;
        let h = harness(def, vec![]);

        let result = h.engine.handle_event(&event("hola")).await;
        assert!(matches!(result, Err(EngineError::FlowInactive(_))));
        assert_eq!(h.messenger.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keyword_trigger_gates_new_runs() {
        let mut def = linear_definition();
        def.nodes[0] = Node::new(
            "start",
            TriggerConfig {
                mode: TriggerMode::Keyword,
                keyword: Some("pedido".into()),
            },
        );
        let h = harness(def, vec![]);

        let ignored = h.engine.handle_event(&event("hola")).await.unwrap();
        assert_eq!(ignored, RunOutcome::Ignored);

        let started = h.engine.handle_event(&event("quiero hacer un PEDIDO")).await.unwrap();
        assert!(matches!(started, RunOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_stops_run() {
        let h = harness(linear_definition(), vec![]);
        h.engine.cancellation_token().cancel();

        let result = h.engine.handle_event(&event("hola")).await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_edge_mapping_writes_globals() {
        let def = definition(
            "consulta",
            vec![
                Node::new("start", crate::graph::TriggerConfig::default()),
                Node::new(
                    "api",
                    HttpCallConfig {
                        endpoint: "libreria".into(),
                        method: HttpMethod::Get,
                        params: Default::default(),
                        unwrap_path: Some("items".into()),
                    },
                ),
                send_node("mostrar", "Encontré: {{primero}}"),
            ],
            vec![
                Edge::new("e1", "start", "api"),
                Edge::new("e2", "api", "mostrar").with_mapping("primero", "{{api.data[0].title}}"),
            ],
        );
        let h = harness(def, vec![]);

        h.engine.handle_event(&event("busco algo")).await.unwrap();
        let state = h.store.snapshot("c-1").await.unwrap();
        assert_eq!(state.global_variables["primero"], "Rayuela");
        assert_eq!(
            state.node_outputs[&NodeId::from("mostrar")].get("message"),
            Some(&json!("Encontré: Rayuela"))
        );
    }

    #[tokio::test]
    async fn test_failed_http_call_routes_on_error_flag() {
        let def = definition(
            "consulta",
            vec![
                Node::new("start", crate::graph::TriggerConfig::default()),
                Node::new(
                    "api",
                    HttpCallConfig {
                        endpoint: "libreria".into(),
                        method: HttpMethod::Get,
                        params: Default::default(),
                        unwrap_path: None,
                    },
                ),
                send_node("aviso", "El catálogo no responde, probá más tarde."),
                send_node("mostrar", "Acá van los resultados."),
            ],
            vec![
                Edge::new("e1", "start", "api"),
                Edge::new("e2", "api", "aviso").with_condition("{{api.error}} equals true"),
                Edge::new("e3", "api", "mostrar").with_condition("default"),
            ],
        );
        let h = harness_with_rest(
            def,
            vec![],
            FixedRest {
                status: 500,
                body: json!({"error": "boom"}),
            },
        );

        let outcome = h.engine.handle_event(&event("busco un libro")).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::AwaitingInput {
                at: NodeId::from("aviso")
            }
        );

        let state = h.store.snapshot("c-1").await.unwrap();
        assert_eq!(
            state.node_outputs[&NodeId::from("api")].get("error"),
            Some(&json!(true))
        );
    }

    #[tokio::test]
    async fn test_terminal_run_keeps_conversation_context() {
        let h = harness(linear_definition(), vec![]);
        h.engine.handle_event(&event("hola")).await.unwrap();

        let state = h.store.snapshot("c-1").await.unwrap();
        assert!(state.is_idle());
        assert!(!state.history.is_empty());
        assert!(!state.node_outputs.is_empty());

        // A later event starts a fresh run over the same conversation.
        let again = h.engine.handle_event(&event("otra cosa")).await.unwrap();
        assert!(matches!(again, RunOutcome::Completed { .. }));
    }
}
