// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The ReAct orchestrator: drives the model ↔ tool iteration for one user
//! turn, emits typed segments, enforces the step budget, and keeps the
//! session history consistent on every exit path.

use std::collections::HashSet;
use std::sync::Arc;

use reagent_config::Config;
use reagent_model::{
    ChatMessage, ChatProvider, ChatRequest, Role, SegmentKind, SegmentSink, ToolCallMsg, ToolSpec,
};
use reagent_tools::{
    invoke_local, register_builtins, HttpInvoker, RequestContext, ToolKind, ToolRegistry,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::frontend::FrontendToolManager;
use crate::prompts;
use crate::store::SessionStore;
use crate::tasks::TaskManager;

/// One user turn, as handed over by the transport.  The envelope is
/// OpenAI-compatible; unknown fields are ignored by serde.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    /// Model override for this turn; empty uses the provider default.
    #[serde(default)]
    pub model: Option<String>,
    /// Incoming messages; non-system entries are appended to the session
    /// history (typically just the new user message).
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Tools implemented by the caller's browser, passed through to the
    /// model verbatim and live only for this turn.
    #[serde(default)]
    pub frontend_tools: Vec<ToolSpec>,
    #[serde(default)]
    pub environment_context: Option<String>,
    /// Ambient inbound request data forwarded to HTTP tools.
    #[serde(default)]
    pub request_context: RequestContext,
}

pub struct ReactEngine {
    provider: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
    tasks: Arc<TaskManager>,
    frontend: Arc<FrontendToolManager>,
    http: HttpInvoker,
    config: Config,
}

impl ReactEngine {
    /// Build an engine.  The built-in tool set is registered into
    /// `registry` here, before any turn can run.
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        registry: Arc<ToolRegistry>,
        config: Config,
    ) -> Self {
        register_builtins(&registry);
        Self {
            provider,
            registry,
            sessions: Arc::new(SessionStore::new(config.session.idle_timeout_ms)),
            tasks: Arc::new(TaskManager::new(config.session.on_busy)),
            frontend: Arc::new(FrontendToolManager::new(config.frontend_tool.timeout_ms)),
            http: HttpInvoker::new(),
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The browser-result ingress routes completions here.
    pub fn frontend(&self) -> &Arc<FrontendToolManager> {
        &self.frontend
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Cancel the in-flight turn of a session: flips the cancellation token
    /// and releases every pending browser slot so a blocked worker wakes up.
    pub fn cancel(&self, session_id: &str) -> bool {
        let had_task = self.tasks.cancel(session_id);
        let released = self.frontend.cleanup_session(session_id);
        if released > 0 {
            debug!(session = session_id, released, "released pending browser slots");
        }
        had_task
    }

    /// Run one user turn.  All outcomes, including failures, surface as
    /// typed segments on the sink; the returned error is reserved for
    /// internal invariant violations.
    pub async fn run(&self, req: TurnRequest, sink: SegmentSink) -> anyhow::Result<()> {
        let mut guard = match self.tasks.begin(&req.session_id).await {
            Ok(g) => g,
            Err(busy) => {
                warn!(session = %req.session_id, "rejecting concurrent turn");
                sink.emit(SegmentKind::Error, busy.to_string()).await;
                return Ok(());
            }
        };

        let frontend_names: HashSet<String> = req
            .frontend_tools
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        let tool_specs = self.assemble_tool_specs(&req.frontend_tools);

        // Fresh system prompt: prior system messages are replaced, never
        // accumulated.
        let mut history = self.sessions.history(&req.session_id);
        history.retain(|m| m.role != Role::System);
        history.insert(0, ChatMessage::system(self.build_system_prompt(&req)));
        history.extend(
            req.messages
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );

        let max_steps = self.config.react.max_steps.max(1);
        for step in 1..=max_steps {
            if guard.cancelled() {
                return self.finish_cancelled(&req, history, &sink).await;
            }

            let chat_req = ChatRequest {
                model: req.model.clone().unwrap_or_default(),
                messages: history.clone(),
                tools: tool_specs.clone(),
                tool_choice: None,
                temperature: Some(req.temperature.unwrap_or(self.config.react.temperature)),
                max_tokens: req.max_tokens,
                stream: true,
            };

            // The cancel token interrupts a streaming read at the next chunk
            // boundary instead of waiting for the model to finish.
            let outcome = tokio::select! {
                biased;
                _ = guard.cancel_receiver() => None,
                r = self.provider.chat(chat_req, Some(&sink)) => Some(r),
            };
            let response = match outcome {
                None => {
                    return self.finish_cancelled(&req, history, &sink).await;
                }
                Some(Ok(r)) => r,
                Some(Err(e)) => {
                    warn!(session = %req.session_id, error = %e, "model call failed");
                    // History is persisted up to the last consistent point:
                    // the assistant message for this step was never added.
                    self.sessions.persist(&req.session_id, history);
                    sink.emit(SegmentKind::Error, format!("upstream_error: {e}"))
                        .await;
                    return Ok(());
                }
            };

            let assistant = response.message;
            history.push(assistant.clone());

            if !assistant.has_tool_calls() {
                let answer = assistant.content.unwrap_or_default();
                sink.emit(SegmentKind::Answer, answer).await;
                self.sessions.persist(&req.session_id, history);
                debug!(session = %req.session_id, step, "turn complete");
                return Ok(());
            }

            // Strictly sequential, in the model's order: each observation is
            // in history before the next call executes.
            for call in assistant.tool_calls.iter().flatten() {
                let observation = self
                    .execute_tool_call(call, &req, &frontend_names, &sink)
                    .await;
                sink.emit(SegmentKind::Observation, observation.clone())
                    .await;
                history.push(ChatMessage::tool_result(call.id.clone(), observation));
            }

            if guard.cancelled() {
                return self.finish_cancelled(&req, history, &sink).await;
            }
        }

        // Step budget exhausted: surface as an error, keep the history.
        self.sessions.persist(&req.session_id, history);
        sink.emit(SegmentKind::Error, "max_steps_exceeded").await;
        Ok(())
    }

    async fn finish_cancelled(
        &self,
        req: &TurnRequest,
        history: Vec<ChatMessage>,
        sink: &SegmentSink,
    ) -> anyhow::Result<()> {
        self.frontend.cleanup_session(&req.session_id);
        self.sessions.persist(&req.session_id, history);
        sink.emit(SegmentKind::Error, "cancelled").await;
        debug!(session = %req.session_id, "turn cancelled");
        Ok(())
    }

    /// Built-ins and registered tools with basic schemas, then the request's
    /// frontend tools verbatim.
    fn assemble_tool_specs(&self, frontend_tools: &[ToolSpec]) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .registry
            .basic_schemas()
            .into_iter()
            .map(|s| ToolSpec::function(s.name, s.description, s.parameters))
            .collect();
        specs.extend(frontend_tools.iter().cloned());
        specs
    }

    fn build_system_prompt(&self, req: &TurnRequest) -> String {
        let summaries = self.registry.list_summaries();
        let examples: Vec<(String, String)> = if self.config.react.detailed_system_prompt {
            summaries
                .iter()
                .filter_map(|s| {
                    let detail = self.registry.get_detail(&s.name)?;
                    let example = detail.request_example?;
                    Some((
                        s.name.clone(),
                        reagent_tools::example::render_example_json(&example),
                    ))
                })
                .collect()
        } else {
            Vec::new()
        };
        prompts::system_prompt(&summaries, req.environment_context.as_deref(), &examples)
    }

    /// Dispatch one tool call and return its observation.  Failures never
    /// abort the turn: they come back as `❌` text the model can react to.
    async fn execute_tool_call(
        &self,
        call: &ToolCallMsg,
        req: &TurnRequest,
        frontend_names: &HashSet<String>,
        sink: &SegmentSink,
    ) -> String {
        let name = call.function.name.as_str();

        // Frontend tools first: the request's own tools shadow the registry
        // for this turn, and the sentinel Action is emitted by the manager.
        if frontend_names.contains(name) {
            return self.frontend.invoke(call, &req.session_id, sink).await;
        }

        let Some(def) = self.registry.get_definition(name) else {
            sink.emit(
                SegmentKind::Action,
                format!("{name}({})", call.function.arguments),
            )
            .await;
            return format!("❌ Tool not found: {name}");
        };

        if def.kind == ToolKind::Browser {
            // Registered browser tools also resolve through the frontend
            // bridge at call time.
            return self.frontend.invoke(call, &req.session_id, sink).await;
        }

        sink.emit(
            SegmentKind::Action,
            format!("{name}({})", call.function.arguments),
        )
        .await;

        let result = match def.kind {
            ToolKind::Local => invoke_local(&def, &call.function.arguments).await,
            ToolKind::Http => {
                self.http
                    .invoke(&def, &call.function.arguments, &req.request_context)
                    .await
            }
            ToolKind::Browser => unreachable!("handled above"),
        };

        match result {
            Ok(observation) => observation,
            Err(e) => {
                debug!(tool = name, error = %e, "tool call failed");
                format!("❌ Tool call failed: {e}")
            }
        }
    }

    /// Evict idle sessions; intended to be driven by a periodic task in the
    /// hosting process.
    pub fn evict_idle_sessions(&self) -> usize {
        self.sessions.evict_idle()
    }

    #[cfg(test)]
    pub(crate) fn tasks(&self) -> &Arc<TaskManager> {
        &self.tasks
    }
}
