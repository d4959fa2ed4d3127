// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Scenario tests for the ReAct engine.
//!
//! Uses `ScriptedMockProvider` so every scenario is deterministic and
//! requires no network access.

use std::sync::Arc;

use async_trait::async_trait;
use reagent_config::{BusyPolicy, Config};
use reagent_model::{
    ChatMessage, ChatProvider, ChatRequest, ChatResponse, ModelError, Role, Segment, SegmentKind,
    SegmentSink, ScriptedMockProvider, ScriptedTurn, ToolCallMsg, ToolSpec,
};
use reagent_tools::{
    handler, FieldSpec, ParamBinding, ToolDefinition, ToolRegistry, TypeSpec,
};
use serde_json::{json, Value};

use crate::{ReactEngine, TurnRequest};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn engine_with(provider: Arc<ScriptedMockProvider>, registry: Arc<ToolRegistry>) -> ReactEngine {
    ReactEngine::new(provider, registry, Config::default())
}

fn add_tool() -> ToolDefinition {
    ToolDefinition::local(
        "add",
        "adds two integers",
        vec![
            ParamBinding::new("a", TypeSpec::Integer, 0),
            ParamBinding::new("b", TypeSpec::Integer, 1),
        ],
        handler(|args| async move {
            let a = args[0].as_i64().unwrap_or(0);
            let b = args[1].as_i64().unwrap_or(0);
            Ok(json!(a + b))
        }),
    )
    .returning(TypeSpec::Integer)
}

fn create_employee_tool() -> ToolDefinition {
    let record = TypeSpec::record(
        "EmployeeRequest",
        vec![
            FieldSpec::new("name", TypeSpec::String),
            FieldSpec::new("department", TypeSpec::String),
            FieldSpec::new("salary", TypeSpec::Number),
        ],
    );
    ToolDefinition::local(
        "createEmployee",
        "creates an employee record",
        vec![ParamBinding::new("request", record, 0)],
        handler(|args| async move {
            Ok(json!({ "success": true, "created": args[0].clone() }))
        }),
    )
}

fn user_turn(session: &str, text: &str) -> TurnRequest {
    TurnRequest {
        session_id: session.into(),
        messages: vec![ChatMessage::user(text)],
        ..TurnRequest::default()
    }
}

/// Run a turn to completion and return every emitted segment in order.
async fn run_and_collect(engine: &ReactEngine, req: TurnRequest) -> Vec<Segment> {
    let (sink, mut rx) = SegmentSink::channel(256);
    engine.run(req, sink).await.unwrap();
    let mut segments = Vec::new();
    while let Ok(s) = rx.try_recv() {
        segments.push(s);
    }
    segments
}

fn texts_of(segments: &[Segment], kind: SegmentKind) -> Vec<&str> {
    segments
        .iter()
        .filter(|s| s.kind == kind)
        .map(|s| s.text.as_str())
        .collect()
}

/// A provider that always fails, for upstream-error scenarios.
struct FailingProvider;

#[async_trait]
impl ChatProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }
    fn model_name(&self) -> &str {
        "failing-model"
    }
    async fn chat(
        &self,
        _req: ChatRequest,
        _sink: Option<&SegmentSink>,
    ) -> Result<ChatResponse, ModelError> {
        Err(ModelError::Upstream {
            status: 503,
            body: "overloaded".into(),
        })
    }
}

// ── Arithmetic via tool ───────────────────────────────────────────────────────

#[tokio::test]
async fn arithmetic_via_tool_emits_action_observation_answer() {
    let provider = Arc::new(ScriptedMockProvider::tool_then_text(
        "call-1",
        "add",
        r#"{"a":2,"b":3}"#,
        "2 + 3 = 5",
    ));
    let registry = Arc::new(ToolRegistry::new());
    registry.register(add_tool());
    let engine = engine_with(Arc::clone(&provider), registry);

    let segments = run_and_collect(&engine, user_turn("s1", "what is 2+3?")).await;

    let actions = texts_of(&segments, SegmentKind::Action);
    assert_eq!(actions, vec![r#"add({"a":2,"b":3})"#]);

    let observations = texts_of(&segments, SegmentKind::Observation);
    assert_eq!(observations, vec!["5"]);

    let answers = texts_of(&segments, SegmentKind::Answer);
    assert_eq!(answers.len(), 1);
    assert!(answers[0].contains('5'));
}

#[tokio::test]
async fn action_precedes_observation_precedes_answer() {
    let provider = Arc::new(ScriptedMockProvider::tool_then_text(
        "call-1",
        "add",
        r#"{"a":1,"b":1}"#,
        "two",
    ));
    let registry = Arc::new(ToolRegistry::new());
    registry.register(add_tool());
    let engine = engine_with(provider, registry);

    let segments = run_and_collect(&engine, user_turn("s", "1+1")).await;
    let order: Vec<SegmentKind> = segments
        .iter()
        .map(|s| s.kind)
        .filter(|k| {
            matches!(
                k,
                SegmentKind::Action | SegmentKind::Observation | SegmentKind::Answer
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            SegmentKind::Action,
            SegmentKind::Observation,
            SegmentKind::Answer
        ]
    );
}

// ── Envelope unwrap ───────────────────────────────────────────────────────────

#[tokio::test]
async fn envelope_unwrap_builds_record_from_flat_arguments() {
    let provider = Arc::new(ScriptedMockProvider::tool_then_text(
        "call-1",
        "createEmployee",
        r#"{"name":"X","department":"D","salary":1.0}"#,
        "created",
    ));
    let registry = Arc::new(ToolRegistry::new());
    registry.register(create_employee_tool());
    let engine = engine_with(provider, registry);

    let segments = run_and_collect(&engine, user_turn("s", "hire X")).await;
    let observations = texts_of(&segments, SegmentKind::Observation);
    assert_eq!(observations.len(), 1);
    assert!(observations[0].contains(r#""success":true"#));
    assert!(observations[0].contains(r#""name":"X""#));
}

// ── History invariants ────────────────────────────────────────────────────────

#[tokio::test]
async fn assistant_tool_calls_followed_by_matching_tool_messages() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::tool_calls(vec![
            ToolCallMsg::function("c1", "add", r#"{"a":1,"b":2}"#),
            ToolCallMsg::function("c2", "add", r#"{"a":3,"b":4}"#),
        ]),
        ScriptedTurn::text("done"),
    ]));
    let registry = Arc::new(ToolRegistry::new());
    registry.register(add_tool());
    let engine = engine_with(provider, registry);

    run_and_collect(&engine, user_turn("s", "go")).await;

    let history = engine.sessions().history("s");
    let assistant_idx = history
        .iter()
        .position(|m| m.has_tool_calls())
        .expect("assistant tool-call message in history");
    let calls = history[assistant_idx].tool_calls.as_ref().unwrap();
    assert_eq!(calls.len(), 2);
    for (offset, call) in calls.iter().enumerate() {
        let tool_msg = &history[assistant_idx + 1 + offset];
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some(call.id.as_str()));
    }
}

#[tokio::test]
async fn history_ends_with_plain_assistant_message_on_success() {
    let provider = Arc::new(ScriptedMockProvider::always_text("final answer"));
    let engine = engine_with(provider, Arc::new(ToolRegistry::new()));

    run_and_collect(&engine, user_turn("s", "hello")).await;

    let history = engine.sessions().history("s");
    let last = history.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(!last.has_tool_calls());
    assert_eq!(last.text_content(), Some("final answer"));
}

#[tokio::test]
async fn system_prompt_is_replaced_not_accumulated() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::text("first"),
        ScriptedTurn::text("second"),
    ]));
    let engine = engine_with(Arc::clone(&provider), Arc::new(ToolRegistry::new()));

    run_and_collect(&engine, user_turn("s", "one")).await;
    run_and_collect(&engine, user_turn("s", "two")).await;

    let history = engine.sessions().history("s");
    let system_count = history.iter().filter(|m| m.role == Role::System).count();
    assert_eq!(system_count, 1, "exactly one system message after two turns");
    assert_eq!(history[0].role, Role::System);
}

#[tokio::test]
async fn second_turn_sees_first_turn_history() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::text("first reply"),
        ScriptedTurn::text("second reply"),
    ]));
    let engine = engine_with(Arc::clone(&provider), Arc::new(ToolRegistry::new()));

    run_and_collect(&engine, user_turn("s", "first question")).await;
    run_and_collect(&engine, user_turn("s", "second question")).await;

    let sent = provider.last_request.lock().unwrap();
    let messages = &sent.as_ref().unwrap().messages;
    let texts: Vec<&str> = messages.iter().filter_map(|m| m.text_content()).collect();
    assert!(texts.contains(&"first question"));
    assert!(texts.contains(&"first reply"));
    assert!(texts.contains(&"second question"));
}

// ── System prompt and tool specs ──────────────────────────────────────────────

#[tokio::test]
async fn registered_tools_listed_in_system_prompt_but_frontend_tools_omitted() {
    let provider = Arc::new(ScriptedMockProvider::always_text("ok"));
    let registry = Arc::new(ToolRegistry::new());
    registry.register(add_tool());
    let engine = engine_with(Arc::clone(&provider), registry);

    let mut req = user_turn("s", "hi");
    req.frontend_tools = vec![ToolSpec::function(
        "getAllCookies",
        "reads browser cookies",
        json!({"type":"object","properties":{}}),
    )];
    run_and_collect(&engine, req).await;

    let sent = provider.last_request.lock().unwrap();
    let sent = sent.as_ref().unwrap();
    let system_text = sent.messages[0].text_content().unwrap();
    assert!(system_text.contains("- add: adds two integers"));
    assert!(
        !system_text.contains("getAllCookies"),
        "frontend tools must not appear in the prompt text"
    );
    // ...but they do travel in the structured tools field.
    assert!(sent.tools.iter().any(|t| t.name() == "getAllCookies"));
}

#[tokio::test]
async fn builtin_tool_detail_is_always_available() {
    let provider = Arc::new(ScriptedMockProvider::always_text("ok"));
    let engine = engine_with(Arc::clone(&provider), Arc::new(ToolRegistry::new()));

    run_and_collect(&engine, user_turn("s", "hi")).await;

    let sent = provider.last_request.lock().unwrap();
    let sent = sent.as_ref().unwrap();
    assert!(sent.tools.iter().any(|t| t.name() == "tool_detail"));
}

#[tokio::test]
async fn model_can_fetch_tool_detail_mid_turn() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::tool_call("c1", "tool_detail", r#"{"tool_name":"add"}"#),
        ScriptedTurn::text("now I know the schema"),
    ]));
    let registry = Arc::new(ToolRegistry::new());
    registry.register(add_tool());
    let engine = engine_with(provider, registry);

    let segments = run_and_collect(&engine, user_turn("s", "describe add")).await;
    let observations = texts_of(&segments, SegmentKind::Observation);
    assert_eq!(observations.len(), 1);
    let detail: Value = serde_json::from_str(observations[0]).unwrap();
    assert_eq!(detail["name"], "add");
    assert_eq!(detail["return_type"], "integer");
}

// ── Error recovery ────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_tool_is_an_observation_not_a_failure() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::tool_call("c1", "frobnicate", "{}"),
        ScriptedTurn::text("recovered"),
    ]));
    let engine = engine_with(provider, Arc::new(ToolRegistry::new()));

    let segments = run_and_collect(&engine, user_turn("s", "go")).await;
    let observations = texts_of(&segments, SegmentKind::Observation);
    assert_eq!(observations, vec!["❌ Tool not found: frobnicate"]);
    assert_eq!(texts_of(&segments, SegmentKind::Answer), vec!["recovered"]);
}

#[tokio::test]
async fn tool_failure_becomes_observation_and_loop_continues() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::tool_call("c1", "add", r#"{"a":"two","b":3}"#),
        ScriptedTurn::text("let me fix the arguments"),
    ]));
    let registry = Arc::new(ToolRegistry::new());
    registry.register(add_tool());
    let engine = engine_with(provider, registry);

    let segments = run_and_collect(&engine, user_turn("s", "go")).await;
    let observations = texts_of(&segments, SegmentKind::Observation);
    assert_eq!(observations.len(), 1);
    assert!(observations[0].starts_with("❌ Tool call failed:"));
    assert!(observations[0].contains('a'));
    assert_eq!(
        texts_of(&segments, SegmentKind::Answer),
        vec!["let me fix the arguments"]
    );
}

#[tokio::test]
async fn upstream_failure_emits_single_error_segment() {
    let engine = ReactEngine::new(
        Arc::new(FailingProvider),
        Arc::new(ToolRegistry::new()),
        Config::default(),
    );

    let segments = run_and_collect(&engine, user_turn("s", "hi")).await;
    let errors = texts_of(&segments, SegmentKind::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("upstream_error:"));
    assert!(errors[0].contains("503"));

    // History holds the prompt and user message, no stub assistant message.
    let history = engine.sessions().history("s");
    assert!(history.iter().all(|m| m.role != Role::Assistant));
}

// ── Step budget ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn step_budget_bounds_model_calls_and_reports_error() {
    let scripts: Vec<ScriptedTurn> = (0..5)
        .map(|i| ScriptedTurn::tool_call(format!("c{i}"), "add", r#"{"a":1,"b":1}"#))
        .collect();
    let provider = Arc::new(ScriptedMockProvider::new(scripts));
    let registry = Arc::new(ToolRegistry::new());
    registry.register(add_tool());

    let mut config = Config::default();
    config.react.max_steps = 2;
    let engine = ReactEngine::new(
        Arc::clone(&provider) as Arc<dyn reagent_model::ChatProvider>,
        registry,
        config,
    );

    let segments = run_and_collect(&engine, user_turn("s", "loop")).await;

    assert_eq!(provider.call_count(), 2, "max_steps bounds model calls");
    let observations = texts_of(&segments, SegmentKind::Observation);
    assert!(observations.len() <= 2);
    assert_eq!(texts_of(&segments, SegmentKind::Error), vec!["max_steps_exceeded"]);
    assert!(texts_of(&segments, SegmentKind::Answer).is_empty());

    // Both assistant+tool pairs are retained.
    let history = engine.sessions().history("s");
    let assistants = history.iter().filter(|m| m.has_tool_calls()).count();
    let tools = history.iter().filter(|m| m.role == Role::Tool).count();
    assert_eq!(assistants, 2);
    assert_eq!(tools, 2);
}

// ── Browser (frontend) tool round trip ────────────────────────────────────────

#[tokio::test]
async fn browser_tool_round_trip() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::tool_call("c1", "getAllCookies", "{}"),
        ScriptedTurn::text("your cookie is k=v"),
    ]));
    let engine = Arc::new(engine_with(provider, Arc::new(ToolRegistry::new())));

    let mut req = user_turn("sess", "what cookies do I have?");
    req.frontend_tools = vec![ToolSpec::function(
        "getAllCookies",
        "reads browser cookies",
        json!({"type":"object","properties":{}}),
    )];

    let (sink, mut rx) = SegmentSink::channel(64);
    let engine2 = Arc::clone(&engine);
    let worker = tokio::spawn(async move { engine2.run(req, sink).await });

    // The browser client sees the sentinel Action and posts the result back.
    let mut segments = Vec::new();
    let mut call_id = None;
    while let Some(seg) = rx.recv().await {
        if seg.kind == SegmentKind::Action && call_id.is_none() {
            let payload = seg
                .text
                .strip_prefix("[FRONTEND_TOOL_CALL] ")
                .expect("sentinel prefix");
            let v: Value = serde_json::from_str(payload).unwrap();
            assert_eq!(v["type"], "FRONTEND_TOOL_CALL");
            assert_eq!(v["toolCall"]["function"]["name"], "getAllCookies");
            let cid = v["callId"].as_str().unwrap().to_string();
            assert!(!cid.is_empty(), "call id must be fresh and non-empty");
            assert!(engine.frontend().complete(
                "sess",
                &cid,
                Some(json!({"cookie":"k=v"})),
                None,
                false,
            ));
            call_id = Some(cid);
        }
        segments.push(seg);
    }
    worker.await.unwrap().unwrap();

    assert!(call_id.is_some(), "an Action with the sentinel was emitted");
    let observations = texts_of(&segments, SegmentKind::Observation);
    assert_eq!(observations.len(), 1);
    assert!(observations[0].contains("k=v"));
    let answers = texts_of(&segments, SegmentKind::Answer);
    assert_eq!(answers, vec!["your cookie is k=v"]);
}

#[tokio::test]
async fn browser_tool_timeout_is_one_observation_and_turn_continues() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::tool_call("c1", "slowTool", "{}"),
        ScriptedTurn::text("gave up on the browser"),
    ]));
    let mut config = Config::default();
    config.frontend_tool.timeout_ms = 30;
    let engine = ReactEngine::new(provider, Arc::new(ToolRegistry::new()), config);

    let mut req = user_turn("s", "go");
    req.frontend_tools = vec![ToolSpec::function(
        "slowTool",
        "never answers",
        json!({"type":"object","properties":{}}),
    )];

    let segments = run_and_collect(&engine, req).await;
    let observations = texts_of(&segments, SegmentKind::Observation);
    assert_eq!(observations, vec!["❌ Tool call failed: timeout"]);
    assert_eq!(
        texts_of(&segments, SegmentKind::Answer),
        vec!["gave up on the browser"]
    );
    assert_eq!(engine.frontend().pending_count(), 0);
}

// ── Cancellation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_during_browser_wait_ends_turn_with_cancelled_error() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![ScriptedTurn::tool_call(
        "c1",
        "slowTool",
        "{}",
    )]));
    let engine = Arc::new(engine_with(provider, Arc::new(ToolRegistry::new())));

    let mut req = user_turn("sess", "go");
    req.frontend_tools = vec![ToolSpec::function(
        "slowTool",
        "never answers",
        json!({"type":"object","properties":{}}),
    )];

    let (sink, mut rx) = SegmentSink::channel(64);
    let engine2 = Arc::clone(&engine);
    let worker = tokio::spawn(async move { engine2.run(req, sink).await });

    while engine.frontend().pending_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(engine.cancel("sess"));
    worker.await.unwrap().unwrap();

    let mut segments = Vec::new();
    while let Ok(s) = rx.try_recv() {
        segments.push(s);
    }
    let errors = texts_of(&segments, SegmentKind::Error);
    assert_eq!(errors, vec!["cancelled"]);
    // The blocked slot was released as part of the cancel.
    let observations = texts_of(&segments, SegmentKind::Observation);
    assert_eq!(observations, vec!["❌ Tool call failed: cancelled"]);
}

#[tokio::test]
async fn cancel_before_any_step_emits_cancelled() {
    let provider = Arc::new(ScriptedMockProvider::always_text("never streamed"));
    let engine = Arc::new(engine_with(provider, Arc::new(ToolRegistry::new())));

    // Pre-cancel by holding the turn open: start, cancel, then observe.
    let (sink, mut rx) = SegmentSink::channel(64);
    let mut req = user_turn("sess", "go");
    req.frontend_tools = vec![];

    // Begin a guard manually so the cancel lands before run() starts its loop.
    let tasks = engine.tasks().clone();
    let pre_guard = tasks.begin("sess").await.unwrap();
    let engine2 = Arc::clone(&engine);
    let worker = tokio::spawn(async move { engine2.run(req, sink).await });
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    engine.cancel("sess");
    drop(pre_guard);
    worker.await.unwrap().unwrap();

    let mut segments = Vec::new();
    while let Ok(s) = rx.try_recv() {
        segments.push(s);
    }
    // The run either completed normally (cancel raced the handoff) or was
    // cancelled; in both cases exactly one terminal segment is emitted.
    let terminal: Vec<&Segment> = segments
        .iter()
        .filter(|s| matches!(s.kind, SegmentKind::Error | SegmentKind::Answer))
        .collect();
    assert_eq!(terminal.len(), 1);
}

// ── Busy sessions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reject_policy_surfaces_busy_error_segment() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::tool_call("c1", "slowTool", "{}"),
        ScriptedTurn::text("done"),
        ScriptedTurn::text("should not be needed"),
    ]));
    let mut config = Config::default();
    config.session.on_busy = BusyPolicy::Reject;
    config.frontend_tool.timeout_ms = 500;
    let engine = Arc::new(ReactEngine::new(
        provider,
        Arc::new(ToolRegistry::new()),
        config,
    ));

    let mut req1 = user_turn("sess", "first");
    req1.frontend_tools = vec![ToolSpec::function(
        "slowTool",
        "blocks",
        json!({"type":"object","properties":{}}),
    )];
    let (sink1, _rx1) = SegmentSink::channel(64);
    let engine2 = Arc::clone(&engine);
    let worker = tokio::spawn(async move { engine2.run(req1, sink1).await });

    while engine.frontend().pending_count() == 0 {
        tokio::task::yield_now().await;
    }

    // Second turn on the same session is rejected while the first runs.
    let segments = run_and_collect(&engine, user_turn("sess", "second")).await;
    let errors = texts_of(&segments, SegmentKind::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("in flight"));

    engine.cancel("sess");
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn different_sessions_run_independently() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![
        ScriptedTurn::text("for a"),
        ScriptedTurn::text("for b"),
    ]));
    let engine = engine_with(provider, Arc::new(ToolRegistry::new()));

    run_and_collect(&engine, user_turn("a", "q1")).await;
    run_and_collect(&engine, user_turn("b", "q2")).await;

    assert_eq!(
        engine.sessions().history("a").last().unwrap().text_content(),
        Some("for a")
    );
    assert_eq!(
        engine.sessions().history("b").last().unwrap().text_content(),
        Some("for b")
    );
}

// ── Streaming pass-through ────────────────────────────────────────────────────

#[tokio::test]
async fn reasoning_and_content_segments_stream_before_answer() {
    let provider = Arc::new(ScriptedMockProvider::new(vec![ScriptedTurn::text(
        "the answer",
    )
    .with_reasoning("thinking it through")]));
    let engine = engine_with(provider, Arc::new(ToolRegistry::new()));

    let segments = run_and_collect(&engine, user_turn("s", "q")).await;
    let kinds: Vec<SegmentKind> = segments.iter().map(|s| s.kind).collect();
    let reasoning_pos = kinds
        .iter()
        .position(|k| *k == SegmentKind::Reasoning)
        .expect("reasoning segment");
    let content_pos = kinds
        .iter()
        .position(|k| *k == SegmentKind::Content)
        .expect("content segment");
    let answer_pos = kinds
        .iter()
        .position(|k| *k == SegmentKind::Answer)
        .expect("answer segment");
    assert!(reasoning_pos < content_pos);
    assert!(content_pos < answer_pos);
}
