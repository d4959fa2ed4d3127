// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    ChatMessage, ChatRequest, ChatResponse, ModelError, SegmentKind, SegmentSink, ToolCallMsg,
};

/// One pre-scripted model turn.
#[derive(Debug, Clone)]
pub struct ScriptedTurn {
    /// The assistant message returned for this call.
    pub message: ChatMessage,
    /// Optional reasoning text streamed to the sink before the content.
    pub reasoning: Option<String>,
}

impl ScriptedTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: ChatMessage::assistant(content),
            reasoning: None,
        }
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            message: ChatMessage::assistant_tool_calls(vec![ToolCallMsg::function(
                id, name, arguments,
            )]),
            reasoning: None,
        }
    }

    /// Multiple tool calls in one assistant turn.
    pub fn tool_calls(calls: Vec<ToolCallMsg>) -> Self {
        Self {
            message: ChatMessage::assistant_tool_calls(calls),
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// A pre-scripted provider.  Each call to `chat` pops the next scripted turn
/// from the front of the queue, so tests can specify exact sequences
/// (including tool calls) without network access.
pub struct ScriptedMockProvider {
    scripts: Mutex<Vec<ScriptedTurn>>,
    calls: AtomicU32,
    /// The last `ChatRequest` seen by this provider.
    /// Written on each `chat()` call so tests can inspect what was sent.
    pub last_request: Arc<Mutex<Option<ChatRequest>>>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<ScriptedTurn>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            calls: AtomicU32::new(0),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Convenience: provider that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![ScriptedTurn::text(reply)])
    }

    /// Convenience: a tool call followed by a text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            ScriptedTurn::tool_call(tool_id, tool_name, args_json),
            ScriptedTurn::text(final_text),
        ])
    }

    /// Number of `chat()` calls served so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl crate::ChatProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }

    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn chat(
        &self,
        req: ChatRequest,
        sink: Option<&SegmentSink>,
    ) -> Result<ChatResponse, ModelError> {
        *self.last_request.lock().unwrap() = Some(req);
        let n = self.calls.fetch_add(1, Ordering::SeqCst);

        let turn = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                // Default fallback when all scripts are consumed
                ScriptedTurn::text("[no more scripts]")
            } else {
                scripts.remove(0)
            }
        };

        if let Some(s) = sink {
            if let Some(r) = &turn.reasoning {
                s.emit(SegmentKind::Reasoning, r.clone()).await;
            }
            if let Some(text) = turn.message.text_content() {
                s.emit(SegmentKind::Content, text.to_string()).await;
            }
        }

        let finish = if turn.message.has_tool_calls() {
            "tool_calls"
        } else {
            "stop"
        };
        Ok(ChatResponse {
            id: format!("mock-{n}"),
            created: 0,
            model: "scripted-mock-model".into(),
            message: turn.message,
            finish_reason: Some(finish.into()),
            usage: None,
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
