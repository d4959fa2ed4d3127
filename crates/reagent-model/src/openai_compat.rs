// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Driver for every provider that speaks the OpenAI `/chat/completions`
//! wire format (hosted OpenAI, BigModel/GLM, MiniMax, local gateways).
//!
//! Streaming responses arrive as SSE `data:` lines terminated by `[DONE]`.
//! A single SSE event can be split across TCP packets, so a persistent line
//! buffer is maintained across chunks; only complete `\n`-terminated lines
//! are parsed.  Incremental `content` is forwarded to the sink as `Content`
//! and `reasoning_content` as `Reasoning`; tool-call fragments are
//! accumulated per parallel-call index and flushed in index order into the
//! synthesized final message.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    ChatMessage, ChatRequest, ChatResponse, ModelError, Role, SegmentKind, SegmentSink,
    ToolCallMsg, Usage,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Long generations: the total budget covers the whole streamed response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

pub struct OpenAICompatProvider {
    /// Adapter id returned by `ChatProvider::name()`.
    adapter: String,
    /// Default model forwarded when the request carries none.
    model: String,
    /// API key (pre-resolved from config or env).  `None` for local gateways.
    api_key: Option<String>,
    /// Full chat completions URL, e.g. `https://api.openai.com/v1/chat/completions`.
    chat_url: String,
    /// Send `thinking: {"type":"disabled"}` in the request body.
    thinking_disabled: bool,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    /// `base_url` ends **before** `/chat/completions`, e.g.
    /// `https://open.bigmodel.cn/api/paas/v4`.
    pub fn new(
        adapter: String,
        model: String,
        api_key: Option<String>,
        base_url: &str,
        thinking_disabled: bool,
    ) -> Result<Self, ModelError> {
        let base = base_url.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ModelError::Config(format!("http client: {e}")))?;
        Ok(Self {
            adapter,
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            thinking_disabled,
            client,
        })
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let model = if req.model.is_empty() {
            self.model.as_str()
        } else {
            req.model.as_str()
        };
        let mut body = json!({
            "model": model,
            "messages": req.messages,
            "stream": req.stream,
        });
        if !req.tools.is_empty() {
            body["tools"] = json!(req.tools);
        }
        if let Some(choice) = &req.tool_choice {
            body["tool_choice"] = choice.clone();
        }
        if let Some(t) = req.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(m) = req.max_tokens {
            body["max_tokens"] = json!(m);
        }
        if self.thinking_disabled {
            body["thinking"] = json!({ "type": "disabled" });
        }
        body
    }
}

#[async_trait]
impl crate::ChatProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.adapter
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        req: ChatRequest,
        sink: Option<&SegmentSink>,
    ) -> Result<ChatResponse, ModelError> {
        let body = self.build_body(&req);
        debug!(
            adapter = %self.adapter,
            model = %body["model"],
            tool_count = req.tools.len(),
            message_count = req.messages.len(),
            stream = req.stream,
            "sending completion request"
        );

        let mut http_req = self.client.post(&self.chat_url).json(&body);
        if let Some(key) = &self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let resp = http_req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Upstream { status, body });
        }

        if !req.stream {
            let v: Value = resp
                .json()
                .await
                .map_err(|e| ModelError::Stream(format!("decoding response body: {e}")))?;
            return parse_full_response(&v);
        }

        let mut acc = StreamAccumulator::default();
        let mut byte_stream = resp.bytes_stream();
        let mut buf = String::new();
        'outer: while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk.map_err(|e| ModelError::Transport(e.to_string()))?;
            buf.push_str(&String::from_utf8_lossy(&bytes));
            for payload in drain_complete_sse_lines(&mut buf) {
                if payload == "[DONE]" {
                    break 'outer;
                }
                let v: Value = match serde_json::from_str(&payload) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "skipping undecodable SSE chunk");
                        continue;
                    }
                };
                for event in parse_sse_chunk(&v) {
                    acc.apply(event, sink).await;
                }
            }
        }

        Ok(acc.finish(&self.model))
    }
}

// ─── SSE decoding ─────────────────────────────────────────────────────────────

/// Drain all complete `\n`-terminated SSE `data:` payloads from `buf`.
///
/// Any trailing incomplete line (bytes not yet terminated by `\n`) is left
/// in `buf` so it can be extended by the next TCP chunk.  Comment lines and
/// empty keep-alives are dropped.
pub(crate) fn drain_complete_sse_lines(buf: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        // Strip the optional Windows-style \r before \n.
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(data) = line.strip_prefix("data: ") {
            let data = data.trim();
            if !data.is_empty() {
                payloads.push(data.to_string());
            }
        }
    }
    payloads
}

/// One decoded piece of an SSE chunk.  A single chunk can carry several
/// (e.g. a final delta plus a finish reason).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChunkEvent {
    Meta {
        id: String,
        created: u64,
        model: String,
    },
    Content(String),
    Reasoning(String),
    ToolCall {
        index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    FinishReason(String),
    Usage(Usage),
}

pub(crate) fn parse_sse_chunk(v: &Value) -> Vec<ChunkEvent> {
    let mut events = Vec::new();

    if let Some(id) = v["id"].as_str() {
        events.push(ChunkEvent::Meta {
            id: id.to_string(),
            created: v["created"].as_u64().unwrap_or(0),
            model: v["model"].as_str().unwrap_or_default().to_string(),
        });
    }

    // Usage-only chunk (final statistics; null on delta chunks).
    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        events.push(ChunkEvent::Usage(Usage {
            prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        }));
    }

    let choice = &v["choices"][0];
    if choice.is_null() {
        return events;
    }

    if let Some(reason) = choice["finish_reason"].as_str() {
        events.push(ChunkEvent::FinishReason(reason.to_string()));
    }

    let delta = &choice["delta"];

    // Parallel tool calls interleave by "index"; each entry may carry only a
    // fragment of the arguments string.
    if let Some(tool_calls) = delta.get("tool_calls").and_then(|t| t.as_array()) {
        for tc in tool_calls {
            events.push(ChunkEvent::ToolCall {
                index: tc["index"].as_u64().unwrap_or(0) as u32,
                id: tc["id"].as_str().unwrap_or("").to_string(),
                name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                arguments: tc["function"]["arguments"]
                    .as_str()
                    .unwrap_or("")
                    .to_string(),
            });
        }
    }

    // Reasoning channel: `reasoning_content` is the common field
    // (GLM, DeepSeek-style servers); some aggregators use `reasoning`.
    let reasoning = delta
        .get("reasoning_content")
        .and_then(|c| c.as_str())
        .or_else(|| delta.get("reasoning").and_then(|c| c.as_str()));
    if let Some(r) = reasoning {
        if !r.is_empty() {
            events.push(ChunkEvent::Reasoning(r.to_string()));
        }
    }

    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            events.push(ChunkEvent::Content(text.to_string()));
        }
    }

    events
}

/// Parse a non-streaming response body into a [`ChatResponse`].
fn parse_full_response(v: &Value) -> Result<ChatResponse, ModelError> {
    let message: ChatMessage = serde_json::from_value(v["choices"][0]["message"].clone())
        .map_err(|e| ModelError::Stream(format!("decoding choices[0].message: {e}")))?;
    let usage = v.get("usage").filter(|u| !u.is_null()).map(|u| Usage {
        prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
    });
    Ok(ChatResponse {
        id: v["id"].as_str().unwrap_or_default().to_string(),
        created: v["created"].as_u64().unwrap_or(0),
        model: v["model"].as_str().unwrap_or_default().to_string(),
        finish_reason: v["choices"][0]["finish_reason"]
            .as_str()
            .map(str::to_string),
        message,
        usage,
    })
}

// ─── Stream accumulation ──────────────────────────────────────────────────────

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    args_buf: String,
}

/// Accumulates delta events into the synthesized final response.
#[derive(Default)]
struct StreamAccumulator {
    id: String,
    created: u64,
    model: String,
    content: String,
    tool_calls: BTreeMap<u32, PendingToolCall>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl StreamAccumulator {
    async fn apply(&mut self, event: ChunkEvent, sink: Option<&SegmentSink>) {
        match event {
            ChunkEvent::Meta { id, created, model } => {
                if self.id.is_empty() {
                    self.id = id;
                }
                if self.created == 0 {
                    self.created = created;
                }
                if self.model.is_empty() {
                    self.model = model;
                }
            }
            ChunkEvent::Content(delta) => {
                self.content.push_str(&delta);
                if let Some(s) = sink {
                    s.emit(SegmentKind::Content, delta).await;
                }
            }
            ChunkEvent::Reasoning(delta) => {
                if let Some(s) = sink {
                    s.emit(SegmentKind::Reasoning, delta).await;
                }
            }
            ChunkEvent::ToolCall {
                index,
                id,
                name,
                arguments,
            } => {
                let ptc = self.tool_calls.entry(index).or_default();
                if !id.is_empty() {
                    ptc.id = id;
                }
                if !name.is_empty() {
                    ptc.name = name;
                }
                ptc.args_buf.push_str(&arguments);
            }
            ChunkEvent::FinishReason(reason) => self.finish_reason = Some(reason),
            ChunkEvent::Usage(u) => self.usage = Some(u),
        }
    }

    fn finish(self, default_model: &str) -> ChatResponse {
        // Flush accumulated parallel tool calls in index order.  A call with
        // an empty name cannot be dispatched and is dropped; storing it
        // would corrupt the history sent back on the next turn.  An empty id
        // gets a synthetic fallback so the turn can still complete.
        let mut calls = Vec::new();
        for (i, (_, ptc)) in self.tool_calls.into_iter().enumerate() {
            if ptc.name.is_empty() {
                warn!(tool_call_id = %ptc.id, "dropping tool call with empty name from stream");
                continue;
            }
            let id = if ptc.id.is_empty() {
                warn!(tool_name = %ptc.name, "tool call had empty id; generating synthetic id");
                format!("tc_synthetic_{i}")
            } else {
                ptc.id
            };
            let args = if ptc.args_buf.is_empty() {
                "{}".to_string()
            } else {
                ptc.args_buf
            };
            calls.push(ToolCallMsg::function(id, ptc.name, args));
        }

        let message = ChatMessage {
            role: Role::Assistant,
            content: if self.content.is_empty() {
                None
            } else {
                Some(self.content)
            },
            name: None,
            tool_call_id: None,
            tool_calls: if calls.is_empty() { None } else { Some(calls) },
        };
        ChatResponse {
            id: self.id,
            created: self.created,
            model: if self.model.is_empty() {
                default_model.to_string()
            } else {
                self.model
            },
            message,
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
