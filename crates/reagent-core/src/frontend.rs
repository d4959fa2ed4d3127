// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Bridge between the agent loop and tools that execute in the caller's
//! browser.
//!
//! The transport is a duplex channel: outbound segments stream to the
//! browser, and the browser posts tool results back through a separate
//! endpoint.  An outbound call is announced with a sentinel `Action`
//! segment; the worker then blocks on a single-shot completion slot keyed
//! by `(session_id, call_id)` until the paired result arrives, the wait
//! budget expires, or the session is cancelled.  Every slot resolves
//! exactly once.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reagent_model::{SegmentKind, SegmentSink, ToolCallMsg};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// Sentinel prefix clients detect on `Action` segments.  Transports MUST
/// forward the line verbatim.
pub const FRONTEND_TOOL_CALL_PREFIX: &str = "[FRONTEND_TOOL_CALL] ";

/// Wire shape of the browser's out-of-band result post.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendToolResult {
    pub call_id: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub is_error: bool,
}

pub struct FrontendToolManager {
    pending: Mutex<HashMap<(String, String), oneshot::Sender<String>>>,
    timeout: Duration,
}

impl FrontendToolManager {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Allocate a correlation id and completion slot for one outbound call.
    pub fn register(&self, session_id: &str) -> (String, oneshot::Receiver<String>) {
        let call_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .insert((session_id.to_string(), call_id.clone()), tx);
        (call_id, rx)
    }

    /// Ask the browser to execute `call` and block until the paired result
    /// arrives or the wait budget expires.  The returned string is the
    /// observation appended to history.
    pub async fn invoke(
        &self,
        call: &ToolCallMsg,
        session_id: &str,
        sink: &SegmentSink,
    ) -> String {
        let (call_id, rx) = self.register(session_id);
        let envelope = json!({
            "type": "FRONTEND_TOOL_CALL",
            "callId": call_id,
            "toolCall": call,
        });
        sink.emit(
            SegmentKind::Action,
            format!("{FRONTEND_TOOL_CALL_PREFIX}{envelope}"),
        )
        .await;
        debug!(session = session_id, call_id = %call_id, tool = %call.function.name,
               "waiting for frontend tool result");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(observation)) => observation,
            // Slot dropped without a value: the session was cleaned up.
            Ok(Err(_)) => "❌ Tool call failed: cancelled".to_string(),
            Err(_) => {
                self.pending
                    .lock()
                    .unwrap()
                    .remove(&(session_id.to_string(), call_id.clone()));
                warn!(session = session_id, call_id = %call_id, "frontend tool call timed out");
                "❌ Tool call failed: timeout".to_string()
            }
        }
    }

    /// Fulfil a pending call with the browser's result.  Returns false for
    /// an unknown `(session_id, call_id)` pair or a slot already resolved.
    pub fn complete(
        &self,
        session_id: &str,
        call_id: &str,
        result: Option<Value>,
        error: Option<String>,
        is_error: bool,
    ) -> bool {
        let tx = self
            .pending
            .lock()
            .unwrap()
            .remove(&(session_id.to_string(), call_id.to_string()));
        let Some(tx) = tx else {
            return false;
        };
        let observation = if is_error {
            let err = error.unwrap_or_else(|| "unknown error".to_string());
            format!("❌ Tool call failed: {err}")
        } else {
            let rendered = match result {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => "null".to_string(),
            };
            format!("✅ Tool call succeeded: {rendered}")
        };
        // A send error means the waiter already gave up (timeout race).
        tx.send(observation).is_ok()
    }

    /// Deserialized-ingress form of [`complete`](Self::complete).
    pub fn complete_result(&self, session_id: &str, res: FrontendToolResult) -> bool {
        self.complete(session_id, &res.call_id, res.result, res.error, res.is_error)
    }

    /// Resolve every pending slot for a session as cancelled.  Returns the
    /// number of slots released.
    pub fn cleanup_session(&self, session_id: &str) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let before = pending.len();
        // Dropping the senders resolves the paired receivers with an error,
        // which the waiters report as a cancelled observation.
        pending.retain(|(sid, _), _| sid != session_id);
        before - pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
