// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// The kind of a streamed content segment.
///
/// Transports render these however they like (SSE event names, WebSocket
/// frames); the engine only guarantees emission order and that a kind
/// transition closes the previous segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Thinking,
    Reasoning,
    Action,
    Observation,
    Answer,
    Ask,
    Error,
    Content,
}

/// One typed fragment of a turn's output stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub text: String,
}

/// The single channel through which a turn communicates progress to its
/// caller.  Clonable; every component participating in a turn receives the
/// same sink.
#[derive(Clone)]
pub struct SegmentSink {
    tx: mpsc::Sender<Segment>,
}

impl SegmentSink {
    pub fn new(tx: mpsc::Sender<Segment>) -> Self {
        Self { tx }
    }

    /// Convenience constructor for callers that just want a paired receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Segment>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Emit one fragment.  A dropped receiver is ignored: an abandoned
    /// caller must never wedge the turn that is producing for it.
    pub async fn emit(&self, kind: SegmentKind, text: impl Into<String>) {
        let _ = self
            .tx
            .send(Segment {
                kind,
                text: text.into(),
            })
            .await;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
