// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Duration, Utc};
use reagent_model::ChatMessage;

/// Per-conversation state: the ordered message history plus bookkeeping for
/// idle eviction.  The engine is the only mutator during a turn.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            history: Vec::new(),
            created_at: now,
            last_used_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }

    pub fn idle_since(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_used_at
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
