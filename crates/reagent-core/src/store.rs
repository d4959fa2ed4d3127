// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use reagent_model::ChatMessage;
use tracing::debug;

use crate::session::Session;

/// Keyed map of conversation sessions.  Sessions are created lazily on
/// first use and evicted after the configured idle timeout.  Exclusive turn
/// access is arbitrated by the task manager, not here; the store only
/// guards its own map.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout_ms: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout: Duration::milliseconds(idle_timeout_ms as i64),
        }
    }

    /// Snapshot of a session's history, creating the session if needed.
    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        session.touch();
        session.history.clone()
    }

    /// Append messages to a session without replacing the rest.
    pub fn append(&self, session_id: &str, messages: impl IntoIterator<Item = ChatMessage>) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        session.history.extend(messages);
        session.touch();
    }

    /// Replace a session's history after a turn.
    pub fn persist(&self, session_id: &str, history: Vec<ChatMessage>) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        session.history = history;
        session.touch();
    }

    pub fn clear(&self, session_id: &str) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id) {
            session.history.clear();
            session.touch();
        }
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap().remove(session_id).is_some()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }

    /// Drop every session idle for longer than the configured timeout.
    /// Returns the number of evicted sessions.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Utc::now())
    }

    fn evict_idle_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|id, s| {
            let keep = s.idle_since(now) < self.idle_timeout;
            if !keep {
                debug!(session = %id, "evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
