// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-session turn arbitration and cancellation.
//!
//! At most one turn mutates a session's history at a time.  A second turn on
//! a busy session either queues behind it or is rejected, per configuration.
//! Each in-flight turn registers a one-shot cancellation token; the engine
//! polls it between iterations and at suspension points.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reagent_config::BusyPolicy;
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Error)]
#[error("session {0} already has a turn in flight")]
pub struct SessionBusy(pub String);

#[derive(Default)]
#[derive(Debug)]
struct SessionSlot {
    lock: Arc<tokio::sync::Mutex<()>>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            lock: Arc::new(tokio::sync::Mutex::new(())),
            cancel_tx: None,
        }
    }
}

pub struct TaskManager {
    policy: BusyPolicy,
    slots: Arc<Mutex<HashMap<String, SessionSlot>>>,
}

impl TaskManager {
    pub fn new(policy: BusyPolicy) -> Self {
        Self {
            policy,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Acquire the session for one turn.  With the serialize policy this
    /// waits for a running turn to finish; with reject it fails fast.
    pub async fn begin(&self, session_id: &str) -> Result<TurnGuard, SessionBusy> {
        let lock = {
            let mut slots = self.slots.lock().unwrap();
            slots
                .entry(session_id.to_string())
                .or_insert_with(SessionSlot::new)
                .lock
                .clone()
        };

        let permit = match self.policy {
            BusyPolicy::Serialize => lock.lock_owned().await,
            BusyPolicy::Reject => lock
                .try_lock_owned()
                .map_err(|_| SessionBusy(session_id.to_string()))?,
        };

        // The token is installed only after the permit is held, so it always
        // belongs to the turn that owns the session.
        let (tx, rx) = oneshot::channel();
        self.slots
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_insert_with(SessionSlot::new)
            .cancel_tx = Some(tx);

        Ok(TurnGuard {
            session_id: session_id.to_string(),
            slots: Arc::clone(&self.slots),
            cancel_rx: rx,
            _permit: permit,
        })
    }

    /// Signal the in-flight turn of a session to stop.  Returns false when
    /// no turn is in flight.
    pub fn cancel(&self, session_id: &str) -> bool {
        let tx = self
            .slots
            .lock()
            .unwrap()
            .get_mut(session_id)
            .and_then(|s| s.cancel_tx.take());
        match tx {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// Exclusive hold on a session for the duration of one turn.  Dropping the
/// guard releases the session and retires its cancellation token.
#[derive(Debug)]
pub struct TurnGuard {
    session_id: String,
    slots: Arc<Mutex<HashMap<String, SessionSlot>>>,
    cancel_rx: oneshot::Receiver<()>,
    _permit: tokio::sync::OwnedMutexGuard<()>,
}

impl TurnGuard {
    /// Poll the cancellation token.  Both an explicit signal and a dropped
    /// sender count as cancelled; only an untouched token reads as live.
    pub fn cancelled(&mut self) -> bool {
        !matches!(
            self.cancel_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        )
    }

    /// Await-able form of the token for `select!` around suspension points.
    pub fn cancel_receiver(&mut self) -> &mut oneshot::Receiver<()> {
        &mut self.cancel_rx
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.slots.lock() {
            if let Some(slot) = slots.get_mut(&self.session_id) {
                slot.cancel_tx = None;
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
