// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Weak};
use std::time::Instant;

use serde_json::json;

use crate::definition::{handler, ToolDefinition};
use crate::{ToolError, ToolRegistry};

/// The `runtime_summary` diagnostic: a snapshot of the hosting process for
/// troubleshooting from inside a conversation.  An ordinary LOCAL tool with
/// no special standing in the engine.
pub fn runtime_summary_definition(registry: &Arc<ToolRegistry>) -> ToolDefinition {
    let weak: Weak<ToolRegistry> = Arc::downgrade(registry);
    let started = Instant::now();
    ToolDefinition::local(
        "runtime_summary",
        "Reports a diagnostic snapshot of the agent runtime: process id, \
         worker parallelism, uptime, and the number of registered tools.",
        vec![],
        handler(move |_args| {
            let weak = weak.clone();
            async move {
                let tool_count = weak.upgrade().map(|r| r.len()).unwrap_or(0);
                let parallelism = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                Ok::<_, ToolError>(json!({
                    "pid": std::process::id(),
                    "worker_parallelism": parallelism,
                    "uptime_secs": started.elapsed().as_secs(),
                    "registered_tools": tool_count,
                }))
            }
        }),
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
