// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Weak};

use crate::definition::{handler, ParamBinding, ToolDefinition, TypeSpec};
use crate::{ToolError, ToolRegistry};

/// The `tool_detail` built-in: returns the full, example-bearing schema for
/// a registered tool.  Tool lists sent to the model carry only basic
/// schemas; this is how the model obtains example payloads on demand
/// without paying the token cost up front.
///
/// Holds a `Weak` registry reference: the definition lives inside the
/// registry it queries, and a strong reference would keep that cycle alive.
pub fn tool_detail_definition(registry: &Arc<ToolRegistry>) -> ToolDefinition {
    let weak: Weak<ToolRegistry> = Arc::downgrade(registry);
    let bindings = vec![ParamBinding::new("tool_name", TypeSpec::String, 0)
        .with_description("Name of the registered tool to describe")];
    ToolDefinition::local(
        "tool_detail",
        "Returns the full schema of a registered tool: parameter types, \
         descriptions, and example request/response payloads. Call this \
         before using a tool whose arguments you are unsure about.",
        bindings,
        handler(move |args| {
            let weak = weak.clone();
            async move {
                let name = args
                    .first()
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| ToolError::invalid("tool_name", "expected a string"))?;
                let registry = weak
                    .upgrade()
                    .ok_or_else(|| ToolError::Execution("tool registry is gone".into()))?;
                let detail = registry
                    .get_detail(&name)
                    .ok_or(ToolError::NotFound(name))?;
                serde_json::to_value(&detail)
                    .map_err(|e| ToolError::Execution(format!("serializing detail: {e}")))
            }
        }),
    )
    .returning(TypeSpec::record(
        "ToolDetail",
        vec![],
    ))
}

/// Exposed for tests: render a detail lookup the way the handler does.
#[cfg(test)]
fn lookup(registry: &Arc<ToolRegistry>, name: &str) -> Option<serde_json::Value> {
    registry
        .get_detail(name)
        .and_then(|d| serde_json::to_value(&d).ok())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
