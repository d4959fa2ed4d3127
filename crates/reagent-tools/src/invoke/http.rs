// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Invocation of tools that are REST endpoints on other services.
//!
//! Request assembly is a pure function ([`prepare`]) so the URL, header, and
//! body rules are testable without a live backend; [`HttpInvoker::invoke`]
//! only performs the send.  A non-2xx response is NOT an error: it becomes a
//! structured JSON observation so the model can read the failure and pivot.

use reqwest::Method;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::RequestContext;
use crate::definition::{ParamSource, ToolDefinition, ToolTarget};
use crate::ToolError;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Headers never propagated from the inbound request: content negotiation is
/// owned by the route definition and the cookie header is rebuilt from the
/// structured cookie list.
const STRIPPED_HEADERS: [&str; 4] = ["content-type", "accept", "content-length", "cookie"];

/// A fully assembled outbound request, before sending.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Assemble the outbound request for an HTTP tool definition.
pub fn prepare(
    def: &ToolDefinition,
    args_json: &str,
    ctx: &RequestContext,
) -> Result<PreparedRequest, ToolError> {
    let ToolTarget::Http(route) = &def.target else {
        return Err(ToolError::Execution(format!(
            "{} is not an HTTP tool",
            def.name
        )));
    };

    let mut args = parse_args_object(args_json)?;

    // 1. Resolve the absolute URL.
    let template = &route.path_template;
    let resolved = if template.starts_with("http://") || template.starts_with("https://") {
        template.clone()
    } else {
        let base = ctx
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let path = if template.starts_with('/') {
            template.clone()
        } else {
            format!("/{template}")
        };
        format!("{base}{path}")
    };

    // 2. Substitute every {name} placeholder, consuming the argument.
    let substituted = substitute_path_params(&resolved, &mut args)?;
    let mut url = reqwest::Url::parse(&substituted)
        .map_err(|e| ToolError::invalid("url", format!("invalid URL '{substituted}': {e}")))?;

    let method = route.method.clone();
    let is_query_only = method == Method::GET || method == Method::DELETE;

    // 3./4. Split the remaining arguments into query and body.
    let mut body = None;
    if is_query_only {
        for (k, v) in std::mem::take(&mut args) {
            url.query_pairs_mut().append_pair(&k, &canonical_text(&v));
        }
    } else {
        // Explicit query-source bindings stay query parameters even on
        // body-carrying methods.
        for binding in def.bindings.iter().filter(|b| b.source == ParamSource::Query) {
            if let Some(v) = args.remove(&binding.name) {
                url.query_pairs_mut()
                    .append_pair(&binding.name, &canonical_text(&v));
            }
        }

        let body_bindings: Vec<_> = def
            .bindings
            .iter()
            .filter(|b| b.source == ParamSource::Body)
            .collect();
        let value = if let [single] = body_bindings.as_slice() {
            // Exactly one BODY binding: its value is the body (unwrap); when
            // the key is absent the remaining object stands in for it.
            match args.remove(&single.name) {
                Some(v) => v,
                None => Value::Object(std::mem::take(&mut args)),
            }
        } else {
            Value::Object(std::mem::take(&mut args))
        };
        // An empty {} body value is treated as no body.
        if !matches!(&value, Value::Object(m) if m.is_empty()) {
            body = Some(value);
        }
    }

    // 5. Headers.
    let mut headers: Vec<(String, String)> = ctx
        .headers
        .iter()
        .filter(|(name, _)| !STRIPPED_HEADERS.contains(&name.to_lowercase().as_str()))
        .cloned()
        .collect();
    if let Some(cookie) = ctx.cookie_header() {
        headers.push(("Cookie".into(), cookie));
    }
    let accept = route.produces.as_deref().unwrap_or("application/json");
    headers.push(("Accept".into(), accept.to_string()));
    if body.is_some() {
        let content_type = route.consumes.as_deref().unwrap_or("application/json");
        headers.push(("Content-Type".into(), content_type.to_string()));
    }

    Ok(PreparedRequest {
        method,
        url: url.to_string(),
        headers,
        body,
    })
}

fn parse_args_object(args_json: &str) -> Result<Map<String, Value>, ToolError> {
    let trimmed = args_json.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| ToolError::invalid("arguments", format!("malformed JSON: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ToolError::invalid(
            "arguments",
            format!("expected a JSON object, got {other}"),
        )),
    }
}

/// Replace each `{name}` segment from the argument map, removing consumed
/// arguments.  A placeholder with no matching argument is an error.
fn substitute_path_params(
    template: &str,
    args: &mut Map<String, Value>,
) -> Result<String, ToolError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close_rel) = rest[open..].find('}') else {
            // Unbalanced brace: keep literally.
            out.push_str(rest);
            return Ok(out);
        };
        let close = open + close_rel;
        let name = &rest[open + 1..close];
        out.push_str(&rest[..open]);
        match args.remove(name) {
            Some(v) => out.push_str(&canonical_text(&v)),
            None => {
                return Err(ToolError::invalid(
                    name,
                    format!("no argument for path placeholder {{{name}}}"),
                ));
            }
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Canonical text form of a value: strings verbatim, scalars via their
/// display form, structured values as compact JSON.
fn canonical_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

// ─── Error rendering ──────────────────────────────────────────────────────────

fn friendly_status(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        405 => "Method not allowed",
        408 => "Request timeout",
        409 => "Conflict",
        422 => "Unprocessable entity",
        429 => "Too many requests",
        500 => "Internal server error",
        502 => "Bad gateway",
        503 => "Service unavailable",
        504 => "Gateway timeout",
        _ => "HTTP error",
    }
}

/// Best-effort extraction of a human message from a JSON error body.
fn extract_backend_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    for key in ["message", "error", "msg"] {
        if let Some(m) = v.get(key).and_then(|m| m.as_str()) {
            if !m.is_empty() {
                return Some(m.to_string());
            }
        }
    }
    None
}

/// Render a non-2xx backend response as the structured observation the model
/// reads: `{"error":true,"status":…,"message":…,"tool":…}`.
pub(crate) fn format_http_error(status: u16, body: &str, tool: &str) -> String {
    let detail = extract_backend_message(body).unwrap_or_else(|| {
        // 100-char preview of non-JSON bodies.
        body.chars().take(100).collect()
    });
    let message = if detail.is_empty() {
        friendly_status(status).to_string()
    } else {
        format!("{}: {detail}", friendly_status(status))
    };
    serde_json::json!({
        "error": true,
        "status": status,
        "message": message,
        "tool": tool,
    })
    .to_string()
}

// ─── Invoker ──────────────────────────────────────────────────────────────────

/// Executes HTTP tool definitions with a shared connection pool.
pub struct HttpInvoker {
    client: reqwest::Client,
}

impl HttpInvoker {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Execute the tool and return the observation text.
    ///
    /// 2xx returns the raw response body; 4xx/5xx returns the structured
    /// error observation; only transport failures are `Err`.
    pub async fn invoke(
        &self,
        def: &ToolDefinition,
        args_json: &str,
        ctx: &RequestContext,
    ) -> Result<String, ToolError> {
        let prepared = prepare(def, args_json, ctx)?;
        debug!(
            tool = %def.name,
            method = %prepared.method,
            url = %prepared.url,
            has_body = prepared.body.is_some(),
            "invoking http tool"
        );

        let mut req = self
            .client
            .request(prepared.method.clone(), &prepared.url);
        for (name, value) in &prepared.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &prepared.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ToolError::Execution(format!("http request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ToolError::Execution(format!("reading response body: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Ok(format_http_error(status.as_u16(), &body, &def.name))
        }
    }
}

impl Default for HttpInvoker {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
