// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Invocation of in-process tools.
//!
//! The model supplies a JSON object keyed by parameter name; the bindings
//! map each key onto a positional slot and declared type.  The handler then
//! receives a fully converted positional argument list.

use serde_json::{Map, Value};

use crate::definition::{ToolDefinition, ToolTarget, TypeSpec};
use crate::ToolError;

/// Execute a LOCAL tool definition against the model's argument JSON.
/// The returned string is the observation appended to history.
pub async fn invoke_local(def: &ToolDefinition, args_json: &str) -> Result<String, ToolError> {
    let ToolTarget::Local(target) = &def.target else {
        return Err(ToolError::Execution(format!(
            "{} is not a local tool",
            def.name
        )));
    };

    let mut args = parse_args_object(args_json)?;

    // Envelope unwrapping: a callable with exactly one record-typed
    // parameter accepts the whole argument object as that parameter when
    // the model sent the record's fields at the top level.
    if let [binding] = def.bindings.as_slice() {
        if binding.spec.is_complex() && !args.contains_key(&binding.name) {
            let whole = std::mem::take(&mut args);
            args.insert(binding.name.clone(), Value::Object(whole));
        }
    }

    let arity = def
        .bindings
        .iter()
        .map(|b| b.position + 1)
        .max()
        .unwrap_or(0);
    let mut positional = vec![Value::Null; arity];
    for binding in &def.bindings {
        match args.remove(&binding.name) {
            Some(value) => {
                positional[binding.position] = convert(value, &binding.spec, &binding.name)?;
            }
            None if binding.required => {
                return Err(ToolError::invalid(
                    &binding.name,
                    "required parameter is missing",
                ));
            }
            None => {}
        }
    }

    let result = target(positional).await?;
    Ok(render_result(&result))
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

/// Convert one argument value to its declared type.
fn convert(value: Value, spec: &TypeSpec, name: &str) -> Result<Value, ToolError> {
    match spec {
        TypeSpec::String => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Null => Ok(Value::Null),
            other => Err(ToolError::invalid(
                name,
                format!("cannot convert {other} to string"),
            )),
        },
        TypeSpec::Integer => match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(Value::from(f as i64)),
                _ => Err(ToolError::invalid(name, format!("{n} is not an integer"))),
            },
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| ToolError::invalid(name, format!("'{s}' is not an integer: {e}"))),
            other => Err(ToolError::invalid(
                name,
                format!("cannot convert {other} to integer"),
            )),
        },
        TypeSpec::Number => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|e| ToolError::invalid(name, format!("'{s}' is not a number: {e}"))),
            other => Err(ToolError::invalid(
                name,
                format!("cannot convert {other} to number"),
            )),
        },
        TypeSpec::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(ToolError::invalid(name, format!("'{s}' is not a boolean"))),
            },
            other => Err(ToolError::invalid(
                name,
                format!("cannot convert {other} to boolean"),
            )),
        },
        TypeSpec::Enum(variants) => match &value {
            Value::String(s) if variants.contains(s) => Ok(value),
            Value::String(s) => Err(ToolError::invalid(
                name,
                format!("'{s}' is not one of [{}]", variants.join(", ")),
            )),
            other => Err(ToolError::invalid(
                name,
                format!("cannot convert {other} to enum"),
            )),
        },
        TypeSpec::List(_) => match value {
            Value::Array(_) => Ok(value),
            other => Err(ToolError::invalid(
                name,
                format!("expected an array, got {other}"),
            )),
        },
        TypeSpec::Map(_, _) | TypeSpec::Record { .. } => match value {
            Value::Object(_) => Ok(value),
            other => Err(ToolError::invalid(
                name,
                format!("expected an object, got {other}"),
            )),
        },
    }
}

/// Render a handler result as observation text: strings verbatim, anything
/// else as JSON.
fn render_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
