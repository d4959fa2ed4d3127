// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Example generation for tool details.
//!
//! Given a [`TypeSpec`], produces a structurally plausible example value.
//! String and numeric fields draw on field-name heuristics so generated
//! payloads read like real data; pre-declared field metadata always wins.
//! Record expansion is limited to one level: a nested record or map renders
//! as a sentinel string pointing the model at the `tool_detail` tool, which
//! bounds output on self-referential entity types.

use serde_json::{json, Value};

use crate::definition::{FieldSpec, ParamBinding, ParamSpec, ToolDetail, TypeSpec};

/// Example value for a type, rooted at the named tool (the tool name appears
/// in the nested-object sentinel).
pub fn example_value(spec: &TypeSpec, tool_name: &str) -> Value {
    example_at_depth(spec, None, tool_name, 0)
}

/// Sentinel emitted in place of a nested complex value.
fn nested_sentinel(tool_name: &str) -> Value {
    Value::String(format!(
        "Nested object omitted. Call tool_detail(\"{tool_name}\") for the full schema."
    ))
}

fn example_at_depth(spec: &TypeSpec, field_name: Option<&str>, tool: &str, depth: u32) -> Value {
    match spec {
        TypeSpec::String => string_example(field_name),
        TypeSpec::Integer => integer_example(field_name),
        TypeSpec::Number => number_example(field_name),
        TypeSpec::Boolean => json!(true),
        TypeSpec::Enum(variants) => match variants.first() {
            Some(v) => json!(v),
            None => json!(""),
        },
        TypeSpec::List(elem) => json!([example_at_depth(elem, field_name, tool, depth)]),
        TypeSpec::Map(key, value) => {
            if depth >= 1 {
                return nested_sentinel(tool);
            }
            let k = match example_at_depth(key, None, tool, depth + 1) {
                Value::String(s) => s,
                other => other.to_string(),
            };
            let mut obj = serde_json::Map::new();
            obj.insert(k, example_at_depth(value, None, tool, depth + 1));
            Value::Object(obj)
        }
        TypeSpec::Record { fields, .. } => {
            if depth >= 1 {
                return nested_sentinel(tool);
            }
            let mut obj = serde_json::Map::new();
            for f in fields {
                obj.insert(f.name.clone(), field_example(f, tool, depth + 1));
            }
            Value::Object(obj)
        }
    }
}

fn field_example(field: &FieldSpec, tool: &str, depth: u32) -> Value {
    if let Some(e) = &field.example {
        return e.clone();
    }
    example_at_depth(&field.spec, Some(&field.name), tool, depth)
}

/// Field-name heuristics for strings.  Matching is on the lowercased name.
fn string_example(field_name: Option<&str>) -> Value {
    let Some(name) = field_name else {
        return json!("example");
    };
    let lower = name.to_lowercase();
    let text = if lower.contains("email") {
        "alice@example.com"
    } else if lower.contains("phone") {
        "+1-555-0142"
    } else if lower.contains("name") {
        "Alice Smith"
    } else if lower.contains("date") {
        "2024-01-15"
    } else if lower.contains("time") {
        "2024-01-15T09:30:00Z"
    } else if lower.contains("url") || lower.contains("link") {
        "https://example.com"
    } else if lower.contains("city") {
        "Stockholm"
    } else if lower.contains("address") {
        "12 Harbour Street"
    } else if lower.contains("department") {
        "Engineering"
    } else if lower.contains("id") {
        "a1b2c3"
    } else {
        "example"
    };
    json!(text)
}

fn integer_example(field_name: Option<&str>) -> Value {
    let Some(name) = field_name else {
        return json!(1);
    };
    let lower = name.to_lowercase();
    if lower.contains("age") {
        json!(30)
    } else if lower.contains("year") {
        json!(2024)
    } else if lower.contains("count") || lower.contains("size") || lower.contains("page") {
        json!(3)
    } else if lower.contains("id") {
        json!(1001)
    } else {
        json!(1)
    }
}

fn number_example(field_name: Option<&str>) -> Value {
    let Some(name) = field_name else {
        return json!(1.0);
    };
    let lower = name.to_lowercase();
    if lower.contains("salary") || lower.contains("price") || lower.contains("amount") {
        json!(5000.0)
    } else if lower.contains("rate") || lower.contains("ratio") {
        json!(0.5)
    } else {
        json!(1.0)
    }
}

// ─── Default descriptions ─────────────────────────────────────────────────────

/// Fallback tool description derived from the signature.
pub fn default_tool_description(name: &str, bindings: &[ParamBinding]) -> String {
    if bindings.is_empty() {
        format!("Executes the `{name}` operation.")
    } else {
        let params: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
        format!(
            "Executes the `{name}` operation. Parameters: {}.",
            params.join(", ")
        )
    }
}

/// Fallback parameter description.
pub fn default_param_description(binding: &ParamBinding) -> String {
    format!(
        "Parameter `{}` of type {}.",
        binding.name,
        binding.spec.display_name()
    )
}

/// Fallback return description.
pub fn default_return_description(spec: &TypeSpec) -> String {
    format!("Returns a {} value.", spec.display_name())
}

/// Render an example value as pretty JSON for prompt inlining.
pub fn render_example_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ─── Detail assembly ──────────────────────────────────────────────────────────

/// Assemble the full [`ToolDetail`] for a definition at registration time.
pub fn build_detail(
    name: &str,
    description: &str,
    bindings: &[ParamBinding],
    return_spec: Option<&TypeSpec>,
) -> ToolDetail {
    let description = if description.is_empty() {
        default_tool_description(name, bindings)
    } else {
        description.to_string()
    };

    let parameters: Vec<ParamSpec> = bindings
        .iter()
        .map(|b| ParamSpec {
            name: b.name.clone(),
            type_name: b.spec.display_name(),
            description: b
                .description
                .clone()
                .unwrap_or_else(|| default_param_description(b)),
            required: b.required,
            example: Some(example_at_depth(&b.spec, Some(&b.name), name, 0)),
        })
        .collect();

    let mut request = serde_json::Map::new();
    for b in bindings {
        request.insert(
            b.name.clone(),
            example_at_depth(&b.spec, Some(&b.name), name, 0),
        );
    }

    let return_example = return_spec.map(|s| example_value(s, name));
    // The observation the model will read back is the serialized form.
    let response_example = return_example
        .as_ref()
        .map(|v| Value::String(render_example_json(v)));

    ToolDetail {
        name: name.to_string(),
        description,
        parameters,
        return_type: return_spec
            .map(|s| s.display_name())
            .unwrap_or_else(|| "void".into()),
        return_example,
        request_example: if request.is_empty() {
            None
        } else {
            Some(Value::Object(request))
        },
        response_example,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
