// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{example, ToolError};

// ─── Kinds and sources ────────────────────────────────────────────────────────

/// How a tool is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// In-process callable
    Local,
    /// REST endpoint on another service
    Http,
    /// Executed by the attached browser client; resolved at call time
    Browser,
}

/// Where an HTTP tool argument is placed in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamSource {
    #[default]
    Body,
    Path,
    Query,
    Other,
}

// ─── Type model ───────────────────────────────────────────────────────────────

/// Shape of a parameter or return value, supplied as plain data by the
/// external discovery collaborator.  The engine never reflects over host
/// types; everything it needs to convert arguments and generate examples is
/// carried here.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    String,
    Integer,
    Number,
    Boolean,
    /// Closed set of string variants
    Enum(Vec<String>),
    List(Box<TypeSpec>),
    Map(Box<TypeSpec>, Box<TypeSpec>),
    /// A user-defined record with named fields
    Record {
        name: String,
        fields: Vec<FieldSpec>,
    },
}

impl TypeSpec {
    pub fn record(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self::Record {
            name: name.into(),
            fields,
        }
    }

    /// True for types that deserialize from a JSON object (the envelope
    /// unwrapping rule applies only to these).
    pub fn is_complex(&self) -> bool {
        matches!(self, TypeSpec::Record { .. } | TypeSpec::Map(_, _))
    }

    /// JSON-Schema `type` keyword for this shape.
    pub fn json_type(&self) -> &'static str {
        match self {
            TypeSpec::String | TypeSpec::Enum(_) => "string",
            TypeSpec::Integer => "integer",
            TypeSpec::Number => "number",
            TypeSpec::Boolean => "boolean",
            TypeSpec::List(_) => "array",
            TypeSpec::Map(_, _) | TypeSpec::Record { .. } => "object",
        }
    }

    /// Human-readable type name used in tool details.
    pub fn display_name(&self) -> String {
        match self {
            TypeSpec::String => "string".into(),
            TypeSpec::Integer => "integer".into(),
            TypeSpec::Number => "number".into(),
            TypeSpec::Boolean => "boolean".into(),
            TypeSpec::Enum(variants) => format!("enum[{}]", variants.join("|")),
            TypeSpec::List(elem) => format!("array<{}>", elem.display_name()),
            TypeSpec::Map(k, v) => format!("map<{}, {}>", k.display_name(), v.display_name()),
            TypeSpec::Record { name, .. } => name.clone(),
        }
    }
}

/// One field of a [`TypeSpec::Record`].  Pre-declared description/example
/// metadata overrides the example generator.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub spec: TypeSpec,
    pub description: Option<String>,
    pub example: Option<Value>,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, spec: TypeSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            description: None,
            example: None,
            required: true,
        }
    }

    pub fn with_description(mut self, d: impl Into<String>) -> Self {
        self.description = Some(d.into());
        self
    }

    pub fn with_example(mut self, e: Value) -> Self {
        self.example = Some(e);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

// ─── Bindings ─────────────────────────────────────────────────────────────────

/// How one argument of the model-supplied JSON object maps onto the target
/// callable or HTTP request.
#[derive(Debug, Clone)]
pub struct ParamBinding {
    pub name: String,
    pub spec: TypeSpec,
    /// Positional slot in the local callable's argument list
    pub position: usize,
    pub required: bool,
    pub source: ParamSource,
    pub description: Option<String>,
}

impl ParamBinding {
    pub fn new(name: impl Into<String>, spec: TypeSpec, position: usize) -> Self {
        Self {
            name: name.into(),
            spec,
            position,
            required: true,
            source: ParamSource::Body,
            description: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn from_path(mut self) -> Self {
        self.source = ParamSource::Path;
        self
    }

    pub fn from_query(mut self) -> Self {
        self.source = ParamSource::Query;
        self
    }

    pub fn with_description(mut self, d: impl Into<String>) -> Self {
        self.description = Some(d.into());
        self
    }
}

// ─── Targets ──────────────────────────────────────────────────────────────────

/// Route descriptor for an HTTP tool.
#[derive(Debug, Clone)]
pub struct HttpRoute {
    pub method: reqwest::Method,
    /// Path with `{param}` placeholders; absolute URLs are used as-is.
    pub path_template: String,
    pub consumes: Option<String>,
    pub produces: Option<String>,
}

impl HttpRoute {
    pub fn new(method: reqwest::Method, path_template: impl Into<String>) -> Self {
        Self {
            method,
            path_template: path_template.into(),
            consumes: None,
            produces: None,
        }
    }

    pub fn consumes(mut self, mime: impl Into<String>) -> Self {
        self.consumes = Some(mime.into());
        self
    }

    pub fn produces(mut self, mime: impl Into<String>) -> Self {
        self.produces = Some(mime.into());
        self
    }
}

/// A local callable.  Arguments arrive positionally, converted per the
/// definition's bindings; the returned value becomes the observation.
pub type LocalHandler =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// Wrap an async closure as a [`LocalHandler`].
pub fn handler<F, Fut>(f: F) -> LocalHandler
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

#[derive(Clone)]
pub enum ToolTarget {
    Local(LocalHandler),
    Http(HttpRoute),
    Browser,
}

impl std::fmt::Debug for ToolTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolTarget::Local(_) => write!(f, "Local(<handler>)"),
            ToolTarget::Http(route) => write!(f, "Http({} {})", route.method, route.path_template),
            ToolTarget::Browser => write!(f, "Browser"),
        }
    }
}

// ─── Summaries and details ────────────────────────────────────────────────────

/// The cheap view of a tool: what the system prompt lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

/// One parameter in a [`ToolDetail`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// The full, example-bearing schema of a tool, fetched on demand via the
/// `tool_detail` built-in so the token cost is only paid when needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDetail {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub return_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_example: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_example: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_example: Option<Value>,
}

// ─── Definition ───────────────────────────────────────────────────────────────

/// What the registry stores for one tool.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub kind: ToolKind,
    pub detail: ToolDetail,
    pub bindings: Vec<ParamBinding>,
    pub target: ToolTarget,
}

impl ToolDefinition {
    pub fn local(
        name: impl Into<String>,
        description: impl Into<String>,
        bindings: Vec<ParamBinding>,
        target: LocalHandler,
    ) -> Self {
        let name = name.into();
        let detail = example::build_detail(&name, &description.into(), &bindings, None);
        Self {
            name,
            kind: ToolKind::Local,
            detail,
            bindings,
            target: ToolTarget::Local(target),
        }
    }

    pub fn http(
        name: impl Into<String>,
        description: impl Into<String>,
        bindings: Vec<ParamBinding>,
        route: HttpRoute,
    ) -> Self {
        let name = name.into();
        let detail = example::build_detail(&name, &description.into(), &bindings, None);
        Self {
            name,
            kind: ToolKind::Http,
            detail,
            bindings,
            target: ToolTarget::Http(route),
        }
    }

    pub fn browser(
        name: impl Into<String>,
        description: impl Into<String>,
        bindings: Vec<ParamBinding>,
    ) -> Self {
        let name = name.into();
        let detail = example::build_detail(&name, &description.into(), &bindings, None);
        Self {
            name,
            kind: ToolKind::Browser,
            detail,
            bindings,
            target: ToolTarget::Browser,
        }
    }

    /// Declare the return type; rebuilds the detail's return sections.
    pub fn returning(mut self, spec: TypeSpec) -> Self {
        self.detail = example::build_detail(
            &self.name,
            &self.detail.description,
            &self.bindings,
            Some(&spec),
        );
        self
    }

    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.detail.description.clone(),
        }
    }

    /// Basic JSON Schema for the model's `tools` payload: types and required
    /// fields only, no examples, to keep the per-turn token cost small.
    pub fn basic_parameters_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for b in &self.bindings {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), Value::String(b.spec.json_type().into()));
            if let TypeSpec::Enum(variants) = &b.spec {
                prop.insert(
                    "enum".into(),
                    Value::Array(variants.iter().cloned().map(Value::String).collect()),
                );
            }
            if let Some(d) = &b.description {
                prop.insert("description".into(), Value::String(d.clone()));
            }
            properties.insert(b.name.clone(), Value::Object(prop));
            if b.required {
                required.push(Value::String(b.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
