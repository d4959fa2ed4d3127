// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod context;
pub mod definition;
pub mod error;
pub mod example;
pub mod invoke;
pub mod registry;

pub use context::RequestContext;
pub use definition::{
    handler, FieldSpec, HttpRoute, LocalHandler, ParamBinding, ParamSource, ParamSpec,
    ToolDefinition, ToolDetail, ToolKind, ToolSummary, ToolTarget, TypeSpec,
};
pub use error::ToolError;
pub use invoke::http::{HttpInvoker, PreparedRequest};
pub use invoke::local::invoke_local;
pub use registry::{ToolRegistry, ToolSchema};

pub use builtin::register_builtins;
