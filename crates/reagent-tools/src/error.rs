// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Failure modes of a tool invocation.
///
/// These never cross the engine boundary as errors: the engine formats them
/// into `❌`-prefixed observations so the model can see the failure and
/// recover.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Argument JSON was malformed, a required parameter was missing, or a
    /// value could not be converted to the declared type.
    #[error("invalid arguments: {name}: {message}")]
    InvalidArguments { name: String, message: String },

    /// The named tool is not registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The tool ran and failed: handler error, HTTP transport failure,
    /// browser timeout or cancellation.
    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            name: name.into(),
            message: message.into(),
        }
    }
}
