// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Failure modes of a provider call.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The provider returned a non-2xx status.
    #[error("upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The request never completed (DNS, TLS, connect, read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The stream ended early or carried undecodable data.
    #[error("malformed stream: {0}")]
    Stream(String),

    /// The provider cannot be constructed from the given configuration.
    #[error("model configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_includes_status_and_body() {
        let e = ModelError::Upstream {
            status: 429,
            body: "rate limited".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("rate limited"));
    }

    #[test]
    fn config_error_message() {
        let e = ModelError::Config("missing base_url".into());
        assert!(e.to_string().contains("missing base_url"));
    }
}
