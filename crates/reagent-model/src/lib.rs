// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Uniform contract over OpenAI-compatible chat-completion providers.
//!
//! The engine talks to [`ChatProvider`] only; the concrete driver is selected
//! from configuration by [`from_config`].  All drivers speak the OpenAI
//! `/chat/completions` wire format (JSON request, SSE `data:` streaming) and
//! differ only in base URL, auth, and small body extensions.

mod error;
mod mock;
mod openai_compat;
mod provider;
mod segment;
mod types;

use std::sync::Arc;

pub use error::ModelError;
pub use mock::{ScriptedMockProvider, ScriptedTurn};
pub use openai_compat::OpenAICompatProvider;
pub use provider::ChatProvider;
pub use segment::{Segment, SegmentKind, SegmentSink};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, FunctionCall, FunctionSpec, Role, ToolCallMsg,
    ToolSpec, Usage,
};

/// Build a provider from configuration.
///
/// Known adapters map to their hosted base URLs; any other adapter value is
/// accepted as long as `base_url` points at an OpenAI-compatible endpoint.
pub fn from_config(cfg: &reagent_config::ModelConfig) -> Result<Arc<dyn ChatProvider>, ModelError> {
    let api_key = cfg.resolve_api_key();
    let (base_url, thinking_disabled) = match cfg.adapter.as_str() {
        "openai" => ("https://api.openai.com/v1".to_string(), false),
        // GLM models accept a `thinking` body extension; sending
        // {"type":"disabled"} keeps tool-call turns deterministic.
        "bigmodel" => ("https://open.bigmodel.cn/api/paas/v4".to_string(), true),
        "minimax" => ("https://api.minimax.chat/v1".to_string(), false),
        other => match &cfg.base_url {
            Some(url) => (url.clone(), false),
            None => {
                return Err(ModelError::Config(format!(
                    "unknown adapter '{other}' requires model.base_url"
                )))
            }
        },
    };
    let base_url = cfg.base_url.clone().unwrap_or(base_url);

    let provider = OpenAICompatProvider::new(
        cfg.adapter.clone(),
        cfg.model.clone(),
        api_key,
        &base_url,
        thinking_disabled,
    )?;
    Ok(Arc::new(provider))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
