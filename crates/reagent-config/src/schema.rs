// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub react: ReactConfig,
    #[serde(default)]
    pub frontend_tool: FrontendToolConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Hints for the external tool-discovery collaborator.  The engine never
    /// reads these; they are carried so one config file serves both sides.
    #[serde(default)]
    pub tool_scan: ToolScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Adapter identifier selecting the provider driver.
    /// Known values: "openai" | "bigmodel" | "minimax".  Any other value
    /// requires `base_url` and uses the generic OpenAI-compatible driver.
    pub adapter: String,
    /// Model name forwarded to the provider API
    pub model: String,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Base URL override.  Useful for local proxies or self-hosted gateways.
    /// For the known adapters the correct default is auto-selected.
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            adapter: "openai".into(),
            model: "gpt-4o".into(),
            api_key: None,
            // api_key_env is intentionally None here.  resolve_api_key()
            // falls through to the adapter's canonical env-var name
            // (OPENAI_API_KEY etc.); hard-coding one here would shadow that
            // lookup whenever the adapter is overridden.
            api_key_env: None,
            base_url: None,
        }
    }
}

impl ModelConfig {
    /// Canonical API-key environment variable for a known adapter.
    pub fn canonical_key_env(adapter: &str) -> Option<&'static str> {
        match adapter {
            "openai" => Some("OPENAI_API_KEY"),
            "bigmodel" => Some("BIGMODEL_API_KEY"),
            "minimax" => Some("MINIMAX_API_KEY"),
            _ => None,
        }
    }

    /// Resolve the API key: explicit key, then the named env var, then the
    /// adapter's canonical env var.  Returns `None` when nothing is set
    /// (local gateways may not need a key).
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(k) = &self.api_key {
            if !k.is_empty() {
                return Some(k.clone());
            }
        }
        if let Some(var) = &self.api_key_env {
            if let Ok(v) = std::env::var(var) {
                if !v.is_empty() {
                    return Some(v);
                }
            }
        }
        Self::canonical_key_env(&self.adapter)
            .and_then(|var| std::env::var(var).ok())
            .filter(|v| !v.is_empty())
    }
}

fn default_max_steps() -> u32 {
    10
}
fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactConfig {
    /// Maximum number of model calls per user turn
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Sampling temperature forwarded to the provider (0.0–2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Inline request examples into the system prompt.  Off by default: the
    /// model fetches examples on demand via the `tool_detail` tool, which
    /// keeps the prompt small when many tools are registered.
    #[serde(default)]
    pub detailed_system_prompt: bool,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            temperature: default_temperature(),
            detailed_system_prompt: false,
        }
    }
}

fn default_frontend_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendToolConfig {
    /// How long the engine waits for a browser-executed tool result before
    /// the pending call is failed with a timeout observation.
    #[serde(default = "default_frontend_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for FrontendToolConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_frontend_timeout_ms(),
        }
    }
}

fn default_idle_timeout_ms() -> u64 {
    30 * 60 * 1000
}

/// What happens when a turn arrives for a session that already has one
/// in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Queue behind the running turn (default)
    #[default]
    Serialize,
    /// Fail fast with a busy error
    Reject,
}

impl std::fmt::Display for BusyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusyPolicy::Serialize => write!(f, "serialize"),
            BusyPolicy::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are evicted
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default)]
    pub on_busy: BusyPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            on_busy: BusyPolicy::Serialize,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolScanConfig {
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub classes: Vec<String>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
