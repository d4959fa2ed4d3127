// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::definition::{ToolDefinition, ToolDetail, ToolSummary};

/// A model-facing tool schema.  Mirrors the model crate's spec shape but
/// keeps this crate independent from it; the engine maps between the two.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Central registry holding all registered tools.
///
/// Many-reader, rare-writer: definitions are registered once at startup by
/// the external discovery collaborator and read on every turn.  Tool names
/// are globally unique; a duplicate registration replaces the earlier one
/// with a warning.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<ToolDefinition>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, def: ToolDefinition) {
        let name = def.name.clone();
        let mut tools = self.tools.write().unwrap();
        if tools.insert(name.clone(), Arc::new(def)).is_some() {
            warn!(tool = %name, "replacing existing tool registration");
        }
    }

    pub fn get_definition(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.tools.read().unwrap().get(name).cloned()
    }

    pub fn get_detail(&self, name: &str) -> Option<ToolDetail> {
        self.tools
            .read()
            .unwrap()
            .get(name)
            .map(|d| d.detail.clone())
    }

    /// Name + description for every tool, sorted by name so prompts are
    /// stable across runs.
    pub fn list_summaries(&self) -> Vec<ToolSummary> {
        let mut summaries: Vec<ToolSummary> = self
            .tools
            .read()
            .unwrap()
            .values()
            .map(|d| d.summary())
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Basic (required-fields-only) schemas for the model's `tools` payload,
    /// sorted by name.
    pub fn basic_schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .read()
            .unwrap()
            .values()
            .map(|d| ToolSchema {
                name: d.name.clone(),
                description: d.detail.description.clone(),
                parameters: d.basic_parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().unwrap().is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
