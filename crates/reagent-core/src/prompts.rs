// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! System prompt assembly.
//!
//! The prompt is rebuilt from scratch every turn and replaces any prior
//! system message in the history.  Registered tools are listed as
//! `name: description` only; their schemas travel in the structured `tools`
//! request field, and full examples are fetched on demand via `tool_detail`.
//! Frontend tools are deliberately omitted from the text: they already
//! arrive with complete schemas in the request and listing them twice just
//! spends tokens.

use reagent_tools::ToolSummary;

/// Per-tool inlined examples for detailed mode: `(tool name, request JSON)`.
pub type ToolExamples = [(String, String)];

pub fn system_prompt(
    tools: &[ToolSummary],
    environment_context: Option<&str>,
    examples: &ToolExamples,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a precise assistant that solves tasks in a loop of \
         reasoning, acting through tools, and observing the results.\n\n",
    );
    prompt.push_str(guidelines());

    if let Some(env) = environment_context.filter(|e| !e.trim().is_empty()) {
        prompt.push_str("\n\n## Environment\n");
        prompt.push_str(env.trim());
    }

    prompt.push_str("\n\n## Available tools\n");
    if tools.is_empty() {
        prompt.push_str("(no registered tools)\n");
    } else {
        for t in tools {
            prompt.push_str(&format!("- {}: {}\n", t.name, t.description));
        }
    }

    if !examples.is_empty() {
        prompt.push_str("\n## Request examples\n");
        for (name, json) in examples {
            prompt.push_str(&format!("### {name}\n```json\n{json}\n```\n"));
        }
    }

    prompt
}

fn guidelines() -> &'static str {
    "## How to work\n\
     - Use tools instead of guessing; read each observation before deciding the next step.\n\
     - Call tools only through the structured tool-call protocol. Never write a tool call into your text.\n\
     - Before the first use of a tool whose payload you are unsure about, call `tool_detail` with its name to get the full schema and examples.\n\
     - Never invent tool names or parameters, and never fabricate tool results.\n\
     - If a tool fails, read the error; retry with corrected arguments or explain the failure.\n\
     - When no tool is needed, answer directly and concisely."
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn summaries() -> Vec<ToolSummary> {
        vec![
            ToolSummary {
                name: "add".into(),
                description: "adds two integers".into(),
            },
            ToolSummary {
                name: "tool_detail".into(),
                description: "returns the full schema of a tool".into(),
            },
        ]
    }

    #[test]
    fn prompt_lists_tools_as_name_description() {
        let p = system_prompt(&summaries(), None, &[]);
        assert!(p.contains("- add: adds two integers"));
        assert!(p.contains("- tool_detail:"));
    }

    #[test]
    fn prompt_includes_environment_context() {
        let p = system_prompt(&summaries(), Some("tenant: acme, locale: sv-SE"), &[]);
        assert!(p.contains("## Environment"));
        assert!(p.contains("tenant: acme"));
    }

    #[test]
    fn blank_environment_is_skipped() {
        let p = system_prompt(&summaries(), Some("   "), &[]);
        assert!(!p.contains("## Environment"));
    }

    #[test]
    fn concise_prompt_has_no_example_section() {
        let p = system_prompt(&summaries(), None, &[]);
        assert!(!p.contains("## Request examples"));
    }

    #[test]
    fn detailed_prompt_inlines_examples() {
        let examples = vec![("add".to_string(), r#"{"a": 1, "b": 2}"#.to_string())];
        let p = system_prompt(&summaries(), None, &examples);
        assert!(p.contains("## Request examples"));
        assert!(p.contains("### add"));
        assert!(p.contains(r#"{"a": 1, "b": 2}"#));
    }

    #[test]
    fn empty_registry_is_stated() {
        let p = system_prompt(&[], None, &[]);
        assert!(p.contains("(no registered tools)"));
    }

    #[test]
    fn prompt_mentions_tool_detail_workflow() {
        let p = system_prompt(&summaries(), None, &[]);
        assert!(p.contains("`tool_detail`"));
    }
}
