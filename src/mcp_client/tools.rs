//! Agent-facing tool shape.
//!
//! An [`AgentTool`] records a tool's identity and schema only. Invocation is
//! always routed through the owning [`McpClient`](super::McpClient), which
//! serializes it onto the shared session and renders the outcome as text.
//! Input validation is not enforced here; schemas are given to the agent for
//! planning.

use serde::Serialize;

use super::errors::McpError;
use super::types::{ContentItem, ToolCallResult, ToolDefinition};

/// A remote tool as presented to an agent framework.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AgentTool {
    definition: ToolDefinition,
}

impl AgentTool {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    /// JSON schema of the tool's arguments (`{}` when the runtime gave none).
    pub fn input_schema(&self) -> &serde_json::Value {
        &self.definition.input_schema
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }
}

impl From<ToolDefinition> for AgentTool {
    fn from(definition: ToolDefinition) -> Self {
        Self { definition }
    }
}

/// Render a call outcome as the text an agent sees.
///
/// Text items are joined with newlines and other items are rendered as
/// compact JSON. Error-flagged results and raised errors are reported in-band
/// rather than propagated.
pub fn render_outcome(tool_name: &str, outcome: Result<ToolCallResult, McpError>) -> String {
    match outcome {
        Ok(result) if result.is_error => {
            let detail = render_content(&result.content);
            let detail = if detail.is_empty() {
                "Unknown error".to_string()
            } else {
                detail
            };
            format!("Error executing {tool_name}: {detail}")
        }
        Ok(result) => render_content(&result.content),
        Err(e) => format!("Error calling {tool_name}: {e}"),
    }
}

fn render_content(content: &[ContentItem]) -> String {
    content
        .iter()
        .map(|item| match item {
            ContentItem::Text { text, .. } => text.clone(),
            ContentItem::Structured(value) => value.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
