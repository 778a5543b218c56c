//! The `Tool` trait and supporting types.

use std::time::Duration;

use async_trait::async_trait;

/// Errors a tool can raise back to the agent loop.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },

    #[error("Tool {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },
}

/// Output of a tool execution: a JSON result the model reads, plus how
/// long the call took.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub result: serde_json::Value,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }

    pub fn text(content: impl Into<String>, duration: Duration) -> Self {
        Self {
            result: serde_json::Value::String(content.into()),
            duration,
        }
    }
}

/// A capability the conversational agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name as surfaced to the model.
    fn name(&self) -> &str;

    /// Description surfaced to the model; explains when to call it.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute with validated-by-schema (but untrusted) parameters.
    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError>;
}

/// Pull a required string parameter, or fail with a parameter error.
pub fn require_str<'a>(
    params: &'a serde_json::Value,
    key: &str,
    tool: &str,
) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters {
            name: tool.to_string(),
            reason: format!("missing required string parameter {key:?}"),
        })
}
