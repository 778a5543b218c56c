//! Survey tools — the engine operations exposed to the conversational
//! agent.
//!
//! Each tool wraps one [`SessionContext`] operation and returns its
//! tagged outcome as JSON. The agent reads the `status` field and relays
//! the payload; it never manipulates session state directly.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::context::SessionContext;
use crate::flow::JumpTarget;
use crate::tools::tool::{Tool, ToolError, ToolOutput, require_str};

fn to_json<T: serde::Serialize>(tool: &str, value: &T) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::ExecutionFailed {
        name: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Returns the question currently on the respondent's screen.
pub struct CurrentQuestionTool {
    ctx: Arc<SessionContext>,
}

impl CurrentQuestionTool {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for CurrentQuestionTool {
    fn name(&self) -> &str {
        "current_question"
    }

    fn description(&self) -> &str {
        "Get the question currently on the respondent's screen: text, answer kind, \
         options, numeric bounds, and a pre-formatted full_question ready to read \
         aloud. Call this before speaking so you always describe what is on screen."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let view = self.ctx.current_question().await;
        Ok(ToolOutput::success(
            to_json(self.name(), &view)?,
            start.elapsed(),
        ))
    }
}

/// Validates and saves an answer, advancing the flow.
pub struct SubmitAnswerTool {
    ctx: Arc<SessionContext>,
}

impl SubmitAnswerTool {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for SubmitAnswerTool {
    fn name(&self) -> &str {
        "submit_answer"
    }

    fn description(&self) -> &str {
        "Save the respondent's answer to the current question and advance. The answer \
         can be a long conversational response; mentioned options are extracted \
         automatically. Always call with dry_run=true first: the result predicts the \
         transition (including disqualification) without saving, so you can confirm \
         with the respondent before committing with dry_run=false."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "The respondent's answer, verbatim or cleaned up"
                },
                "dry_run": {
                    "type": "boolean",
                    "description": "If true, predict the transition without saving (default: false)"
                }
            },
            "required": ["answer"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let answer = require_str(&params, "answer", self.name())?;
        let dry_run = params
            .get("dry_run")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let outcome = self.ctx.submit_answer_text(answer, dry_run).await;
        Ok(ToolOutput::success(
            to_json(self.name(), &outcome)?,
            start.elapsed(),
        ))
    }
}

/// Returns to the previous question.
pub struct GoBackTool {
    ctx: Arc<SessionContext>,
}

impl GoBackTool {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GoBackTool {
    fn name(&self) -> &str {
        "go_back"
    }

    fn description(&self) -> &str {
        "Go back to the previous question. Use when the respondent says 'back', \
         'undo', 'I meant to say...', or similar. Their earlier answer is kept so \
         they can review or change it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let outcome = self.ctx.go_back().await;
        Ok(ToolOutput::success(
            to_json(self.name(), &outcome)?,
            start.elapsed(),
        ))
    }
}

/// Jumps to a specific question by id or history position.
pub struct NavigateTool {
    ctx: Arc<SessionContext>,
}

impl NavigateTool {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for NavigateTool {
    fn name(&self) -> &str {
        "navigate_to_question"
    }

    fn description(&self) -> &str {
        "Navigate directly to a specific question. Use when the respondent says 'go \
         to question 3' (pass question_number) or 'jump to S10' (pass step_id). \
         Provide exactly one of the two."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "step_id": {
                    "type": "string",
                    "description": "Step id to jump to, e.g. \"S5\""
                },
                "question_number": {
                    "type": "integer",
                    "description": "1-based position in the answered-question history"
                }
            }
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let target = if let Some(step_id) = params.get("step_id").and_then(|v| v.as_str()) {
            JumpTarget::StepId(step_id.to_string())
        } else if let Some(n) = params.get("question_number").and_then(|v| v.as_u64()) {
            JumpTarget::Position(n as usize)
        } else {
            return Err(ToolError::InvalidParameters {
                name: self.name().to_string(),
                reason: "provide either step_id or question_number".to_string(),
            });
        };

        let outcome = self.ctx.jump_to(target).await;
        Ok(ToolOutput::success(
            to_json(self.name(), &outcome)?,
            start.elapsed(),
        ))
    }
}

/// Returns overall progress and the full answer set.
pub struct ProgressTool {
    ctx: Arc<SessionContext>,
}

impl ProgressTool {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ProgressTool {
    fn name(&self) -> &str {
        "survey_progress"
    }

    fn description(&self) -> &str {
        "Get the survey progress: current step, every recorded answer, the visited \
         history, and whether the flow has completed or disqualified. Use this to \
         re-sync after the respondent edits the form manually."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let progress = self.ctx.progress().await;
        Ok(ToolOutput::success(
            to_json(self.name(), &progress)?,
            start.elapsed(),
        ))
    }
}
