//! The conversational intake agent.
//!
//! A thin loop around the LLM provider: every respondent message runs a
//! bounded tool round-trip (the model calls survey tools, results are
//! fed back) until the model answers in text. The engine — not the
//! model — owns all survey state; the agent only relays.

pub mod prompts;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::LlmError;
use crate::llm::{ChatMessage, LlmProvider, ToolCompletionRequest};
use crate::tools::ToolRegistry;

/// Upper bound on tool rounds per respondent turn. The normal flow uses
/// two or three (check screen, dry-run, commit); runaway loops get cut.
const MAX_TOOL_ROUNDS: usize = 8;

/// Per-session conversational agent.
pub struct IntakeAgent {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    history: Mutex<Vec<ChatMessage>>,
}

impl IntakeAgent {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            tools,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Inject an out-of-band note into the conversation (e.g. "the user
    /// changed the form manually") to be seen on the next turn.
    pub async fn notify(&self, note: &str) {
        self.history.lock().await.push(ChatMessage::user(note));
    }

    /// Process one respondent message and return the agent's reply.
    ///
    /// Tool calls are executed against the session context the tools
    /// were built around; their JSON results go back to the model until
    /// it produces a text reply (or the round limit is hit).
    pub async fn respond(&self, text: &str) -> Result<String, LlmError> {
        let mut history = self.history.lock().await;
        history.push(ChatMessage::user(text));

        let tool_definitions = self.tools.tool_definitions().await;

        for _round in 0..MAX_TOOL_ROUNDS {
            let mut messages = vec![ChatMessage::system(prompts::SYSTEM_PROMPT)];
            messages.extend(history.iter().cloned());

            let response = self
                .llm
                .complete_with_tools(ToolCompletionRequest::new(
                    messages,
                    tool_definitions.clone(),
                ))
                .await?;

            if response.tool_calls.is_empty() {
                let reply = response.content.unwrap_or_default();
                history.push(ChatMessage::assistant(&reply));
                return Ok(reply);
            }

            history.push(ChatMessage::assistant_tool_calls(
                response.content.unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            for call in response.tool_calls {
                let result = match self.tools.get(&call.name).await {
                    Some(tool) => match tool.execute(call.arguments.clone()).await {
                        Ok(output) => output.result.to_string(),
                        Err(e) => {
                            tracing::warn!(tool = %call.name, error = %e, "Tool execution failed");
                            serde_json::json!({"status": "error", "message": e.to_string()})
                                .to_string()
                        }
                    },
                    None => {
                        tracing::warn!(tool = %call.name, "Model requested unknown tool");
                        serde_json::json!({"status": "error", "message": "unknown tool"})
                            .to_string()
                    }
                };
                history.push(ChatMessage::tool_result(call.id, result));
            }
        }

        tracing::warn!("Tool round limit reached without a text reply");
        let fallback = "Sorry, I lost my train of thought — could you say that again?";
        history.push(ChatMessage::assistant(fallback));
        Ok(fallback.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{
        CompletionRequest, CompletionResponse, ToolCall, ToolCompletionResponse,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider: pops one canned response per call.
    struct ScriptedLlm {
        script: Vec<ToolCompletionResponse>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(script: Vec<ToolCompletionResponse>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: "unused".into(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }

        async fn complete_with_tools(
            &self,
            _request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let canned = self.script.get(i).unwrap_or_else(|| {
                panic!("scripted provider exhausted after {i} calls")
            });
            Ok(ToolCompletionResponse {
                content: canned.content.clone(),
                tool_calls: canned.tool_calls.clone(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    async fn agent_with(script: Vec<ToolCompletionResponse>) -> IntakeAgent {
        use crate::context::SessionContext;
        use crate::flow::session::Engine;
        use crate::flow::survey::chart_audit_catalog;
        use crate::retry::RetryPolicy;
        use crate::store::{LibSqlStore, SessionStore};

        let engine = Engine::new(std::sync::Arc::new(chart_audit_catalog().unwrap()));
        let store: Arc<dyn SessionStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let ctx =
            SessionContext::open("doc-1", engine, store, None, RetryPolicy::with_max_retries(1))
                .await;
        IntakeAgent::new(
            Arc::new(ScriptedLlm::new(script)),
            ToolRegistry::for_session(ctx),
        )
    }

    fn text_response(text: &str) -> ToolCompletionResponse {
        ToolCompletionResponse {
            content: Some(text.into()),
            tool_calls: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    fn tool_response(calls: Vec<ToolCall>) -> ToolCompletionResponse {
        ToolCompletionResponse {
            content: None,
            tool_calls: calls,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    #[tokio::test]
    async fn plain_text_reply_passes_through() {
        let agent = agent_with(vec![text_response("Hi! Let's get started.")]).await;
        let reply = agent.respond("hello").await.unwrap();
        assert_eq!(reply, "Hi! Let's get started.");
    }

    #[tokio::test]
    async fn tool_calls_execute_and_feed_back() {
        let agent = agent_with(vec![
            tool_response(vec![ToolCall {
                id: "c1".into(),
                name: "current_question".into(),
                arguments: serde_json::json!({}),
            }]),
            text_response("The first question asks about paid affiliations."),
        ])
        .await;

        let reply = agent.respond("what's the first question?").await.unwrap();
        assert!(reply.contains("paid affiliations"));

        // The tool result landed in the history for the second round.
        let history = agent.history.lock().await;
        assert!(history.iter().any(|m| m.tool_result_for.as_deref() == Some("c1")));
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result_not_failure() {
        let agent = agent_with(vec![
            tool_response(vec![ToolCall {
                id: "c1".into(),
                name: "no_such_tool".into(),
                arguments: serde_json::json!({}),
            }]),
            text_response("done"),
        ])
        .await;

        let reply = agent.respond("hi").await.unwrap();
        assert_eq!(reply, "done");
        let history = agent.history.lock().await;
        let result = history
            .iter()
            .find(|m| m.tool_result_for.as_deref() == Some("c1"))
            .unwrap();
        assert!(result.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn round_limit_produces_fallback() {
        // A model that calls tools forever.
        let script: Vec<_> = (0..MAX_TOOL_ROUNDS)
            .map(|i| {
                tool_response(vec![ToolCall {
                    id: format!("c{i}"),
                    name: "survey_progress".into(),
                    arguments: serde_json::json!({}),
                }])
            })
            .collect();
        let agent = agent_with(script).await;
        let reply = agent.respond("hi").await.unwrap();
        assert!(reply.contains("say that again"));
    }
}
