//! Integration tests for the intake WebSocket + REST surface.
//!
//! Each test spins up an Axum server on a random port with an in-memory
//! store and a scripted LLM stub, connects via tokio-tungstenite, and
//! exercises the real WS / REST contract.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use intake_assist::error::LlmError;
use intake_assist::flow::Engine;
use intake_assist::flow::survey::chart_audit_catalog;
use intake_assist::llm::{
    CompletionRequest, CompletionResponse, LlmProvider, ToolCall, ToolCompletionRequest,
    ToolCompletionResponse,
};
use intake_assist::retry::RetryPolicy;
use intake_assist::server::{AppState, app_router};
use intake_assist::store::{LibSqlStore, SessionStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Scripted LLM stub: pops one canned tool-completion per call.
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

fn text_response(text: &str) -> ToolCompletionResponse {
    ToolCompletionResponse {
        content: Some(text.to_string()),
        tool_calls: Vec::new(),
        input_tokens: 0,
        output_tokens: 0,
    }
}

fn tool_response(name: &str, arguments: Value) -> ToolCompletionResponse {
    ToolCompletionResponse {
        content: None,
        tool_calls: vec![ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments,
        }],
        input_tokens: 0,
        output_tokens: 0,
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: "stub".to_string(),
            input_tokens: 0,
            output_tokens: 0,
        })
    }

    async fn complete_with_tools(
        &self,
        _request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.get(i) {
            Some(canned) => Ok(ToolCompletionResponse {
                content: canned.content.clone(),
                tool_calls: canned.tool_calls.clone(),
                input_tokens: 0,
                output_tokens: 0,
            }),
            None => Ok(text_response("(script exhausted)")),
        }
    }
}

/// Start a server on a random port, return (port, store).
async fn start_server(script: Vec<ToolCompletionResponse>) -> (u16, Arc<dyn SessionStore>) {
    let store: Arc<dyn SessionStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let state = AppState {
        engine: Engine::new(Arc::new(chart_audit_catalog().unwrap())),
        store: Arc::clone(&store),
        llm: Arc::new(ScriptedLlm::new(script)),
        save_interval: Duration::from_secs(60),
        retry_policy: RetryPolicy::with_max_retries(1),
    };
    let app = app_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, store)
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {other:?}"),
    }
}

async fn connect(port: u16, session: &str) -> tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
> {
    let (ws, _resp) = connect_async(format!("ws://127.0.0.1:{port}/ws/intake/{session}"))
        .await
        .expect("WS connect failed");
    ws
}

// ── WebSocket tests ─────────────────────────────────────────────────

#[tokio::test]
async fn handshake_yields_navigation_at_entry_step() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store) = start_server(Vec::new()).await;
        let mut ws = connect(port, "doc-1").await;

        ws.send(Message::Text(r#"{"type":"handshake"}"#.into()))
            .await
            .unwrap();

        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        assert_eq!(json["type"], "navigation");
        assert_eq!(json["step"], "S1");
        assert!(json["step_history"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn handshake_state_is_adopted() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store) = start_server(Vec::new()).await;
        let mut ws = connect(port, "doc-2").await;

        let handshake = serde_json::json!({
            "type": "handshake",
            "step": "S5",
            "answers": {"S1": ["None of the above"], "S3": ["Ohio"]},
            "step_history": ["S1", "S3"],
        });
        ws.send(Message::Text(handshake.to_string().into()))
            .await
            .unwrap();

        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["type"], "navigation");
        assert_eq!(json["step"], "S5");
        assert_eq!(json["answers"]["S3"][0], "Ohio");
        assert_eq!(json["step_history"], serde_json::json!(["S1", "S3"]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn user_text_gets_an_agent_reply() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store) =
            start_server(vec![text_response("Hi! Let's get started with the survey.")]).await;
        let mut ws = connect(port, "doc-3").await;

        ws.send(Message::Text(r#"{"type":"handshake"}"#.into()))
            .await
            .unwrap();
        let _navigation = ws.next().await.unwrap().unwrap();

        ws.send(Message::Text(
            r#"{"type":"user_text","text":"hello"}"#.into(),
        ))
        .await
        .unwrap();

        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["type"], "agent_text");
        assert!(json["text"].as_str().unwrap().contains("get started"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn agent_tool_call_advances_and_syncs_navigation() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store) = start_server(vec![
            tool_response(
                "submit_answer",
                serde_json::json!({"answer": "none of the above"}),
            ),
            text_response("Got it — on to the next question."),
        ])
        .await;
        let mut ws = connect(port, "doc-4").await;

        ws.send(Message::Text(r#"{"type":"handshake"}"#.into()))
            .await
            .unwrap();
        let _navigation = ws.next().await.unwrap().unwrap();

        ws.send(Message::Text(
            r#"{"type":"user_text","text":"none of the above"}"#.into(),
        ))
        .await
        .unwrap();

        let reply = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(reply["type"], "agent_text");

        // The committed answer moved S1 → S3; the client gets a sync.
        let nav = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(nav["type"], "navigation");
        assert_eq!(nav["step"], "S3");
        assert_eq!(nav["answers"]["S1"][0], "None of the above");
        assert_eq!(nav["step_history"], serde_json::json!(["S1"]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn disqualifying_turn_sends_ended() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store) = start_server(vec![
            tool_response(
                "submit_answer",
                serde_json::json!({"answer": "I do not consent"}),
            ),
            text_response("I understand. Thank you for your time."),
        ])
        .await;
        let mut ws = connect(port, "doc-5").await;

        let handshake = serde_json::json!({
            "type": "handshake",
            "step": "S16",
            "answers": {},
            "step_history": [],
        });
        ws.send(Message::Text(handshake.to_string().into()))
            .await
            .unwrap();
        let _navigation = ws.next().await.unwrap().unwrap();

        ws.send(Message::Text(
            r#"{"type":"user_text","text":"I do not consent"}"#.into(),
        ))
        .await
        .unwrap();

        let reply = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(reply["type"], "agent_text");

        let nav = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(nav["type"], "navigation");
        assert_eq!(nav["step"], "DISQUALIFIED");

        let ended = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(ended["type"], "ended");
        assert_eq!(ended["outcome"], "disqualified");
        assert!(ended["message"].as_str().unwrap().contains("do not qualify"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn sync_state_replaces_server_state_and_persists() {
    timeout(TEST_TIMEOUT, async {
        let (port, store) = start_server(Vec::new()).await;
        let mut ws = connect(port, "doc-6").await;

        ws.send(Message::Text(r#"{"type":"handshake"}"#.into()))
            .await
            .unwrap();
        let _navigation = ws.next().await.unwrap().unwrap();

        let sync = serde_json::json!({
            "type": "sync_state",
            "step": "S10",
            "answers": {"S1": ["None of the above"], "S3": ["Texas"], "S5": "Dermatology", "S6": "Board certified", "S7": 12},
            "step_history": ["S1", "S3", "S5", "S6", "S7"],
        });
        ws.send(Message::Text(sync.to_string().into())).await.unwrap();

        // Persistence is fire-and-forget; poll the store briefly.
        let mut record = None;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if let Some(r) = store.load("doc-6").await.unwrap() {
                if r.state.current.to_string() == "S10" {
                    record = Some(r);
                    break;
                }
            }
        }
        let record = record.expect("sync_state was not persisted");
        assert_eq!(record.state.history.len(), 5);
        assert_eq!(
            record.state.answers.get("S7"),
            Some(&intake_assist::flow::Answer::Numeric(12))
        );
    })
    .await
    .expect("test timed out");
}

// ── REST tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn rest_survey_serves_screener_steps() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store) = start_server(Vec::new()).await;

        let body: Value = reqwest::get(format!("http://127.0.0.1:{port}/api/survey"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["entry"], "S1");
        let steps = body["steps"].as_array().unwrap();
        assert_eq!(steps[0]["id"], "S1");
        assert_eq!(steps[0]["kind"], "multi_choice");
        assert!(steps.iter().any(|s| s["id"] == "S16"));
        // Audit-section steps are not part of the form view.
        assert!(!steps.iter().any(|s| s["id"] == "A1_1"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_submit_answer_validates_and_resolves() {
    timeout(TEST_TIMEOUT, async {
        let (port, _store) = start_server(Vec::new()).await;
        let client = reqwest::Client::new();
        let url = format!("http://127.0.0.1:{port}/api/submit-answer");

        // Out-of-range numeric answer is rejected with the range message.
        let body: Value = client
            .post(&url)
            .json(&serde_json::json!({"current_step": "S10", "answer": 50, "answers": {}}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["valid"], false);
        assert_eq!(body["message"], "Please enter a number between 70 and 100.");

        // In-range answer resolves to the next step.
        let body: Value = client
            .post(&url)
            .json(&serde_json::json!({"current_step": "S10", "answer": 85, "answers": {}}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["valid"], true);
        assert_eq!(body["next_step"], "S11");

        // Declining consent resolves to the disqualified terminal.
        let body: Value = client
            .post(&url)
            .json(&serde_json::json!({
                "current_step": "S16",
                "answer": "I do not consent",
                "answers": {}
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["valid"], true);
        assert_eq!(body["next_step"], "DISQUALIFIED");
        assert_eq!(body["reason"], "Disqualified at S16");

        // Unknown step ids are rejected outright.
        let response = client
            .post(&url)
            .json(&serde_json::json!({"current_step": "NOPE", "answer": "x", "answers": {}}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_session_lookup_roundtrip() {
    timeout(TEST_TIMEOUT, async {
        let (port, store) = start_server(Vec::new()).await;

        // Unknown session → 404 shape.
        let response = reqwest::get(format!("http://127.0.0.1:{port}/api/session/ghost"))
            .await
            .unwrap();
        assert_eq!(response.status(), 404);

        // Saved session is returned with its full state.
        let engine = Engine::new(Arc::new(chart_audit_catalog().unwrap()));
        let mut state = engine.new_session();
        engine.submit(
            &mut state,
            intake_assist::flow::Answer::multi(["None of the above"]),
            false,
        );
        store.save("doc-7", &state, true).await.unwrap();

        let body: Value = reqwest::get(format!("http://127.0.0.1:{port}/api/session/doc-7"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["session"]["current_step"], "S3");
        assert_eq!(body["session"]["voice_mode"], true);
        assert_eq!(body["session"]["step_history"], serde_json::json!(["S1"]));
    })
    .await
    .expect("test timed out");
}
