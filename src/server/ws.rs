//! The intake WebSocket — one connection per respondent session.
//!
//! The connection's task owns the session: respondent text for the
//! agent, manual form edits (`sync_state`), and the periodic backstop
//! save are all serialized here, so the engine needs no internal
//! locking beyond the session's own.
//!
//! Protocol (JSON frames, `type`-tagged):
//! - client → server: `handshake` (first frame: initial state),
//!   `user_text`, `sync_state`
//! - server → client: `navigation` (step + answers + history),
//!   `agent_text`, `ended`, `error`

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::IntakeAgent;
use crate::context::SessionContext;
use crate::flow::{AnswerSet, Position, SessionState};
use crate::tools::ToolRegistry;

use super::AppState;

/// Build the WebSocket route.
pub fn ws_routes(state: AppState) -> Router {
    Router::new()
        .route("/ws/intake/{session_id}", get(ws_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// First frame: the client's view of the session state. Empty fields
    /// fall back to the persisted session, then to a fresh one.
    Handshake {
        #[serde(default)]
        step: Option<String>,
        #[serde(default)]
        answers: AnswerSet,
        #[serde(default)]
        step_history: Vec<String>,
        #[serde(default)]
        voice_mode: bool,
    },
    /// A respondent utterance for the agent.
    UserText { text: String },
    /// Manual form edit: replaces the server-side session state.
    SyncState {
        step: String,
        answers: AnswerSet,
        step_history: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Navigation {
        step: String,
        answers: AnswerSet,
        step_history: Vec<String>,
    },
    AgentText {
        text: String,
    },
    Ended {
        outcome: String,
        message: String,
    },
    Error {
        message: String,
    },
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!(session = %session_id, "Intake client connecting");
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize server message");
            true
        }
    }
}

async fn send_navigation(socket: &mut WebSocket, state: &SessionState) -> bool {
    send(
        socket,
        &ServerMessage::Navigation {
            step: state.current.to_string(),
            answers: state.answers.clone(),
            step_history: state.history.clone(),
        },
    )
    .await
}

async fn handle_socket(mut socket: WebSocket, session_id: String, app: AppState) {
    // First frame: the handshake with the client's initial state.
    let (initial, voice_mode) = match socket.recv().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
            Ok(ClientMessage::Handshake {
                step: Some(step),
                answers,
                step_history,
                voice_mode,
            }) => (
                Some(SessionState {
                    current: Position::from(step),
                    answers,
                    history: step_history,
                }),
                voice_mode,
            ),
            Ok(ClientMessage::Handshake { .. }) => (None, false),
            Ok(other) => {
                debug!(?other, "Expected handshake as first frame, starting fresh");
                (None, false)
            }
            Err(e) => {
                debug!(error = %e, "Handshake parse failed, starting fresh");
                (None, false)
            }
        },
        _ => {
            info!(session = %session_id, "Client disconnected before handshake");
            return;
        }
    };

    let ctx = SessionContext::open(
        session_id.clone(),
        app.engine.clone(),
        Arc::clone(&app.store),
        initial,
        app.retry_policy.clone(),
    )
    .await;
    ctx.set_voice_mode(voice_mode);

    let agent = IntakeAgent::new(Arc::clone(&app.llm), ToolRegistry::for_session(Arc::clone(&ctx)));

    // Initial sync so the client renders the right question.
    let mut last_step = {
        let state = ctx.state().await;
        if !send_navigation(&mut socket, &state).await {
            return;
        }
        state.current.to_string()
    };

    let mut backstop = tokio::time::interval(app.save_interval);
    backstop.reset(); // skip the immediate first tick

    loop {
        tokio::select! {
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::UserText { text }) => {
                                match agent.respond(&text).await {
                                    Ok(reply) => {
                                        if !send(&mut socket, &ServerMessage::AgentText { text: reply }).await {
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        warn!(session = %session_id, error = %e, "Agent turn failed");
                                        if !send(&mut socket, &ServerMessage::Error {
                                            message: "The assistant is temporarily unavailable.".into(),
                                        }).await {
                                            break;
                                        }
                                    }
                                }

                                // The agent may have driven navigation; sync the client.
                                let state = ctx.state().await;
                                let step = state.current.to_string();
                                if step != last_step {
                                    last_step = step;
                                    if !send_navigation(&mut socket, &state).await {
                                        break;
                                    }
                                    if let Some(ended) = ended_message(&state.current) {
                                        if !send(&mut socket, &ended).await {
                                            break;
                                        }
                                    }
                                }
                            }
                            Ok(ClientMessage::SyncState { step, answers, step_history }) => {
                                let outcome = ctx.sync_state(&step, answers, step_history).await;
                                debug!(session = %session_id, step = %step, ?outcome, "sync_state");
                                last_step = ctx.state().await.current.to_string();
                                agent.notify(
                                    "The user has changed the form state. Call current_question \
                                     and survey_progress before your next reply to stay in sync \
                                     with the screen.",
                                ).await;
                            }
                            Ok(ClientMessage::Handshake { .. }) => {
                                debug!(session = %session_id, "Ignoring repeated handshake");
                            }
                            Err(e) => {
                                debug!(error = %e, frame = %text.as_str(), "Unrecognized client frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(session = %session_id, "Intake client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(session = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }

            // Periodic backstop save while the connection is open.
            _ = backstop.tick() => {
                ctx.persist_now().await;
            }
        }
    }

    // Final save before the connection goes away.
    ctx.persist_now().await;
    info!(session = %session_id, "Intake connection closed");
}

fn ended_message(position: &Position) -> Option<ServerMessage> {
    match position {
        Position::Complete => Some(ServerMessage::Ended {
            outcome: "complete".into(),
            message: "Survey completed successfully! Thank you for your participation.".into(),
        }),
        Position::Disqualified => Some(ServerMessage::Ended {
            outcome: "disqualified".into(),
            message: "Based on your response, you do not qualify for this survey. Thank you for your time.".into(),
        }),
        Position::Step(_) => None,
    }
}
