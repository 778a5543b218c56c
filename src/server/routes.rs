//! REST endpoints for the web form.
//!
//! The form drives the same engine as the voice agent: it fetches the
//! screener definition once, then validates/advances statelessly through
//! `POST /api/submit-answer` while mirroring its state over the
//! WebSocket `sync_state` channel.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::flow::resolver::{Resolution, resolve};
use crate::flow::step::{Bound, StepDefinition};
use crate::flow::survey::SCREENER_STEP_IDS;
use crate::flow::validator::{Verdict, validate};
use crate::flow::{Answer, AnswerSet};

use super::AppState;

/// Build the REST routes.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/survey", get(survey_data))
        .route("/api/session/{session_id}", get(get_session))
        .route("/api/submit-answer", post(submit_answer))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "intake-assist"
    }))
}

/// The screener step definitions for the form UI.
async fn survey_data(State(state): State<AppState>) -> impl IntoResponse {
    let steps: Vec<serde_json::Value> = state
        .engine
        .catalog()
        .project(SCREENER_STEP_IDS)
        .into_iter()
        .map(step_summary)
        .collect();
    Json(serde_json::json!({
        "entry": state.engine.catalog().entry(),
        "steps": steps
    }))
}

/// Static projection of a step for the form: templates are left
/// uninterpolated and dynamic bounds are null (the form resolves them
/// through submit-answer validation).
fn step_summary(step: &StepDefinition) -> serde_json::Value {
    let bound = |b: &Option<Bound>| match b {
        Some(Bound::Literal(n)) => serde_json::json!(n),
        Some(Bound::Dynamic(_)) | None => serde_json::Value::Null,
    };
    serde_json::json!({
        "id": step.id,
        "question": step.question,
        "kind": step.kind,
        "options": step.options,
        "min": bound(&step.min),
        "max": bound(&step.max),
        "sub_fields": step.sub_fields,
        "help_text": step.help_text,
    })
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.store.load(&session_id).await {
        Ok(Some(record)) => Json(serde_json::json!({
            "success": true,
            "session": {
                "current_step": record.state.current.to_string(),
                "answers": record.state.answers,
                "step_history": record.state.history,
                "voice_mode": record.voice_mode,
            }
        }))
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"success": false, "message": "No session found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(session = %session_id, error = %e, "Session lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"success": false, "message": "Error loading session"})),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct SubmitAnswerRequest {
    current_step: String,
    answer: Answer,
    #[serde(default)]
    answers: AnswerSet,
}

/// Stateless validate + resolve for the form: the client owns its state
/// and asks the engine where to go next.
async fn submit_answer(
    State(state): State<AppState>,
    Json(req): Json<SubmitAnswerRequest>,
) -> impl IntoResponse {
    let Some(step) = state.engine.catalog().get(&req.current_step) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "valid": false,
                "message": format!("Step {} doesn't exist in the survey.", req.current_step)
            })),
        )
            .into_response();
    };

    if let Verdict::Reject(message) = validate(step, &req.answer, &req.answers) {
        return Json(serde_json::json!({"valid": false, "message": message})).into_response();
    }

    let response = match resolve(step, &req.answer, &req.answers) {
        Resolution::Next(next) => serde_json::json!({"valid": true, "next_step": next}),
        Resolution::Complete => serde_json::json!({"valid": true, "next_step": "COMPLETE"}),
        Resolution::Disqualified(cause) => serde_json::json!({
            "valid": true,
            "next_step": "DISQUALIFIED",
            "reason": cause.reason(),
        }),
    };
    Json(response).into_response()
}
