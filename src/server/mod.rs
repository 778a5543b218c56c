//! HTTP + WebSocket surface.

pub mod routes;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::flow::Engine;
use crate::llm::LlmProvider;
use crate::retry::RetryPolicy;
use crate::store::SessionStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub store: Arc<dyn SessionStore>,
    pub llm: Arc<dyn LlmProvider>,
    /// Periodic backstop save interval for live sessions.
    pub save_interval: Duration,
    /// Backoff policy for persistence writes.
    pub retry_policy: RetryPolicy,
}

/// Build the full router: REST endpoints, the intake WebSocket, CORS.
pub fn app_router(state: AppState) -> Router {
    routes::api_routes(state.clone())
        .merge(ws::ws_routes(state))
        .layer(CorsLayer::permissive())
}
