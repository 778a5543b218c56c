//! `SessionStore` trait — the async persistence seam.
//!
//! The store is a best-effort mirror of the in-memory session: it is
//! written on every transition and periodically as a backstop, so saves
//! must be cheap and repeat-safe (idempotent upsert keyed by session id).
//! The engine never blocks on it and never sees its errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::flow::SessionState;

/// A persisted session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub state: SessionState,
    /// Whether the respondent was last using the voice channel.
    pub voice_mode: bool,
    pub updated_at: DateTime<Utc>,
}

/// Summary row for session listings.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,
    pub current_step: String,
    pub voice_mode: bool,
    pub updated_at: DateTime<Utc>,
}

/// One audit-trail entry.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub action: String,
    pub step: Option<String>,
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert the full session state. Repeated identical saves are harmless.
    async fn save(
        &self,
        session_id: &str,
        state: &SessionState,
        voice_mode: bool,
    ) -> Result<(), DatabaseError>;

    /// Load a session, or None if it has never been saved.
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, DatabaseError>;

    /// Delete a session and its audit trail.
    async fn delete(&self, session_id: &str) -> Result<(), DatabaseError>;

    /// Most recently updated sessions, newest first.
    async fn list(&self, limit: usize) -> Result<Vec<SessionSummary>, DatabaseError>;

    /// Append an audit-trail entry ("answer_saved", "back", "sync_state", ...).
    async fn append_event(
        &self,
        session_id: &str,
        action: &str,
        step: Option<&str>,
        detail: Option<&serde_json::Value>,
    ) -> Result<(), DatabaseError>;

    /// Audit-trail entries for a session, oldest first, up to `limit`.
    async fn events(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, DatabaseError>;
}
