//! libSQL backend — async `SessionStore` implementation.
//!
//! Supports local file and in-memory databases. Saves are upserts keyed
//! by session id, so the frequent per-transition and periodic backstop
//! writes stay idempotent.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::DatabaseError;
use crate::flow::{AnswerSet, Position, SessionState};
use crate::store::traits::{SessionEvent, SessionRecord, SessionStore, SessionSummary};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT NOT NULL PRIMARY KEY,
    current_step TEXT NOT NULL,
    answers TEXT NOT NULL,
    step_history TEXT NOT NULL,
    voice_mode INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS session_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    action TEXT NOT NULL,
    step TEXT,
    detail TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at);
CREATE INDEX IF NOT EXISTS idx_events_session ON session_events(session_id, id);
";

/// libSQL session store.
///
/// Holds a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and ensure the schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Session database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to create in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map(|_| ())
            .map_err(|e| DatabaseError::Query(format!("Schema initialization failed: {e}")))
    }
}

/// Parse an RFC 3339 timestamp written by this store.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

#[async_trait]
impl SessionStore for LibSqlStore {
    async fn save(
        &self,
        session_id: &str,
        state: &SessionState,
        voice_mode: bool,
    ) -> Result<(), DatabaseError> {
        let answers = serde_json::to_string(&state.answers)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let history = serde_json::to_string(&state.history)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO sessions
                     (session_id, current_step, answers, step_history, voice_mode, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(session_id) DO UPDATE SET
                     current_step = excluded.current_step,
                     answers = excluded.answers,
                     step_history = excluded.step_history,
                     voice_mode = excluded.voice_mode,
                     updated_at = excluded.updated_at",
                params![
                    session_id,
                    state.current.to_string(),
                    answers,
                    history,
                    voice_mode as i64,
                    now,
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT current_step, answers, step_history, voice_mode, updated_at
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
            )
            .await
            .map_err(query_err)?;

        let Some(row) = rows.next().await.map_err(query_err)? else {
            return Ok(None);
        };

        let current_step: String = row.get(0).map_err(query_err)?;
        let answers_json: String = row.get(1).map_err(query_err)?;
        let history_json: String = row.get(2).map_err(query_err)?;
        let voice_mode: i64 = row.get(3).map_err(query_err)?;
        let updated_at: String = row.get(4).map_err(query_err)?;

        let answers: AnswerSet = serde_json::from_str(&answers_json)
            .map_err(|e| DatabaseError::Serialization(format!("answers: {e}")))?;
        let history: Vec<String> = serde_json::from_str(&history_json)
            .map_err(|e| DatabaseError::Serialization(format!("step_history: {e}")))?;

        Ok(Some(SessionRecord {
            session_id: session_id.to_string(),
            state: SessionState {
                current: Position::from(current_step),
                answers,
                history,
            },
            voice_mode: voice_mode != 0,
            updated_at: parse_datetime(&updated_at),
        }))
    }

    async fn delete(&self, session_id: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "DELETE FROM session_events WHERE session_id = ?1",
                params![session_id],
            )
            .await
            .map_err(query_err)?;
        self.conn
            .execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<SessionSummary>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT session_id, current_step, voice_mode, updated_at
                 FROM sessions ORDER BY updated_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let session_id: String = row.get(0).map_err(query_err)?;
            let current_step: String = row.get(1).map_err(query_err)?;
            let voice_mode: i64 = row.get(2).map_err(query_err)?;
            let updated_at: String = row.get(3).map_err(query_err)?;
            sessions.push(SessionSummary {
                session_id,
                current_step,
                voice_mode: voice_mode != 0,
                updated_at: parse_datetime(&updated_at),
            });
        }
        Ok(sessions)
    }

    async fn append_event(
        &self,
        session_id: &str,
        action: &str,
        step: Option<&str>,
        detail: Option<&serde_json::Value>,
    ) -> Result<(), DatabaseError> {
        let detail_json = detail
            .map(|d| serde_json::to_string(d))
            .transpose()
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO session_events (session_id, action, step, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session_id,
                    action,
                    step.map(|s| s.to_string()),
                    detail_json,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn events(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT action, step, detail, created_at
                 FROM session_events WHERE session_id = ?1
                 ORDER BY id ASC LIMIT ?2",
                params![session_id, limit as i64],
            )
            .await
            .map_err(query_err)?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let action: String = row.get(0).map_err(query_err)?;
            let step: Option<String> = row.get(1).map_err(query_err)?;
            let detail: Option<String> = row.get(2).map_err(query_err)?;
            let created_at: String = row.get(3).map_err(query_err)?;
            events.push(SessionEvent {
                action,
                step,
                detail: detail.and_then(|d| serde_json::from_str(&d).ok()),
                created_at: parse_datetime(&created_at),
            });
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Answer;

    fn sample_state() -> SessionState {
        let mut answers = AnswerSet::new();
        answers.insert("S1", Answer::multi(["None of the above"]));
        answers.insert("S7", Answer::Numeric(12));
        SessionState {
            current: Position::Step("S10".into()),
            answers,
            history: vec!["S1".into(), "S3".into(), "S5".into()],
        }
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let state = sample_state();

        store.save("doc-1", &state, true).await.unwrap();
        let record = store.load("doc-1").await.unwrap().expect("saved session");

        assert_eq!(record.state, state);
        assert!(record.voice_mode);
        assert_eq!(record.session_id, "doc-1");
    }

    #[tokio::test]
    async fn load_missing_session_is_none() {
        let store = LibSqlStore::new_memory().await.unwrap();
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repeated_saves_are_idempotent_upserts() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let state = sample_state();

        store.save("doc-1", &state, false).await.unwrap();
        store.save("doc-1", &state, false).await.unwrap();
        store.save("doc-1", &state, false).await.unwrap();

        let sessions = store.list(10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].current_step, "S10");
    }

    #[tokio::test]
    async fn save_overwrites_previous_state() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let mut state = sample_state();
        store.save("doc-1", &state, false).await.unwrap();

        state.current = Position::Disqualified;
        state.history.push("S10".into());
        store.save("doc-1", &state, true).await.unwrap();

        let record = store.load("doc-1").await.unwrap().unwrap();
        assert_eq!(record.state.current, Position::Disqualified);
        assert_eq!(record.state.history.len(), 4);
        assert!(record.voice_mode);
    }

    #[tokio::test]
    async fn terminal_positions_roundtrip_as_strings() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let mut state = sample_state();
        state.current = Position::Complete;
        store.save("doc-1", &state, false).await.unwrap();

        let record = store.load("doc-1").await.unwrap().unwrap();
        assert_eq!(record.state.current, Position::Complete);
    }

    #[tokio::test]
    async fn events_append_in_order() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store
            .append_event("doc-1", "answer_saved", Some("S1"), Some(&serde_json::json!({"answer": ["None of the above"]})))
            .await
            .unwrap();
        store
            .append_event("doc-1", "back", Some("S1"), None)
            .await
            .unwrap();

        let events = store.events("doc-1", 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "answer_saved");
        assert_eq!(events[0].detail.as_ref().unwrap()["answer"][0], "None of the above");
        assert_eq!(events[1].action, "back");
        assert!(events[1].detail.is_none());
    }

    #[tokio::test]
    async fn delete_removes_session_and_events() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.save("doc-1", &sample_state(), false).await.unwrap();
        store.append_event("doc-1", "answer_saved", Some("S1"), None).await.unwrap();

        store.delete("doc-1").await.unwrap();
        assert!(store.load("doc-1").await.unwrap().is_none());
        assert!(store.events("doc-1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");

        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.save("doc-1", &sample_state(), false).await.unwrap();
        }

        let store = LibSqlStore::new_local(&path).await.unwrap();
        let record = store.load("doc-1").await.unwrap().expect("persisted session");
        assert_eq!(record.state.current, Position::Step("S10".into()));
    }
}
