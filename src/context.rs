//! Per-session context — the engine, the live state, and the store.
//!
//! One `SessionContext` exists per connected respondent and is the only
//! writer of that session's state; the surrounding system funnels voice
//! commands and manual form edits onto the one task that owns it. The
//! in-memory state is the authority for the live interaction:
//! persistence is a best-effort mirror written fire-and-forget with
//! retry, and a failed save never rolls back or blocks a transition.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::flow::session::{
    BackOutcome, Engine, JumpOutcome, JumpTarget, ProgressView, QuestionView, ReplaceOutcome,
    SubmitOutcome,
};
use crate::flow::{Answer, AnswerSet, SessionState, voice};
use crate::retry::{RetryPolicy, retry_async};
use crate::store::SessionStore;

pub struct SessionContext {
    session_id: String,
    engine: Engine,
    store: Arc<dyn SessionStore>,
    state: RwLock<SessionState>,
    voice_mode: AtomicBool,
    retry_policy: RetryPolicy,
}

impl SessionContext {
    /// Open a session: prefer the client-provided initial state, then a
    /// previously persisted one, then a fresh session at the entry step.
    pub async fn open(
        session_id: impl Into<String>,
        engine: Engine,
        store: Arc<dyn SessionStore>,
        initial: Option<SessionState>,
        retry_policy: RetryPolicy,
    ) -> Arc<Self> {
        let session_id = session_id.into();

        let state = match initial {
            Some(state) => state,
            None => match store.load(&session_id).await {
                Ok(Some(record)) => {
                    tracing::info!(
                        session = %session_id,
                        step = %record.state.current,
                        "Resumed persisted session"
                    );
                    record.state
                }
                Ok(None) => engine.new_session(),
                Err(e) => {
                    tracing::error!(session = %session_id, error = %e, "Session load failed, starting fresh");
                    engine.new_session()
                }
            },
        };

        let ctx = Arc::new(Self {
            session_id,
            engine,
            store,
            state: RwLock::new(state),
            voice_mode: AtomicBool::new(false),
            retry_policy,
        });
        ctx.persist().await;
        ctx
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn set_voice_mode(&self, on: bool) {
        self.voice_mode.store(on, Ordering::Relaxed);
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn current_question(&self) -> QuestionView {
        let state = self.state.read().await;
        self.engine.current_question(&state)
    }

    pub async fn progress(&self) -> ProgressView {
        let state = self.state.read().await;
        self.engine.progress(&state)
    }

    /// Submit a structured answer (the form path).
    pub async fn submit_answer(&self, answer: Answer, dry_run: bool) -> SubmitOutcome {
        let (outcome, answered_step) = {
            let mut state = self.state.write().await;
            let answered = state.current.step_id().map(str::to_string);
            let outcome = self.engine.submit(&mut state, answer.clone(), dry_run);
            (outcome, answered)
        };
        let committed = matches!(
            outcome,
            SubmitOutcome::Advanced { .. }
                | SubmitOutcome::Completed { .. }
                | SubmitOutcome::Disqualified { .. }
        );
        if committed {
            self.record_event(
                "answer_saved",
                answered_step,
                Some(serde_json::json!({ "answer": answer })),
            );
            self.persist().await;
        }
        outcome
    }

    /// Submit a raw conversational answer (the agent path): the response
    /// is first normalized against the current step's options.
    pub async fn submit_answer_text(&self, raw: &str, dry_run: bool) -> SubmitOutcome {
        let answer = {
            let state = self.state.read().await;
            match state.current.step_id().and_then(|id| self.engine.catalog().get(id)) {
                Some(step) => voice::extract_answer(step, raw),
                None => Answer::scalar(raw.trim()),
            }
        };
        self.submit_answer(answer, dry_run).await
    }

    pub async fn go_back(&self) -> BackOutcome {
        let outcome = {
            let mut state = self.state.write().await;
            self.engine.go_back(&mut state)
        };
        if let BackOutcome::Moved { ref step, .. } = outcome {
            self.record_event("back", Some(step.clone()), None);
            self.persist().await;
        }
        outcome
    }

    pub async fn jump_to(&self, target: JumpTarget) -> JumpOutcome {
        let outcome = {
            let mut state = self.state.write().await;
            self.engine.jump_to(&mut state, target)
        };
        if let JumpOutcome::Moved { ref step, .. } = outcome {
            self.record_event("jump", Some(step.clone()), None);
            self.persist().await;
        }
        outcome
    }

    /// External override: the form UI pushes a complete state snapshot.
    pub async fn sync_state(
        &self,
        step: &str,
        answers: AnswerSet,
        history: Vec<String>,
    ) -> ReplaceOutcome {
        let outcome = {
            let mut state = self.state.write().await;
            self.engine.replace(&mut state, step, answers, history)
        };
        if let ReplaceOutcome::Replaced { ref step } = outcome {
            self.record_event("sync_state", Some(step.clone()), None);
            self.persist().await;
        }
        outcome
    }

    /// Persist the current state now and wait for the result. Used by
    /// the periodic backstop and the disconnect path; still best-effort.
    pub async fn persist_now(&self) {
        let state = self.state.read().await.clone();
        let store = Arc::clone(&self.store);
        let session_id = self.session_id.clone();
        let voice = self.voice_mode.load(Ordering::Relaxed);
        let result = retry_async("session_save", &self.retry_policy, || {
            let store = Arc::clone(&store);
            let session_id = session_id.clone();
            let state = state.clone();
            async move { store.save(&session_id, &state, voice).await }
        })
        .await;
        if let Err(e) = result {
            tracing::error!(session = %self.session_id, error = %e, "Session save dropped after retries");
        }
    }

    /// Fire-and-forget persistence: snapshots the state and saves on a
    /// background task so the live interaction never waits on the store.
    async fn persist(&self) {
        let state = self.state.read().await.clone();
        let store = Arc::clone(&self.store);
        let session_id = self.session_id.clone();
        let voice = self.voice_mode.load(Ordering::Relaxed);
        let policy = self.retry_policy.clone();
        tokio::spawn(async move {
            let result = retry_async("session_save", &policy, || {
                let store = Arc::clone(&store);
                let session_id = session_id.clone();
                let state = state.clone();
                async move { store.save(&session_id, &state, voice).await }
            })
            .await;
            if let Err(e) = result {
                tracing::error!(session = %session_id, error = %e, "Session save dropped after retries");
            }
        });
    }

    /// Fire-and-forget audit-trail append.
    fn record_event(
        &self,
        action: &'static str,
        step: Option<String>,
        detail: Option<serde_json::Value>,
    ) {
        let store = Arc::clone(&self.store);
        let session_id = self.session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = store
                .append_event(&session_id, action, step.as_deref(), detail.as_ref())
                .await
            {
                tracing::warn!(session = %session_id, error = %e, "Audit event dropped");
            }
        });
    }
}
