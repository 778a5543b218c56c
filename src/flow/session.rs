//! Session state and the navigation operations over it.
//!
//! [`SessionState`] is the single unit of persisted and transmitted
//! state: the current position, the accumulated answers, and the ordered
//! history of visited steps. It is mutated exclusively through the
//! [`Engine`] operations (advance, go-back, jump-to) plus the external
//! override used when the form UI replaces state out of band.
//!
//! Every operation returns a tagged outcome, never an error: for a
//! structurally valid state and a well-formed request there is no failure
//! path, only outcomes the caller relays to the respondent.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::answer::{Answer, AnswerSet};
use super::catalog::Catalog;
use super::render::{RenderedStep, render_step};
use super::resolver::{Resolution, resolve};
use super::validator::{Verdict, validate};

/// Where a session currently is: on a step, or at a terminal outcome.
///
/// Serializes as the bare string the form UI and store use
/// (`"S7"`, `"COMPLETE"`, `"DISQUALIFIED"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Position {
    Step(String),
    Complete,
    Disqualified,
}

impl Position {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Step(_))
    }

    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::Step(id) => Some(id),
            _ => None,
        }
    }
}

impl From<String> for Position {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "COMPLETE" => Self::Complete,
            "DISQUALIFIED" => Self::Disqualified,
            _ => Self::Step(raw),
        }
    }
}

impl From<Position> for String {
    fn from(pos: Position) -> Self {
        pos.to_string()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(id) => write!(f, "{id}"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Disqualified => write!(f, "DISQUALIFIED"),
        }
    }
}

/// Per-respondent flow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(rename = "current_step")]
    pub current: Position,
    pub answers: AnswerSet,
    #[serde(rename = "step_history")]
    pub history: Vec<String>,
}

/// Respondent-facing terminal messages.
const COMPLETED_MESSAGE: &str =
    "Survey completed successfully! Thank you for your participation.";
const DISQUALIFIED_MESSAGE: &str =
    "Based on your response, you do not qualify for this survey. Thank you for your time.";
const ENDED_MESSAGE: &str = "The survey has already ended.";

/// Outcome of submitting an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Validator rejection; nothing was mutated.
    Invalid { step: String, message: String },
    /// Speculative submission: the predicted transition, uncommitted.
    DryRun {
        step: String,
        predicted_next: String,
        will_disqualify: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        termination_reason: Option<String>,
    },
    /// Advanced to another step.
    Advanced {
        step: String,
        next_step: String,
        next_question: String,
    },
    /// The flow finished successfully.
    Completed { message: String, total_answers: usize },
    /// The flow ended without qualification.
    Disqualified { message: String, reason: String },
    /// Submit on an already-terminal session; nothing was mutated.
    Ended { message: String },
}

/// Outcome of going back one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackOutcome {
    Moved { step: String, question: String },
    NoHistory { message: String },
    Ended { message: String },
}

/// Outcome of jumping to a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JumpOutcome {
    Moved {
        step: String,
        question: String,
        has_answer: bool,
    },
    UnknownStep { message: String },
    OutOfRange { message: String },
    Ended { message: String },
}

/// Outcome of an external state override.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplaceOutcome {
    Replaced { step: String },
    UnknownStep { message: String },
}

/// Target for a jump: a literal step id, or a 1-based index into the
/// step history ("go to the third question").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    StepId(String),
    Position(usize),
}

/// The current question as seen by the agent or the form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuestionView {
    Active {
        #[serde(flatten)]
        rendered: RenderedStep,
        has_answer: bool,
    },
    Completed { message: String },
    Disqualified { message: String },
}

/// Progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub current_step: String,
    pub questions_answered: usize,
    pub answers: AnswerSet,
    pub step_history: Vec<String>,
    pub is_complete: bool,
    pub is_disqualified: bool,
}

/// The flow engine: the catalog plus the pure operations over
/// [`SessionState`]. Cheap to clone and share; holds no mutable state of
/// its own.
#[derive(Clone)]
pub struct Engine {
    catalog: Arc<Catalog>,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Fresh state at the entry step with nothing answered.
    pub fn new_session(&self) -> SessionState {
        SessionState {
            current: Position::Step(self.catalog.entry().to_string()),
            answers: AnswerSet::new(),
            history: Vec::new(),
        }
    }

    /// Render the current question (or the terminal message).
    pub fn current_question(&self, state: &SessionState) -> QuestionView {
        match &state.current {
            Position::Complete => QuestionView::Completed {
                message: COMPLETED_MESSAGE.to_string(),
            },
            Position::Disqualified => QuestionView::Disqualified {
                message: DISQUALIFIED_MESSAGE.to_string(),
            },
            Position::Step(id) => match self.catalog.get(id) {
                Some(step) => QuestionView::Active {
                    rendered: render_step(step, &state.answers),
                    has_answer: state.answers.contains(id),
                },
                // A validated catalog makes this unreachable; fail closed
                // rather than panicking on a corrupted persisted state.
                None => QuestionView::Disqualified {
                    message: DISQUALIFIED_MESSAGE.to_string(),
                },
            },
        }
    }

    /// Progress snapshot for the agent and the form.
    pub fn progress(&self, state: &SessionState) -> ProgressView {
        ProgressView {
            current_step: state.current.to_string(),
            questions_answered: state.answers.len(),
            answers: state.answers.clone(),
            step_history: state.history.clone(),
            is_complete: state.current == Position::Complete,
            is_disqualified: state.current == Position::Disqualified,
        }
    }

    /// Submit an answer for the current step.
    ///
    /// With `dry_run` the resulting transition is computed and reported
    /// without committing anything — the confirm-before-saving UX checks
    /// a disqualifying answer this way before the respondent locks it in.
    pub fn submit(&self, state: &mut SessionState, answer: Answer, dry_run: bool) -> SubmitOutcome {
        let Position::Step(step_id) = state.current.clone() else {
            return SubmitOutcome::Ended {
                message: ENDED_MESSAGE.to_string(),
            };
        };
        let Some(step) = self.catalog.get(&step_id) else {
            return SubmitOutcome::Ended {
                message: ENDED_MESSAGE.to_string(),
            };
        };

        if let Verdict::Reject(message) = validate(step, &answer, &state.answers) {
            return SubmitOutcome::Invalid {
                step: step_id,
                message,
            };
        }

        let resolution = resolve(step, &answer, &state.answers);

        if dry_run {
            let (predicted, reason) = match &resolution {
                Resolution::Next(id) => (id.clone(), None),
                Resolution::Complete => ("COMPLETE".to_string(), None),
                Resolution::Disqualified(cause) => {
                    ("DISQUALIFIED".to_string(), Some(cause.reason()))
                }
            };
            return SubmitOutcome::DryRun {
                step: step_id,
                will_disqualify: reason.is_some(),
                termination_reason: reason,
                predicted_next: predicted,
            };
        }

        state.answers.insert(step_id.clone(), answer);
        state.history.push(step_id.clone());

        match resolution {
            Resolution::Next(next_id) => {
                let next_question = self
                    .catalog
                    .get(&next_id)
                    .map(|s| super::expr::interpolate(&s.question, &state.answers))
                    .unwrap_or_default();
                state.current = Position::Step(next_id.clone());
                SubmitOutcome::Advanced {
                    step: step_id,
                    next_step: next_id,
                    next_question,
                }
            }
            Resolution::Complete => {
                state.current = Position::Complete;
                SubmitOutcome::Completed {
                    message: COMPLETED_MESSAGE.to_string(),
                    total_answers: state.answers.len(),
                }
            }
            Resolution::Disqualified(cause) => {
                state.current = Position::Disqualified;
                SubmitOutcome::Disqualified {
                    message: DISQUALIFIED_MESSAGE.to_string(),
                    reason: cause.reason(),
                }
            }
        }
    }

    /// Return to the most recently visited step.
    ///
    /// The answer recorded for the step being left is kept, so the
    /// respondent sees their previous entry when the question re-renders.
    pub fn go_back(&self, state: &mut SessionState) -> BackOutcome {
        if state.current.is_terminal() {
            return BackOutcome::Ended {
                message: ENDED_MESSAGE.to_string(),
            };
        }
        match state.history.pop() {
            Some(prev) => {
                let question = self
                    .catalog
                    .get(&prev)
                    .map(|s| super::expr::interpolate(&s.question, &state.answers))
                    .unwrap_or_default();
                state.current = Position::Step(prev.clone());
                BackOutcome::Moved {
                    step: prev,
                    question,
                }
            }
            None => BackOutcome::NoHistory {
                message: "We're already at the first question. There's nothing to go back to."
                    .to_string(),
            },
        }
    }

    /// Jump to a specific step, by id or by 1-based history position.
    ///
    /// Jumping to a step already in the history truncates the history to
    /// just before its first occurrence, so the recorded path stays
    /// consistent with landing there. Jumping to an id not in the history
    /// leaves the history unchanged.
    pub fn jump_to(&self, state: &mut SessionState, target: JumpTarget) -> JumpOutcome {
        if state.current.is_terminal() {
            return JumpOutcome::Ended {
                message: ENDED_MESSAGE.to_string(),
            };
        }

        let target_pos = match target {
            JumpTarget::StepId(id) => {
                let pos = Position::from(id.clone());
                if pos.step_id().is_some() && !self.catalog.contains(&id) {
                    return JumpOutcome::UnknownStep {
                        message: format!("Step {id} doesn't exist in the survey."),
                    };
                }
                pos
            }
            JumpTarget::Position(n) => {
                if n < 1 || n > state.history.len() {
                    return JumpOutcome::OutOfRange {
                        message: format!(
                            "Question number {n} is out of range. You've answered {} questions so far.",
                            state.history.len()
                        ),
                    };
                }
                Position::Step(state.history[n - 1].clone())
            }
        };

        if let Some(step_id) = target_pos.step_id() {
            if let Some(first) = state.history.iter().position(|h| h == step_id) {
                state.history.truncate(first);
            }
        }

        let (question, has_answer) = match target_pos.step_id() {
            Some(id) => (
                self.catalog
                    .get(id)
                    .map(|s| super::expr::interpolate(&s.question, &state.answers))
                    .unwrap_or_default(),
                state.answers.contains(id),
            ),
            None => (String::new(), false),
        };

        state.current = target_pos.clone();
        JumpOutcome::Moved {
            step: target_pos.to_string(),
            question,
            has_answer,
        }
    }

    /// Unconditionally replace all session fields.
    ///
    /// Used when an out-of-band editor (the manually operated form)
    /// changes state; the caller is inside the trust boundary, so no
    /// answer validation happens. This is also the only way out of a
    /// terminal position (respondent-initiated restart/edit flows).
    pub fn replace(
        &self,
        state: &mut SessionState,
        current: &str,
        answers: AnswerSet,
        history: Vec<String>,
    ) -> ReplaceOutcome {
        let pos = Position::from(current.to_string());
        if let Some(id) = pos.step_id() {
            if !self.catalog.contains(id) {
                return ReplaceOutcome::UnknownStep {
                    message: format!("Step {id} doesn't exist in the survey."),
                };
            }
        }
        state.current = pos.clone();
        state.answers = answers;
        state.history = history;
        ReplaceOutcome::Replaced {
            step: pos.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::step::{AnswerKind, step};

    /// Small catalog exercising every rule shape.
    fn engine() -> Engine {
        let catalog = Catalog::builder("A")
            .step(
                step("A", "first?", AnswerKind::SingleChoice)
                    .options(["Yes", "No"])
                    .branch("answers.A == 'Yes' ? 'B' : 'DISQUALIFIED'"),
            )
            .step(
                step("B", "count?", AnswerKind::Number)
                    .min(1)
                    .max(10)
                    .range_split("C", "DISQUALIFIED"),
            )
            .step(
                step("C", "anything else on {answers.A}?", AnswerKind::FreeText).goto("D"),
            )
            .step(
                step("D", "done?", AnswerKind::SingleChoice)
                    .options(["Yes", "No"])
                    .value_map([("No", "C")], "COMPLETE"),
            )
            .build()
            .unwrap();
        Engine::new(Arc::new(catalog))
    }

    #[test]
    fn new_session_starts_at_entry() {
        let engine = engine();
        let state = engine.new_session();
        assert_eq!(state.current, Position::Step("A".into()));
        assert!(state.answers.is_empty());
        assert!(state.history.is_empty());
    }

    #[test]
    fn advance_records_answer_and_history() {
        let engine = engine();
        let mut state = engine.new_session();

        let outcome = engine.submit(&mut state, Answer::scalar("Yes"), false);
        assert_eq!(
            outcome,
            SubmitOutcome::Advanced {
                step: "A".into(),
                next_step: "B".into(),
                next_question: "count?".into(),
            }
        );
        assert_eq!(state.current, Position::Step("B".into()));
        assert_eq!(state.history, vec!["A".to_string()]);
        assert_eq!(state.answers.get("A"), Some(&Answer::scalar("Yes")));
    }

    #[test]
    fn invalid_answer_mutates_nothing() {
        let engine = engine();
        let mut state = engine.new_session();
        let before = state.clone();

        let outcome = engine.submit(&mut state, Answer::scalar("maybe"), false);
        assert!(matches!(outcome, SubmitOutcome::Invalid { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn go_back_after_advance_keeps_the_answer() {
        let engine = engine();
        let mut state = engine.new_session();
        engine.submit(&mut state, Answer::scalar("Yes"), false);

        let outcome = engine.go_back(&mut state);
        assert_eq!(
            outcome,
            BackOutcome::Moved {
                step: "A".into(),
                question: "first?".into(),
            }
        );
        // Not a full inverse: position is restored, the answer is retained.
        assert_eq!(state.current, Position::Step("A".into()));
        assert_eq!(state.answers.get("A"), Some(&Answer::scalar("Yes")));
        assert!(state.history.is_empty());
    }

    #[test]
    fn go_back_with_empty_history() {
        let engine = engine();
        let mut state = engine.new_session();
        assert!(matches!(
            engine.go_back(&mut state),
            BackOutcome::NoHistory { .. }
        ));
    }

    #[test]
    fn disqualifying_answer_ends_the_flow() {
        let engine = engine();
        let mut state = engine.new_session();

        let outcome = engine.submit(&mut state, Answer::scalar("No"), false);
        assert_eq!(
            outcome,
            SubmitOutcome::Disqualified {
                message: DISQUALIFIED_MESSAGE.to_string(),
                reason: "Disqualified at A".into(),
            }
        );
        assert_eq!(state.current, Position::Disqualified);

        // Further submissions are refused without mutation.
        let before = state.clone();
        assert!(matches!(
            engine.submit(&mut state, Answer::scalar("Yes"), false),
            SubmitOutcome::Ended { .. }
        ));
        assert!(matches!(engine.go_back(&mut state), BackOutcome::Ended { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn walk_to_completion() {
        let engine = engine();
        let mut state = engine.new_session();
        engine.submit(&mut state, Answer::scalar("Yes"), false);
        engine.submit(&mut state, Answer::Numeric(5), false);
        engine.submit(&mut state, Answer::scalar("nothing"), false);
        let outcome = engine.submit(&mut state, Answer::scalar("Yes"), false);
        assert_eq!(
            outcome,
            SubmitOutcome::Completed {
                message: COMPLETED_MESSAGE.to_string(),
                total_answers: 4,
            }
        );
        assert_eq!(state.current, Position::Complete);
    }

    #[test]
    fn dry_run_predicts_without_committing() {
        let engine = engine();
        let mut state = engine.new_session();
        let before = state.clone();

        let outcome = engine.submit(&mut state, Answer::scalar("No"), true);
        assert_eq!(
            outcome,
            SubmitOutcome::DryRun {
                step: "A".into(),
                predicted_next: "DISQUALIFIED".into(),
                will_disqualify: true,
                termination_reason: Some("Disqualified at A".into()),
            }
        );
        assert_eq!(state, before, "speculative submit must not mutate");

        let ok = engine.submit(&mut state, Answer::scalar("Yes"), true);
        assert_eq!(
            ok,
            SubmitOutcome::DryRun {
                step: "A".into(),
                predicted_next: "B".into(),
                will_disqualify: false,
                termination_reason: None,
            }
        );
        assert_eq!(state, before);
    }

    #[test]
    fn jump_to_visited_step_truncates_history() {
        let engine = engine();
        let mut state = engine.new_session();
        engine.submit(&mut state, Answer::scalar("Yes"), false);
        engine.submit(&mut state, Answer::Numeric(5), false);
        engine.submit(&mut state, Answer::scalar("notes"), false);
        assert_eq!(state.history, vec!["A", "B", "C"]);

        let outcome = engine.jump_to(&mut state, JumpTarget::StepId("B".into()));
        assert_eq!(
            outcome,
            JumpOutcome::Moved {
                step: "B".into(),
                question: "count?".into(),
                has_answer: true,
            }
        );
        assert_eq!(state.current, Position::Step("B".into()));
        // Truncated to just before B's first occurrence.
        assert_eq!(state.history, vec!["A"]);
        // Answers are retained across the jump.
        assert_eq!(state.answers.get("C"), Some(&Answer::scalar("notes")));
    }

    #[test]
    fn jump_to_unvisited_step_leaves_history_alone() {
        let engine = engine();
        let mut state = engine.new_session();
        engine.submit(&mut state, Answer::scalar("Yes"), false);
        assert_eq!(state.history, vec!["A"]);

        let outcome = engine.jump_to(&mut state, JumpTarget::StepId("D".into()));
        assert!(matches!(outcome, JumpOutcome::Moved { .. }));
        assert_eq!(state.history, vec!["A"]);
        assert_eq!(state.current, Position::Step("D".into()));
    }

    #[test]
    fn jump_by_history_position() {
        let engine = engine();
        let mut state = engine.new_session();
        engine.submit(&mut state, Answer::scalar("Yes"), false);
        engine.submit(&mut state, Answer::Numeric(5), false);

        let outcome = engine.jump_to(&mut state, JumpTarget::Position(1));
        assert!(matches!(outcome, JumpOutcome::Moved { ref step, .. } if step == "A"));
        assert_eq!(state.current, Position::Step("A".into()));
        assert!(state.history.is_empty());

        let oob = engine.jump_to(&mut state, JumpTarget::Position(5));
        assert!(matches!(oob, JumpOutcome::OutOfRange { .. }));
    }

    #[test]
    fn jump_to_unknown_step_is_rejected() {
        let engine = engine();
        let mut state = engine.new_session();
        let before = state.clone();
        let outcome = engine.jump_to(&mut state, JumpTarget::StepId("Z9".into()));
        assert!(matches!(outcome, JumpOutcome::UnknownStep { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn replace_is_the_only_way_out_of_a_terminal() {
        let engine = engine();
        let mut state = engine.new_session();
        engine.submit(&mut state, Answer::scalar("No"), false);
        assert_eq!(state.current, Position::Disqualified);
        assert!(matches!(
            engine.jump_to(&mut state, JumpTarget::StepId("A".into())),
            JumpOutcome::Ended { .. }
        ));

        let mut answers = AnswerSet::new();
        answers.insert("A", Answer::scalar("Yes"));
        let outcome = engine.replace(&mut state, "B", answers, vec!["A".into()]);
        assert!(matches!(outcome, ReplaceOutcome::Replaced { ref step } if step == "B"));
        assert_eq!(state.current, Position::Step("B".into()));
        assert_eq!(state.history, vec!["A"]);
    }

    #[test]
    fn replace_rejects_unknown_step() {
        let engine = engine();
        let mut state = engine.new_session();
        let before = state.clone();
        let outcome = engine.replace(&mut state, "NOPE", AnswerSet::new(), Vec::new());
        assert!(matches!(outcome, ReplaceOutcome::UnknownStep { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn current_question_renders_with_answers() {
        let engine = engine();
        let mut state = engine.new_session();
        engine.submit(&mut state, Answer::scalar("Yes"), false);
        engine.submit(&mut state, Answer::Numeric(3), false);

        match engine.current_question(&state) {
            QuestionView::Active {
                rendered,
                has_answer,
            } => {
                assert_eq!(rendered.step_id, "C");
                assert_eq!(rendered.question, "anything else on Yes?");
                assert!(!has_answer);
            }
            other => panic!("expected active question, got {other:?}"),
        }
    }

    #[test]
    fn progress_reports_terminal_flags() {
        let engine = engine();
        let mut state = engine.new_session();
        let p = engine.progress(&state);
        assert_eq!(p.current_step, "A");
        assert!(!p.is_complete && !p.is_disqualified);

        engine.submit(&mut state, Answer::scalar("No"), false);
        let p = engine.progress(&state);
        assert_eq!(p.current_step, "DISQUALIFIED");
        assert!(p.is_disqualified);
        assert_eq!(p.questions_answered, 1);
    }

    #[test]
    fn session_state_serde_roundtrip() {
        let engine = engine();
        let mut state = engine.new_session();
        engine.submit(&mut state, Answer::scalar("Yes"), false);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["current_step"], "B");
        assert_eq!(json["step_history"], serde_json::json!(["A"]));
        assert_eq!(json["answers"]["A"], "Yes");

        let back: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
