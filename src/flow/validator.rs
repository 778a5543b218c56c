//! Answer validation.
//!
//! `validate` decides whether a candidate answer is acceptable for a
//! step, and produces an actionable rejection message when it is not —
//! the message is surfaced verbatim to the respondent, so it always
//! states the permitted options or numeric range.

use super::answer::{Answer, AnswerSet};
use super::step::{AnswerKind, StepDefinition};

/// Validation outcome. Rejections carry a respondent-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Validate `answer` for `step` against the accumulated answers (needed
/// to resolve dynamic bounds). Pure; never mutates anything.
pub fn validate(step: &StepDefinition, answer: &Answer, answers: &AnswerSet) -> Verdict {
    match step.kind {
        AnswerKind::SingleChoice => {
            if step.options.iter().any(|o| answer.selects(o)) && !matches!(answer, Answer::MultiSelect(_)) {
                Verdict::Accept
            } else {
                Verdict::Reject(options_message(&step.options))
            }
        }

        // Voice-derived selections may not match catalog strings
        // verbatim; the upstream extraction is trusted and only
        // emptiness is rejected here.
        AnswerKind::MultiChoice => {
            if answer.is_empty() {
                Verdict::Reject("Please select at least one option.".to_string())
            } else {
                Verdict::Accept
            }
        }

        AnswerKind::Number | AnswerKind::NumberOrUnknown => {
            // Special tokens ("Don't know") are listed as options.
            if step.options.iter().any(|o| answer.selects(o)) {
                return Verdict::Accept;
            }
            let Some(n) = answer.as_number() else {
                return Verdict::Reject("Please enter a valid number.".to_string());
            };
            let min = resolve_bound(step.min.as_ref(), answers);
            let max = resolve_bound(step.max.as_ref(), answers);
            let in_bounds = min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m);
            if in_bounds {
                Verdict::Accept
            } else {
                Verdict::Reject(range_message(min, max))
            }
        }

        // Sub-field-level checks belong to the form UI; the engine only
        // rejects an entirely empty entry.
        AnswerKind::CompositeNumber => {
            if answer.is_empty() {
                Verdict::Reject("Please provide values.".to_string())
            } else {
                Verdict::Accept
            }
        }

        AnswerKind::FreeText => {
            if answer.is_empty() {
                Verdict::Reject("Please provide a response.".to_string())
            } else {
                Verdict::Accept
            }
        }

        AnswerKind::Informational => Verdict::Accept,
    }
}

/// A bound that fails to resolve is treated as absent: validation must be
/// total, and the resolver's fail-closed path still guards routing.
fn resolve_bound(
    bound: Option<&super::step::Bound>,
    answers: &AnswerSet,
) -> Option<i64> {
    let bound = bound?;
    match bound.resolve(answers) {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::debug!(error = %e, "Bound expression failed during validation");
            None
        }
    }
}

fn options_message(options: &[String]) -> String {
    const SHOWN: usize = 3;
    let listed = options
        .iter()
        .take(SHOWN)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if options.len() > SHOWN {
        format!("Please select one of the provided options: {listed}, ...")
    } else {
        format!("Please select one of the provided options: {listed}")
    }
}

fn range_message(min: Option<i64>, max: Option<i64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("Please enter a number between {min} and {max}."),
        (Some(min), None) => format!("Please enter a number of at least {min}."),
        (None, Some(max)) => format!("Please enter a number no greater than {max}."),
        (None, None) => "Please enter a valid number.".to_string(),
    }
}
