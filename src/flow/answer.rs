//! Answer values and the accumulated answer set.
//!
//! Answers arrive from three places (agent tool calls, the web form, and
//! persisted sessions) and are normalized into [`Answer`] exactly once at
//! the validator boundary. Downstream code never branches on ambiguous
//! runtime types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single recorded answer.
///
/// Serializes untagged so the persisted JSON matches the wire shape the
/// form UI produces: a number, a list of option strings, or a plain
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// An integer answer for numeric steps.
    Numeric(i64),
    /// Ordered selection for multi-choice steps.
    MultiSelect(Vec<String>),
    /// A plain string: chosen option, free text, or a special token
    /// such as "Don't know".
    Scalar(String),
}

impl Answer {
    /// Construct a scalar answer.
    pub fn scalar(s: impl Into<String>) -> Self {
        Self::Scalar(s.into())
    }

    /// Construct a multi-select answer.
    pub fn multi<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MultiSelect(options.into_iter().map(Into::into).collect())
    }

    /// The numeric value, if this answer is a number or parses as one.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Scalar(s) => s.trim().parse().ok(),
            Self::MultiSelect(_) => None,
        }
    }

    /// Whether this answer selects the given option exactly.
    ///
    /// Multi-select answers match any selected entry; scalar answers match
    /// by equality. Numbers never match option strings.
    pub fn selects(&self, option: &str) -> bool {
        match self {
            Self::Scalar(s) => s == option,
            Self::MultiSelect(opts) => opts.iter().any(|o| o == option),
            Self::Numeric(_) => false,
        }
    }

    /// Display form used for interpolation and transcripts.
    pub fn display(&self) -> String {
        match self {
            Self::Scalar(s) => s.clone(),
            Self::Numeric(n) => n.to_string(),
            Self::MultiSelect(opts) => opts.join(", "),
        }
    }

    /// Whether the answer is empty (blank text or no selection).
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.trim().is_empty(),
            Self::MultiSelect(opts) => opts.is_empty(),
            Self::Numeric(_) => false,
        }
    }
}

/// Accumulated answers keyed by step id.
///
/// Grows monotonically in normal forward flow; values are overwritten
/// when a respondent revisits a step. Back-navigation never deletes an
/// answer, so revisited steps can show what was previously entered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet(BTreeMap<String, Answer>);

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, step_id: &str) -> Option<&Answer> {
        self.0.get(step_id)
    }

    pub fn insert(&mut self, step_id: impl Into<String>, answer: Answer) {
        self.0.insert(step_id.into(), answer);
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.0.contains_key(step_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Answer)> {
        self.0.iter()
    }

    /// Copy of this set with `answer` tentatively written at `step_id`.
    ///
    /// Next-step rules may reference the very answer being evaluated, so
    /// the resolver works over this view instead of the committed set.
    pub fn with_tentative(&self, step_id: &str, answer: &Answer) -> AnswerSet {
        let mut view = self.clone();
        view.insert(step_id.to_string(), answer.clone());
        view
    }
}
