//! Render projection — what a step looks like for display or speech.
//!
//! A pure formatting function over the catalog definition and the
//! accumulated answers: interpolates the question template, resolves
//! dynamic bounds, and pre-formats an options summary the voice agent
//! can read aloud. Rendering twice with an unchanged answer set yields
//! identical output.

use serde::Serialize;

use super::answer::AnswerSet;
use super::expr::interpolate;
use super::step::{AnswerKind, StepDefinition, SubField};

/// Display/speech projection of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedStep {
    pub step_id: String,
    /// Fully interpolated question text.
    pub question: String,
    pub kind: AnswerKind,
    pub options: Vec<String>,
    /// Resolved numeric bounds, when the step has them.
    pub min: Option<i64>,
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<SubField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// Pre-formatted options summary for natural speech.
    pub options_text: String,
    /// Complete question ready to read: question + options + help.
    pub full_question: String,
}

/// Project a step for display against the current answers.
pub fn render_step(step: &StepDefinition, answers: &AnswerSet) -> RenderedStep {
    let question = interpolate(&step.question, answers);

    let options_text = if step.options.is_empty() {
        String::new()
    } else if step.options.len() <= 5 {
        format!(" Your options are: {}.", step.options.join(", "))
    } else {
        format!(" You have {} options to choose from.", step.options.len())
    };

    let help = step
        .help_text
        .as_ref()
        .map(|h| format!(" {h}"))
        .unwrap_or_default();

    let min = step.min.as_ref().and_then(|b| b.resolve(answers).ok());
    let max = step.max.as_ref().and_then(|b| b.resolve(answers).ok());

    RenderedStep {
        step_id: step.id.clone(),
        full_question: format!("{question}{options_text}{help}"),
        question,
        kind: step.kind,
        options: step.options.clone(),
        min,
        max,
        sub_fields: step.sub_fields.clone(),
        help_text: step.help_text.clone(),
        options_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::answer::Answer;
    use crate::flow::step::{AnswerKind, step};

    #[test]
    fn interpolates_prior_answers_into_the_question() {
        let mut answers = AnswerSet::new();
        answers.insert("A1_4", Answer::scalar("Yes"));

        let s = step(
            "A3",
            "At the time of the treatment initiation in {answers.A1_4 == 'Yes' ? 'July' : 'August'} 2025, did you consider this patient's plaque psoriasis ...?",
            AnswerKind::SingleChoice,
        )
        .options(["Mild", "Moderate", "Severe"]);

        let rendered = render_step(&s.def, &answers);
        assert!(rendered.question.contains("in July 2025"));
        assert_eq!(
            rendered.options_text,
            " Your options are: Mild, Moderate, Severe."
        );
        assert!(rendered.full_question.starts_with(&rendered.question));
        assert!(rendered.full_question.ends_with(&rendered.options_text));
    }

    #[test]
    fn rendering_is_idempotent_for_unchanged_answers() {
        let mut answers = AnswerSet::new();
        answers.insert("S12_1", Answer::Numeric(12));

        let s = step("S13_1", "Mild patients initiated:", AnswerKind::Number)
            .min(0)
            .max_expr("int(answers.S12_1)");

        let first = render_step(&s.def, &answers);
        let second = render_step(&s.def, &answers);
        assert_eq!(first, second);
        assert_eq!(first.min, Some(0));
        assert_eq!(first.max, Some(12));
    }

    #[test]
    fn long_option_lists_are_summarized() {
        let s = step("S3", "Which states?", AnswerKind::MultiChoice)
            .options(["A", "B", "C", "D", "E", "F"]);
        let rendered = render_step(&s.def, &AnswerSet::new());
        assert_eq!(rendered.options_text, " You have 6 options to choose from.");
    }

    #[test]
    fn help_text_is_appended() {
        let s = step("S7", "How many years?", AnswerKind::Number)
            .min(2)
            .max(35)
            .help("If less than a year, enter 1.");
        let rendered = render_step(&s.def, &AnswerSet::new());
        assert_eq!(
            rendered.full_question,
            "How many years? If less than a year, enter 1."
        );
    }
}
