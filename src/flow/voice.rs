//! Voice answer matching — normalizing spoken/conversational responses
//! into catalog answers before validation.
//!
//! A respondent says "derm" or "I'd go with dermatology, probably"; the
//! catalog option is "Dermatology". This module maps the utterance onto
//! the option strings, pulls every mentioned option for multi-choice
//! steps, and extracts digits for numeric steps. It trusts recall over
//! precision: the validator and the confirm-before-save flow catch what
//! slips through.

use regex::Regex;
use std::sync::OnceLock;

use super::answer::Answer;
use super::step::{AnswerKind, StepDefinition};

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// Match a spoken answer to one option, or None.
///
/// Tries, in order: case-insensitive equality, the utterance as a
/// substring of the option ("derm" → "Dermatology"), the option inside
/// the utterance ("I choose Dermatology"), then word-set overlap for
/// multi-word options ("advisory board" → "Advisory board member").
pub fn match_voice_to_option(answer: &str, options: &[String]) -> Option<String> {
    let a = answer.trim().to_lowercase();
    if a.is_empty() || options.is_empty() {
        return None;
    }

    for opt in options {
        if a == opt.to_lowercase() {
            return Some(opt.clone());
        }
    }

    for opt in options {
        if opt.to_lowercase().contains(&a) {
            return Some(opt.clone());
        }
    }

    for opt in options {
        if a.contains(&opt.to_lowercase()) {
            return Some(opt.clone());
        }
    }

    let a_words: Vec<&str> = a.split_whitespace().collect();
    for opt in options {
        let opt_lower = opt.to_lowercase();
        let opt_words: Vec<&str> = opt_lower.split_whitespace().collect();
        if opt_words.is_empty() {
            continue;
        }
        if opt_words.iter().all(|w| a_words.contains(w)) {
            return Some(opt.clone());
        }
        if !a_words.is_empty() && a_words.iter().all(|w| opt_words.contains(w)) {
            let common = a_words.iter().filter(|w| opt_words.contains(*w)).count();
            if common * 2 >= opt_words.len() {
                return Some(opt.clone());
            }
        }
    }

    None
}

/// Words long enough to identify an option on their own.
fn significant_words(option: &str) -> Vec<String> {
    option
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .map(String::from)
        .collect()
}

/// Every catalog option mentioned in a conversational multi-choice answer.
fn extract_mentions(raw: &str, options: &[String]) -> Vec<String> {
    let lower = raw.to_lowercase();
    let mut matched = Vec::new();

    for opt in options {
        if lower.contains(&opt.to_lowercase()) {
            matched.push(opt.clone());
            continue;
        }
        let words = significant_words(opt);
        if !words.is_empty() {
            let found = words.iter().filter(|w| lower.contains(w.as_str())).count();
            if found * 2 >= words.len() {
                matched.push(opt.clone());
            }
        }
    }

    if matched.is_empty() {
        if let Some(single) = match_voice_to_option(raw, options) {
            matched.push(single);
        }
    }
    matched
}

/// Normalize a raw conversational response into an [`Answer`] for `step`.
///
/// Falls back to the raw text when nothing matches, so the validator can
/// produce its actionable rejection instead of this layer guessing.
pub fn extract_answer(step: &StepDefinition, raw: &str) -> Answer {
    let trimmed = raw.trim();

    match step.kind {
        AnswerKind::MultiChoice => {
            let matched = extract_mentions(trimmed, &step.options);
            if matched.is_empty() {
                Answer::scalar(trimmed)
            } else {
                Answer::MultiSelect(matched)
            }
        }

        AnswerKind::SingleChoice => match match_voice_to_option(trimmed, &step.options) {
            Some(opt) => Answer::Scalar(opt),
            None => {
                let lower = trimmed.to_lowercase();
                for opt in &step.options {
                    let words = significant_words(opt);
                    if words.iter().any(|w| lower.contains(w.as_str())) {
                        return Answer::Scalar(opt.clone());
                    }
                }
                Answer::scalar(trimmed)
            }
        },

        AnswerKind::Number | AnswerKind::NumberOrUnknown => {
            if let Some(m) = digits_re().find(trimmed) {
                if let Ok(n) = m.as_str().parse() {
                    return Answer::Numeric(n);
                }
            }
            let lower = trimmed.to_lowercase();
            let sounds_unknown = lower.contains("don't know")
                || lower.contains("dont know")
                || lower.contains("unknown")
                || lower.contains("not sure");
            if sounds_unknown && step.kind == AnswerKind::NumberOrUnknown {
                // Map onto the step's own token spelling when it has one.
                let token = step
                    .options
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "Don't know".to_string());
                return Answer::Scalar(token);
            }
            Answer::scalar(trimmed)
        }

        // Composite entries keep the raw text; sub-field parsing belongs
        // to the form layer.
        AnswerKind::CompositeNumber | AnswerKind::FreeText | AnswerKind::Informational => {
            Answer::scalar(trimmed)
        }
    }
}
