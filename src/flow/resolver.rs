//! Next-step resolution.
//!
//! `resolve` is a pure function over the step definition, the answer just
//! given, and the accumulated answers. It never fails: an unresolvable
//! branch disqualifies (fail-closed — an unrecognized branch must not
//! silently advance the respondent), with the underlying cause preserved
//! for operator logs so a catalog bug is distinguishable from a
//! legitimate disqualification.

use super::answer::{Answer, AnswerSet};
use super::step::{NextRule, StepDefinition, StepTarget};

/// Where the flow goes after an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Advance to another step.
    Next(String),
    /// The respondent finished the questionnaire.
    Complete,
    /// The flow ends without qualification.
    Disqualified(DisqualifyCause),
}

/// Why a resolution disqualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisqualifyCause {
    /// A rule routed to the DISQUALIFIED terminal.
    Rule { step: String },
    /// No rule matched or a rule failed to evaluate. Respondent-facing
    /// behavior is identical to `Rule`; the detail goes to the logs.
    Unresolved { step: String, detail: String },
}

impl DisqualifyCause {
    /// The step the respondent was on when the flow ended.
    pub fn step(&self) -> &str {
        match self {
            Self::Rule { step } | Self::Unresolved { step, .. } => step,
        }
    }

    /// Respondent-facing reason string.
    pub fn reason(&self) -> String {
        format!("Disqualified at {}", self.step())
    }
}

/// Determine the next step for `step` given `answer`.
///
/// The rule is evaluated over a working view of the answers with `answer`
/// tentatively written at the current step, so rules can reference the
/// very answer being decided on. Numeric comparison is inclusive on both
/// bounds.
pub fn resolve(step: &StepDefinition, answer: &Answer, answers: &AnswerSet) -> Resolution {
    let view = answers.with_tentative(&step.id, answer);

    match &step.next {
        NextRule::Literal(target) => target_resolution(&step.id, target),

        NextRule::Conditional(expr) => match expr.eval(&view) {
            Ok(value) => match value {
                super::expr::Value::Str(name) => {
                    target_resolution(&step.id, &StepTarget::parse(&name))
                }
                other => unresolved(
                    &step.id,
                    format!("conditional rule produced {} instead of a step id", other.kind()),
                ),
            },
            Err(e) => unresolved(&step.id, format!("conditional rule failed: {e}")),
        },

        NextRule::RangeSplit {
            in_range,
            out_of_range,
            unknown,
        } => {
            let Some(n) = answer.as_number() else {
                // Special tokens ("Don't know") route via the unknown arm.
                return match unknown {
                    Some(target) => target_resolution(&step.id, target),
                    None => unresolved(
                        &step.id,
                        format!("non-numeric answer {:?} on a numeric split", answer.display()),
                    ),
                };
            };

            let min = match step.min.as_ref().map(|b| b.resolve(&view)).transpose() {
                Ok(v) => v,
                Err(e) => return unresolved(&step.id, format!("min bound failed: {e}")),
            };
            let max = match step.max.as_ref().map(|b| b.resolve(&view)).transpose() {
                Ok(v) => v,
                Err(e) => return unresolved(&step.id, format!("max bound failed: {e}")),
            };

            let in_bounds = min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m);
            if in_bounds {
                target_resolution(&step.id, in_range)
            } else {
                target_resolution(&step.id, out_of_range)
            }
        }

        NextRule::ValueMap { map, default } => {
            // Multi-select answers never match a literal key; membership
            // branching belongs in conditional rules.
            let key = match answer {
                Answer::Scalar(s) => Some(s.clone()),
                Answer::Numeric(n) => Some(n.to_string()),
                Answer::MultiSelect(_) => None,
            };
            let target = key
                .and_then(|k| map.iter().find(|(v, _)| *v == k))
                .map(|(_, t)| t)
                .unwrap_or(default);
            target_resolution(&step.id, target)
        }
    }
}

fn target_resolution(step_id: &str, target: &StepTarget) -> Resolution {
    match target {
        StepTarget::Step(id) => Resolution::Next(id.clone()),
        StepTarget::Complete => Resolution::Complete,
        StepTarget::Disqualified => Resolution::Disqualified(DisqualifyCause::Rule {
            step: step_id.to_string(),
        }),
    }
}

fn unresolved(step_id: &str, detail: String) -> Resolution {
    tracing::warn!(step = step_id, %detail, "Unresolved transition, failing closed");
    Resolution::Disqualified(DisqualifyCause::Unresolved {
        step: step_id.to_string(),
        detail,
    })
}
