//! Step definitions — the static description of one questionnaire unit.
//!
//! Branching rules are tagged variants ([`NextRule`]) chosen at catalog
//! authoring time, and every embedded expression is parsed when the step
//! is built. There is no runtime guessing about whether a rule string is
//! a literal step id or an expression to evaluate.

use serde::{Deserialize, Serialize};

use super::expr::{Expr, ParseError};

/// Where a transition can land: another step, or one of the two terminal
/// outcomes. Terminals are not steps and have no [`StepDefinition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTarget {
    Step(String),
    Complete,
    Disqualified,
}

impl StepTarget {
    /// Interpret a target string. `COMPLETE` and `DISQUALIFIED` are the
    /// reserved terminal names; anything else is a step id.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "COMPLETE" => Self::Complete,
            "DISQUALIFIED" => Self::Disqualified,
            id => Self::Step(id.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Step(_))
    }
}

impl std::fmt::Display for StepTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(id) => write!(f, "{id}"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Disqualified => write!(f, "DISQUALIFIED"),
        }
    }
}

/// What kind of answer a step expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// Exactly one of the listed options.
    SingleChoice,
    /// One or more of the listed options.
    MultiChoice,
    /// An integer, optionally bounded.
    Number,
    /// An integer, or one of the listed special tokens ("Don't know").
    NumberOrUnknown,
    /// Several numeric sub-fields entered together (height/weight).
    CompositeNumber,
    /// Free text.
    FreeText,
    /// Informational screen; acknowledged, never answered.
    Informational,
}

/// A numeric bound: a literal, or an expression resolved against the
/// accumulated answers at evaluation time ("no more than the count you
/// gave earlier").
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Literal(i64),
    Dynamic(Expr),
}

impl Bound {
    /// Resolve to a concrete value against the accumulated answers.
    pub fn resolve(
        &self,
        answers: &super::answer::AnswerSet,
    ) -> Result<i64, super::expr::EvalError> {
        use super::expr::{EvalError, Value};
        match self {
            Bound::Literal(n) => Ok(*n),
            Bound::Dynamic(expr) => match expr.eval(answers)? {
                Value::Num(n) => Ok(n),
                Value::Str(s) => s.trim().parse().map_err(|_| EvalError::NotANumber(s)),
                other => Err(EvalError::Type {
                    expected: "number",
                    got: other.kind(),
                }),
            },
        }
    }
}

/// One sub-field of a composite-number step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubField {
    pub id: String,
    pub label: String,
    pub min: i64,
    pub max: i64,
}

/// How the flow leaves a step.
#[derive(Debug, Clone, PartialEq)]
pub enum NextRule {
    /// Unconditional jump.
    Literal(StepTarget),
    /// Expression producing a step id or terminal name.
    Conditional(Expr),
    /// Numeric split on the step's resolved `[min, max]`. `unknown`
    /// receives special non-numeric tokens on number-or-unknown steps.
    RangeSplit {
        in_range: StepTarget,
        out_of_range: StepTarget,
        unknown: Option<StepTarget>,
    },
    /// Literal answer value → target, with a required default.
    ValueMap {
        map: Vec<(String, StepTarget)>,
        default: StepTarget,
    },
}

/// Immutable definition of one questionnaire step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDefinition {
    pub id: String,
    /// Question text template; may contain `{expr}` interpolation slots.
    pub question: String,
    pub kind: AnswerKind,
    /// Permissible options for choice kinds; special tokens for
    /// number-or-unknown; empty otherwise.
    pub options: Vec<String>,
    pub min: Option<Bound>,
    pub max: Option<Bound>,
    /// Display-only visibility predicate. Routing never consults this:
    /// every reachable transition already implies its own visibility.
    pub show_if: Option<Expr>,
    pub help_text: Option<String>,
    pub sub_fields: Vec<SubField>,
    pub next: NextRule,
}

impl StepDefinition {
    /// Whether the step expects an integer answer.
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, AnswerKind::Number | AnswerKind::NumberOrUnknown)
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Builder used by the survey data module. Expression strings are parsed
/// immediately; parse failures are collected and surfaced as catalog
/// build errors rather than panics.
#[derive(Debug)]
pub struct StepBuilder {
    pub(crate) def: StepDefinition,
    pub(crate) errors: Vec<(String, ParseError)>,
}

/// Start a step definition. The default rule disqualifies, so a step the
/// author forgot to route fails closed instead of advancing.
pub fn step(id: &str, question: &str, kind: AnswerKind) -> StepBuilder {
    StepBuilder {
        def: StepDefinition {
            id: id.to_string(),
            question: question.to_string(),
            kind,
            options: Vec::new(),
            min: None,
            max: None,
            show_if: None,
            help_text: None,
            sub_fields: Vec::new(),
            next: NextRule::Literal(StepTarget::Disqualified),
        },
        errors: Vec::new(),
    }
}

impl StepBuilder {
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.def.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn min(mut self, min: i64) -> Self {
        self.def.min = Some(Bound::Literal(min));
        self
    }

    pub fn max(mut self, max: i64) -> Self {
        self.def.max = Some(Bound::Literal(max));
        self
    }

    pub fn max_expr(mut self, source: &str) -> Self {
        match Expr::parse(source) {
            Ok(expr) => self.def.max = Some(Bound::Dynamic(expr)),
            Err(e) => self.errors.push(("max".to_string(), e)),
        }
        self
    }

    pub fn min_expr(mut self, source: &str) -> Self {
        match Expr::parse(source) {
            Ok(expr) => self.def.min = Some(Bound::Dynamic(expr)),
            Err(e) => self.errors.push(("min".to_string(), e)),
        }
        self
    }

    pub fn show_if(mut self, source: &str) -> Self {
        match Expr::parse(source) {
            Ok(expr) => self.def.show_if = Some(expr),
            Err(e) => self.errors.push(("show_if".to_string(), e)),
        }
        self
    }

    pub fn help(mut self, text: &str) -> Self {
        self.def.help_text = Some(text.to_string());
        self
    }

    pub fn sub_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = SubField>,
    {
        self.def.sub_fields = fields.into_iter().collect();
        self
    }

    /// Unconditional jump to a step id or terminal name.
    pub fn goto(mut self, target: &str) -> Self {
        self.def.next = NextRule::Literal(StepTarget::parse(target));
        self
    }

    /// Conditional rule; the expression must produce a target string.
    pub fn branch(mut self, source: &str) -> Self {
        match Expr::parse(source) {
            Ok(expr) => self.def.next = NextRule::Conditional(expr),
            Err(e) => self.errors.push(("next".to_string(), e)),
        }
        self
    }

    /// Route on whether the numeric answer falls inside `[min, max]`.
    pub fn range_split(mut self, in_range: &str, out_of_range: &str) -> Self {
        self.def.next = NextRule::RangeSplit {
            in_range: StepTarget::parse(in_range),
            out_of_range: StepTarget::parse(out_of_range),
            unknown: None,
        };
        self
    }

    /// Range split with a target for special non-numeric tokens.
    pub fn range_split_or_unknown(
        mut self,
        in_range: &str,
        out_of_range: &str,
        unknown: &str,
    ) -> Self {
        self.def.next = NextRule::RangeSplit {
            in_range: StepTarget::parse(in_range),
            out_of_range: StepTarget::parse(out_of_range),
            unknown: Some(StepTarget::parse(unknown)),
        };
        self
    }

    /// Literal answer value → target, falling back to `default`.
    pub fn value_map<'a, I>(mut self, map: I, default: &str) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.def.next = NextRule::ValueMap {
            map: map
                .into_iter()
                .map(|(k, v)| (k.to_string(), StepTarget::parse(v)))
                .collect(),
            default: StepTarget::parse(default),
        };
        self
    }
}
