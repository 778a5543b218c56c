//! The step catalog — every step definition, validated at build time.
//!
//! Built once at startup and passed explicitly (as `Arc<Catalog>`) to the
//! engine operations; there is no global lookup. Build-time validation
//! guarantees the invariant the resolver relies on: every id a rule can
//! route to is either a defined step or a terminal outcome.

use std::collections::HashMap;

use crate::error::CatalogError;

use super::expr::Expr;
use super::step::{NextRule, StepBuilder, StepDefinition, StepTarget};

/// Immutable, process-wide catalog of step definitions.
#[derive(Debug)]
pub struct Catalog {
    steps: Vec<StepDefinition>,
    index: HashMap<String, usize>,
    entry: String,
}

impl Catalog {
    pub fn builder(entry: &str) -> CatalogBuilder {
        CatalogBuilder {
            entry: entry.to_string(),
            steps: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Look up a step definition by id.
    pub fn get(&self, id: &str) -> Option<&StepDefinition> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// The id of the first step of the flow.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in authoring order.
    pub fn iter(&self) -> impl Iterator<Item = &StepDefinition> {
        self.steps.iter()
    }

    /// Subset of steps (authoring order) for a partial UI view, e.g. the
    /// screener section served to the web form.
    pub fn project(&self, ids: &[&str]) -> Vec<&StepDefinition> {
        self.steps
            .iter()
            .filter(|s| ids.contains(&s.id.as_str()))
            .collect()
    }
}

/// Collects steps and validates the whole catalog on `build`.
pub struct CatalogBuilder {
    entry: String,
    steps: Vec<StepDefinition>,
    errors: Vec<CatalogError>,
}

impl CatalogBuilder {
    pub fn step(mut self, builder: StepBuilder) -> Self {
        for (field, e) in &builder.errors {
            self.errors.push(CatalogError::BadExpression {
                step: builder.def.id.clone(),
                field: field.clone(),
                message: e.to_string(),
            });
        }
        self.steps.push(builder.def);
        self
    }

    /// Validate and freeze the catalog. Returns the first problem found:
    /// duplicate ids, a missing entry step, an expression that failed to
    /// parse, or a rule referencing an id that is neither a step nor a
    /// terminal.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        let mut index = HashMap::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            if index.insert(step.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateStep(step.id.clone()));
            }
        }

        if !index.contains_key(&self.entry) {
            return Err(CatalogError::MissingEntry(self.entry));
        }

        let catalog = Catalog {
            steps: self.steps,
            index,
            entry: self.entry,
        };
        catalog.check_references()?;
        Ok(catalog)
    }
}

impl Catalog {
    fn check_references(&self) -> Result<(), CatalogError> {
        for step in &self.steps {
            for target in rule_targets(&step.next) {
                if let StepTarget::Step(id) = &target {
                    if !self.contains(id) {
                        return Err(CatalogError::UnknownReference {
                            step: step.id.clone(),
                            target: id.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Every target a rule can statically route to.
///
/// For conditional rules this walks the ternary result positions: string
/// literals there are jump targets, while computed results (none in the
/// shipped survey) can only be checked at resolve time, where the
/// fail-closed path covers them.
fn rule_targets(rule: &NextRule) -> Vec<StepTarget> {
    match rule {
        NextRule::Literal(t) => vec![t.clone()],
        NextRule::RangeSplit {
            in_range,
            out_of_range,
            unknown,
        } => {
            let mut targets = vec![in_range.clone(), out_of_range.clone()];
            targets.extend(unknown.clone());
            targets
        }
        NextRule::ValueMap { map, default } => {
            let mut targets: Vec<_> = map.iter().map(|(_, t)| t.clone()).collect();
            targets.push(default.clone());
            targets
        }
        NextRule::Conditional(expr) => {
            let mut out = Vec::new();
            collect_result_targets(expr, &mut out);
            out
        }
    }
}

fn collect_result_targets(expr: &Expr, out: &mut Vec<StepTarget>) {
    match expr {
        Expr::Ternary {
            then, otherwise, ..
        } => {
            collect_result_targets(then, out);
            collect_result_targets(otherwise, out);
        }
        Expr::Str(s) => out.push(StepTarget::parse(s)),
        _ => {}
    }
}
