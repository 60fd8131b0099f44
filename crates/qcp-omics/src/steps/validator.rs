//! Validation of requested step plans against the registry.
//!
//! All violations are collected rather than stopping at the first one, so the
//! caller can report every problem with a plan at once.

use super::registry::{Category, MethodRule, StepDefinition, StepRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A step as requested by the user, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRequest {
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl StepRequest {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            method: None,
        }
    }

    pub fn with_method(step: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            method: Some(method.into()),
        }
    }
}

/// Kinds of plan violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    UnknownStep,
    OutOfOrder,
    InvalidMethod,
    UnsupportedMethod,
    IncompleteOrMisorderedForRaw,
}

/// One broken constraint in a requested plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanViolation {
    pub kind: ViolationKind,
    /// Step name, or category name for raw-dataset violations.
    pub step: String,
    /// Index in the requested list, when the violation concerns a single entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    pub message: String,
}

impl PlanViolation {
    pub fn new(
        kind: ViolationKind,
        step: impl Into<String>,
        position: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            step: step.into(),
            position,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PlanViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(pos) => write!(f, "[{:?}] '{}' at #{}: {}", self.kind, self.step, pos, self.message),
            None => write!(f, "[{:?}] '{}': {}", self.kind, self.step, self.message),
        }
    }
}

/// A plan entry ready for execution.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub name: String,
    pub method: Option<String>,
    /// `None` only in best-effort plans, for names the registry does not know.
    pub definition: Option<&'static StepDefinition>,
}

/// Ordered list of steps handed to the executor.
#[derive(Debug, Clone, Default)]
pub struct StepPlan {
    entries: Vec<PlanEntry>,
}

impl StepPlan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a plan without checking any constraint.
    ///
    /// Unknown names are kept with no definition and skipped by the executor.
    pub fn best_effort(requests: &[StepRequest], registry: &'static StepRegistry) -> Self {
        let entries = requests
            .iter()
            .map(|r| {
                let definition = registry.get(&r.step);
                PlanEntry {
                    name: r.step.clone(),
                    method: match definition {
                        Some(def) => def.resolve_method(r.method.as_deref()),
                        None => r.method.clone(),
                    },
                    definition,
                }
            })
            .collect();
        Self { entries }
    }
}

/// Validate requested steps against the registry.
///
/// Returns the resolved plan, or every violation found.
pub fn validate(
    requests: &[StepRequest],
    is_raw: bool,
    registry: &'static StepRegistry,
) -> Result<StepPlan, Vec<PlanViolation>> {
    let mut violations = Vec::new();
    let mut entries = Vec::with_capacity(requests.len());
    let mut highest: Option<Category> = None;

    for (pos, request) in requests.iter().enumerate() {
        let Some(definition) = registry.get(&request.step) else {
            violations.push(PlanViolation::new(
                ViolationKind::UnknownStep,
                &request.step,
                Some(pos),
                "step is not defined in the registry",
            ));
            continue;
        };

        match highest {
            Some(prev) if definition.category < prev => {
                violations.push(PlanViolation::new(
                    ViolationKind::OutOfOrder,
                    &request.step,
                    Some(pos),
                    format!(
                        "{} step requested after a {} step",
                        definition.category, prev
                    ),
                ));
            }
            _ => highest = Some(definition.category),
        }

        if let Some(violation) = check_method(definition, request.method.as_deref(), pos) {
            violations.push(violation);
        }

        entries.push(PlanEntry {
            name: request.step.clone(),
            method: definition.resolve_method(request.method.as_deref()),
            definition: Some(definition),
        });
    }

    if is_raw {
        violations.extend(check_raw_contiguity(&entries, registry));
    }

    if violations.is_empty() {
        debug!("Validated plan with {} step(s)", entries.len());
        Ok(StepPlan { entries })
    } else {
        debug!("Plan rejected with {} violation(s)", violations.len());
        Err(violations)
    }
}

fn check_method(definition: &StepDefinition, method: Option<&str>, pos: usize) -> Option<PlanViolation> {
    match (definition.method, method) {
        (MethodRule::Forbidden, Some(m)) => Some(PlanViolation::new(
            ViolationKind::UnsupportedMethod,
            definition.name,
            Some(pos),
            format!("step takes no method, got '{m}'"),
        )),
        (rule, None) if rule.is_required() => Some(PlanViolation::new(
            ViolationKind::InvalidMethod,
            definition.name,
            Some(pos),
            format!("a method is required, one of: {}", describe_allowed(rule)),
        )),
        (rule, Some(m)) if !rule.allows(m) => Some(PlanViolation::new(
            ViolationKind::InvalidMethod,
            definition.name,
            Some(pos),
            format!("method '{m}' is not one of: {}", describe_allowed(rule)),
        )),
        _ => None,
    }
}

fn describe_allowed(rule: MethodRule) -> String {
    match rule.allowed() {
        Some(values) => values.join(", "),
        None => "any".to_string(),
    }
}

/// Raw datasets must go through the categories in full registry order.
///
/// Every touched category must be a registry-order prefix, `qc` must be
/// touched, and every category before the latest touched one must be complete.
fn check_raw_contiguity(entries: &[PlanEntry], registry: &StepRegistry) -> Vec<PlanViolation> {
    let mut selected: BTreeMap<Category, Vec<&str>> = BTreeMap::new();
    for entry in entries {
        if let Some(def) = entry.definition {
            selected.entry(def.category).or_default().push(def.name);
        }
    }

    let Some(latest) = selected.keys().max().copied() else {
        return Vec::new();
    };

    let mut violations = Vec::new();
    for category in Category::ALL.into_iter().filter(|c| *c <= latest) {
        let expected: Vec<&str> = registry.category_steps(category).map(|s| s.name).collect();
        let chosen = selected.get(&category).map(Vec::as_slice).unwrap_or(&[]);

        if chosen.is_empty() {
            violations.push(PlanViolation::new(
                ViolationKind::IncompleteOrMisorderedForRaw,
                category.display_name(),
                None,
                format!(
                    "raw datasets must run the {category} steps before any later category: {}",
                    expected.join(", ")
                ),
            ));
            continue;
        }

        let is_prefix = chosen.len() <= expected.len() && expected[..chosen.len()] == *chosen;
        if !is_prefix {
            violations.push(PlanViolation::new(
                ViolationKind::IncompleteOrMisorderedForRaw,
                category.display_name(),
                None,
                format!(
                    "raw datasets must select {category} steps in registry order starting from '{}'",
                    expected[0]
                ),
            ));
        } else if category < latest && chosen.len() < expected.len() {
            violations.push(PlanViolation::new(
                ViolationKind::IncompleteOrMisorderedForRaw,
                category.display_name(),
                None,
                format!(
                    "raw datasets must complete {category} before {latest}, missing: {}",
                    expected[chosen.len()..].join(", ")
                ),
            ));
        }
    }
    violations
}
