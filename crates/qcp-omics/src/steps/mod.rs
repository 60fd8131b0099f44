//! Step catalog and plan validation.
//!
//! The [`StepRegistry`] is the fixed universe of named steps, grouped into
//! ordered [`Category`] values. [`validate`] checks a requested ordering
//! against the registry and resolves every entry to its [`StepDefinition`].

mod registry;
mod validator;

pub use registry::{
    Category, MethodRule, StepDefinition, StepKind, StepRegistry, registry,
};
pub use validator::{PlanEntry, PlanViolation, StepPlan, StepRequest, ViolationKind, validate};
