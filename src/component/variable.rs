//! Time-varying model variables

use std::fmt;

use super::{Component, ComponentKind, Formula, Time};
use crate::engine::Context;
use crate::error::Result;

/// A variable evaluated for every time step in `[0, T_CALCULATION_MAX]`
///
/// ```ignore
/// let premium = ModelVariable::new("premium")
///     .assign(|ctx, t| Ok(if t == 0 { ctx.field_f64("premium")? } else { 0.0 }));
/// ```
#[derive(Debug, Clone)]
pub struct ModelVariable {
    name: String,
    formula: Option<Formula>,
    record_set: Option<String>,
}

impl ModelVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formula: None,
            record_set: None,
        }
    }

    /// Read fields from the named record set instead of the primary one
    pub fn in_record_set(mut self, record_set: impl Into<String>) -> Self {
        self.record_set = Some(record_set.into());
        self
    }

    /// Bind a time-indexed formula, replacing any previous one
    pub fn assign<F>(self, f: F) -> Self
    where
        F: Fn(&Context<'_>, Time) -> Result<f64> + Send + Sync + 'static,
    {
        self.assign_formula(Formula::time(f))
    }

    /// Bind any formula; arity is checked when the model is validated
    pub fn assign_formula(mut self, formula: Formula) -> Self {
        self.formula = Some(formula);
        self
    }
}

impl Component for ModelVariable {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Variable
    }

    fn formula(&self) -> Option<&Formula> {
        self.formula.as_ref()
    }

    fn record_set(&self) -> Option<&str> {
        self.record_set.as_deref()
    }
}

impl fmt::Display for ModelVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelVariable: {}", self.name)
    }
}
