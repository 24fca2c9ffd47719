//! Time-invariant constants

use std::fmt;

use super::{Component, ComponentKind, Formula};
use crate::engine::Context;
use crate::error::Result;

/// A value computed once per record
#[derive(Debug, Clone)]
pub struct Constant {
    name: String,
    formula: Option<Formula>,
    record_set: Option<String>,
}

impl Constant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formula: None,
            record_set: None,
        }
    }

    pub fn in_record_set(mut self, record_set: impl Into<String>) -> Self {
        self.record_set = Some(record_set.into());
        self
    }

    /// Bind a zero-argument formula, replacing any previous one
    pub fn assign<F>(self, f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Result<f64> + Send + Sync + 'static,
    {
        self.assign_formula(Formula::constant(f))
    }

    pub fn assign_formula(mut self, formula: Formula) -> Self {
        self.formula = Some(formula);
        self
    }
}

impl Component for Constant {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Constant
    }

    fn formula(&self) -> Option<&Formula> {
        self.formula.as_ref()
    }

    fn record_set(&self) -> Option<&str> {
        self.record_set.as_deref()
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constant: {}", self.name)
    }
}
