//! Model components: time-varying variables and constants
//!
//! Both variants share the [`Component`] capability set: a unique name, an
//! assigned formula, and the record set the component reads from. Arity is
//! fixed by the [`Formula`] variant and checked when the model is validated.

mod formula;
mod variable;
mod constant;

pub use formula::{ConstantFn, Formula, Time, TimeFn};
pub use variable::ModelVariable;
pub use constant::Constant;

use crate::error::{ModelError, Result};

/// Which variant a component is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Evaluated for every time step
    Variable,
    /// Evaluated once per record
    Constant,
}

impl ComponentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Variable => "model variable",
            ComponentKind::Constant => "constant",
        }
    }

    /// Arity a formula must have for this kind
    pub fn expected_arity(&self) -> usize {
        match self {
            ComponentKind::Variable => 1,
            ComponentKind::Constant => 0,
        }
    }

    fn arity_description(&self) -> &'static str {
        match self {
            ComponentKind::Variable => "exactly one parameter (t)",
            ComponentKind::Constant => "no parameters",
        }
    }
}

/// Capabilities shared by model variables and constants
pub trait Component {
    fn name(&self) -> &str;

    fn kind(&self) -> ComponentKind;

    fn formula(&self) -> Option<&Formula>;

    /// Record set named explicitly for this component, if any
    fn record_set(&self) -> Option<&str>;

    /// Check that a formula of the right arity is bound
    fn validate(&self) -> Result<&Formula> {
        let formula = self
            .formula()
            .ok_or_else(|| ModelError::UnboundFormula(self.name().to_string()))?;
        if formula.arity() != self.kind().expected_arity() {
            return Err(ModelError::FormulaArity {
                name: self.name().to_string(),
                kind: self.kind().label(),
                expected: self.kind().arity_description(),
            });
        }
        Ok(formula)
    }
}
