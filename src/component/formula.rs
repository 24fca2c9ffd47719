//! Formulas bound to model components

use std::fmt;
use std::sync::Arc;

use crate::engine::Context;
use crate::error::Result;

/// Time index of a projection period
pub type Time = i64;

/// Formula of a time-varying model variable
pub type TimeFn = dyn Fn(&Context<'_>, Time) -> Result<f64> + Send + Sync;

/// Formula of a constant
pub type ConstantFn = dyn Fn(&Context<'_>) -> Result<f64> + Send + Sync;

/// A formula with its arity fixed by the variant
#[derive(Clone)]
pub enum Formula {
    /// Takes the time index as its only argument
    Time(Arc<TimeFn>),
    /// Takes no arguments
    Constant(Arc<ConstantFn>),
}

impl Formula {
    pub fn time<F>(f: F) -> Self
    where
        F: Fn(&Context<'_>, Time) -> Result<f64> + Send + Sync + 'static,
    {
        Formula::Time(Arc::new(f))
    }

    pub fn constant<F>(f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Result<f64> + Send + Sync + 'static,
    {
        Formula::Constant(Arc::new(f))
    }

    /// Number of parameters the formula accepts
    pub fn arity(&self) -> usize {
        match self {
            Formula::Time(_) => 1,
            Formula::Constant(_) => 0,
        }
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Time(_) => f.write_str("Formula::Time(fn(t))"),
            Formula::Constant(_) => f.write_str("Formula::Constant(fn())"),
        }
    }
}
