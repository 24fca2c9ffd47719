//! Recursive, memoized evaluation of model components
//!
//! The engine works on validated [`Unit`]s. It has two modes:
//! - **tracing**: each formula runs once per sample time in an instrumented
//!   context that records the components it calls (graph edges), whether it
//!   recurses forward or backward in time, and whether it reads other records;
//! - **calculation**: for the selected record, every time step of every
//!   component is computed at most once and cached.

mod cache;
mod context;
mod evaluator;

pub use cache::{CacheStats, Slot, UnitCache};
pub use context::Context;
pub use evaluator::{trace_all, Evaluator, TraceReport};

use std::collections::HashMap;

use crate::component::{ComponentKind, Formula, Time};
use crate::data::{RecordSet, Runplan};
use crate::error::{ModelError, Result};
use crate::graph::UnitId;
use crate::settings::Settings;

/// A validated component, ready to be evaluated
#[derive(Debug, Clone)]
pub struct Unit {
    pub name: String,
    pub formula: Formula,

    /// Index of the record set the component reads from
    pub record_set: usize,

    /// Fill time steps from `T_CALCULATION_MAX` down to 0 (backward recursion)
    pub descending: bool,
}

impl Unit {
    pub fn kind(&self) -> ComponentKind {
        match self.formula {
            Formula::Time(_) => ComponentKind::Variable,
            Formula::Constant(_) => ComponentKind::Constant,
        }
    }
}

/// Everything an evaluator reads, borrowed from the model
#[derive(Clone, Copy)]
pub struct Environment<'m> {
    pub units: &'m [Unit],
    pub index: &'m HashMap<String, UnitId>,
    pub record_sets: &'m [RecordSet],
    pub runplan: &'m Runplan,
    pub settings: &'m Settings,
}

impl<'m> Environment<'m> {
    pub fn resolve(&self, name: &str) -> Result<UnitId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownComponent(name.to_string()))
    }

    pub fn unit(&self, id: UnitId) -> &'m Unit {
        &self.units[id.index()]
    }

    /// Last evaluated time step
    pub fn t_max(&self) -> Time {
        self.settings.t_calculation_max
    }
}
