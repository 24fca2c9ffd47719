//! The view a formula gets of the model while it runs

use super::Evaluator;
use crate::component::{ComponentKind, Time};
use crate::data::Value;
use crate::error::{ModelError, Result};
use crate::graph::UnitId;

/// Returned by field lookups while tracing a record set without records
static TRACE_PLACEHOLDER: Value = Value::Number(0.0);

/// Access to other components, record fields and run-plan parameters
///
/// Every formula receives a `Context`. Calls made through it are memoized
/// per record, and while the model is being validated they are recorded as
/// dependency edges instead of being evaluated.
pub struct Context<'a> {
    evaluator: &'a Evaluator<'a>,
    caller: UnitId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(evaluator: &'a Evaluator<'a>, caller: UnitId) -> Self {
        Self { evaluator, caller }
    }

    /// Name of the component whose formula is running
    pub fn name(&self) -> &'a str {
        let unit = self.evaluator.env().unit(self.caller);
        &unit.name
    }

    /// Last evaluated time step (`T_CALCULATION_MAX`)
    pub fn t_max(&self) -> Time {
        self.evaluator.env().t_max()
    }

    /// Value of a model variable at `t` for the current record
    ///
    /// A component may call itself at other time steps (time recursion).
    pub fn var(&self, name: &str, t: Time) -> Result<f64> {
        let id = self.resolve(name, ComponentKind::Variable)?;
        if self.evaluator.is_tracing() {
            self.evaluator.note_call(self.caller, id, t);
            return Ok(0.0);
        }
        self.evaluator.value(id, t)
    }

    /// Value of a model variable at `t` for another record of its record set
    ///
    /// Only results that were already calculated in this run can be read.
    pub fn var_at(&self, name: &str, t: Time, record: usize) -> Result<f64> {
        let id = self.resolve(name, ComponentKind::Variable)?;
        if self.evaluator.is_tracing() {
            self.evaluator.note_call(self.caller, id, t);
            self.evaluator.note_cross_record();
            return Ok(0.0);
        }
        if self.current_record_of(id) == Some(record) {
            return self.evaluator.value(id, t);
        }
        self.evaluator.lookup(id, t, record)
    }

    /// Value of a constant for the current record
    pub fn constant(&self, name: &str) -> Result<f64> {
        let id = self.resolve(name, ComponentKind::Constant)?;
        if self.evaluator.is_tracing() {
            self.evaluator.note_call(self.caller, id, 0);
            return Ok(0.0);
        }
        self.evaluator.constant_value(id)
    }

    /// Value of a constant for another, already calculated record
    pub fn constant_at(&self, name: &str, record: usize) -> Result<f64> {
        let id = self.resolve(name, ComponentKind::Constant)?;
        if self.evaluator.is_tracing() {
            self.evaluator.note_call(self.caller, id, 0);
            self.evaluator.note_cross_record();
            return Ok(0.0);
        }
        if self.current_record_of(id) == Some(record) {
            return self.evaluator.constant_value(id);
        }
        self.evaluator.lookup(id, 0, record)
    }

    /// Field of the current record in this component's record set
    pub fn field(&self, column: &str) -> Result<&'a Value> {
        let set = self.evaluator.env().unit(self.caller).record_set;
        self.field_of(set, column)
    }

    pub fn field_f64(&self, column: &str) -> Result<f64> {
        self.field(column)?.as_f64()
    }

    pub fn field_str(&self, column: &str) -> Result<&'a str> {
        self.field(column)?.as_str()
    }

    /// Field of the linked record in another record set
    pub fn field_in(&self, record_set: &str, column: &str) -> Result<&'a Value> {
        let set = self
            .evaluator
            .env()
            .record_sets
            .iter()
            .position(|s| s.name() == record_set)
            .ok_or_else(|| ModelError::UnknownRecordSet(record_set.to_string()))?;
        self.field_of(set, column)
    }

    /// Position of the current record in this component's record set
    pub fn record(&self) -> Option<usize> {
        let set = self.evaluator.env().unit(self.caller).record_set;
        self.evaluator.current_record(set)
    }

    /// Run-plan parameter of the active version
    pub fn param_value(&self, name: &str) -> Result<&'a Value> {
        let runplan = self.evaluator.env().runplan;
        runplan.get(name)
    }

    pub fn param(&self, name: &str) -> Result<f64> {
        self.param_value(name)?.as_f64()
    }

    pub fn param_str(&self, name: &str) -> Result<&'a str> {
        self.param_value(name)?.as_str()
    }

    fn resolve(&self, name: &str, expected: ComponentKind) -> Result<UnitId> {
        let env = self.evaluator.env();
        let id = env.resolve(name)?;
        if env.unit(id).kind() != expected {
            return Err(ModelError::KindMismatch {
                name: name.to_string(),
                expected: expected.label(),
            });
        }
        Ok(id)
    }

    fn current_record_of(&self, id: UnitId) -> Option<usize> {
        let set = self.evaluator.env().unit(id).record_set;
        self.evaluator.current_record(set)
    }

    fn field_of(&self, set: usize, column: &str) -> Result<&'a Value> {
        let record_sets = self.evaluator.env().record_sets;
        let record_set = &record_sets[set];
        match self.evaluator.current_record(set) {
            Some(record) => record_set.get(record, column),
            None if self.evaluator.is_tracing() => {
                record_set.column_index(column)?;
                Ok(&TRACE_PLACEHOLDER)
            }
            None => Err(ModelError::UnlinkedRecord {
                set: record_set.name().to_string(),
                id: self.evaluator.driver_id(),
            }),
        }
    }
}
