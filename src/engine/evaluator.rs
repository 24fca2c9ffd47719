//! Per-record evaluator and dependency tracer

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use super::cache::{CacheStats, Slot, UnitCache};
use super::{Context, Environment};
use crate::component::{ComponentKind, Formula, Time};
use crate::error::{ModelError, Result};
use crate::graph::UnitId;

/// What tracing a single formula revealed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceReport {
    /// Other components called, in first-call order
    pub children: Vec<UnitId>,

    /// The formula calls itself at a later time step
    pub descending: bool,

    /// The formula reads results of other records
    pub cross_record: bool,
}

#[derive(Debug, Default)]
struct Trace {
    sample: Time,
    report: TraceReport,
}

/// Evaluates components for one record at a time
///
/// All state is interior so that formulas, which only get a shared
/// [`Context`], can recurse back into the evaluator. An evaluator is owned by
/// a single worker; nothing in it is shared between threads.
pub struct Evaluator<'m> {
    env: Environment<'m>,
    caches: Vec<RefCell<UnitCache>>,

    /// Selected record per record set (`None` when no record is linked)
    current: Vec<Cell<Option<usize>>>,

    /// Identifier of the record driving the current calculation
    driver_id: RefCell<String>,

    /// Evaluations in progress, innermost last
    stack: RefCell<Vec<(UnitId, Time)>>,

    tracing: bool,
    trace: RefCell<Trace>,

    retain_history: bool,
    timings: Option<RefCell<Vec<Duration>>>,
}

/// Trace every unit of the environment, in declaration order
///
/// The first record of each record set is selected so that field lookups
/// return realistic values; calls to other components return 0.
pub fn trace_all(env: Environment<'_>) -> Result<Vec<TraceReport>> {
    let tracer = Evaluator::tracer(env);
    (0..env.units.len())
        .map(|i| tracer.trace_unit(UnitId(i)))
        .collect()
}

/// Stack depth from which time recursion is resolved by filling from the
/// far end of the domain instead of recursing further
const DEEP_RECURSION: usize = 64;

/// Hard limit on nested evaluations; exceeding it is an error
pub const MAX_DEPTH: usize = 512;

/// Time steps at which time-indexed formulas are sampled while tracing
fn sample_times(t_max: Time) -> Vec<Time> {
    let mut samples: Vec<Time> = Vec::with_capacity(4);
    for t in [0, 1, t_max / 2, t_max] {
        if t <= t_max && !samples.contains(&t) {
            samples.push(t);
        }
    }
    samples
}

impl<'m> Evaluator<'m> {
    /// Create an evaluator with empty caches
    pub fn new(env: Environment<'m>, retain_history: bool) -> Self {
        let steps = (env.t_max() + 1) as usize;
        let caches = env
            .units
            .iter()
            .map(|unit| {
                let len = match unit.kind() {
                    ComponentKind::Variable => steps,
                    ComponentKind::Constant => 1,
                };
                RefCell::new(UnitCache::new(len))
            })
            .collect();

        let timings = env
            .settings
            .save_runtime
            .then(|| RefCell::new(vec![Duration::ZERO; env.units.len()]));

        Self {
            env,
            caches,
            current: env.record_sets.iter().map(|_| Cell::new(None)).collect(),
            driver_id: RefCell::new(String::new()),
            stack: RefCell::new(Vec::new()),
            tracing: false,
            trace: RefCell::new(Trace::default()),
            retain_history,
            timings,
        }
    }

    fn tracer(env: Environment<'m>) -> Self {
        Self {
            env,
            caches: Vec::new(),
            current: env
                .record_sets
                .iter()
                .map(|set| Cell::new((!set.is_empty()).then_some(0)))
                .collect(),
            driver_id: RefCell::new(String::new()),
            stack: RefCell::new(Vec::new()),
            tracing: true,
            trace: RefCell::new(Trace::default()),
            retain_history: false,
            timings: None,
        }
    }

    fn trace_unit(&self, id: UnitId) -> Result<TraceReport> {
        *self.trace.borrow_mut() = Trace::default();
        let ctx = Context::new(self, id);

        match &self.env.unit(id).formula {
            Formula::Time(formula) => {
                for t in sample_times(self.env.t_max()) {
                    self.trace.borrow_mut().sample = t;
                    formula(&ctx, t)?;
                }
            }
            Formula::Constant(formula) => {
                formula(&ctx)?;
            }
        }

        let report = std::mem::take(&mut self.trace.borrow_mut().report);
        log::debug!(
            "traced '{}': children={:?} descending={} cross_record={}",
            self.env.unit(id).name,
            report.children,
            report.descending,
            report.cross_record
        );
        Ok(report)
    }

    pub(super) fn env(&self) -> Environment<'m> {
        self.env
    }

    pub(super) fn is_tracing(&self) -> bool {
        self.tracing
    }

    /// Record a call from `caller` to `callee` at time `t` while tracing
    pub(super) fn note_call(&self, caller: UnitId, callee: UnitId, t: Time) {
        let mut trace = self.trace.borrow_mut();
        if callee == caller {
            if t > trace.sample {
                trace.report.descending = true;
            }
        } else if !trace.report.children.contains(&callee) {
            trace.report.children.push(callee);
        }
    }

    pub(super) fn note_cross_record(&self) {
        self.trace.borrow_mut().report.cross_record = true;
    }

    /// Select `record` of record set `set`, linking every other record set
    /// to its record with the same identifier
    pub fn select(&self, set: usize, record: usize) -> Result<()> {
        let id = self.env.record_sets[set].id(record)?;
        for (i, other) in self.env.record_sets.iter().enumerate() {
            let position = if i == set { Some(record) } else { other.position_of(&id) };
            self.current[i].set(position);
        }
        *self.driver_id.borrow_mut() = id;
        Ok(())
    }

    /// Record currently selected on a record set
    pub fn current_record(&self, set: usize) -> Option<usize> {
        self.current[set].get()
    }

    pub(super) fn driver_id(&self) -> String {
        self.driver_id.borrow().clone()
    }

    /// Clear every cache for the newly selected records
    pub fn reset(&self) {
        for (unit, cache) in self.env.units.iter().zip(&self.caches) {
            cache
                .borrow_mut()
                .reset(self.current[unit.record_set].get(), self.retain_history);
        }
        self.stack.borrow_mut().clear();
    }

    /// Compute every time step of a component for the current record
    pub fn evaluate(&self, id: UnitId) -> Result<()> {
        let started = Instant::now();
        let unit = self.env.unit(id);

        match unit.kind() {
            ComponentKind::Variable => {
                let t_max = self.env.t_max();
                if unit.descending {
                    for t in (0..=t_max).rev() {
                        self.value(id, t)?;
                    }
                } else {
                    for t in 0..=t_max {
                        self.value(id, t)?;
                    }
                }
            }
            ComponentKind::Constant => {
                self.constant_value(id)?;
            }
        }

        if let Some(timings) = &self.timings {
            timings.borrow_mut()[id.index()] += started.elapsed();
        }
        Ok(())
    }

    /// Value of a model variable at `t` for the current record
    ///
    /// Outside `[0, T_CALCULATION_MAX]` the value is 0 and the formula is not
    /// invoked, which is what lets edge-anchored recursion terminate.
    pub fn value(&self, id: UnitId, t: Time) -> Result<f64> {
        if t < 0 || t > self.env.t_max() {
            return Ok(0.0);
        }
        let unit = self.env.unit(id);
        let Formula::Time(formula) = &unit.formula else {
            return Err(ModelError::KindMismatch {
                name: unit.name.clone(),
                expected: ComponentKind::Variable.label(),
            });
        };

        let index = t as usize;
        if self.stack.borrow().len() >= DEEP_RECURSION && self.slot(id, index) == Slot::Empty {
            self.fill_towards(id, t)?;
        }
        if let Some(v) = self.claim(id, index, t)? {
            return Ok(v);
        }
        let result = self.invoke(id, t, || formula(&Context::new(self, id), t));
        self.settle(id, index, result)
    }

    /// Value of a constant for the current record, computed on first use
    pub fn constant_value(&self, id: UnitId) -> Result<f64> {
        let unit = self.env.unit(id);
        let Formula::Constant(formula) = &unit.formula else {
            return Err(ModelError::KindMismatch {
                name: unit.name.clone(),
                expected: ComponentKind::Constant.label(),
            });
        };

        if let Some(v) = self.claim(id, 0, 0)? {
            return Ok(v);
        }
        let result = self.invoke(id, 0, || formula(&Context::new(self, id)));
        self.settle(id, 0, result)
    }

    fn slot(&self, id: UnitId, index: usize) -> Slot {
        self.caches[id.index()].borrow().slot(index)
    }

    /// Fill the slots between `t` and the far end of the domain one by one
    ///
    /// Runs when `id` is already on the stack at another time step, so the
    /// recursion walks through time. Filling from the end it walks towards
    /// keeps every step one level deep, whatever direction tracing saw.
    fn fill_towards(&self, id: UnitId, t: Time) -> Result<()> {
        let outer = self
            .stack
            .borrow()
            .iter()
            .rev()
            .find(|(unit, _)| *unit == id)
            .map(|&(_, outer_t)| outer_t);
        let Some(outer) = outer else {
            return Ok(());
        };

        let t_max = self.env.t_max();
        if outer < t && t < t_max && self.slot(id, (t + 1) as usize) == Slot::Empty {
            for s in ((t + 1)..=t_max).rev() {
                self.value(id, s)?;
            }
        } else if outer > t && t > 0 && self.slot(id, (t - 1) as usize) == Slot::Empty {
            for s in 0..t {
                self.value(id, s)?;
            }
        }
        Ok(())
    }

    /// Cached result, or mark the slot as in progress
    fn claim(&self, id: UnitId, index: usize, t: Time) -> Result<Option<f64>> {
        let mut cache = self.caches[id.index()].borrow_mut();
        match cache.slot(index) {
            Slot::Ready(v) => {
                cache.record_hit();
                Ok(Some(v))
            }
            Slot::InProgress => Err(self.cycle_error(id, t)),
            Slot::Empty => {
                cache.record_miss();
                cache.set(index, Slot::InProgress);
                Ok(None)
            }
        }
    }

    fn invoke<F>(&self, id: UnitId, t: Time, f: F) -> Result<f64>
    where
        F: FnOnce() -> Result<f64>,
    {
        let depth = self.stack.borrow().len();
        if depth >= MAX_DEPTH {
            return Err(ModelError::RecursionDepth {
                name: self.env.unit(id).name.clone(),
                t,
                depth,
            });
        }
        self.stack.borrow_mut().push((id, t));
        let result = f();
        self.stack.borrow_mut().pop();
        result
    }

    fn settle(&self, id: UnitId, index: usize, result: Result<f64>) -> Result<f64> {
        let slot = match &result {
            Ok(v) => Slot::Ready(*v),
            Err(_) => Slot::Empty,
        };
        self.caches[id.index()].borrow_mut().set(index, slot);
        result
    }

    fn cycle_error(&self, id: UnitId, t: Time) -> ModelError {
        let stack = self.stack.borrow();
        let start = stack.iter().position(|&entry| entry == (id, t)).unwrap_or(0);
        let mut names: Vec<&str> = stack[start..]
            .iter()
            .map(|(unit, _)| self.env.unit(*unit).name.as_str())
            .collect();
        names.push(self.env.unit(id).name.as_str());
        ModelError::Cycle { path: names.join(" -> "), t }
    }

    /// Already computed result for the current record; never evaluates
    pub fn read(&self, id: UnitId, t: Time) -> Result<f64> {
        if t < 0 || t > self.env.t_max() {
            return Ok(0.0);
        }
        let unit = self.env.unit(id);
        let index = match unit.kind() {
            ComponentKind::Variable => t as usize,
            ComponentKind::Constant => 0,
        };

        let cache = self.caches[id.index()].borrow();
        match cache.slot(index) {
            Slot::Ready(v) => Ok(v),
            _ if unit.kind() == ComponentKind::Constant => {
                Err(ModelError::ConstantNotCalculated(unit.name.clone()))
            }
            _ => Err(ModelError::RecordNotCalculated {
                name: unit.name.clone(),
                record: cache.record().unwrap_or_default(),
            }),
        }
    }

    /// Result of another record, from retained history; never evaluates
    pub fn lookup(&self, id: UnitId, t: Time, record: usize) -> Result<f64> {
        if t < 0 || t > self.env.t_max() {
            return Ok(0.0);
        }
        let unit = self.env.unit(id);
        let index = match unit.kind() {
            ComponentKind::Variable => t as usize,
            ComponentKind::Constant => 0,
        };
        let cache = self.caches[id.index()].borrow();
        match cache.lookup(record, index) {
            Some(v) => Ok(v),
            None if !self.retain_history => Err(ModelError::HistoryNotRetained(unit.name.clone())),
            None => Err(ModelError::RecordNotCalculated {
                name: unit.name.clone(),
                record,
            }),
        }
    }


    /// Time spent per component since the last call (empty unless SAVE_RUNTIME)
    pub fn take_timings(&self) -> Vec<Duration> {
        match &self.timings {
            Some(timings) => {
                let mut timings = timings.borrow_mut();
                let taken = timings.clone();
                timings.iter_mut().for_each(|d| *d = Duration::ZERO);
                taken
            }
            None => Vec::new(),
        }
    }

    /// Cache hits and misses per component (empty unless SAVE_RUNTIME)
    pub fn cache_stats(&self) -> Vec<CacheStats> {
        if self.timings.is_none() {
            return Vec::new();
        }
        self.caches.iter().map(|cache| cache.borrow().stats()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RecordSet, Runplan};
    use crate::engine::Unit;
    use crate::settings::Settings;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixture {
        units: Vec<Unit>,
        index: HashMap<String, UnitId>,
        record_sets: Vec<RecordSet>,
        runplan: Runplan,
        settings: Settings,
    }

    impl Fixture {
        fn new(formulas: Vec<(&str, Formula)>, t_max: Time) -> Self {
            let mut policy = RecordSet::from_columns(
                "policy",
                vec![
                    ("id", vec![1.into(), 2.into()]),
                    ("premium", vec![100.into(), 250.into()]),
                ],
            )
            .unwrap();
            policy.initialize("id").unwrap();

            let units: Vec<Unit> = formulas
                .into_iter()
                .map(|(name, formula)| Unit {
                    name: name.to_string(),
                    formula,
                    record_set: 0,
                    descending: false,
                })
                .collect();
            let index = units
                .iter()
                .enumerate()
                .map(|(i, u)| (u.name.clone(), UnitId(i)))
                .collect();

            Self {
                units,
                index,
                record_sets: vec![policy],
                runplan: Runplan::empty(),
                settings: Settings::default().with_id_column("id").with_horizon(t_max, t_max),
            }
        }

        fn env(&self) -> Environment<'_> {
            Environment {
                units: &self.units,
                index: &self.index,
                record_sets: &self.record_sets,
                runplan: &self.runplan,
                settings: &self.settings,
            }
        }

        /// Apply trace results the way model validation does
        fn traced(mut self) -> Self {
            let reports = trace_all(self.env()).unwrap();
            for (unit, report) in self.units.iter_mut().zip(reports) {
                unit.descending = report.descending;
            }
            self
        }
    }

    #[test]
    fn test_trace_children_in_first_call_order_without_self() {
        let fixture = Fixture::new(
            vec![
                ("a", Formula::time(|ctx, t| Ok(ctx.var("b", t)? + ctx.constant("c")? + ctx.var("a", t - 1)?))),
                ("b", Formula::time(|ctx, t| Ok(ctx.constant("c")? * t as f64))),
                ("c", Formula::constant(|_| Ok(10.0))),
            ],
            12,
        );

        let reports = trace_all(fixture.env()).unwrap();
        assert_eq!(reports[0].children, vec![UnitId(1), UnitId(2)]);
        assert_eq!(reports[1].children, vec![UnitId(2)]);
        assert!(reports[2].children.is_empty());
        assert!(!reports[0].descending);
    }

    #[test]
    fn test_trace_detects_backward_recursion_and_cross_record() {
        let fixture = Fixture::new(
            vec![
                ("back", Formula::time(|ctx, t| {
                    if t == ctx.t_max() {
                        return Ok(100.0);
                    }
                    Ok(ctx.var("back", t + 1)? - 1.0)
                })),
                ("peer", Formula::time(|ctx, t| ctx.var_at("back", t, 0))),
            ],
            12,
        );

        let reports = trace_all(fixture.env()).unwrap();
        assert!(reports[0].descending);
        assert!(reports[1].cross_record);
        assert_eq!(reports[1].children, vec![UnitId(0)]);
    }

    #[test]
    fn test_forward_and_backward_recursion() {
        let fixture = Fixture::new(
            vec![
                ("f", Formula::time(|ctx, t| {
                    if t == 0 {
                        return Ok(0.0);
                    }
                    Ok(ctx.var("f", t - 1)? + 2.0)
                })),
                ("g", Formula::time(|ctx, t| {
                    if t == ctx.t_max() {
                        return Ok(100.0);
                    }
                    Ok(ctx.var("g", t + 1)? - 1.0)
                })),
            ],
            1440,
        )
        .traced();

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();
        evaluator.evaluate(UnitId(0)).unwrap();
        evaluator.evaluate(UnitId(1)).unwrap();

        assert_eq!(evaluator.read(UnitId(0), 1).unwrap(), 2.0);
        assert_eq!(evaluator.read(UnitId(0), 2).unwrap(), 4.0);
        assert_eq!(evaluator.read(UnitId(1), 1439).unwrap(), 99.0);
        assert_eq!(evaluator.read(UnitId(1), 0).unwrap(), 100.0 - 1440.0);
    }

    #[test]
    fn test_out_of_domain_returns_zero_without_invoking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fixture = Fixture::new(
            vec![(
                "mv",
                Formula::time(move |_, t| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(t as f64)
                }),
            )],
            10,
        );

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();

        assert_eq!(evaluator.value(UnitId(0), -1).unwrap(), 0.0);
        assert_eq!(evaluator.value(UnitId(0), 11).unwrap(), 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(evaluator.value(UnitId(0), 5).unwrap(), 5.0);
        assert_eq!(evaluator.value(UnitId(0), 5).unwrap(), 5.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_time_mutual_recursion_is_a_cycle() {
        let fixture = Fixture::new(
            vec![
                ("a", Formula::time(|ctx, t| ctx.var("b", t))),
                ("b", Formula::time(|ctx, t| Ok(ctx.var("a", t)? + 1.0))),
            ],
            5,
        );

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();

        match evaluator.evaluate(UnitId(0)) {
            Err(ModelError::Cycle { path, t }) => {
                assert_eq!(path, "a -> b -> a");
                assert_eq!(t, 0);
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_mutual_recursion_across_time_is_allowed() {
        let fixture = Fixture::new(
            vec![
                ("a", Formula::time(|ctx, t| Ok(ctx.var("b", t - 1)? + 1.0))),
                ("b", Formula::time(|ctx, t| ctx.var("a", t))),
            ],
            5,
        );

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();
        evaluator.evaluate(UnitId(0)).unwrap();
        evaluator.evaluate(UnitId(1)).unwrap();

        assert_eq!(evaluator.read(UnitId(0), 5).unwrap(), 6.0);
        assert_eq!(evaluator.read(UnitId(1), 3).unwrap(), 4.0);
    }

    #[test]
    fn test_constant_once_per_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut fixture = Fixture::new(
            vec![(
                "p",
                Formula::constant(move |ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ctx.field_f64("premium")
                }),
            )],
            3,
        );
        fixture.settings.save_runtime = true;

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 1).unwrap();
        evaluator.reset();
        assert!(matches!(
            evaluator.read(UnitId(0), 0),
            Err(ModelError::ConstantNotCalculated(_))
        ));

        evaluator.evaluate(UnitId(0)).unwrap();
        assert_eq!(evaluator.constant_value(UnitId(0)).unwrap(), 250.0);
        assert_eq!(evaluator.read(UnitId(0), 2).unwrap(), 250.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(evaluator.cache_stats()[0], CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_cache_stats_only_with_save_runtime() {
        let fixture = Fixture::new(vec![("p", Formula::constant(|_| Ok(1.0)))], 3);
        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();
        evaluator.evaluate(UnitId(0)).unwrap();
        assert!(evaluator.cache_stats().is_empty());
        assert!(evaluator.take_timings().is_empty());
    }

    #[test]
    fn test_backward_recursion_not_seen_by_tracing() {
        // untraced, so filled in ascending order
        let fixture = Fixture::new(vec![("g", Formula::time(|ctx, t| Ok(ctx.var("g", t + 1)? + 1.0)))], 1440);

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();
        evaluator.evaluate(UnitId(0)).unwrap();

        assert_eq!(evaluator.read(UnitId(0), 1440).unwrap(), 1.0);
        assert_eq!(evaluator.read(UnitId(0), 0).unwrap(), 1441.0);
    }

    #[test]
    fn test_deep_mutual_recursion_across_time() {
        let fixture = Fixture::new(
            vec![
                ("a", Formula::time(|ctx, t| ctx.var("b", t + 1))),
                ("b", Formula::time(|ctx, t| Ok(ctx.var("a", t)? + 1.0))),
            ],
            1440,
        )
        .traced();

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();
        evaluator.evaluate(UnitId(0)).unwrap();
        evaluator.evaluate(UnitId(1)).unwrap();

        assert_eq!(evaluator.read(UnitId(0), 0).unwrap(), 1440.0);
        assert_eq!(evaluator.read(UnitId(1), 0).unwrap(), 1441.0);
        assert_eq!(evaluator.read(UnitId(0), 1440).unwrap(), 0.0);
    }

    #[test]
    fn test_recursion_depth_limit() {
        let count = MAX_DEPTH + 20;
        let names: Vec<String> = (0..count).map(|i| format!("u{}", i)).collect();
        let formulas = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let next = names.get(i + 1).cloned();
                let formula = Formula::time(move |ctx, t| match &next {
                    Some(next) => Ok(ctx.var(next, t)? + 1.0),
                    None => Ok(0.0),
                });
                (name.as_str(), formula)
            })
            .collect();
        let fixture = Fixture::new(formulas, 2);

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();

        match evaluator.evaluate(UnitId(0)) {
            Err(ModelError::RecursionDepth { depth, t, .. }) => {
                assert_eq!(depth, MAX_DEPTH);
                assert_eq!(t, 0);
            }
            other => panic!("expected recursion depth error, got {:?}", other),
        }
        // evaluating from the leaves stays shallow
        for i in (0..count).rev() {
            evaluator.evaluate(UnitId(i)).unwrap();
        }
        assert_eq!(evaluator.read(UnitId(0), 2).unwrap(), (count - 1) as f64);
    }

    #[test]
    fn test_lookup_without_retained_history() {
        let fixture = Fixture::new(vec![("mv", Formula::time(|_, t| Ok(t as f64)))], 3);

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();
        evaluator.evaluate(UnitId(0)).unwrap();
        evaluator.select(0, 1).unwrap();
        evaluator.reset();

        assert_eq!(
            evaluator.lookup(UnitId(0), 1, 0),
            Err(ModelError::HistoryNotRetained("mv".into()))
        );
    }

    #[test]
    fn test_lookup_reads_retained_records_only() {
        let fixture = Fixture::new(vec![("mv", Formula::time(|ctx, t| Ok(ctx.field_f64("premium")? + t as f64)))], 3);

        let evaluator = Evaluator::new(fixture.env(), true);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();
        evaluator.evaluate(UnitId(0)).unwrap();
        assert!(evaluator.lookup(UnitId(0), 1, 1).is_err());

        evaluator.select(0, 1).unwrap();
        evaluator.reset();
        evaluator.evaluate(UnitId(0)).unwrap();
        assert_eq!(evaluator.lookup(UnitId(0), 1, 0).unwrap(), 101.0);
        assert_eq!(evaluator.lookup(UnitId(0), 1, 1).unwrap(), 251.0);
        assert_eq!(evaluator.lookup(UnitId(0), -1, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_formula_error_propagates_unmodified() {
        let fixture = Fixture::new(
            vec![("mv", Formula::time(|_, t| {
                if t == 2 {
                    return Err(ModelError::formula("bad period"));
                }
                Ok(0.0)
            }))],
            5,
        );

        let evaluator = Evaluator::new(fixture.env(), false);
        evaluator.select(0, 0).unwrap();
        evaluator.reset();
        assert_eq!(evaluator.evaluate(UnitId(0)), Err(ModelError::formula("bad period")));
    }

    #[test]
    fn test_sample_times() {
        assert_eq!(sample_times(1440), vec![0, 1, 720, 1440]);
        assert_eq!(sample_times(1), vec![0, 1]);
        assert_eq!(sample_times(0), vec![0]);
    }
}
