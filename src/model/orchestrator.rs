//! The model: owns components, record sets, run plan and settings, and
//! drives validation, per-record calculation and output assembly

use log::{info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::AddAssign;
use std::time::{Duration, Instant};

use super::output::OutputTable;
use super::runtime::RuntimeReport;
use crate::component::{Component, ComponentKind, Constant, ModelVariable};
use crate::data::{RecordSet, Runplan};
use crate::engine::{trace_all, CacheStats, Environment, Evaluator, Unit};
use crate::error::{ModelError, Result};
use crate::graph::{DependencyGraph, UnitId};
use crate::settings::Settings;

/// Result of validation: evaluable units and their dependency graph
struct Compiled {
    units: Vec<Unit>,
    index: HashMap<String, UnitId>,
    graph: DependencyGraph,
    queue: Vec<UnitId>,

    /// Tracing saw a formula read other records, so completed records are
    /// retained from the start
    retain_history: bool,
}

/// Work for one record set
struct Job {
    set: usize,
    /// Units to evaluate per record, in queue order
    scope: Vec<UnitId>,
    /// Units written to the output, in declaration order
    outputs: Vec<UnitId>,
    columns: Vec<String>,
}

/// Accumulated results of one worker
struct Batch {
    table: OutputTable,
    timings: Vec<Duration>,
    cache: Vec<CacheStats>,
}

impl Batch {
    fn merge(mut self, other: Batch) -> Batch {
        self.table.absorb(other.table);
        accumulate(&mut self.timings, other.timings);
        accumulate(&mut self.cache, other.cache);
        self
    }
}

/// Elementwise sum; an empty side (nothing collected) is skipped
fn accumulate<T: AddAssign + Copy>(total: &mut Vec<T>, other: Vec<T>) {
    if total.is_empty() {
        *total = other;
    } else {
        for (sum, value) in total.iter_mut().zip(other) {
            *sum += value;
        }
    }
}

struct Worker<'m> {
    evaluator: Evaluator<'m>,
    table: OutputTable,
}

impl Worker<'_> {
    fn finish(self) -> Batch {
        Batch {
            timings: self.evaluator.take_timings(),
            cache: self.evaluator.cache_stats(),
            table: self.table,
        }
    }
}

/// Cash-flow model over one or more record sets
///
/// # Example
/// ```ignore
/// let premium = ModelVariable::new("premium").assign(|ctx, t| {
///     Ok(if t == 0 { ctx.field_f64("premium")? } else { 0.0 })
/// });
/// let mut model = Model::new(Runplan::empty(), vec![premium], vec![], vec![policies], Settings::default());
/// let output = model.run()?;
/// ```
pub struct Model {
    runplan: Runplan,
    variables: Vec<ModelVariable>,
    constants: Vec<Constant>,
    record_sets: Vec<RecordSet>,
    settings: Settings,
    compiled: Option<Compiled>,
    output: BTreeMap<String, OutputTable>,
    runtime: Option<RuntimeReport>,
}

impl Model {
    /// Create a model; the first record set is the primary one
    pub fn new(
        runplan: Runplan,
        variables: Vec<ModelVariable>,
        constants: Vec<Constant>,
        record_sets: Vec<RecordSet>,
        settings: Settings,
    ) -> Self {
        Self {
            runplan,
            variables,
            constants,
            record_sets,
            settings,
            compiled: None,
            output: BTreeMap::new(),
            runtime: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn runplan(&self) -> &Runplan {
        &self.runplan
    }

    /// Run plan, e.g. to select another version before a run
    pub fn runplan_mut(&mut self) -> &mut Runplan {
        &mut self.runplan
    }

    /// Every component in declaration order: variables, then constants
    pub fn components(&self) -> impl Iterator<Item = &dyn Component> {
        self.variables
            .iter()
            .map(|v| v as &dyn Component)
            .chain(self.constants.iter().map(|c| c as &dyn Component))
    }

    pub fn component(&self, name: &str) -> Option<&dyn Component> {
        self.components().find(|c| c.name() == name)
    }

    pub fn record_set(&self, name: &str) -> Option<&RecordSet> {
        self.record_sets.iter().find(|s| s.name() == name)
    }

    pub fn is_validated(&self) -> bool {
        self.compiled.is_some()
    }

    /// Output of the last calculation
    pub fn output(&self) -> &BTreeMap<String, OutputTable> {
        &self.output
    }

    /// Timing of the last calculation (only with SAVE_RUNTIME)
    pub fn runtime(&self) -> Option<&RuntimeReport> {
        self.runtime.as_ref()
    }

    /// Check the whole configuration and derive the evaluation queue
    ///
    /// Record sets are indexed, every formula is checked for arity, traced
    /// once to discover its direct dependencies, and the graph is built.
    pub fn validate(&mut self) -> Result<()> {
        self.compiled = None;
        self.settings.validate()?;
        if self.record_sets.is_empty() {
            return Err(ModelError::NoRecordSets);
        }
        self.check_names()?;

        let id_column = self.settings.policy_id_column.clone();
        for record_set in &mut self.record_sets {
            record_set.initialize(&id_column)?;
        }

        let mut units = Vec::new();
        for component in self.components() {
            let formula = component.validate()?.clone();
            let record_set = self.resolve_record_set(component.record_set())?;
            units.push(Unit {
                name: component.name().to_string(),
                formula,
                record_set,
                descending: false,
            });
        }
        let index: HashMap<String, UnitId> = units
            .iter()
            .enumerate()
            .map(|(i, unit)| (unit.name.clone(), UnitId(i)))
            .collect();

        let reports = trace_all(Environment {
            units: &units,
            index: &index,
            record_sets: &self.record_sets,
            runplan: &self.runplan,
            settings: &self.settings,
        })?;

        let mut children = Vec::with_capacity(units.len());
        let mut retain_history = false;
        for (unit, report) in units.iter_mut().zip(reports) {
            unit.descending = report.descending;
            retain_history |= report.cross_record;
            children.push(report.children);
        }

        let graph = DependencyGraph::new(children);
        let cyclic = graph.cyclic_units();
        if !cyclic.is_empty() {
            let names: Vec<&str> = cyclic.iter().map(|id| units[id.index()].name.as_str()).collect();
            warn!(
                "components {:?} depend on each other; same-period recursion between them fails at run time",
                names
            );
        }
        let queue = graph.queue();

        info!(
            "model validated: {} components, {} record sets",
            units.len(),
            self.record_sets.len()
        );

        self.compiled = Some(Compiled {
            units,
            index,
            graph,
            queue,
            retain_history,
        });
        Ok(())
    }

    fn check_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let names = self
            .record_sets
            .iter()
            .map(|s| s.name())
            .chain(self.components().map(|c| c.name()));
        for name in names {
            if !seen.insert(name) {
                return Err(ModelError::DuplicateName(name.to_string()));
            }
        }
        Ok(())
    }

    fn resolve_record_set(&self, name: Option<&str>) -> Result<usize> {
        match name {
            None => Ok(0),
            Some(name) => self
                .record_sets
                .iter()
                .position(|s| s.name() == name)
                .ok_or_else(|| ModelError::UnknownRecordSet(name.to_string())),
        }
    }

    fn set_index(&self, name: &str) -> Result<usize> {
        self.resolve_record_set(Some(name))
    }

    fn compiled(&self) -> Result<&Compiled> {
        self.compiled.as_ref().ok_or(ModelError::NotValidated)
    }

    fn env<'m>(&'m self, compiled: &'m Compiled) -> Environment<'m> {
        Environment {
            units: &compiled.units,
            index: &compiled.index,
            record_sets: &self.record_sets,
            runplan: &self.runplan,
            settings: &self.settings,
        }
    }

    fn names(&self, ids: &[UnitId]) -> Result<Vec<&str>> {
        let compiled = self.compiled()?;
        Ok(ids.iter().map(|id| compiled.units[id.index()].name.as_str()).collect())
    }

    fn id_of(&self, name: &str) -> Result<UnitId> {
        self.compiled()?
            .index
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownComponent(name.to_string()))
    }

    /// Components called directly by `name`, in first-call order
    pub fn children(&self, name: &str) -> Result<Vec<&str>> {
        let id = self.id_of(name)?;
        self.names(self.compiled()?.graph.children(id))
    }

    /// Every component `name` depends on, directly or not
    pub fn closure(&self, name: &str) -> Result<Vec<&str>> {
        let id = self.id_of(name)?;
        self.names(self.compiled()?.graph.closure(id))
    }

    /// Evaluation order
    pub fn queue(&self) -> Result<Vec<&str>> {
        self.names(&self.compiled()?.queue)
    }

    fn job(&self, compiled: &Compiled, set: usize) -> Job {
        let roots: Vec<UnitId> = (0..compiled.units.len())
            .map(UnitId)
            .filter(|id| compiled.units[id.index()].record_set == set)
            .collect();
        let scope = compiled.graph.scope(&roots);

        // constants are not summed into aggregate tables
        let outputs: Vec<UnitId> = roots
            .into_iter()
            .filter(|id| {
                let unit = &compiled.units[id.index()];
                self.settings.is_output_column(&unit.name)
                    && (!self.settings.aggregate || unit.kind() == ComponentKind::Variable)
            })
            .collect();
        let columns = outputs
            .iter()
            .map(|id| compiled.units[id.index()].name.clone())
            .collect();

        Job { set, scope, outputs, columns }
    }

    /// Starting table for a record set: zeros to sum into, or no rows
    fn empty_table(&self, job: &Job) -> OutputTable {
        if self.settings.aggregate {
            OutputTable::aggregate(job.columns.clone(), self.settings.t_output_max)
        } else {
            OutputTable::individual(job.columns.clone())
        }
    }

    /// Pre-allocated output tables, one per record set
    pub fn empty_output(&self) -> Result<BTreeMap<String, OutputTable>> {
        let compiled = self.compiled()?;
        Ok(self
            .record_sets
            .iter()
            .enumerate()
            .map(|(set, record_set)| {
                let job = self.job(compiled, set);
                (record_set.name().to_string(), self.empty_table(&job))
            })
            .collect())
    }

    /// Calculate one record of a record set in isolation
    pub fn calculate_record(&self, record_set: &str, record: usize) -> Result<OutputTable> {
        let compiled = self.compiled()?;
        let job = self.job(compiled, self.set_index(record_set)?);
        let evaluator = Evaluator::new(self.env(compiled), false);
        self.record_table(&evaluator, &job, record)
    }

    /// Select the record, reset caches, evaluate the scope in queue order,
    /// and read back the output columns for every output time step
    fn record_table(&self, evaluator: &Evaluator<'_>, job: &Job, record: usize) -> Result<OutputTable> {
        evaluator.select(job.set, record)?;
        evaluator.reset();
        for &id in &job.scope {
            evaluator.evaluate(id)?;
        }

        let individual = !self.settings.aggregate;
        let mut table = OutputTable::empty(job.columns.clone(), individual);
        let mut row = vec![0.0; job.outputs.len()];
        for t in 0..=self.settings.t_output_max {
            for (value, &id) in row.iter_mut().zip(&job.outputs) {
                // zero past T_CALCULATION_MAX
                *value = evaluator.read(id, t)?;
            }
            table.push_row(t, individual.then_some(record), &row);
        }
        Ok(table)
    }

    fn calculate_serial(&self, compiled: &Compiled, job: &Job, retain_history: bool) -> Result<Batch> {
        let evaluator = Evaluator::new(self.env(compiled), retain_history);
        let mut table = self.empty_table(job);
        for record in 0..self.record_sets[job.set].len() {
            table.absorb(self.record_table(&evaluator, job, record)?);
        }
        Ok(Batch {
            timings: evaluator.take_timings(),
            cache: evaluator.cache_stats(),
            table,
        })
    }

    fn calculate_parallel(&self, compiled: &Compiled, job: &Job) -> Result<Batch> {
        let env = self.env(compiled);
        (0..self.record_sets[job.set].len())
            .into_par_iter()
            .try_fold(
                || Worker {
                    evaluator: Evaluator::new(env, false),
                    table: self.empty_table(job),
                },
                |mut worker, record| {
                    let table = self.record_table(&worker.evaluator, job, record)?;
                    worker.table.absorb(table);
                    Ok::<_, ModelError>(worker)
                },
            )
            .map(|worker| worker.map(Worker::finish))
            .try_reduce(
                || Batch {
                    table: self.empty_table(job),
                    timings: Vec::new(),
                    cache: Vec::new(),
                },
                |left, right| Ok(left.merge(right)),
            )
    }

    fn calculate_all(&self) -> Result<(BTreeMap<String, OutputTable>, RuntimeReport)> {
        let started = Instant::now();
        let compiled = self.compiled()?;

        let parallel = self.settings.parallel && !compiled.retain_history;
        if self.settings.parallel && compiled.retain_history {
            warn!("formulas read other records; calculating records sequentially");
        }

        let mut report = RuntimeReport::new(compiled.units.iter().map(|u| u.name.clone()).collect());
        let mut output = BTreeMap::new();

        for (set, record_set) in self.record_sets.iter().enumerate() {
            let job = self.job(compiled, set);
            let batch = if parallel {
                self.calculate_parallel(compiled, &job)
            } else {
                self.calculate_serial(compiled, &job, compiled.retain_history)
            };
            let batch = match batch {
                // a lookup tracing did not see: start over, keeping every record
                Err(ModelError::HistoryNotRetained(name)) => {
                    warn!(
                        "'{}' reads other records; recalculating record set '{}' sequentially",
                        name,
                        record_set.name()
                    );
                    self.calculate_serial(compiled, &job, true)?
                }
                batch => batch?,
            };
            report.absorb(&batch.timings, &batch.cache);
            info!(
                "record set '{}': {} records, {} rows",
                record_set.name(),
                record_set.len(),
                batch.table.len()
            );
            output.insert(record_set.name().to_string(), batch.table);
        }

        report.total = started.elapsed();
        Ok((output, report))
    }

    /// Calculate every record of every record set and assemble the output
    pub fn calculate(&mut self) -> Result<&BTreeMap<String, OutputTable>> {
        let (output, report) = self.calculate_all()?;

        self.runtime = if self.settings.save_runtime {
            info!("runtime per component:\n{}", report);
            Some(report)
        } else {
            None
        };
        self.output = output;
        Ok(&self.output)
    }

    /// Validate, then calculate; returns the final table per record set
    pub fn run(&mut self) -> Result<&BTreeMap<String, OutputTable>> {
        self.validate()?;
        self.calculate()
    }
}
