//! Cash-flow Engine - recursive, memoized projection of actuarial models
//!
//! This library provides:
//! - Model variables (one value per time step) and constants (one value per record)
//! - Dependency discovery by tracing formulas, and closure-size evaluation order
//! - Per-record memoized evaluation with forward and backward time recursion
//! - Aggregate or individual output tables, optionally computed in parallel

pub mod error;
pub mod settings;
pub mod data;
pub mod component;
pub mod graph;
pub mod engine;
pub mod model;

// Re-export commonly used types
pub use error::{ModelError, Result};
pub use settings::Settings;
pub use data::{RecordSet, Runplan, Value};
pub use component::{Component, Constant, Formula, ModelVariable, Time};
pub use engine::Context;
pub use model::{Model, OutputTable, RuntimeReport};
