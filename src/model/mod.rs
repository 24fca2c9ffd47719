//! Model orchestration and output assembly

mod orchestrator;
mod output;
mod runtime;

pub use orchestrator::Model;
pub use output::{OutputTable, RECORD_COLUMN, TIME_COLUMN};
pub use runtime::RuntimeReport;
