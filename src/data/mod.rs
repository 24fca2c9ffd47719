//! Input collaborators: record sets, run plan and their CSV loading

mod value;
mod record_set;
mod runplan;
pub mod loader;

pub use value::Value;
pub use record_set::RecordSet;
pub use runplan::{Runplan, DEFAULT_VERSION, VERSION_COLUMN};
pub use loader::{load_record_set, load_record_set_from_reader, load_runplan, load_runplan_from_reader};
