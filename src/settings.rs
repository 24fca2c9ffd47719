//! Run settings with defaults and partial overrides

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Settings shared by every component of a model
///
/// Keys use the upper-case names found in user settings files,
/// e.g. `{"AGGREGATE": false, "T_CALCULATION_MAX": 120}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
    /// Sum results across records (true) or keep one block of rows per record
    pub aggregate: bool,

    /// Components written to the output; empty means all of them
    pub output_columns: Vec<String>,

    /// Name of the unique identifier column in every record set
    pub policy_id_column: String,

    /// Collect per-component evaluation times
    pub save_runtime: bool,

    /// Last time step that is actually evaluated
    pub t_calculation_max: i64,

    /// Last time step present in the output (rows after `t_calculation_max` are zero)
    pub t_output_max: i64,

    /// Process records on the rayon thread pool
    pub parallel: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            aggregate: true,
            output_columns: Vec::new(),
            policy_id_column: "POLICY_ID".to_string(),
            save_runtime: false,
            t_calculation_max: 1440,
            t_output_max: 1440,
            parallel: false,
        }
    }
}

impl Settings {
    /// Merge a (possibly partial) JSON object over the defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ModelError::Input(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_json(&text)
    }

    /// Check that the horizons make sense
    pub fn validate(&self) -> Result<()> {
        if self.t_calculation_max < 0 {
            return Err(ModelError::Settings(format!(
                "T_CALCULATION_MAX must not be negative, got {}",
                self.t_calculation_max
            )));
        }
        if self.t_output_max < 0 {
            return Err(ModelError::Settings(format!(
                "T_OUTPUT_MAX must not be negative, got {}",
                self.t_output_max
            )));
        }
        if self.policy_id_column.is_empty() {
            return Err(ModelError::Settings("POLICY_ID_COLUMN must not be empty".into()));
        }
        Ok(())
    }

    /// Whether a component should appear in the output tables
    pub fn is_output_column(&self, name: &str) -> bool {
        self.output_columns.is_empty() || self.output_columns.iter().any(|c| c == name)
    }

    // Builder-style helpers, mostly used by tests and small scripts

    pub fn with_aggregate(mut self, aggregate: bool) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn with_horizon(mut self, t_calculation_max: i64, t_output_max: i64) -> Self {
        self.t_calculation_max = t_calculation_max;
        self.t_output_max = t_output_max;
        self
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.policy_id_column = column.into();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
