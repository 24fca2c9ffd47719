//! Run plan: versioned table of run-level parameters

use super::Value;
use crate::error::{ModelError, Result};

/// Name of the mandatory version column
pub const VERSION_COLUMN: &str = "version";

/// Version selected when nothing else was chosen
pub const DEFAULT_VERSION: &str = "1";

/// Versions table with one active version
///
/// Each row holds the parameters of one version; lookups are scoped to the
/// active row.
#[derive(Debug, Clone)]
pub struct Runplan {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    version: String,
}

impl Runplan {
    /// Create a run plan from named columns; a `version` column is required
    pub fn from_columns(columns: Vec<(&str, Vec<Value>)>) -> Result<Self> {
        let len = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        if columns.iter().any(|(_, values)| values.len() != len) {
            return Err(ModelError::Input("run plan columns differ in length".into()));
        }
        let header = columns.iter().map(|(c, _)| c.to_string()).collect();
        let rows = (0..len)
            .map(|i| columns.iter().map(|(_, values)| values[i].clone()).collect())
            .collect();
        Self::new(header, rows)
    }

    /// Create a run plan from a header and row-major data
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if !columns.iter().any(|c| c == VERSION_COLUMN) {
            return Err(ModelError::MissingVersionColumn);
        }
        if rows.iter().any(|row| row.len() != columns.len()) {
            return Err(ModelError::Input("run plan row length differs from header".into()));
        }
        Ok(Self {
            columns,
            rows,
            version: DEFAULT_VERSION.to_string(),
        })
    }

    /// Run plan without parameters
    pub fn empty() -> Self {
        Self {
            columns: vec![VERSION_COLUMN.to_string()],
            rows: Vec::new(),
            version: DEFAULT_VERSION.to_string(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Select the active version
    pub fn set_version(&mut self, version: impl Into<String>) -> Result<()> {
        let version = version.into();
        if self.row_of(&version).is_none() {
            return Err(ModelError::UnknownVersion(version));
        }
        self.version = version;
        Ok(())
    }

    /// Parameter of the active version
    pub fn get(&self, name: &str) -> Result<&Value> {
        let unknown = || ModelError::UnknownParameter {
            name: name.to_string(),
            version: self.version.clone(),
        };
        let column = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(unknown)?;
        let row = self.row_of(&self.version).ok_or_else(unknown)?;
        Ok(&self.rows[row][column])
    }

    fn row_of(&self, version: &str) -> Option<usize> {
        let column = self.columns.iter().position(|c| c == VERSION_COLUMN)?;
        self.rows.iter().position(|row| row[column].key() == version)
    }
}

impl Default for Runplan {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runplan() -> Runplan {
        Runplan::from_columns(vec![
            ("version", vec![1.into(), 2.into()]),
            ("value", vec![57.into(), 89.into()]),
        ])
        .unwrap()
    }

    #[test]
    fn test_runplan() {
        let mut runplan = runplan();
        assert_eq!(runplan.version(), "1");
        assert_eq!(runplan.get("value").unwrap().as_f64().unwrap(), 57.0);

        runplan.set_version("2").unwrap();
        assert_eq!(runplan.version(), "2");
        assert_eq!(runplan.get("value").unwrap().as_f64().unwrap(), 89.0);

        assert_eq!(Runplan::empty().version(), "1");
    }

    #[test]
    fn test_requires_version_column() {
        let result = Runplan::from_columns(vec![("a", vec![1.into(), 2.into(), 3.into()])]);
        assert!(matches!(result, Err(ModelError::MissingVersionColumn)));
    }

    #[test]
    fn test_unknown_version() {
        let mut runplan = runplan();
        assert!(matches!(runplan.set_version("3"), Err(ModelError::UnknownVersion(_))));
        assert_eq!(runplan.version(), "1");
    }

    #[test]
    fn test_unknown_parameter() {
        assert!(matches!(runplan().get("foo"), Err(ModelError::UnknownParameter { .. })));
        assert!(Runplan::empty().get("value").is_err());
    }
}
