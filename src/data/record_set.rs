//! Record sets (model points): ordered records sharing one schema

use std::collections::HashMap;

use super::Value;
use crate::error::{ModelError, Result};

/// Named, ordered collection of records with a unique identifier column
///
/// Rows are kept in input order; position `i` is the record index used
/// throughout the engine. The identifier index is built by [`RecordSet::initialize`].
#[derive(Debug, Clone)]
pub struct RecordSet {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    id_column: Option<usize>,
    positions: HashMap<String, usize>,
}

impl RecordSet {
    /// Create a record set from a header and row-major data
    pub fn new<S: Into<String>>(name: S, columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let name = name.into();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ModelError::Input(format!(
                    "record set '{}': row {} has {} cells, header has {}",
                    name,
                    i,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self {
            name,
            columns,
            rows,
            id_column: None,
            positions: HashMap::new(),
        })
    }

    /// Create a record set from named columns of equal length
    pub fn from_columns<S: Into<String>>(name: S, columns: Vec<(&str, Vec<Value>)>) -> Result<Self> {
        let name = name.into();
        let len = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        if let Some((column, _)) = columns.iter().find(|(_, values)| values.len() != len) {
            return Err(ModelError::Input(format!(
                "record set '{}': column '{}' length differs from the others",
                name, column
            )));
        }

        let header = columns.iter().map(|(c, _)| c.to_string()).collect();
        let rows = (0..len)
            .map(|i| columns.iter().map(|(_, values)| values[i].clone()).collect())
            .collect();
        Self::new(name, header, rows)
    }

    /// Validate and index the identifier column
    pub fn initialize(&mut self, id_column: &str) -> Result<()> {
        let index = self
            .columns
            .iter()
            .position(|c| c == id_column)
            .ok_or_else(|| ModelError::MissingIdColumn {
                set: self.name.clone(),
                column: id_column.to_string(),
            })?;

        let mut positions = HashMap::with_capacity(self.rows.len());
        for (position, row) in self.rows.iter().enumerate() {
            let id = row[index].key();
            if positions.insert(id.clone(), position).is_some() {
                return Err(ModelError::DuplicateId {
                    set: self.name.clone(),
                    column: id_column.to_string(),
                    id,
                });
            }
        }

        self.id_column = Some(index);
        self.positions = positions;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.id_column.is_some()
    }

    /// Position of a column in the header
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| ModelError::UnknownColumn {
                set: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Field of the record at `record`
    pub fn get(&self, record: usize, column: &str) -> Result<&Value> {
        let index = self.column_index(column)?;
        self.row(record).map(|row| &row[index])
    }

    /// Identifier of the record at `record` (requires `initialize`)
    pub fn id(&self, record: usize) -> Result<String> {
        let index = self.id_column.ok_or_else(|| ModelError::MissingIdColumn {
            set: self.name.clone(),
            column: "<not initialized>".to_string(),
        })?;
        self.row(record).map(|row| row[index].key())
    }

    /// Position of the record with the given identifier
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    fn row(&self, record: usize) -> Result<&Vec<Value>> {
        self.rows.get(record).ok_or_else(|| ModelError::RecordOutOfRange {
            set: self.name.clone(),
            record,
        })
    }
}

impl std::fmt::Display for RecordSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordSet: {}", self.name)
    }
}
