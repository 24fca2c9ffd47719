//! Result tables produced by a model run

use std::io::Write;

use crate::component::Time;
use crate::error::Result;

/// Name of the time column
pub const TIME_COLUMN: &str = "t";

/// Name of the record column in individual output
pub const RECORD_COLUMN: &str = "r";

/// Column-major table: time, optional record index, one column per component
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    columns: Vec<String>,
    time: Vec<Time>,
    records: Option<Vec<usize>>,
    values: Vec<Vec<f64>>,
}

impl OutputTable {
    /// Zero-filled table with one row per time step in `[0, t_output_max]`
    pub fn aggregate(columns: Vec<String>, t_output_max: Time) -> Self {
        let rows = (t_output_max + 1) as usize;
        Self {
            values: vec![vec![0.0; rows]; columns.len()],
            time: (0..=t_output_max).collect(),
            records: None,
            columns,
        }
    }

    /// Empty table whose rows carry a record index
    pub fn individual(columns: Vec<String>) -> Self {
        Self::empty(columns, true)
    }

    /// Empty table of either shape, filled with [`OutputTable::push_row`]
    pub fn empty(columns: Vec<String>, individual: bool) -> Self {
        Self {
            values: vec![Vec::new(); columns.len()],
            time: Vec::new(),
            records: individual.then(Vec::new),
            columns,
        }
    }

    /// Append one row; `values` follow the column order
    pub fn push_row(&mut self, t: Time, record: Option<usize>, values: &[f64]) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.time.push(t);
        if let (Some(records), Some(record)) = (self.records.as_mut(), record) {
            records.push(record);
        }
        for (column, value) in self.values.iter_mut().zip(values) {
            column.push(*value);
        }
    }

    /// Elementwise sum with a table of the same shape
    pub fn add(&mut self, other: &OutputTable) {
        debug_assert_eq!(self.columns, other.columns);
        debug_assert_eq!(self.time.len(), other.time.len());
        for (column, other_column) in self.values.iter_mut().zip(&other.values) {
            for (value, other_value) in column.iter_mut().zip(other_column) {
                *value += other_value;
            }
        }
    }

    /// Append all rows of `other` after the rows of `self`
    pub fn append(&mut self, other: OutputTable) {
        debug_assert_eq!(self.columns, other.columns);
        self.time.extend(other.time);
        if let (Some(records), Some(other_records)) = (self.records.as_mut(), other.records) {
            records.extend(other_records);
        }
        for (column, other_column) in self.values.iter_mut().zip(other.values) {
            column.extend(other_column);
        }
    }

    /// Fold partial results in: sum for aggregate tables, concatenation otherwise
    pub fn absorb(&mut self, other: OutputTable) {
        if self.is_individual() {
            self.append(other);
        } else {
            self.add(&other);
        }
    }

    pub fn merge(mut self, other: OutputTable) -> OutputTable {
        self.absorb(other);
        self
    }

    pub fn is_individual(&self) -> bool {
        self.records.is_some()
    }

    /// Component column names (without `t` and `r`)
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn time(&self) -> &[Time] {
        &self.time
    }

    pub fn records(&self) -> Option<&[usize]> {
        self.records.as_deref()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Write the table as CSV with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![TIME_COLUMN.to_string()];
        if self.records.is_some() {
            header.push(RECORD_COLUMN.to_string());
        }
        header.extend(self.columns.iter().cloned());
        csv_writer.write_record(&header)?;

        for row in 0..self.len() {
            let mut fields = vec![self.time[row].to_string()];
            if let Some(records) = &self.records {
                fields.push(records[row].to_string());
            }
            fields.extend(self.values.iter().map(|column| column[row].to_string()));
            csv_writer.write_record(&fields)?;
        }

        csv_writer
            .flush()
            .map_err(|e| crate::error::ModelError::Input(e.to_string()))?;
        Ok(())
    }
}
