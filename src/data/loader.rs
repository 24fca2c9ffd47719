//! Load record sets and run plans from CSV

use csv::Reader;
use std::path::Path;

use super::{RecordSet, Runplan, Value};
use crate::error::{ModelError, Result};

/// Header and parsed rows of a CSV source
fn read_table<R: std::io::Read>(reader: R) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let mut csv_reader = Reader::from_reader(reader);
    let header = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        rows.push(record.iter().map(Value::parse).collect());
    }

    Ok((header, rows))
}

fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| ModelError::Input(format!("{}: {}", path.display(), e)))
}

/// Load a record set from a CSV file
pub fn load_record_set<P: AsRef<Path>>(name: &str, path: P) -> Result<RecordSet> {
    load_record_set_from_reader(name, open(path.as_ref())?)
}

/// Load a record set from any reader (e.g., string buffer, network stream)
pub fn load_record_set_from_reader<R: std::io::Read>(name: &str, reader: R) -> Result<RecordSet> {
    let (header, rows) = read_table(reader)?;
    RecordSet::new(name, header, rows)
}

/// Load a run plan from a CSV file
pub fn load_runplan<P: AsRef<Path>>(path: P) -> Result<Runplan> {
    load_runplan_from_reader(open(path.as_ref())?)
}

/// Load a run plan from any reader
pub fn load_runplan_from_reader<R: std::io::Read>(reader: R) -> Result<Runplan> {
    let (header, rows) = read_table(reader)?;
    Runplan::new(header, rows)
}
