//! Input record loading
//!
//! Reads a CSV file with a header row and maps its columns to record fields
//! through the workflow's [`RecordSchema`].

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use action_flow::{Record, RecordSchema};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("Failed to read records: {0}")]
    Csv(#[from] csv::Error),

    #[error("Column '{column}' for field '{field}' is missing from the header")]
    MissingColumn { field: String, column: String },

    #[error("Record file has no header row")]
    NoHeader,
}

/// Load every non-empty row of the CSV file at `path`
pub fn load_records(path: &Path, schema: &RecordSchema) -> Result<Vec<Record>, RecordsError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let records = read_from(reader, schema)?;
    info!(path = %path.display(), records = records.len(), "Loaded records");
    Ok(records)
}

/// Load records from any CSV source
pub fn read_records<R: Read>(source: R, schema: &RecordSchema) -> Result<Vec<Record>, RecordsError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);
    read_from(reader, schema)
}

fn read_from<R: Read>(
    mut reader: csv::Reader<R>,
    schema: &RecordSchema,
) -> Result<Vec<Record>, RecordsError> {
    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(RecordsError::NoHeader);
    }
    let positions: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(pos, name)| (name, pos))
        .collect();

    // field name -> column position
    let mut columns: Vec<(String, usize)> = Vec::new();
    if schema.columns.is_empty() {
        columns.extend(
            headers
                .iter()
                .enumerate()
                .filter(|(_, name)| !name.is_empty())
                .map(|(pos, name)| (name.to_string(), pos)),
        );
    } else {
        for (field, column) in &schema.columns {
            let pos = positions
                .get(column.as_str())
                .ok_or_else(|| RecordsError::MissingColumn {
                    field: field.clone(),
                    column: column.clone(),
                })?;
            columns.push((field.clone(), *pos));
        }
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        if row.iter().all(str::is_empty) {
            debug!(line = line + 2, "Skipping empty row");
            continue;
        }

        let mut record = Record::new(records.len());
        for (field, pos) in &columns {
            let Some(cell) = row.get(*pos).filter(|cell| !cell.is_empty()) else {
                continue;
            };
            let value = if schema.numeric_text.iter().any(|f| f == field) {
                strip_float_suffix(cell)
            } else {
                cell
            };
            record = record.with_field(field.as_str(), value);
        }
        if let Some(label) = schema.label.as_deref().and_then(|f| record.supplied(f)) {
            let label = label.to_string();
            record = record.with_label(label);
        }
        records.push(record);
    }
    Ok(records)
}

/// `12345.0` -> `12345`; spreadsheets export integer IDs as floats
pub fn strip_float_suffix(value: &str) -> &str {
    match value.strip_suffix(".0") {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits,
        _ => value,
    }
}
