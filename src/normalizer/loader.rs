//! Table loaders: CSV files and JSON record sets → `RawTable`
//!
//! JSON input may be:
//! - a top-level array of record objects
//! - an object whose first array-of-objects member holds the records
//! - an object with explicit `columns` and `rows`

use serde_json::{Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::{RawCell, RawTable};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported JSON table shape: {0}")]
    UnsupportedShape(String),

    #[error("Cannot infer table format from {0}; pass --format")]
    UnknownFormat(PathBuf),
}

/// Input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Some(TableFormat::Csv),
            Some("json") => Some(TableFormat::Json),
            _ => None,
        }
    }
}

impl std::str::FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "json" => Ok(TableFormat::Json),
            other => Err(format!("unknown table format '{other}' (expected csv or json)")),
        }
    }
}

/// Load a table from disk, inferring the format from the extension when
/// `format` is `None`.
pub fn load_table(path: &Path, format: Option<TableFormat>) -> Result<RawTable, LoadError> {
    let format = format
        .or_else(|| TableFormat::from_path(path))
        .ok_or_else(|| LoadError::UnknownFormat(path.to_path_buf()))?;

    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let table = match format {
        TableFormat::Csv => parse_csv(file)?,
        TableFormat::Json => {
            let value: Value = serde_json::from_reader(std::io::BufReader::new(file))?;
            table_from_json(value)?
        }
    };

    debug!(
        path = %path.display(),
        columns = table.columns.len(),
        rows = table.rows.len(),
        "Loaded input table"
    );
    Ok(table)
}

/// Read a headed CSV. Every cell is text; blank cells become `Null`.
pub fn parse_csv<R: Read>(reader: R) -> Result<RawTable, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        RawCell::Null
                    } else {
                        RawCell::Text(cell.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable { columns, rows })
}

/// Parse JSON text in any of the accepted shapes.
pub fn parse_json(text: &str) -> Result<RawTable, LoadError> {
    table_from_json(serde_json::from_str(text)?)
}

pub fn table_from_json(value: Value) -> Result<RawTable, LoadError> {
    match value {
        Value::Array(items) => records_to_table(&items),
        Value::Object(mut obj) => {
            if obj.contains_key("columns") && obj.contains_key("rows") {
                return Ok(serde_json::from_value(Value::Object(obj))?);
            }
            let key = obj
                .iter()
                .find(|(_, v)| is_record_array(v))
                .map(|(k, _)| k.clone())
                .ok_or_else(|| {
                    LoadError::UnsupportedShape("object has no array of records".to_string())
                })?;
            match obj.remove(&key) {
                Some(Value::Array(items)) => records_to_table(&items),
                _ => Err(LoadError::UnsupportedShape(format!("member '{key}' is not an array"))),
            }
        }
        other => Err(LoadError::UnsupportedShape(format!(
            "expected array or object, got {}",
            json_kind(&other)
        ))),
    }
}

fn is_record_array(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|a| !a.is_empty() && a.iter().all(Value::is_object))
}

/// Build a table from record objects. Columns are the union of keys in
/// first-seen order; absent keys become `Null`.
pub fn records_to_table(items: &[Value]) -> Result<RawTable, LoadError> {
    let mut records: Vec<&Map<String, Value>> = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| {
            LoadError::UnsupportedShape(format!("record {idx} is {}, not an object", json_kind(item)))
        })?;
        records.push(obj);
    }

    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| record.get(c).map_or(RawCell::Null, json_to_cell))
                .collect()
        })
        .collect();

    Ok(RawTable { columns, rows })
}

fn json_to_cell(value: &Value) -> RawCell {
    match value {
        Value::Null => RawCell::Null,
        Value::Bool(b) => RawCell::Bool(*b),
        Value::Number(n) => n.as_f64().map_or(RawCell::Null, RawCell::Number),
        Value::String(s) => RawCell::Text(s.clone()),
        other => RawCell::Text(other.to_string()),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
