//! Normalizer: heterogeneous KPI tables → canonical readings
//!
//! Input is any rectangular table (CSV export, JSON records, API payload).
//! The normalizer resolves the five logical fields through a declarative
//! synonym table, coerces every cell, canonicalizes KPI names and reduces
//! duplicate readings.
//!
//! ## Column Resolution
//!
//! 1. Exact, case-insensitive match of a synonym against a column name
//! 2. Substring match over the columns not yet claimed, longest synonym first
//!
//! A column is never bound to two fields. Any field left unresolved is a
//! `ValidationError::MissingColumn`.

pub mod loader;
mod timestamp;

pub use loader::{load_table, parse_csv, parse_json, LoadError, TableFormat};
pub use timestamp::parse_timestamp;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ColumnSynonyms, NormalizerConfig};
use crate::types::{CanonicalTable, Reading, ThresholdPolicy};

// ============================================================================
// Raw Input
// ============================================================================

/// One untyped input cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCell {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RawCell {
    /// Render an identifier cell. Integral numbers lose their fractional
    /// part so `3` and `3.0` name the same floor.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawCell::Null => None,
            RawCell::Bool(b) => Some(b.to_string()),
            RawCell::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            RawCell::Number(n) => Some(n.to_string()),
            RawCell::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
        }
    }

    fn coerce_value(&self) -> CellValue {
        match self {
            RawCell::Null => CellValue::Blank,
            RawCell::Number(n) if n.is_finite() => CellValue::Number(*n),
            RawCell::Text(s) if s.trim().is_empty() => CellValue::Blank,
            RawCell::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => CellValue::Number(n),
                _ => CellValue::Invalid,
            },
            RawCell::Number(_) | RawCell::Bool(_) => CellValue::Invalid,
        }
    }
}

enum CellValue {
    Number(f64),
    Blank,
    Invalid,
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        RawCell::Text(s.to_string())
    }
}

impl From<f64> for RawCell {
    fn from(n: f64) -> Self {
        RawCell::Number(n)
    }
}

/// Rectangular input table with a header row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RawCell>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Schema Mapping
// ============================================================================

/// The five fields every input table must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    Equipment,
    Floor,
    Kpi,
    Timestamp,
    Value,
}

impl LogicalField {
    pub const ALL: [LogicalField; 5] = [
        LogicalField::Equipment,
        LogicalField::Floor,
        LogicalField::Kpi,
        LogicalField::Timestamp,
        LogicalField::Value,
    ];

    fn synonyms(self, table: &ColumnSynonyms) -> &[String] {
        match self {
            LogicalField::Equipment => &table.equipment,
            LogicalField::Floor => &table.floor,
            LogicalField::Kpi => &table.kpi,
            LogicalField::Timestamp => &table.timestamp,
            LogicalField::Value => &table.value,
        }
    }
}

impl std::fmt::Display for LogicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalField::Equipment => write!(f, "equipment"),
            LogicalField::Floor => write!(f, "floor"),
            LogicalField::Kpi => write!(f, "kpi"),
            LogicalField::Timestamp => write!(f, "timestamp"),
            LogicalField::Value => write!(f, "value"),
        }
    }
}

/// Resolved column index per logical field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub equipment: usize,
    pub floor: usize,
    pub kpi: usize,
    pub timestamp: usize,
    pub value: usize,
}

impl ColumnMapping {
    /// Bind every logical field to a distinct column.
    pub fn resolve(columns: &[String], synonyms: &ColumnSynonyms) -> Result<Self, ValidationError> {
        let lowered: Vec<String> = columns.iter().map(|c| c.trim().to_lowercase()).collect();
        let mut bound: BTreeMap<LogicalField, usize> = BTreeMap::new();
        let claimed = |bound: &BTreeMap<LogicalField, usize>, idx: usize| bound.values().any(|&b| b == idx);

        // Pass 1: exact matches
        for field in LogicalField::ALL {
            for syn in field.synonyms(synonyms) {
                let syn = syn.trim().to_lowercase();
                if let Some(idx) = lowered
                    .iter()
                    .enumerate()
                    .position(|(i, col)| *col == syn && !claimed(&bound, i))
                {
                    bound.insert(field, idx);
                    break;
                }
            }
        }

        // Pass 2: substring matches, longest synonym first
        let mut candidates: Vec<(LogicalField, String)> = LogicalField::ALL
            .iter()
            .filter(|f| !bound.contains_key(*f))
            .flat_map(|&f| {
                f.synonyms(synonyms)
                    .iter()
                    .map(move |s| (f, s.trim().to_lowercase()))
            })
            .filter(|(_, s)| !s.is_empty())
            .collect();
        candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        for (field, syn) in candidates {
            if bound.contains_key(&field) {
                continue;
            }
            if let Some(idx) = lowered
                .iter()
                .enumerate()
                .position(|(i, col)| col.contains(&syn) && !claimed(&bound, i))
            {
                debug!(field = %field, column = %columns[idx], synonym = %syn, "Column bound by substring");
                bound.insert(field, idx);
            }
        }

        let get = |field: LogicalField| {
            bound
                .get(&field)
                .copied()
                .ok_or_else(|| ValidationError::MissingColumn {
                    field,
                    synonyms: field.synonyms(synonyms).to_vec(),
                    columns: columns.to_vec(),
                })
        };

        Ok(Self {
            equipment: get(LogicalField::Equipment)?,
            floor: get(LogicalField::Floor)?,
            kpi: get(LogicalField::Kpi)?,
            timestamp: get(LogicalField::Timestamp)?,
            value: get(LogicalField::Value)?,
        })
    }
}

// ============================================================================
// Duplicate Reduction
// ============================================================================

/// How readings sharing (equipment, floor, kpi, timestamp) collapse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateRule {
    /// Average of the non-null values
    #[default]
    Mean,
    /// First non-null value in input order
    First,
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
    first: Option<f64>,
}

impl Accumulator {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
            self.first.get_or_insert(v);
        }
    }

    fn reduce(&self, rule: DuplicateRule) -> Option<f64> {
        match rule {
            DuplicateRule::Mean => (self.count > 0).then(|| self.sum / self.count as f64),
            DuplicateRule::First => self.first,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required {field} column not found (looked for {synonyms:?} in {columns:?})")]
    MissingColumn {
        field: LogicalField,
        synonyms: Vec<String>,
        columns: Vec<String>,
    },

    #[error("No usable rows remain after coercion ({dropped} dropped)")]
    NoRows { dropped: usize },

    #[error("Input table has no data rows")]
    EmptyTable,

    #[error("Row {row} has {found} cells but the header has {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
}

// ============================================================================
// Normalization
// ============================================================================

#[derive(Debug, Default)]
struct DropCounts {
    blank_id: usize,
    bad_timestamp: usize,
    bad_value: usize,
}

impl DropCounts {
    const fn total(&self) -> usize {
        self.blank_id + self.bad_timestamp + self.bad_value
    }
}

/// Map a raw table onto the canonical reading schema.
pub fn normalize(
    table: &RawTable,
    config: &NormalizerConfig,
    policy: &ThresholdPolicy,
) -> Result<CanonicalTable, ValidationError> {
    let mapping = ColumnMapping::resolve(&table.columns, &config.columns)?;

    if table.rows.is_empty() {
        return Err(ValidationError::EmptyTable);
    }

    let width = table.columns.len();
    let mut groups: BTreeMap<(String, String, String, chrono::NaiveDateTime), Accumulator> =
        BTreeMap::new();
    let mut kpi_labels: BTreeMap<String, String> = BTreeMap::new();
    let mut drops = DropCounts::default();
    let mut unknown_kpi_rows = 0usize;

    for (row_idx, row) in table.rows.iter().enumerate() {
        if row.len() != width {
            return Err(ValidationError::RaggedRow {
                row: row_idx,
                found: row.len(),
                expected: width,
            });
        }

        let (Some(equipment), Some(floor), Some(raw_kpi)) = (
            row[mapping.equipment].as_text(),
            row[mapping.floor].as_text(),
            row[mapping.kpi].as_text(),
        ) else {
            drops.blank_id += 1;
            continue;
        };

        let kpi_key = policy.resolve_key(&raw_kpi);
        if kpi_key.is_empty() {
            drops.blank_id += 1;
            continue;
        }
        if config.known_kpis_only && !policy.is_known(&kpi_key) {
            unknown_kpi_rows += 1;
            continue;
        }

        let Some(ts) = row[mapping.timestamp]
            .as_text()
            .as_deref()
            .and_then(parse_timestamp)
        else {
            drops.bad_timestamp += 1;
            continue;
        };

        let value = match row[mapping.value].coerce_value() {
            CellValue::Number(v) => Some(v),
            CellValue::Blank => None,
            CellValue::Invalid => {
                drops.bad_value += 1;
                continue;
            }
        };

        kpi_labels.entry(kpi_key.clone()).or_insert(raw_kpi);
        groups
            .entry((equipment, floor, kpi_key, ts))
            .or_default()
            .push(value);
    }

    debug!(
        blank_id = drops.blank_id,
        bad_timestamp = drops.bad_timestamp,
        bad_value = drops.bad_value,
        unknown_kpi = unknown_kpi_rows,
        "Rows dropped during normalization"
    );

    if groups.is_empty() {
        return Err(ValidationError::NoRows {
            dropped: drops.total() + unknown_kpi_rows,
        });
    }

    let readings: Vec<Reading> = groups
        .into_iter()
        .map(|((equipment_id, floor_id, kpi_key, timestamp), acc)| Reading {
            value: acc.reduce(config.duplicate_rule),
            equipment_id,
            floor_id,
            kpi_key,
            timestamp,
        })
        .collect();

    info!(
        input_rows = table.rows.len(),
        readings = readings.len(),
        dropped = drops.total(),
        kpis = kpi_labels.len(),
        "Table normalized"
    );

    Ok(CanonicalTable {
        readings,
        kpi_labels,
        dropped_rows: drops.total(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(cells: &[&str]) -> Vec<RawCell> {
        cells
            .iter()
            .map(|c| if c.is_empty() { RawCell::Null } else { RawCell::from(*c) })
            .collect()
    }

    fn standard_table(rows: Vec<Vec<RawCell>>) -> RawTable {
        RawTable::new(cols(&["EQ", "Floor", "ckpi", "ckpi_statistics_date", "ave"]), rows)
    }

    #[test]
    fn test_exact_columns_resolve() {
        let m = ColumnMapping::resolve(
            &cols(&["EQ", "Floor", "ckpi", "ckpi_statistics_date", "ave"]),
            &ColumnSynonyms::default(),
        )
        .unwrap();
        assert_eq!((m.equipment, m.floor, m.kpi, m.timestamp, m.value), (0, 1, 2, 3, 4));
    }

    #[test]
    fn test_substring_pass_does_not_double_bind() {
        // "ckpi" is a substring of the date column; the longer synonym claims it first
        let m = ColumnMapping::resolve(
            &cols(&["CKPI_STATISTICS_DATE_LOCAL", "Equipment No", "Floor Level", "CKPI Name", "Average Value"]),
            &ColumnSynonyms::default(),
        )
        .unwrap();
        assert_eq!(m.timestamp, 0);
        assert_eq!(m.equipment, 1);
        assert_eq!(m.floor, 2);
        assert_eq!(m.kpi, 3);
        assert_eq!(m.value, 4);
    }

    #[test]
    fn test_missing_column_reports_field() {
        let err = ColumnMapping::resolve(&cols(&["EQ", "Floor", "ckpi", "date"]), &ColumnSynonyms::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingColumn { field: LogicalField::Value, .. }));
    }

    #[test]
    fn test_normalize_canonicalizes_and_aliases_kpis() {
        let table = standard_table(vec![
            row(&["EQ1", "1", "Door Friction", "2025-01-01", "40"]),
            row(&["EQ1", "1", "Door Speed Error", "2025-01-01", "0.06"]),
        ]);
        let out = normalize(&table, &NormalizerConfig::default(), &ThresholdPolicy::default()).unwrap();
        let keys: Vec<&str> = out.readings.iter().map(|r| r.kpi_key.as_str()).collect();
        assert!(keys.contains(&"doorfriction"));
        assert!(keys.contains(&"cumulativedoorspeederror"));
        assert_eq!(out.kpi_label("doorfriction"), "Door Friction");
    }

    #[test]
    fn test_blank_value_kept_as_nodata_and_bad_rows_dropped() {
        let table = standard_table(vec![
            row(&["EQ1", "1", "doorFriction", "2025-01-01", ""]),
            row(&["EQ1", "1", "doorFriction", "not a date", "40"]),
            row(&["EQ1", "1", "doorFriction", "2025-01-03", "n/a"]),
            row(&["", "1", "doorFriction", "2025-01-04", "40"]),
            row(&["EQ1", "1", "doorFriction", "2025-01-05", "41"]),
        ]);
        let out = normalize(&table, &NormalizerConfig::default(), &ThresholdPolicy::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.readings[0].value, None);
        assert_eq!(out.readings[1].value, Some(41.0));
        assert_eq!(out.dropped_rows, 3);
    }

    #[test]
    fn test_duplicate_rules() {
        let rows = vec![
            row(&["EQ1", "1", "doorfriction", "2025-01-01", ""]),
            row(&["EQ1", "1", "doorfriction", "2025-01-01", "40"]),
            row(&["EQ1", "1", "doorfriction", "2025-01-01", "44"]),
        ];
        let policy = ThresholdPolicy::default();

        let mean = normalize(&standard_table(rows.clone()), &NormalizerConfig::default(), &policy).unwrap();
        assert_eq!(mean.len(), 1);
        assert_eq!(mean.readings[0].value, Some(42.0));

        let config = NormalizerConfig {
            duplicate_rule: DuplicateRule::First,
            ..NormalizerConfig::default()
        };
        let first = normalize(&standard_table(rows), &config, &policy).unwrap();
        assert_eq!(first.readings[0].value, Some(40.0));
    }

    #[test]
    fn test_numeric_floor_cells_match_text() {
        let table = standard_table(vec![
            vec![
                RawCell::from("EQ1"),
                RawCell::Number(3.0),
                RawCell::from("doorfriction"),
                RawCell::from("2025-01-01"),
                RawCell::Number(40.0),
            ],
            row(&["EQ1", "3", "doorfriction", "2025-01-01", "44"]),
        ]);
        let out = normalize(&table, &NormalizerConfig::default(), &ThresholdPolicy::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.readings[0].floor_id, "3");
    }

    #[test]
    fn test_unknown_kpis_filtered_when_configured() {
        let table = standard_table(vec![
            row(&["EQ1", "1", "Motor Temperature", "2025-01-01", "70"]),
            row(&["EQ1", "1", "doorfriction", "2025-01-01", "40"]),
        ]);
        let policy = ThresholdPolicy::default();
        let strict = normalize(&table, &NormalizerConfig::default(), &policy).unwrap();
        assert_eq!(strict.len(), 1);

        let config = NormalizerConfig {
            known_kpis_only: false,
            ..NormalizerConfig::default()
        };
        let open = normalize(&table, &config, &policy).unwrap();
        assert_eq!(open.len(), 2);
    }

    #[test]
    fn test_no_surviving_rows_is_an_error() {
        let table = standard_table(vec![row(&["EQ1", "1", "doorfriction", "garbage", "40"])]);
        let err = normalize(&table, &NormalizerConfig::default(), &ThresholdPolicy::default()).unwrap_err();
        assert_eq!(err, ValidationError::NoRows { dropped: 1 });
    }

    #[test]
    fn test_empty_and_ragged_tables() {
        let config = NormalizerConfig::default();
        let policy = ThresholdPolicy::default();
        assert_eq!(
            normalize(&standard_table(vec![]), &config, &policy).unwrap_err(),
            ValidationError::EmptyTable
        );
        let ragged = standard_table(vec![row(&["EQ1", "1", "doorfriction"])]);
        assert!(matches!(
            normalize(&ragged, &config, &policy).unwrap_err(),
            ValidationError::RaggedRow { row: 0, found: 3, expected: 5 }
        ));
    }
}
