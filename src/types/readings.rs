//! Canonical readings, series keys and the normalized table

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collapse a raw KPI name to its canonical key.
///
/// Strips every non-alphanumeric character and lower-cases the rest, so
/// `"Door Friction"`, `"door_friction"` and `"doorFriction"` all become
/// `"doorfriction"`.
pub fn canonical_kpi_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One normalized KPI measurement.
///
/// Unique per (equipment_id, floor_id, kpi_key, timestamp) once the
/// normalizer has reduced duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub equipment_id: String,
    pub floor_id: String,
    pub kpi_key: String,
    pub timestamp: NaiveDateTime,
    /// `None` when the source cell was blank
    pub value: Option<f64>,
}

impl Reading {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Series key of this reading at the requested granularity
    pub fn series_key(&self, granularity: SeriesGranularity) -> SeriesKey {
        match granularity {
            SeriesGranularity::EquipmentKpi => SeriesKey {
                equipment_id: self.equipment_id.clone(),
                floor_id: None,
                kpi_key: self.kpi_key.clone(),
            },
            SeriesGranularity::EquipmentFloorKpi => SeriesKey {
                equipment_id: self.equipment_id.clone(),
                floor_id: Some(self.floor_id.clone()),
                kpi_key: self.kpi_key.clone(),
            },
        }
    }
}

/// Grouping granularity for a series-level analysis
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeriesGranularity {
    /// One series per (equipment, kpi), floors pooled
    EquipmentKpi,
    /// One series per (equipment, floor, kpi)
    #[default]
    EquipmentFloorKpi,
}

impl std::fmt::Display for SeriesGranularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesGranularity::EquipmentKpi => write!(f, "equipment_kpi"),
            SeriesGranularity::EquipmentFloorKpi => write!(f, "equipment_floor_kpi"),
        }
    }
}

impl std::str::FromStr for SeriesGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "equipment_kpi" => Ok(SeriesGranularity::EquipmentKpi),
            "equipment_floor_kpi" => Ok(SeriesGranularity::EquipmentFloorKpi),
            other => Err(format!("unknown granularity '{other}'")),
        }
    }
}

/// Identifies one analysed series
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub equipment_id: String,
    /// `None` when floors are pooled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<String>,
    pub kpi_key: String,
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.floor_id {
            Some(floor) => write!(f, "{}:{}:{}", self.equipment_id, floor, self.kpi_key),
            None => write!(f, "{}:{}", self.equipment_id, self.kpi_key),
        }
    }
}

/// Output of the normalizer: deduplicated readings in canonical form.
///
/// Readings are sorted by (equipment, floor, kpi, timestamp).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalTable {
    pub readings: Vec<Reading>,
    /// First raw display name seen for each canonical KPI key
    pub kpi_labels: BTreeMap<String, String>,
    /// Rows discarded during coercion (bad timestamp, bad value, blank ids)
    pub dropped_rows: usize,
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Display label for a KPI, falling back to the canonical key
    pub fn kpi_label<'a>(&'a self, kpi_key: &'a str) -> &'a str {
        self.kpi_labels.get(kpi_key).map_or(kpi_key, String::as_str)
    }

    /// Latest reading date, used to anchor relative date presets
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.readings.iter().map(Reading::date).max()
    }

    pub fn earliest_date(&self) -> Option<NaiveDate> {
        self.readings.iter().map(Reading::date).min()
    }
}
