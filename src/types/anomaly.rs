//! Anomaly detection output records

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::SeriesKey;

/// Direction of a flagged local extremum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Peak,
    Low,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyKind::Peak => write!(f, "PEAK"),
            AnomalyKind::Low => write!(f, "LOW"),
        }
    }
}

/// A single flagged point in one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub series_key: SeriesKey,
    pub timestamp: NaiveDateTime,
    pub kind: AnomalyKind,
    pub value: f64,
}

/// Per (kpi, floor) anomaly counts across the selected equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub kpi: String,
    pub kpi_label: String,
    pub floor: String,
    pub peak_count: usize,
    pub low_count: usize,
    pub row_count: usize,
    pub ok_count: usize,
    pub corrective_count: usize,
    pub nodata_count: usize,
}

impl AnomalySummary {
    /// Share of rows flagged as peak or low
    pub fn anomaly_ratio(&self) -> f64 {
        if self.row_count == 0 {
            0.0
        } else {
            (self.peak_count + self.low_count) as f64 / self.row_count as f64
        }
    }
}

/// Technician follow-up derived from a dense anomaly summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionableInsight {
    pub floor: String,
    pub kpi: String,
    pub kpi_label: String,
    pub action: String,
    pub remedy: String,
    pub anomaly_ratio: f64,
}

/// Anomaly branch of an analysis report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub sensitivity: f64,
    pub events: Vec<AnomalyEvent>,
    pub summaries: Vec<AnomalySummary>,
    pub insights: Vec<ActionableInsight>,
}

impl AnomalyReport {
    pub fn total_peaks(&self) -> usize {
        self.summaries.iter().map(|s| s.peak_count).sum()
    }

    pub fn total_lows(&self) -> usize {
        self.summaries.iter().map(|s| s.low_count).sum()
    }
}
