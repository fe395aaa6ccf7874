//! Explicit analysis context: filters, sensitivity, weights and horizon.
//!
//! Every analysis is a pure function of (canonical table, context). The
//! context is built once per request and never mutated by the engine.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::{CanonicalTable, Reading, SeriesGranularity, ThresholdPolicy};
use crate::config::defaults;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("Sensitivity {0} outside allowed range {min}-{max}", min = defaults::MIN_SENSITIVITY, max = defaults::MAX_SENSITIVITY)]
    InvalidSensitivity(f64),

    #[error("Forecast horizon {0} days outside allowed range {min}-{max}", min = defaults::MIN_HORIZON_DAYS, max = defaults::MAX_HORIZON_DAYS)]
    InvalidHorizon(u32),

    #[error("Weight for KPI {0} must be a finite value >= 0, got {1}")]
    InvalidWeight(String, f64),

    #[error("Date range start {0} is after end {1}")]
    InvalidDateRange(NaiveDate, NaiveDate),
}

// ============================================================================
// Date Windows
// ============================================================================

/// Inclusive calendar window; open on a side when the bound is `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub const fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Quick-select windows anchored on the latest reading in the data,
/// not on the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatePreset {
    PastWeek,
    PastMonth,
    #[serde(rename = "past-3-months")]
    Past3Months,
    #[serde(rename = "past-6-months")]
    Past6Months,
    PastYear,
}

impl DatePreset {
    pub const fn days(self) -> i64 {
        match self {
            DatePreset::PastWeek => 7,
            DatePreset::PastMonth => 30,
            DatePreset::Past3Months => 90,
            DatePreset::Past6Months => 180,
            DatePreset::PastYear => 365,
        }
    }

    pub fn resolve(self, latest: NaiveDate) -> DateRange {
        DateRange::between(latest - Duration::days(self.days()), latest)
    }
}

impl std::str::FromStr for DatePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "past-week" | "week" => Ok(DatePreset::PastWeek),
            "past-month" | "month" => Ok(DatePreset::PastMonth),
            "past-3-months" | "3-months" => Ok(DatePreset::Past3Months),
            "past-6-months" | "6-months" => Ok(DatePreset::Past6Months),
            "past-year" | "year" => Ok(DatePreset::PastYear),
            other => Err(format!("unknown date preset '{other}'")),
        }
    }
}

// ============================================================================
// Analysis Context
// ============================================================================

/// Filters and parameters for one analysis request.
///
/// `None` filters select everything. KPI filters hold canonical keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub equipment: Option<BTreeSet<String>>,
    pub floors: Option<BTreeSet<String>>,
    pub kpis: Option<BTreeSet<String>>,
    pub date_range: DateRange,
    /// Takes precedence over `date_range` when set
    pub preset: Option<DatePreset>,
    pub sensitivity: f64,
    pub weights: BTreeMap<String, f64>,
    pub horizon_days: u32,
    /// Invocation date used for remaining-life calculations
    pub today: NaiveDate,
    pub granularity: SeriesGranularity,
}

impl AnalysisContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            equipment: None,
            floors: None,
            kpis: None,
            date_range: DateRange::default(),
            preset: None,
            sensitivity: defaults::DEFAULT_SENSITIVITY,
            weights: BTreeMap::new(),
            horizon_days: defaults::DEFAULT_HORIZON_DAYS,
            today,
            granularity: SeriesGranularity::default(),
        }
    }

    pub fn with_equipment<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equipment = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_floors<I, S>(mut self, floors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.floors = Some(floors.into_iter().map(Into::into).collect());
        self
    }

    /// Select KPIs by raw or canonical name, resolved through the policy aliases
    pub fn with_kpis<I, S>(mut self, kpis: I, policy: &ThresholdPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.kpis = Some(kpis.into_iter().map(|k| policy.resolve_key(k.as_ref())).collect());
        self
    }

    pub const fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = range;
        self
    }

    pub const fn with_preset(mut self, preset: DatePreset) -> Self {
        self.preset = Some(preset);
        self
    }

    pub const fn with_sensitivity(mut self, k: f64) -> Self {
        self.sensitivity = k;
        self
    }

    pub const fn with_horizon(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    pub const fn with_granularity(mut self, granularity: SeriesGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Set a KPI weight, keyed by canonical name
    pub fn with_weight(mut self, kpi: &str, weight: f64, policy: &ThresholdPolicy) -> Self {
        self.weights.insert(policy.resolve_key(kpi), weight);
        self
    }

    /// Check parameter ranges before any computation runs.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.sensitivity.is_finite()
            || !(defaults::MIN_SENSITIVITY..=defaults::MAX_SENSITIVITY).contains(&self.sensitivity)
        {
            return Err(AnalysisError::InvalidSensitivity(self.sensitivity));
        }
        if !(defaults::MIN_HORIZON_DAYS..=defaults::MAX_HORIZON_DAYS).contains(&self.horizon_days) {
            return Err(AnalysisError::InvalidHorizon(self.horizon_days));
        }
        for (kpi, &w) in &self.weights {
            if !w.is_finite() || w < 0.0 {
                return Err(AnalysisError::InvalidWeight(kpi.clone(), w));
            }
        }
        if let (Some(s), Some(e)) = (self.date_range.start, self.date_range.end) {
            if s > e {
                return Err(AnalysisError::InvalidDateRange(s, e));
            }
        }
        Ok(())
    }

    /// Date window after resolving any preset against the table's latest date
    pub fn effective_range(&self, table: &CanonicalTable) -> DateRange {
        match (self.preset, table.latest_date()) {
            (Some(preset), Some(latest)) => preset.resolve(latest),
            _ => self.date_range,
        }
    }

    pub fn kpi_selected(&self, kpi_key: &str) -> bool {
        self.kpis.as_ref().map_or(true, |set| set.contains(kpi_key))
    }

    fn matches(&self, reading: &Reading, range: &DateRange) -> bool {
        self.equipment
            .as_ref()
            .map_or(true, |set| set.contains(&reading.equipment_id))
            && self
                .floors
                .as_ref()
                .map_or(true, |set| set.contains(&reading.floor_id))
            && self.kpi_selected(&reading.kpi_key)
            && range.contains(reading.date())
    }

    /// Readings of `table` that pass every filter, in table order.
    pub fn select<'a>(&self, table: &'a CanonicalTable) -> Vec<&'a Reading> {
        let range = self.effective_range(table);
        table
            .readings
            .iter()
            .filter(|r| self.matches(r, &range))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reading(eq: &str, floor: &str, kpi: &str, d: NaiveDate) -> Reading {
        Reading {
            equipment_id: eq.into(),
            floor_id: floor.into(),
            kpi_key: kpi.into(),
            timestamp: d.and_hms_opt(0, 0, 0).unwrap(),
            value: Some(1.0),
        }
    }

    fn table() -> CanonicalTable {
        CanonicalTable {
            readings: vec![
                reading("EQ1", "1", "doorfriction", date(2025, 1, 1)),
                reading("EQ1", "2", "doorfriction", date(2025, 3, 1)),
                reading("EQ2", "1", "lockhooktime", date(2025, 3, 25)),
                reading("EQ2", "1", "doorfriction", date(2025, 3, 31)),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_context_validates() {
        assert!(AnalysisContext::new(date(2025, 6, 1)).validate().is_ok());
    }

    #[test]
    fn test_sensitivity_range_enforced() {
        let ctx = AnalysisContext::new(date(2025, 6, 1)).with_sensitivity(0.4);
        assert_eq!(ctx.validate(), Err(AnalysisError::InvalidSensitivity(0.4)));
        let ctx = AnalysisContext::new(date(2025, 6, 1)).with_sensitivity(3.0);
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn test_horizon_range_enforced() {
        let ctx = AnalysisContext::new(date(2025, 6, 1)).with_horizon(10);
        assert_eq!(ctx.validate(), Err(AnalysisError::InvalidHorizon(10)));
        let ctx = AnalysisContext::new(date(2025, 6, 1)).with_horizon(730);
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let policy = ThresholdPolicy::default();
        let ctx = AnalysisContext::new(date(2025, 6, 1)).with_weight("Door Friction", -1.0, &policy);
        assert!(matches!(ctx.validate(), Err(AnalysisError::InvalidWeight(k, _)) if k == "doorfriction"));
    }

    #[test]
    fn test_preset_anchors_on_latest_reading() {
        let t = table();
        let ctx = AnalysisContext::new(date(2030, 1, 1)).with_preset(DatePreset::PastWeek);
        let range = ctx.effective_range(&t);
        assert_eq!(range, DateRange::between(date(2025, 3, 24), date(2025, 3, 31)));
        let selected = ctx.select(&t);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_filters_combine() {
        let policy = ThresholdPolicy::default();
        let t = table();
        let ctx = AnalysisContext::new(date(2025, 6, 1))
            .with_equipment(["EQ1"])
            .with_kpis(["Door Friction"], &policy)
            .with_floors(["2"]);
        let selected = ctx.select(&t);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].floor_id, "2");
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!("past-month".parse::<DatePreset>(), Ok(DatePreset::PastMonth));
        assert_eq!("Past-3-Months".parse::<DatePreset>(), Ok(DatePreset::Past3Months));
        assert!("fortnight".parse::<DatePreset>().is_err());
    }
}
