//! Door-mechanism KPI thresholds and point status classification

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::canonical_kpi_key;

/// Canonical keys of the six door-mechanism KPIs
pub mod kpi_keys {
    pub const DOOR_FRICTION: &str = "doorfriction";
    pub const DOOR_SPEED_ERROR: &str = "cumulativedoorspeederror";
    pub const LOCK_HOOK_CLOSING_TIME: &str = "lockhookclosingtime";
    pub const LOCK_HOOK_TIME: &str = "lockhooktime";
    pub const COUPLER_COMPRESS_FORCE: &str = "maximumforceduringcompress";
    pub const LOCK_ROLLER_CLEARANCE: &str = "landingdoorlockrollerclearance";
}

/// Remedy used when a KPI has no specific maintenance action
pub const DEFAULT_REMEDY: &str = "Follow standard inspection checklist";

/// Acceptable range for one KPI. `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl ThresholdSpec {
    pub const fn new(low: Option<f64>, high: Option<f64>) -> Self {
        Self { low, high }
    }

    pub const fn unbounded() -> Self {
        Self { low: None, high: None }
    }

    /// True when neither bound is defined
    pub const fn is_unbounded(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }

    /// Classify a value against this range.
    ///
    /// Bounds are inclusive. A spec without any bound classifies every
    /// present value as corrective.
    pub fn status(&self, value: Option<f64>) -> PointStatus {
        let Some(v) = value.filter(|v| !v.is_nan()) else {
            return PointStatus::NoData;
        };
        let ok = match (self.low, self.high) {
            (Some(low), Some(high)) => low <= v && v <= high,
            (None, Some(high)) => v <= high,
            (Some(low), None) => v >= low,
            (None, None) => false,
        };
        if ok {
            PointStatus::Ok
        } else {
            PointStatus::Corrective
        }
    }
}

/// Per-reading classification against the KPI's acceptable range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    Ok,
    Corrective,
    NoData,
}

impl std::fmt::Display for PointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointStatus::Ok => write!(f, "ok"),
            PointStatus::Corrective => write!(f, "corrective"),
            PointStatus::NoData => write!(f, "nodata"),
        }
    }
}

/// One row of the threshold table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiPolicy {
    pub key: String,
    pub display_name: String,
    pub spec: ThresholdSpec,
    pub remedy: String,
}

/// Static KPI threshold table with optional per-KPI overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    entries: BTreeMap<String, KpiPolicy>,
    /// Canonicalized display names and legacy spellings → canonical key
    aliases: BTreeMap<String, String>,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::door_mechanism()
    }
}

impl ThresholdPolicy {
    /// The built-in door-mechanism table
    pub fn door_mechanism() -> Self {
        use kpi_keys::*;

        let rows: [(&str, &str, Option<f64>, Option<f64>, &str); 6] = [
            (
                DOOR_FRICTION,
                "Door Friction",
                Some(30.0),
                Some(50.0),
                "Lubricate guide rails; inspect rollers",
            ),
            (
                DOOR_SPEED_ERROR,
                "Door Speed Error",
                Some(0.05),
                Some(0.08),
                "Check door motor encoder calibration",
            ),
            (
                LOCK_HOOK_CLOSING_TIME,
                "Landing Door Lock Hook Closing Time",
                Some(0.2),
                Some(0.6),
                "Inspect lock hook mechanism and wiring",
            ),
            (
                LOCK_HOOK_TIME,
                "Landing Door Lock Hook Open Time",
                Some(0.3),
                None,
                "Verify actuator response timing",
            ),
            (
                COUPLER_COMPRESS_FORCE,
                "Maximum Force During Coupler Compress",
                Some(5.0),
                Some(28.0),
                "Check coupler alignment settings",
            ),
            (
                LOCK_ROLLER_CLEARANCE,
                "Landing Door Lock Roller Clearance",
                None,
                Some(0.029),
                "Measure roller clearance; replace worn rollers",
            ),
        ];

        let mut entries = BTreeMap::new();
        let mut aliases = BTreeMap::new();
        for (key, display, low, high, remedy) in rows {
            aliases.insert(canonical_kpi_key(display), key.to_string());
            entries.insert(
                key.to_string(),
                KpiPolicy {
                    key: key.to_string(),
                    display_name: display.to_string(),
                    spec: ThresholdSpec::new(low, high),
                    remedy: remedy.to_string(),
                },
            );
        }

        Self { entries, aliases }
    }

    /// Replace the bounds of a KPI, adding it to the table if unknown.
    pub fn with_override(mut self, kpi: &str, spec: ThresholdSpec) -> Self {
        let key = self.resolve_key(kpi);
        self.entries
            .entry(key.clone())
            .and_modify(|e| e.spec = spec)
            .or_insert_with(|| KpiPolicy {
                display_name: kpi.to_string(),
                key,
                spec,
                remedy: DEFAULT_REMEDY.to_string(),
            });
        self
    }

    /// Map a raw or canonical KPI name to the canonical key, applying aliases.
    pub fn resolve_key(&self, raw: &str) -> String {
        let key = canonical_kpi_key(raw);
        self.aliases.get(&key).cloned().unwrap_or(key)
    }

    pub fn is_known(&self, kpi_key: &str) -> bool {
        self.entries.contains_key(kpi_key)
    }

    /// Threshold spec for a KPI; unknown KPIs are unbounded
    pub fn spec(&self, kpi_key: &str) -> ThresholdSpec {
        self.entries
            .get(kpi_key)
            .map_or_else(ThresholdSpec::unbounded, |e| e.spec)
    }

    pub fn remedy(&self, kpi_key: &str) -> &str {
        self.entries
            .get(kpi_key)
            .map_or(DEFAULT_REMEDY, |e| e.remedy.as_str())
    }

    pub fn display_name<'a>(&'a self, kpi_key: &'a str) -> &'a str {
        self.entries
            .get(kpi_key)
            .map_or(kpi_key, |e| e.display_name.as_str())
    }

    /// Status of a value for the given KPI
    pub fn status(&self, kpi_key: &str, value: Option<f64>) -> PointStatus {
        self.spec(kpi_key).status(value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &KpiPolicy> {
        self.entries.values()
    }
}
