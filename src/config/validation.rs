//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::{defaults, AnalysisConfig};
use crate::types::ThresholdPolicy;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " — did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the set of fixed dotted key paths for AnalysisConfig.
///
/// Maintained by hand to match the struct hierarchy in analysis_config.rs.
/// Map-valued sections (`thresholds.<kpi>`, `health.weights.<kpi>`) are
/// handled by `is_known_key`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [normalizer]
        "normalizer",
        "normalizer.duplicate_rule",
        "normalizer.known_kpis_only",
        "normalizer.columns",
        "normalizer.columns.equipment",
        "normalizer.columns.floor",
        "normalizer.columns.kpi",
        "normalizer.columns.timestamp",
        "normalizer.columns.value",
        // [thresholds]
        "thresholds",
        // [anomaly]
        "anomaly",
        "anomaly.default_sensitivity",
        // [health]
        "health",
        "health.default_weight",
        "health.excellent_min",
        "health.monitoring_min",
        "health.epsilon",
        "health.weights",
        // [forecast]
        "forecast",
        "forecast.default_horizon_days",
        "forecast.min_points",
        "forecast.yearly_order",
        "forecast.weekly_order",
        "forecast.changepoints",
        "forecast.changepoint_range",
        "forecast.changepoint_penalty",
        "forecast.seasonality_penalty",
        "forecast.interval_width",
        "forecast.fit_timeout_ms",
        "forecast.cache_capacity",
        "forecast.granularity",
        // [insights]
        "insights",
        "insights.uncertainty_ratio",
        // [server]
        "server",
        "server.addr",
        "server.request_timeout_secs",
    ];
    keys.iter().copied().collect()
}

const THRESHOLD_BOUND_KEYS: [&str; 2] = ["low", "high"];

/// Whether a dotted key is valid, including the free-form KPI maps.
fn is_known_key(key: &str, known: &HashSet<&str>) -> bool {
    if known.contains(key) {
        return true;
    }
    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        ["thresholds", _kpi] | ["health", "weights", _kpi] => true,
        ["thresholds", _kpi, bound] => THRESHOLD_BOUND_KEYS.contains(bound),
        _ => false,
    }
}

/// Recursively collect all dotted key paths from a TOML value tree.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut candidates: Vec<&str> = known.iter().copied().collect();
    // deterministic tie-breaking
    candidates.sort_unstable();

    let mut best: Option<(&str, usize)> = None;
    for k in candidates {
        let dist = levenshtein(unknown, k);
        if dist <= 3 && best.map_or(true, |(_, d)| dist < d) {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

/// Suggestion for a mistyped bound inside a `[thresholds.<kpi>]` table.
fn suggest_bound(key: &str) -> Option<String> {
    let (prefix, leaf) = key.rsplit_once('.')?;
    THRESHOLD_BOUND_KEYS
        .iter()
        .find(|b| levenshtein(leaf, b) <= 2)
        .map(|b| format!("{prefix}.{b}"))
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns. Existing configs
/// always continue to work.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        // parse errors are reported by serde later
        return Vec::new();
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        if is_known_key(&key, &known) {
            continue;
        }
        let suggestion = if key.starts_with("thresholds.") {
            suggest_bound(&key)
        } else {
            suggest_correction(&key, &known)
        };
        warnings.push(ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            field: key,
            suggestion,
        });
    }

    warnings
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges on a parsed AnalysisConfig.
///
/// Returns (errors, warnings). Errors are values the engine rejects
/// outright; warnings are legal but suspicious.
pub fn validate_ranges(config: &AnalysisConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let k = config.anomaly.default_sensitivity;
    if !(defaults::MIN_SENSITIVITY..=defaults::MAX_SENSITIVITY).contains(&k) {
        errors.push(format!(
            "anomaly.default_sensitivity = {k} is outside {}-{}",
            defaults::MIN_SENSITIVITY,
            defaults::MAX_SENSITIVITY
        ));
    }

    let f = &config.forecast;
    if !(defaults::MIN_HORIZON_DAYS..=defaults::MAX_HORIZON_DAYS).contains(&f.default_horizon_days) {
        errors.push(format!(
            "forecast.default_horizon_days = {} is outside {}-{} days",
            f.default_horizon_days,
            defaults::MIN_HORIZON_DAYS,
            defaults::MAX_HORIZON_DAYS
        ));
    }
    if !(f.interval_width > 0.0 && f.interval_width < 1.0) {
        errors.push(format!(
            "forecast.interval_width = {} must be strictly between 0 and 1",
            f.interval_width
        ));
    }
    if !(f.changepoint_range > 0.0 && f.changepoint_range <= 1.0) {
        errors.push(format!(
            "forecast.changepoint_range = {} must be in (0, 1]",
            f.changepoint_range
        ));
    }

    let ratio = config.insights.uncertainty_ratio;
    if !(0.0..=1.0).contains(&ratio) {
        errors.push(format!("insights.uncertainty_ratio = {ratio} must be in [0, 1]"));
    }

    let h = &config.health;
    for (name, v) in [("excellent_min", h.excellent_min), ("monitoring_min", h.monitoring_min)] {
        if !(0.0..=100.0).contains(&v) {
            errors.push(format!("health.{name} = {v} must be in [0, 100]"));
        }
    }

    // Suspicious but legal
    let builtin = ThresholdPolicy::door_mechanism();
    for kpi in config.thresholds.keys() {
        let key = builtin.resolve_key(kpi);
        if !builtin.is_known(&key) {
            warnings.push(ValidationWarning {
                field: format!("thresholds.{kpi}"),
                message: format!("thresholds.{kpi} does not match a built-in KPI and adds a new one"),
                suggestion: None,
            });
        }
        if config.thresholds[kpi].is_unbounded() {
            warnings.push(ValidationWarning {
                field: format!("thresholds.{kpi}"),
                message: format!("thresholds.{kpi} has no bounds; every reading will be corrective"),
                suggestion: None,
            });
        }
    }
    if f.cache_capacity == 0 {
        warnings.push(ValidationWarning {
            field: "forecast.cache_capacity".to_string(),
            message: "forecast.cache_capacity = 0 disables forecast memoization".to_string(),
            suggestion: None,
        });
    }
    if f.fit_timeout_ms > 60_000 {
        warnings.push(ValidationWarning {
            field: "forecast.fit_timeout_ms".to_string(),
            message: format!(
                "forecast.fit_timeout_ms = {} exceeds one minute per series",
                f.fit_timeout_ms
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
