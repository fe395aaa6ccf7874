//! Analysis Configuration - every tunable constant as a TOML value
//!
//! Each section implements `Default` with the dashboard's original
//! constants, so behaviour is unchanged when no config file is present.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::normalizer::DuplicateRule;
use crate::types::{AnalysisContext, SeriesGranularity, ThresholdPolicy, ThresholdSpec};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `AnalysisConfig::load()` which searches:
/// 1. `$LIFTGUARD_CONFIG` env var
/// 2. `./liftguard.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Column mapping and coercion rules
    #[serde(default)]
    pub normalizer: NormalizerConfig,

    /// Per-KPI bound overrides, keyed by raw or canonical KPI name
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdSpec>,

    #[serde(default)]
    pub anomaly: AnomalyConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub insights: InsightsConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl AnalysisConfig {
    /// Load configuration using the standard search order:
    /// 1. `$LIFTGUARD_CONFIG` environment variable
    /// 2. `./liftguard.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys are logged as warnings; range violations are errors.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Threshold overrides must keep low <= high and be finite
    /// - Health bands must be ordered: monitoring_min < excellent_min
    /// - Forecast knobs must be positive and within their documented ranges
    /// - Default weights must be finite and >= 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        for (kpi, spec) in &self.thresholds {
            Self::check_bounds(spec, &format!("thresholds.{kpi}"), &mut errors);
        }

        let h = &self.health;
        if h.monitoring_min >= h.excellent_min {
            errors.push(format!(
                "health.monitoring_min ({:.1}) must be less than excellent_min ({:.1})",
                h.monitoring_min, h.excellent_min
            ));
        }
        if h.epsilon <= 0.0 {
            errors.push("health.epsilon must be > 0".to_string());
        }
        if !h.default_weight.is_finite() || h.default_weight < 0.0 {
            errors.push(format!(
                "health.default_weight ({}) must be a finite value >= 0",
                h.default_weight
            ));
        }
        for (kpi, &w) in &h.weights {
            if !w.is_finite() || w < 0.0 {
                errors.push(format!("health.weights.{kpi} ({w}) must be a finite value >= 0"));
            }
        }

        let f = &self.forecast;
        if f.min_points < 2 {
            errors.push("forecast.min_points must be >= 2".to_string());
        }
        if f.fit_timeout_ms == 0 {
            errors.push("forecast.fit_timeout_ms must be > 0".to_string());
        }
        if f.changepoint_penalty <= 0.0 || f.seasonality_penalty <= 0.0 {
            errors.push("forecast penalties must be > 0".to_string());
        }

        if self.server.request_timeout_secs == 0 {
            errors.push("server.request_timeout_secs must be > 0".to_string());
        }
        if self.normalizer.columns.has_empty_field() {
            errors.push("normalizer.columns: every field needs at least one synonym".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // NaN comparisons pass every check above
        let scalars = [
            ("anomaly.default_sensitivity", self.anomaly.default_sensitivity),
            ("health.excellent_min", h.excellent_min),
            ("health.monitoring_min", h.monitoring_min),
            ("health.epsilon", h.epsilon),
            ("forecast.changepoint_range", f.changepoint_range),
            ("forecast.changepoint_penalty", f.changepoint_penalty),
            ("forecast.seasonality_penalty", f.seasonality_penalty),
            ("forecast.interval_width", f.interval_width),
            ("insights.uncertainty_ratio", self.insights.uncertainty_ratio),
        ];
        for (name, v) in scalars {
            if !v.is_finite() {
                errors.push(format!("{name} must be a finite number (got {v})"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_bounds(spec: &ThresholdSpec, name: &str, errors: &mut Vec<String>) {
        for (label, bound) in [("low", spec.low), ("high", spec.high)] {
            if bound.is_some_and(|b| !b.is_finite()) {
                errors.push(format!("{name}.{label} must be finite"));
                return;
            }
        }
        if let (Some(low), Some(high)) = (spec.low, spec.high) {
            if low > high {
                errors.push(format!("{name}: low ({low}) must be <= high ({high})"));
            }
        }
    }

    /// Built-in threshold table with the configured overrides applied
    pub fn threshold_policy(&self) -> ThresholdPolicy {
        self.thresholds
            .iter()
            .fold(ThresholdPolicy::door_mechanism(), |policy, (kpi, spec)| {
                policy.with_override(kpi, *spec)
            })
    }

    /// Fresh analysis context seeded with the configured defaults
    pub fn context(&self, today: NaiveDate) -> AnalysisContext {
        let policy = self.threshold_policy();
        let mut ctx = AnalysisContext::new(today)
            .with_sensitivity(self.anomaly.default_sensitivity)
            .with_horizon(self.forecast.default_horizon_days)
            .with_granularity(self.forecast.granularity);
        for (kpi, &w) in &self.health.weights {
            ctx = ctx.with_weight(kpi, w, &policy);
        }
        ctx
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Normalizer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default)]
    pub duplicate_rule: DuplicateRule,

    /// Drop readings whose KPI is not in the threshold table
    #[serde(default = "default_true")]
    pub known_kpis_only: bool,

    #[serde(default)]
    pub columns: ColumnSynonyms,
}

fn default_true() -> bool {
    true
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            duplicate_rule: DuplicateRule::default(),
            known_kpis_only: true,
            columns: ColumnSynonyms::default(),
        }
    }
}

/// Synonyms per logical field, tried in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSynonyms {
    #[serde(default = "default_equipment_synonyms")]
    pub equipment: Vec<String>,
    #[serde(default = "default_floor_synonyms")]
    pub floor: Vec<String>,
    #[serde(default = "default_kpi_synonyms")]
    pub kpi: Vec<String>,
    #[serde(default = "default_timestamp_synonyms")]
    pub timestamp: Vec<String>,
    #[serde(default = "default_value_synonyms")]
    pub value: Vec<String>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

fn default_equipment_synonyms() -> Vec<String> {
    owned(defaults::EQUIPMENT_SYNONYMS)
}

fn default_floor_synonyms() -> Vec<String> {
    owned(defaults::FLOOR_SYNONYMS)
}

fn default_kpi_synonyms() -> Vec<String> {
    owned(defaults::KPI_SYNONYMS)
}

fn default_timestamp_synonyms() -> Vec<String> {
    owned(defaults::TIMESTAMP_SYNONYMS)
}

fn default_value_synonyms() -> Vec<String> {
    owned(defaults::VALUE_SYNONYMS)
}

impl Default for ColumnSynonyms {
    fn default() -> Self {
        Self {
            equipment: default_equipment_synonyms(),
            floor: default_floor_synonyms(),
            kpi: default_kpi_synonyms(),
            timestamp: default_timestamp_synonyms(),
            value: default_value_synonyms(),
        }
    }
}

impl ColumnSynonyms {
    fn has_empty_field(&self) -> bool {
        [&self.equipment, &self.floor, &self.kpi, &self.timestamp, &self.value]
            .iter()
            .any(|list| list.iter().all(|s| s.trim().is_empty()))
    }
}

// ============================================================================
// Anomaly Detection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Sensitivity factor k used when a request does not set one
    #[serde(default = "default_sensitivity")]
    pub default_sensitivity: f64,
}

fn default_sensitivity() -> f64 {
    defaults::DEFAULT_SENSITIVITY
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            default_sensitivity: default_sensitivity(),
        }
    }
}

// ============================================================================
// Health Scoring
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_kpi_weight")]
    pub default_weight: f64,

    #[serde(default = "default_excellent_min")]
    pub excellent_min: f64,

    #[serde(default = "default_monitoring_min")]
    pub monitoring_min: f64,

    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Per-KPI weights applied when a request does not override them
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

fn default_kpi_weight() -> f64 {
    defaults::DEFAULT_KPI_WEIGHT
}

fn default_excellent_min() -> f64 {
    defaults::EXCELLENT_MIN_SCORE
}

fn default_monitoring_min() -> f64 {
    defaults::MONITORING_MIN_SCORE
}

fn default_epsilon() -> f64 {
    defaults::VARIABILITY_EPSILON
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            default_weight: default_kpi_weight(),
            excellent_min: default_excellent_min(),
            monitoring_min: default_monitoring_min(),
            epsilon: default_epsilon(),
            weights: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Forecasting
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_horizon_days")]
    pub default_horizon_days: u32,

    #[serde(default = "default_min_points")]
    pub min_points: usize,

    #[serde(default = "default_yearly_order")]
    pub yearly_order: usize,

    #[serde(default = "default_weekly_order")]
    pub weekly_order: usize,

    #[serde(default = "default_changepoints")]
    pub changepoints: usize,

    #[serde(default = "default_changepoint_range")]
    pub changepoint_range: f64,

    #[serde(default = "default_changepoint_penalty")]
    pub changepoint_penalty: f64,

    #[serde(default = "default_seasonality_penalty")]
    pub seasonality_penalty: f64,

    #[serde(default = "default_interval_width")]
    pub interval_width: f64,

    #[serde(default = "default_fit_timeout_ms")]
    pub fit_timeout_ms: u64,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default)]
    pub granularity: SeriesGranularity,
}

fn default_horizon_days() -> u32 {
    defaults::DEFAULT_HORIZON_DAYS
}

fn default_min_points() -> usize {
    defaults::MIN_FORECAST_POINTS
}

fn default_yearly_order() -> usize {
    defaults::YEARLY_FOURIER_ORDER
}

fn default_weekly_order() -> usize {
    defaults::WEEKLY_FOURIER_ORDER
}

fn default_changepoints() -> usize {
    defaults::MAX_CHANGEPOINTS
}

fn default_changepoint_range() -> f64 {
    defaults::CHANGEPOINT_RANGE
}

fn default_changepoint_penalty() -> f64 {
    defaults::CHANGEPOINT_PENALTY
}

fn default_seasonality_penalty() -> f64 {
    defaults::SEASONALITY_PENALTY
}

fn default_interval_width() -> f64 {
    defaults::INTERVAL_WIDTH
}

fn default_fit_timeout_ms() -> u64 {
    defaults::FIT_TIMEOUT_MS
}

fn default_cache_capacity() -> usize {
    defaults::FORECAST_CACHE_CAPACITY
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_horizon_days: default_horizon_days(),
            min_points: default_min_points(),
            yearly_order: default_yearly_order(),
            weekly_order: default_weekly_order(),
            changepoints: default_changepoints(),
            changepoint_range: default_changepoint_range(),
            changepoint_penalty: default_changepoint_penalty(),
            seasonality_penalty: default_seasonality_penalty(),
            interval_width: default_interval_width(),
            fit_timeout_ms: default_fit_timeout_ms(),
            cache_capacity: default_cache_capacity(),
            granularity: SeriesGranularity::default(),
        }
    }
}

// ============================================================================
// Insights
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsConfig {
    /// Anomaly ratio above which a technician check is raised
    #[serde(default = "default_uncertainty_ratio")]
    pub uncertainty_ratio: f64,
}

fn default_uncertainty_ratio() -> f64 {
    defaults::UNCERTAINTY_RATIO
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            uncertainty_ratio: default_uncertainty_ratio(),
        }
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `LIFTGUARD_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

fn default_request_timeout_secs() -> u64 {
    defaults::REQUEST_TIMEOUT_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::kpi_keys;

    #[test]
    fn test_default_config_validates() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: AnalysisConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.health.default_weight, 0.5);
        assert_eq!(config.forecast.min_points, 10);
        assert!(config.normalizer.known_kpis_only);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[normalizer]
duplicate_rule = "first"

[thresholds."Door Friction"]
low = 25.0
high = 45.0

[health.weights]
doorfriction = 2.0
"#;
        let config: AnalysisConfig = toml::from_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.normalizer.duplicate_rule, DuplicateRule::First);
        assert_eq!(config.normalizer.columns, ColumnSynonyms::default());
        let policy = config.threshold_policy();
        assert_eq!(
            policy.spec(kpi_keys::DOOR_FRICTION),
            ThresholdSpec::new(Some(25.0), Some(45.0))
        );
        // untouched KPIs keep built-in bounds
        assert_eq!(
            policy.spec(kpi_keys::LOCK_HOOK_TIME),
            ThresholdSpec::new(Some(0.3), None)
        );
    }

    #[test]
    fn test_one_sided_override_parses() {
        let config: AnalysisConfig = toml::from_str("[thresholds.lockhooktime]\nlow = 0.4\n").unwrap();
        assert_eq!(
            config.thresholds.get("lockhooktime"),
            Some(&ThresholdSpec::new(Some(0.4), None))
        );
    }

    #[test]
    fn test_validation_catches_inverted_override() {
        let mut config = AnalysisConfig::default();
        config
            .thresholds
            .insert("doorfriction".into(), ThresholdSpec::new(Some(60.0), Some(50.0)));
        let result = config.validate();
        assert!(result.is_err(), "low > high should fail validation");
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("thresholds.doorfriction")));
        }
    }

    #[test]
    fn test_validation_catches_unordered_health_bands() {
        let mut config = AnalysisConfig::default();
        config.health.monitoring_min = 90.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_catches_negative_weight() {
        let mut config = AnalysisConfig::default();
        config.health.weights.insert("doorfriction".into(), -1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_context_inherits_defaults() {
        let mut config = AnalysisConfig::default();
        config.anomaly.default_sensitivity = 2.0;
        config.health.weights.insert("Door Friction".into(), 0.8);
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let ctx = config.context(today);
        assert_eq!(ctx.sensitivity, 2.0);
        assert_eq!(ctx.horizon_days, 365);
        assert_eq!(ctx.weights.get(kpi_keys::DOOR_FRICTION), Some(&0.8));
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut original = AnalysisConfig::default();
        original
            .thresholds
            .insert("doorfriction".into(), ThresholdSpec::new(None, Some(55.0)));
        let toml_str = original.to_toml().expect("serialization should work");
        let back: AnalysisConfig = toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(original, back);
    }

    #[test]
    fn test_all_sections_serialize() {
        let toml_str = AnalysisConfig::default().to_toml().expect("serialization should work");
        for section in ["[normalizer]", "[normalizer.columns]", "[anomaly]", "[health]", "[forecast]", "[insights]", "[server]"] {
            assert!(toml_str.contains(section), "Missing {section} section");
        }
    }
}
