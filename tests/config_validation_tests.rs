//! Config Validation Tests
//!
//! Typo detection, range validation and file loading, exercised
//! independently from the analysis pipeline.

use liftguard::config::validation::{known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys};
use liftguard::config::{AnalysisConfig, ConfigError};
use liftguard::normalizer::DuplicateRule;
use liftguard::types::{SeriesGranularity, ThresholdSpec};
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_forecast_section_warns_with_suggestion() {
    let toml_str = r#"
[forecast]
default_horizn_days = 180
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("default_horizn_days"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("forecast.default_horizon_days"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn typo_in_threshold_bound_suggests_bound() {
    let toml_str = r#"
[thresholds.doorfriction]
hihg = 55.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("thresholds.doorfriction.high"));
}

#[test]
fn kpi_maps_accept_any_kpi_name() {
    let toml_str = r#"
[thresholds.mycustomkpi]
low = 1.0
high = 2.0

[health.weights]
doorfriction = 0.8
"lock hook time" = 0.2
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn completely_unknown_key_has_no_suggestion() {
    let toml_str = r#"
[zzzz]
qqqq = 1
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn every_default_key_is_known() {
    let toml_str = AnalysisConfig::default().to_toml().unwrap();
    let warnings = validate_unknown_keys(&toml_str);
    assert!(warnings.is_empty(), "Default config produced warnings: {warnings:?}");
    assert!(known_config_keys().contains("server.request_timeout_secs"));
}

#[test]
fn suggestion_requires_small_edit_distance() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("health.epsilom", &known).as_deref(),
        Some("health.epsilon")
    );
    assert_eq!(suggest_correction("totally.different", &known), None);
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn default_config_validates() {
    let config = AnalysisConfig::default();
    assert!(config.validate().is_ok());
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.is_empty());
}

#[test]
fn out_of_range_values_are_all_reported() {
    let mut config = AnalysisConfig::default();
    config.anomaly.default_sensitivity = 5.0;
    config.forecast.default_horizon_days = 10;
    config.forecast.interval_width = 1.0;

    match config.validate() {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("default_sensitivity")));
            assert!(errors.iter().any(|e| e.contains("default_horizon_days")));
            assert!(errors.iter().any(|e| e.contains("interval_width")));
        }
        other => panic!("Expected validation errors, got {other:?}"),
    }
}

#[test]
fn inverted_threshold_override_is_an_error() {
    let mut config = AnalysisConfig::default();
    config
        .thresholds
        .insert("doorfriction".into(), ThresholdSpec::new(Some(60.0), Some(40.0)));
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn inverted_health_bands_are_an_error() {
    let mut config = AnalysisConfig::default();
    config.health.monitoring_min = 90.0;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn override_for_unknown_kpi_only_warns() {
    let mut config = AnalysisConfig::default();
    config
        .thresholds
        .insert("cabin vibration".into(), ThresholdSpec::new(None, Some(3.0)));
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 1);
}

// ============================================================================
// File Loading
// ============================================================================

#[test]
fn load_from_file_applies_overrides() {
    let file = write_config(
        r#"
[normalizer]
duplicate_rule = "first"

[thresholds."Door Friction"]
low = 25.0
high = 55.0

[anomaly]
default_sensitivity = 1.5

[forecast]
default_horizon_days = 180
granularity = "equipment_kpi"
"#,
    );
    let config = AnalysisConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.normalizer.duplicate_rule, DuplicateRule::First);
    assert_eq!(config.forecast.default_horizon_days, 180);
    assert_eq!(config.forecast.granularity, SeriesGranularity::EquipmentKpi);

    let policy = config.threshold_policy();
    assert_eq!(policy.spec("doorfriction"), ThresholdSpec::new(Some(25.0), Some(55.0)));
    // untouched entries keep the built-in table
    assert_eq!(policy.spec("lockhooktime"), ThresholdSpec::new(Some(0.3), None));
}

#[test]
fn invalid_file_is_rejected() {
    let file = write_config(
        r#"
[health]
excellent_min = 60.0
monitoring_min = 70.0
"#,
    );
    assert!(matches!(
        AnalysisConfig::load_from_file(file.path()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_config("[forecast\nmin_points = ");
    assert!(matches!(
        AnalysisConfig::load_from_file(file.path()),
        Err(ConfigError::Parse(_, _))
    ));
}

#[test]
fn save_then_load_preserves_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("liftguard.toml");
    let mut config = AnalysisConfig::default();
    config.health.weights.insert("doorfriction".into(), 0.9);
    config.save_to_file(&path).unwrap();
    assert_eq!(AnalysisConfig::load_from_file(&path).unwrap(), config);
}
