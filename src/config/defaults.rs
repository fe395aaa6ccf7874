//! System-wide default constants.
//!
//! Every tunable in `liftguard.toml` falls back to a value defined here.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Configuration Files
// ============================================================================

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "LIFTGUARD_CONFIG";

/// Config file looked up in the working directory when the env var is unset.
pub const LOCAL_CONFIG_FILE: &str = "liftguard.toml";

// ============================================================================
// Normalizer
// ============================================================================

pub const EQUIPMENT_SYNONYMS: &[&str] = &["eq", "equipment"];
pub const FLOOR_SYNONYMS: &[&str] = &["floor"];
pub const KPI_SYNONYMS: &[&str] = &["ckpi", "kpi"];
pub const TIMESTAMP_SYNONYMS: &[&str] = &["ckpi_statistics_date", "date", "timestamp"];
pub const VALUE_SYNONYMS: &[&str] = &["ave", "value"];

// ============================================================================
// Anomaly Detection
// ============================================================================

/// Statistical band multiplier k applied to σ.
pub const DEFAULT_SENSITIVITY: f64 = 1.0;
pub const MIN_SENSITIVITY: f64 = 0.5;
pub const MAX_SENSITIVITY: f64 = 3.0;

/// Series shorter than this cannot have an interior extremum.
pub const MIN_ANOMALY_POINTS: usize = 3;

// ============================================================================
// Health Scoring
// ============================================================================

/// Weight applied to KPIs without an explicit weight.
pub const DEFAULT_KPI_WEIGHT: f64 = 0.5;

/// Lowest score in the Excellent band.
pub const EXCELLENT_MIN_SCORE: f64 = 85.0;

/// Lowest score in the Needs Monitoring band.
pub const MONITORING_MIN_SCORE: f64 = 70.0;

/// Guards the normalized-std denominator against zero.
pub const VARIABILITY_EPSILON: f64 = 1e-9;

// ============================================================================
// Forecasting
// ============================================================================

pub const DEFAULT_HORIZON_DAYS: u32 = 365;
pub const MIN_HORIZON_DAYS: u32 = 30;
pub const MAX_HORIZON_DAYS: u32 = 730;

/// Series with fewer non-null points report insufficient data.
pub const MIN_FORECAST_POINTS: usize = 10;

/// Fourier order of the yearly seasonal component.
pub const YEARLY_FOURIER_ORDER: usize = 10;

/// Fourier order of the weekly seasonal component.
pub const WEEKLY_FOURIER_ORDER: usize = 3;

/// Maximum number of potential trend changepoints.
pub const MAX_CHANGEPOINTS: usize = 25;

/// Share of history (from the start) eligible for changepoints.
pub const CHANGEPOINT_RANGE: f64 = 0.8;

/// Ridge penalty on changepoint slope deltas.
pub const CHANGEPOINT_PENALTY: f64 = 20.0;

/// Ridge penalty on Fourier coefficients.
pub const SEASONALITY_PENALTY: f64 = 0.1;

/// Coverage of the yhat_lower / yhat_upper band.
pub const INTERVAL_WIDTH: f64 = 0.8;

/// Cooperative deadline for one series fit (milliseconds).
pub const FIT_TIMEOUT_MS: u64 = 5_000;

/// Maximum memoized forecasts before FIFO eviction.
pub const FORECAST_CACHE_CAPACITY: usize = 256;

// ============================================================================
// Insights
// ============================================================================

/// Anomaly ratio above which a (floor, kpi) gets a technician check.
pub const UNCERTAINTY_RATIO: f64 = 0.2;

pub const TECHNICIAN_CHECK_ACTION: &str = "High uncertainty → Technician check";

// ============================================================================
// Server
// ============================================================================

pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Upper bound on one analysis request, normalization included (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum accepted request body (bytes). 16 MiB.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Comma-separated list of allowed CORS origins; same-origin only when unset.
pub const CORS_ENV_VAR: &str = "LIFTGUARD_CORS_ORIGINS";

/// API version reported in response envelopes.
pub const API_VERSION: &str = "1";
