//! LiftGuard: elevator door-mechanism KPI analytics
//!
//! Turns periodic equipment-KPI measurements into three artifacts:
//!
//! - **Anomalies**: local peaks and lows outside the KPI range or the
//!   series' own `μ ± kσ` band, rolled up per (kpi, floor)
//! - **Health**: dispersion-based sub-scores combined into a weighted
//!   equipment score and category
//! - **Forecasts**: trend + seasonality extrapolation with the first
//!   predicted threshold breach and remaining life
//!
//! ## Architecture
//!
//! ```text
//! RawTable ─► normalizer ─► CanonicalTable ─► engine::AnalysisPipeline ─► AnalysisReport
//!                                   ▲
//!                            AnalysisContext
//! ```
//!
//! [`service::AnalysisService`] wraps the pipeline for async callers and
//! [`api`] exposes it over HTTP.

pub mod api;
pub mod config;
pub mod engine;
pub mod normalizer;
pub mod service;
pub mod types;

pub use config::AnalysisConfig;
pub use engine::{AnalysisPipeline, AnalysisReport, AnalysisSection, ForecastEngine, ForecastProvider};
pub use normalizer::{normalize, RawCell, RawTable, ValidationError};
pub use service::{AnalysisRequest, AnalysisService, ContextParams, ServiceError};
pub use types::{
    AnalysisContext, AnalysisError, CanonicalTable, EquipmentHealth, ForecastOutcome, HealthStatus, Reading,
    SeriesKey, ThresholdPolicy, ThresholdSpec,
};
