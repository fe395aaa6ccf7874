//! Analysis engine
//!
//! ```text
//! CanonicalTable ──select(ctx)──┬── AnomalyDetector ── InsightBuilder
//!                               ├── VariabilityScorer ── HealthAggregator
//!                               └── ForecastEngine (provider + cache)
//! ```
//!
//! Every branch is a pure function of the selected readings and the
//! context; [`AnalysisPipeline`] runs them and assembles the report.

pub mod anomaly;
pub mod forecast;
pub mod health;
pub mod insights;
mod pipeline;
pub mod variability;

pub use anomaly::AnomalyDetector;
pub use forecast::{
    find_breach, AdditiveSeasonalModel, CacheStats, ForecastCache, ForecastEngine, ForecastError,
    ForecastProvider, ModelForecast,
};
pub use health::{normalize_weights, HealthAggregator};
pub use insights::InsightBuilder;
pub use pipeline::{AnalysisPipeline, AnalysisReport, AnalysisSection};
pub use variability::VariabilityScorer;
