//! Runs the analysis branches over one filtered table
//!
//! ```text
//! validate(ctx) → select(table, ctx) → anomalies | health | forecasts → AnalysisReport
//! ```
//!
//! The pipeline holds no per-request state; the same pipeline can serve
//! any number of requests, each with its own table and context.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::{AnomalyDetector, ForecastCache, ForecastEngine, HealthAggregator, InsightBuilder, VariabilityScorer};
use crate::config::AnalysisConfig;
use crate::types::{
    AnalysisContext, AnalysisError, AnomalyReport, CanonicalTable, DateRange, ForecastOutcome, HealthReport,
    KpiHealthRecord, Reading, ThresholdPolicy,
};

/// Which branches a request asks for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSection {
    #[default]
    All,
    Anomalies,
    Health,
    Forecast,
}

impl AnalysisSection {
    fn includes(self, other: Self) -> bool {
        self == Self::All || self == other
    }
}

impl std::str::FromStr for AnalysisSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "anomalies" | "anomaly" => Ok(Self::Anomalies),
            "health" | "health-scores" => Ok(Self::Health),
            "forecast" | "forecasts" => Ok(Self::Forecast),
            other => Err(format!("unknown section '{other}'")),
        }
    }
}

/// Structured output of one analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Invocation date used for remaining-life figures
    pub today: NaiveDate,
    /// Date window after preset resolution
    pub date_range: DateRange,
    pub readings_selected: usize,
    pub dropped_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<AnomalyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecasts: Option<Vec<ForecastOutcome>>,
}

#[derive(Debug, Clone)]
pub struct AnalysisPipeline {
    policy: ThresholdPolicy,
    scorer: VariabilityScorer,
    aggregator: HealthAggregator,
    insights: InsightBuilder,
    forecaster: ForecastEngine,
}

impl AnalysisPipeline {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            policy: config.threshold_policy(),
            scorer: VariabilityScorer::new(config.health.epsilon),
            aggregator: HealthAggregator::from_config(&config.health),
            insights: InsightBuilder::new(config.insights.uncertainty_ratio),
            forecaster: ForecastEngine::from_config(&config.forecast),
        }
    }

    /// Share a fit cache across pipelines
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ForecastCache>) -> Self {
        self.forecaster = self.forecaster.with_cache(cache);
        self
    }

    /// Replace the forecast engine, e.g. to plug in another provider
    #[must_use]
    pub fn with_forecaster(mut self, forecaster: ForecastEngine) -> Self {
        self.forecaster = forecaster;
        self
    }

    pub const fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Run every branch
    pub fn run(&self, table: &CanonicalTable, ctx: &AnalysisContext) -> Result<AnalysisReport, AnalysisError> {
        self.run_sections(table, ctx, AnalysisSection::All)
    }

    /// Run the requested branches over the readings selected by `ctx`.
    ///
    /// The context is validated before any computation starts.
    pub fn run_sections(
        &self,
        table: &CanonicalTable,
        ctx: &AnalysisContext,
        section: AnalysisSection,
    ) -> Result<AnalysisReport, AnalysisError> {
        ctx.validate()?;
        let started = Instant::now();
        let readings = ctx.select(table);

        let anomalies = if section.includes(AnalysisSection::Anomalies) {
            Some(self.anomalies(&readings, table, ctx)?)
        } else {
            None
        };
        let health = if section.includes(AnalysisSection::Health) {
            Some(self.health(&readings, ctx)?)
        } else {
            None
        };
        let forecasts = section
            .includes(AnalysisSection::Forecast)
            .then(|| self.forecaster.forecast_all(&readings, ctx, &self.policy));

        info!(
            section = ?section,
            readings = readings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(AnalysisReport {
            today: ctx.today,
            date_range: ctx.effective_range(table),
            readings_selected: readings.len(),
            dropped_rows: table.dropped_rows,
            anomalies,
            health,
            forecasts,
        })
    }

    pub fn run_anomalies(&self, table: &CanonicalTable, ctx: &AnalysisContext) -> Result<AnomalyReport, AnalysisError> {
        ctx.validate()?;
        self.anomalies(&ctx.select(table), table, ctx)
    }

    pub fn run_health(&self, table: &CanonicalTable, ctx: &AnalysisContext) -> Result<HealthReport, AnalysisError> {
        ctx.validate()?;
        self.health(&ctx.select(table), ctx)
    }

    pub fn run_forecasts(
        &self,
        table: &CanonicalTable,
        ctx: &AnalysisContext,
    ) -> Result<Vec<ForecastOutcome>, AnalysisError> {
        ctx.validate()?;
        Ok(self.forecaster.forecast_all(&ctx.select(table), ctx, &self.policy))
    }

    fn anomalies(
        &self,
        readings: &[&Reading],
        table: &CanonicalTable,
        ctx: &AnalysisContext,
    ) -> Result<AnomalyReport, AnalysisError> {
        let detector = AnomalyDetector::new(ctx.sensitivity)?;
        let (events, summaries) = detector.analyze(readings, table, &self.policy);
        let insights = self.insights.build(&summaries, &self.policy);
        Ok(AnomalyReport {
            sensitivity: detector.sensitivity(),
            events,
            summaries,
            insights,
        })
    }

    fn health(&self, readings: &[&Reading], ctx: &AnalysisContext) -> Result<HealthReport, AnalysisError> {
        let variability = self.scorer.score(readings);
        let equipment = self.aggregator.aggregate(&variability, &ctx.weights)?;
        let kpi_scores = variability.iter().map(KpiHealthRecord::from).collect();
        Ok(HealthReport {
            variability,
            kpi_scores,
            equipment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::kpi_keys;
    use chrono::Duration;

    fn table() -> CanonicalTable {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let friction = [40.0, 41.0, 40.5, 62.0, 40.0, 39.5, 40.2, 40.1, 40.3, 40.0, 39.8, 40.4];
        let mut readings = Vec::new();
        for (eq, spread) in [("EQ1", 1.0), ("EQ2", 3.0)] {
            for (i, v) in friction.iter().enumerate() {
                readings.push(Reading {
                    equipment_id: eq.into(),
                    floor_id: "1".into(),
                    kpi_key: kpi_keys::DOOR_FRICTION.into(),
                    timestamp: (start + Duration::days(i as i64)).and_hms_opt(0, 0, 0).unwrap(),
                    value: Some(40.0 + (v - 40.0) * spread),
                });
            }
        }
        CanonicalTable {
            readings,
            ..CanonicalTable::default()
        }
    }

    fn ctx() -> AnalysisContext {
        AnalysisContext::new(NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()).with_horizon(30)
    }

    fn pipeline() -> AnalysisPipeline {
        AnalysisPipeline::from_config(&AnalysisConfig::default())
    }

    #[test]
    fn test_full_run_has_every_section() {
        let report = pipeline().run(&table(), &ctx()).unwrap();
        assert_eq!(report.readings_selected, 24);
        let anomalies = report.anomalies.unwrap();
        assert_eq!(anomalies.total_peaks(), 2);
        let health = report.health.unwrap();
        assert_eq!(health.equipment.len(), 2);
        assert_eq!(health.ranked()[0].equipment_id, "EQ2");
        assert_eq!(report.forecasts.unwrap().len(), 2);
    }

    #[test]
    fn test_section_filter() {
        let report = pipeline()
            .run_sections(&table(), &ctx(), AnalysisSection::Health)
            .unwrap();
        assert!(report.anomalies.is_none());
        assert!(report.forecasts.is_none());
        assert!(report.health.is_some());
    }

    #[test]
    fn test_invalid_context_is_rejected_up_front() {
        let bad = ctx().with_sensitivity(5.0);
        assert_eq!(
            pipeline().run(&table(), &bad),
            Err(AnalysisError::InvalidSensitivity(5.0))
        );
    }

    #[test]
    fn test_rerun_is_identical() {
        let p = pipeline();
        assert_eq!(p.run(&table(), &ctx()).unwrap(), p.run(&table(), &ctx()).unwrap());
    }

    #[test]
    fn test_section_parse() {
        assert_eq!("health-scores".parse::<AnalysisSection>(), Ok(AnalysisSection::Health));
        assert!("nope".parse::<AnalysisSection>().is_err());
    }
}
