//! Async analysis façade shared by the CLI and the HTTP API
//!
//! Normalization and every analysis branch are CPU-bound, so each request
//! runs on the blocking pool under the configured request timeout. The
//! forecast cache is owned here and shared by all requests.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::engine::{AnalysisPipeline, AnalysisReport, AnalysisSection, CacheStats, ForecastCache};
use crate::normalizer::{self, loader, LoadError, RawTable, ValidationError};
use crate::types::{
    AnalysisContext, AnalysisError, CanonicalTable, DatePreset, DateRange, SeriesGranularity, ThresholdPolicy,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Analysis did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Analysis task failed: {0}")]
    Join(String),
}

impl ServiceError {
    /// True for errors caused by the request rather than the server
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Analysis(_) | Self::Load(_))
    }
}

/// Table payload: explicit `{columns, rows}` or a list of record objects
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub table: Option<RawTable>,
    #[serde(default)]
    pub records: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub context: ContextParams,
}

impl AnalysisRequest {
    pub fn into_parts(self) -> Result<(RawTable, ContextParams), LoadError> {
        let table = match (self.table, self.records) {
            (Some(table), None) => table,
            (None, Some(records)) => loader::records_to_table(&records)?,
            (Some(_), Some(_)) => {
                return Err(LoadError::UnsupportedShape(
                    "send either `table` or `records`, not both".into(),
                ))
            }
            (None, None) => return Err(LoadError::UnsupportedShape("missing `table` or `records`".into())),
        };
        Ok((table, self.context))
    }
}

/// Optional request overrides; anything absent falls back to config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextParams {
    pub equipment: Option<Vec<String>>,
    pub floors: Option<Vec<String>>,
    pub kpis: Option<Vec<String>>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub preset: Option<DatePreset>,
    pub sensitivity: Option<f64>,
    pub horizon_days: Option<u32>,
    pub weights: BTreeMap<String, f64>,
    pub granularity: Option<SeriesGranularity>,
    /// Invocation date; defaults to the local calendar date
    pub today: Option<NaiveDate>,
}

impl ContextParams {
    /// Merge onto the configured defaults
    pub fn into_context(self, config: &AnalysisConfig, policy: &ThresholdPolicy) -> AnalysisContext {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let mut ctx = config.context(today).with_date_range(DateRange {
            start: self.from,
            end: self.to,
        });
        if let Some(ids) = self.equipment {
            ctx = ctx.with_equipment(ids);
        }
        if let Some(floors) = self.floors {
            ctx = ctx.with_floors(floors);
        }
        if let Some(kpis) = self.kpis {
            ctx = ctx.with_kpis(kpis, policy);
        }
        if let Some(preset) = self.preset {
            ctx = ctx.with_preset(preset);
        }
        if let Some(k) = self.sensitivity {
            ctx = ctx.with_sensitivity(k);
        }
        if let Some(days) = self.horizon_days {
            ctx = ctx.with_horizon(days);
        }
        if let Some(g) = self.granularity {
            ctx = ctx.with_granularity(g);
        }
        for (kpi, w) in self.weights {
            ctx = ctx.with_weight(&kpi, w, policy);
        }
        ctx
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisService {
    config: Arc<AnalysisConfig>,
    pipeline: Arc<AnalysisPipeline>,
    cache: Arc<ForecastCache>,
    timeout: Duration,
}

impl AnalysisService {
    pub fn new(config: AnalysisConfig) -> Self {
        let cache = Arc::new(ForecastCache::new(config.forecast.cache_capacity));
        let pipeline = AnalysisPipeline::from_config(&config).with_cache(Arc::clone(&cache));
        let timeout = Duration::from_secs(config.server.request_timeout_secs);
        info!(
            cache_capacity = config.forecast.cache_capacity,
            timeout_secs = config.server.request_timeout_secs,
            "Analysis service ready"
        );
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            cache,
            timeout,
        }
    }

    /// Override the request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        self.pipeline.policy()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn context(&self, params: ContextParams) -> AnalysisContext {
        params.into_context(&self.config, self.policy())
    }

    pub fn normalize(&self, raw: &RawTable) -> Result<CanonicalTable, ValidationError> {
        normalizer::normalize(raw, &self.config.normalizer, self.policy())
    }

    /// Normalize and analyse on the calling thread
    pub fn analyze_blocking(
        &self,
        raw: &RawTable,
        ctx: &AnalysisContext,
        section: AnalysisSection,
    ) -> Result<AnalysisReport, ServiceError> {
        ctx.validate()?;
        let table = self.normalize(raw)?;
        Ok(self.pipeline.run_sections(&table, ctx, section)?)
    }

    /// Normalize and analyse on the blocking pool, bounded by the request timeout.
    pub async fn analyze(
        &self,
        raw: RawTable,
        ctx: AnalysisContext,
        section: AnalysisSection,
    ) -> Result<AnalysisReport, ServiceError> {
        let service = self.clone();
        let task = tokio::task::spawn_blocking(move || service.analyze_blocking(&raw, &ctx, section));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ServiceError::Join(e.to_string())),
            Err(_) => {
                warn!(timeout = ?self.timeout, "Analysis request timed out");
                Err(ServiceError::Timeout(self.timeout))
            }
        }
    }

    /// Decode a request body and analyse it
    pub async fn handle(
        &self,
        request: AnalysisRequest,
        section: AnalysisSection,
    ) -> Result<AnalysisReport, ServiceError> {
        let (raw, params) = request.into_parts()?;
        let ctx = self.context(params);
        self.analyze(raw, ctx, section).await
    }
}
