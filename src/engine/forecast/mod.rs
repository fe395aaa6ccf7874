//! Threshold-breach forecasting
//!
//! Each series is fitted by a [`ForecastProvider`] and the daily horizon
//! points are scanned for the first crossing of the KPI's acceptable
//! range. Per-series failures are reported as outcomes, never as errors
//! of the whole request.

pub mod additive;
mod cache;
mod linalg;

pub use additive::AdditiveSeasonalModel;
pub use cache::{CacheKey, CacheStats, ForecastCache};

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ForecastConfig;
use crate::types::{
    AnalysisContext, BreachDirection, ForecastOutcome, ForecastPoint, ForecastResult, Reading, SeriesKey,
    ThresholdPolicy, ThresholdSpec,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastError {
    #[error("insufficient data: {points} points, {required} required")]
    InsufficientData { points: usize, required: usize },

    #[error("all observations share one timestamp")]
    DegenerateTimeline,

    #[error("normal equations are singular")]
    SingularSystem,

    #[error("model fit exceeded its deadline")]
    Timeout,

    #[error("interval width {0} must lie strictly between 0 and 1")]
    InvalidInterval(f64),
}

/// In-sample fit plus daily horizon extrapolation
#[derive(Debug, Clone, PartialEq)]
pub struct ModelForecast {
    pub fitted: Vec<ForecastPoint>,
    pub predicted: Vec<ForecastPoint>,
}

/// A time-series model that can extrapolate one series.
///
/// `history` holds finite values; ordering is not assumed. `deadline`,
/// when set, must be honoured cooperatively.
pub trait ForecastProvider: Send + Sync {
    fn name(&self) -> &str;

    fn forecast(
        &self,
        history: &[(NaiveDateTime, f64)],
        horizon_days: u32,
        deadline: Option<Instant>,
    ) -> Result<ModelForecast, ForecastError>;
}

/// First horizon point whose yhat leaves the acceptable range.
///
/// Both bounds are checked on every point, so with a two-sided spec the
/// earlier crossing wins. Bounds are exclusive: touching a bound is ok.
pub fn find_breach(predicted: &[ForecastPoint], spec: &ThresholdSpec) -> Option<(NaiveDate, BreachDirection)> {
    if spec.is_unbounded() {
        return None;
    }
    predicted.iter().find_map(|p| {
        if spec.high.is_some_and(|h| p.yhat > h) {
            Some((p.timestamp.date(), BreachDirection::Above))
        } else if spec.low.is_some_and(|l| p.yhat < l) {
            Some((p.timestamp.date(), BreachDirection::Below))
        } else {
            None
        }
    })
}

/// Runs a provider over series, applying the point floor, the fit
/// deadline and the optional shared cache.
#[derive(Clone)]
pub struct ForecastEngine {
    provider: Arc<dyn ForecastProvider>,
    min_points: usize,
    fit_timeout: Duration,
    cache: Option<Arc<ForecastCache>>,
}

impl std::fmt::Debug for ForecastEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastEngine")
            .field("provider", &self.provider.name())
            .field("min_points", &self.min_points)
            .field("fit_timeout", &self.fit_timeout)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl ForecastEngine {
    pub fn new(provider: Arc<dyn ForecastProvider>, min_points: usize, fit_timeout: Duration) -> Self {
        Self {
            provider,
            min_points,
            fit_timeout,
            cache: None,
        }
    }

    /// Engine backed by [`AdditiveSeasonalModel`] with the configured knobs
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self::new(
            Arc::new(AdditiveSeasonalModel::from_config(config)),
            config.min_points,
            Duration::from_millis(config.fit_timeout_ms),
        )
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ForecastCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn fit(&self, history: &[(NaiveDateTime, f64)], horizon_days: u32) -> Result<ModelForecast, ForecastError> {
        let key = self
            .cache
            .as_ref()
            .map(|_| CacheKey::new(self.provider.name(), history, horizon_days));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key) {
                return Ok(hit);
            }
        }

        let deadline = Instant::now().checked_add(self.fit_timeout);
        let model = self.provider.forecast(history, horizon_days, deadline)?;

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, model.clone());
        }
        Ok(model)
    }

    /// Forecast one series and locate its first breach.
    ///
    /// `points` may contain blank values; only finite ones are fitted.
    pub fn forecast_series(
        &self,
        key: &SeriesKey,
        points: &[(NaiveDateTime, Option<f64>)],
        spec: &ThresholdSpec,
        horizon_days: u32,
        today: NaiveDate,
    ) -> ForecastOutcome {
        let mut history: Vec<(NaiveDateTime, f64)> = points
            .iter()
            .filter_map(|(ts, v)| v.filter(|x| x.is_finite()).map(|x| (*ts, x)))
            .collect();
        history.sort_by_key(|(ts, _)| *ts);

        if history.len() < self.min_points {
            debug!(series = %key, points = history.len(), required = self.min_points, "Too few points to forecast");
            return ForecastOutcome::InsufficientData {
                series_key: key.clone(),
                points: history.len(),
                required: self.min_points,
            };
        }

        match self.fit(&history, horizon_days) {
            Ok(model) => {
                let breach = find_breach(&model.predicted, spec);
                let breach_date = breach.map(|(d, _)| d);
                ForecastOutcome::Forecast(ForecastResult {
                    series_key: key.clone(),
                    provider: self.provider.name().to_string(),
                    horizon_days,
                    observed_points: history.len(),
                    fitted: model.fitted,
                    predicted: model.predicted,
                    breach_date,
                    breach_direction: breach.map(|(_, dir)| dir),
                    remaining_days: breach_date.map(|d| (d - today).num_days()),
                })
            }
            Err(ForecastError::DegenerateTimeline) => {
                let distinct = history.iter().map(|(ts, _)| ts).collect::<BTreeSet<_>>().len();
                ForecastOutcome::InsufficientData {
                    series_key: key.clone(),
                    points: distinct,
                    required: 2,
                }
            }
            Err(ForecastError::InsufficientData { points, required }) => ForecastOutcome::InsufficientData {
                series_key: key.clone(),
                points,
                required,
            },
            Err(e) => {
                warn!(series = %key, error = %e, "Forecast failed");
                ForecastOutcome::Failed {
                    series_key: key.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Forecast every series of `readings` at the context's granularity.
    pub fn forecast_all(
        &self,
        readings: &[&Reading],
        ctx: &AnalysisContext,
        policy: &ThresholdPolicy,
    ) -> Vec<ForecastOutcome> {
        let mut series: BTreeMap<SeriesKey, Vec<(NaiveDateTime, Option<f64>)>> = BTreeMap::new();
        for r in readings {
            series
                .entry(r.series_key(ctx.granularity))
                .or_default()
                .push((r.timestamp, r.value));
        }

        let outcomes: Vec<ForecastOutcome> = series
            .iter()
            .map(|(key, points)| {
                self.forecast_series(key, points, &policy.spec(&key.kpi_key), ctx.horizon_days, ctx.today)
            })
            .collect();

        let forecasts = outcomes.iter().filter(|o| o.as_forecast().is_some()).count();
        let breaches = outcomes
            .iter()
            .filter_map(ForecastOutcome::as_forecast)
            .filter(|r| r.breach_date.is_some())
            .count();
        info!(
            series = outcomes.len(),
            forecasts,
            breaches,
            granularity = %ctx.granularity,
            horizon_days = ctx.horizon_days,
            "Forecast pass complete"
        );
        outcomes
    }
}
