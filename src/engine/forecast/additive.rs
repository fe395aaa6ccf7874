//! Additive trend + seasonality model
//!
//! `y(t) = trend(t) + yearly(t) + weekly(t)` where the trend is piecewise
//! linear with hinge changepoints over the early history and each seasonal
//! term is a truncated Fourier series. Coefficients come from one ridge
//! least-squares solve; intercept and base slope are unpenalized.

use chrono::{Duration, NaiveDateTime};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;
use std::time::Instant;

use super::linalg::{solve_ridge, Deadline};
use super::{ForecastError, ForecastProvider, ModelForecast};
use crate::config::{defaults, ForecastConfig};
use crate::types::ForecastPoint;

const MILLIS_PER_DAY: f64 = 86_400_000.0;
const YEAR_DAYS: f64 = 365.25;
const WEEK_DAYS: f64 = 7.0;

/// Days since the Unix epoch; anchors seasonal phase to the calendar
fn epoch_days(ts: NaiveDateTime) -> f64 {
    ts.and_utc().timestamp_millis() as f64 / MILLIS_PER_DAY
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveSeasonalModel {
    pub yearly_order: usize,
    pub weekly_order: usize,
    pub changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_penalty: f64,
    pub seasonality_penalty: f64,
    pub interval_width: f64,
}

impl Default for AdditiveSeasonalModel {
    fn default() -> Self {
        Self {
            yearly_order: defaults::YEARLY_FOURIER_ORDER,
            weekly_order: defaults::WEEKLY_FOURIER_ORDER,
            changepoints: defaults::MAX_CHANGEPOINTS,
            changepoint_range: defaults::CHANGEPOINT_RANGE,
            changepoint_penalty: defaults::CHANGEPOINT_PENALTY,
            seasonality_penalty: defaults::SEASONALITY_PENALTY,
            interval_width: defaults::INTERVAL_WIDTH,
        }
    }
}

impl AdditiveSeasonalModel {
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            yearly_order: config.yearly_order,
            weekly_order: config.weekly_order,
            changepoints: config.changepoints,
            changepoint_range: config.changepoint_range,
            changepoint_penalty: config.changepoint_penalty,
            seasonality_penalty: config.seasonality_penalty,
            interval_width: config.interval_width,
        }
    }

    /// Changepoint positions in scaled time, evenly spread over the rows
    /// of the first `changepoint_range` share of history.
    fn changepoint_locations(&self, t: &[f64]) -> Vec<f64> {
        let hist_size = (t.len() as f64 * self.changepoint_range).floor() as usize;
        let count = self.changepoints.min(hist_size.saturating_sub(1));
        if count == 0 {
            return Vec::new();
        }
        let step = (hist_size - 1) as f64 / count as f64;
        let mut cps: Vec<f64> = (1..=count)
            .map(|i| t[((i as f64 * step).round() as usize).min(t.len() - 1)])
            .filter(|&c| c > 0.0 && c < 1.0)
            .collect();
        cps.dedup();
        cps
    }

    fn penalties(&self, n_changepoints: usize) -> Vec<f64> {
        let seasonal = 2 * (self.yearly_order + self.weekly_order);
        let mut p = vec![0.0, 0.0];
        p.extend(std::iter::repeat(self.changepoint_penalty).take(n_changepoints));
        p.extend(std::iter::repeat(self.seasonality_penalty).take(seasonal));
        p
    }

    /// One design-matrix row
    fn features(&self, t: f64, day: f64, changepoints: &[f64]) -> Vec<f64> {
        let mut row = Vec::with_capacity(2 + changepoints.len() + 2 * (self.yearly_order + self.weekly_order));
        row.push(1.0);
        row.push(t);
        row.extend(changepoints.iter().map(|&c| (t - c).max(0.0)));
        for (period, order) in [(YEAR_DAYS, self.yearly_order), (WEEK_DAYS, self.weekly_order)] {
            for k in 1..=order {
                let angle = 2.0 * PI * k as f64 * day / period;
                row.push(angle.sin());
                row.push(angle.cos());
            }
        }
        row
    }

    fn z_score(&self) -> Result<f64, ForecastError> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidInterval(self.interval_width));
        }
        let normal = Normal::new(0.0, 1.0).map_err(|_| ForecastError::InvalidInterval(self.interval_width))?;
        Ok(normal.inverse_cdf(0.5 + self.interval_width / 2.0))
    }
}

impl ForecastProvider for AdditiveSeasonalModel {
    fn name(&self) -> &str {
        "additive-seasonal"
    }

    fn forecast(
        &self,
        history: &[(NaiveDateTime, f64)],
        horizon_days: u32,
        deadline: Option<Instant>,
    ) -> Result<ModelForecast, ForecastError> {
        let z = self.z_score()?;
        let deadline = Deadline::new(deadline);

        let mut hist: Vec<(NaiveDateTime, f64)> =
            history.iter().copied().filter(|(_, v)| v.is_finite()).collect();
        hist.sort_by_key(|(ts, _)| *ts);
        let (Some(&(first, _)), Some(&(last, _))) = (hist.first(), hist.last()) else {
            return Err(ForecastError::InsufficientData { points: 0, required: 2 });
        };
        if hist.len() < 2 {
            return Err(ForecastError::InsufficientData {
                points: hist.len(),
                required: 2,
            });
        }

        let span_days = (last - first).num_milliseconds() as f64 / MILLIS_PER_DAY;
        if span_days <= 0.0 {
            return Err(ForecastError::DegenerateTimeline);
        }
        let scaled = |ts: NaiveDateTime| (ts - first).num_milliseconds() as f64 / MILLIS_PER_DAY / span_days;

        let y_scale = hist.iter().map(|(_, v)| v.abs()).fold(0.0_f64, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let t: Vec<f64> = hist.iter().map(|(ts, _)| scaled(*ts)).collect();
        let changepoints = self.changepoint_locations(&t);

        let mut rows = Vec::with_capacity(hist.len());
        for ((ts, _), &ti) in hist.iter().zip(&t) {
            deadline.check()?;
            rows.push(self.features(ti, epoch_days(*ts), &changepoints));
        }
        let y: Vec<f64> = hist.iter().map(|(_, v)| v / y_scale).collect();

        let beta = solve_ridge(&rows, &y, &self.penalties(changepoints.len()), deadline)?;
        let predict = |row: &[f64]| row.iter().zip(&beta).map(|(x, b)| x * b).sum::<f64>() * y_scale;

        let in_sample: Vec<f64> = rows.iter().map(|r| predict(r)).collect();
        let rss: f64 = in_sample
            .iter()
            .zip(&hist)
            .map(|(yhat, (_, v))| (v - yhat).powi(2))
            .sum();
        let sigma = (rss / hist.len() as f64).sqrt();

        let point = |timestamp: NaiveDateTime, ti: f64, yhat: f64| {
            let half = z * sigma * (1.0 + (ti - 1.0).max(0.0)).sqrt();
            ForecastPoint {
                timestamp,
                yhat,
                yhat_lower: yhat - half,
                yhat_upper: yhat + half,
            }
        };

        let fitted = hist
            .iter()
            .zip(&t)
            .zip(&in_sample)
            .map(|(((ts, _), &ti), &yhat)| point(*ts, ti, yhat))
            .collect();

        let mut predicted = Vec::with_capacity(horizon_days as usize);
        for d in 1..=i64::from(horizon_days) {
            let ts = last + Duration::days(d);
            let ti = scaled(ts);
            let yhat = predict(&self.features(ti, epoch_days(ts), &changepoints));
            predicted.push(point(ts, ti, yhat));
        }

        Ok(ModelForecast { fitted, predicted })
    }
}
