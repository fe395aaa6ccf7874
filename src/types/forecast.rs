//! Forecast output records

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::SeriesKey;

/// One fitted or extrapolated point with its uncertainty band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: NaiveDateTime,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Which bound the forecast crosses first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachDirection {
    /// yhat rises above the high bound
    Above,
    /// yhat falls below the low bound
    Below,
}

/// Breach summary for one series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub breach_date: Option<NaiveDate>,
    pub remaining_days: Option<i64>,
    pub direction: Option<BreachDirection>,
}

/// Full forecast of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub series_key: SeriesKey,
    pub provider: String,
    pub horizon_days: u32,
    pub observed_points: usize,
    /// In-sample fit over the observed timestamps
    pub fitted: Vec<ForecastPoint>,
    /// Daily extrapolation across the horizon
    pub predicted: Vec<ForecastPoint>,
    pub breach_date: Option<NaiveDate>,
    pub breach_direction: Option<BreachDirection>,
    pub remaining_days: Option<i64>,
}

impl ForecastResult {
    pub fn summary(&self) -> ForecastSummary {
        ForecastSummary {
            breach_date: self.breach_date,
            remaining_days: self.remaining_days,
            direction: self.breach_direction,
        }
    }
}

/// Per-series forecast outcome; never fails the whole request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Forecast(ForecastResult),
    InsufficientData {
        series_key: SeriesKey,
        points: usize,
        required: usize,
    },
    Failed {
        series_key: SeriesKey,
        reason: String,
    },
}

impl ForecastOutcome {
    pub fn series_key(&self) -> &SeriesKey {
        match self {
            ForecastOutcome::Forecast(r) => &r.series_key,
            ForecastOutcome::InsufficientData { series_key, .. }
            | ForecastOutcome::Failed { series_key, .. } => series_key,
        }
    }

    pub fn as_forecast(&self) -> Option<&ForecastResult> {
        match self {
            ForecastOutcome::Forecast(r) => Some(r),
            _ => None,
        }
    }
}
