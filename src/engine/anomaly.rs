//! Local peak/low detection combining KPI thresholds with a statistical band
//!
//! A point is flagged only when it is a strict local extremum AND it lies
//! outside either the KPI's acceptable range or the `μ ± kσ` band of its
//! own series. Plateaus are never flagged.

use chrono::NaiveDateTime;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::defaults;
use crate::types::{
    AnalysisError, AnomalyEvent, AnomalyKind, AnomalySummary, CanonicalTable, PointStatus, Reading,
    SeriesGranularity, SeriesKey, ThresholdPolicy, ThresholdSpec,
};

/// Peak/low detector with a fixed sensitivity factor k
#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector {
    sensitivity: f64,
}

impl AnomalyDetector {
    pub fn new(sensitivity: f64) -> Result<Self, AnalysisError> {
        if !sensitivity.is_finite()
            || !(defaults::MIN_SENSITIVITY..=defaults::MAX_SENSITIVITY).contains(&sensitivity)
        {
            return Err(AnalysisError::InvalidSensitivity(sensitivity));
        }
        Ok(Self { sensitivity })
    }

    pub const fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    /// Flag interior extrema of a time-ordered series.
    ///
    /// μ and σ (population) are taken over the non-null values. A point
    /// is considered only when it and both neighbours are present.
    pub fn detect(&self, values: &[Option<f64>], spec: &ThresholdSpec) -> Vec<(usize, AnomalyKind)> {
        if values.len() < defaults::MIN_ANOMALY_POINTS {
            return Vec::new();
        }

        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return Vec::new();
        }
        let mu = present.iter().mean();
        let sigma = if present.len() > 1 {
            present.iter().population_std_dev()
        } else {
            0.0
        };
        let upper = mu + self.sensitivity * sigma;
        let lower = mu - self.sensitivity * sigma;

        values
            .windows(3)
            .enumerate()
            .filter_map(|(i, w)| {
                let (Some(prev), Some(v), Some(next)) = (w[0], w[1], w[2]) else {
                    return None;
                };
                let is_peak = v > prev
                    && v > next
                    && (spec.high.is_some_and(|h| v > h) || v > upper);
                let is_low = v < prev
                    && v < next
                    && (spec.low.is_some_and(|l| v < l) || v < lower);
                if is_peak {
                    Some((i + 1, AnomalyKind::Peak))
                } else if is_low {
                    Some((i + 1, AnomalyKind::Low))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Run detection over one series of `(timestamp, value)` points
    /// already sorted by time.
    pub fn detect_series(
        &self,
        key: &SeriesKey,
        points: &[(NaiveDateTime, Option<f64>)],
        spec: &ThresholdSpec,
    ) -> Vec<AnomalyEvent> {
        let values: Vec<Option<f64>> = points.iter().map(|(_, v)| *v).collect();
        self.detect(&values, spec)
            .into_iter()
            .filter_map(|(idx, kind)| {
                let (timestamp, value) = points[idx];
                value.map(|value| AnomalyEvent {
                    series_key: key.clone(),
                    timestamp,
                    kind,
                    value,
                })
            })
            .collect()
    }

    /// Detect over every (equipment, floor, kpi) series in `readings` and
    /// roll the counts up per (kpi, floor).
    pub fn analyze(
        &self,
        readings: &[&Reading],
        table: &CanonicalTable,
        policy: &ThresholdPolicy,
    ) -> (Vec<AnomalyEvent>, Vec<AnomalySummary>) {
        let mut series: BTreeMap<SeriesKey, Vec<(NaiveDateTime, Option<f64>)>> = BTreeMap::new();
        let mut summaries: BTreeMap<(String, String), AnomalySummary> = BTreeMap::new();

        for r in readings {
            series
                .entry(r.series_key(SeriesGranularity::EquipmentFloorKpi))
                .or_default()
                .push((r.timestamp, r.value));

            let summary = summaries
                .entry((r.kpi_key.clone(), r.floor_id.clone()))
                .or_insert_with(|| AnomalySummary {
                    kpi: r.kpi_key.clone(),
                    kpi_label: table.kpi_label(&r.kpi_key).to_string(),
                    floor: r.floor_id.clone(),
                    peak_count: 0,
                    low_count: 0,
                    row_count: 0,
                    ok_count: 0,
                    corrective_count: 0,
                    nodata_count: 0,
                });
            summary.row_count += 1;
            match policy.status(&r.kpi_key, r.value) {
                PointStatus::Ok => summary.ok_count += 1,
                PointStatus::Corrective => summary.corrective_count += 1,
                PointStatus::NoData => summary.nodata_count += 1,
            }
        }

        let mut events = Vec::new();
        for (key, mut points) in series {
            points.sort_by_key(|(ts, _)| *ts);
            let found = self.detect_series(&key, &points, &policy.spec(&key.kpi_key));
            if let Some(floor) = &key.floor_id {
                if let Some(summary) = summaries.get_mut(&(key.kpi_key.clone(), floor.clone())) {
                    for e in &found {
                        match e.kind {
                            AnomalyKind::Peak => summary.peak_count += 1,
                            AnomalyKind::Low => summary.low_count += 1,
                        }
                    }
                }
            }
            events.extend(found);
        }

        debug!(
            events = events.len(),
            groups = summaries.len(),
            k = self.sensitivity,
            "Anomaly detection complete"
        );

        (events, summaries.into_values().collect())
    }
}
