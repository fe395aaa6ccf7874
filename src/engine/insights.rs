//! Actionable insights from anomaly density

use crate::config::defaults;
use crate::types::{ActionableInsight, AnomalySummary, ThresholdPolicy};

#[derive(Debug, Clone, Copy)]
pub struct InsightBuilder {
    uncertainty_ratio: f64,
}

impl InsightBuilder {
    pub const fn new(uncertainty_ratio: f64) -> Self {
        Self { uncertainty_ratio }
    }

    /// One technician-check row per (floor, kpi) whose peaks plus lows
    /// exceed `uncertainty_ratio` of its rows.
    pub fn build(&self, summaries: &[AnomalySummary], policy: &ThresholdPolicy) -> Vec<ActionableInsight> {
        summaries
            .iter()
            .filter(|s| {
                s.row_count > 0
                    && (s.peak_count + s.low_count) as f64 > self.uncertainty_ratio * s.row_count as f64
            })
            .map(|s| ActionableInsight {
                floor: s.floor.clone(),
                kpi: s.kpi.clone(),
                kpi_label: s.kpi_label.clone(),
                action: defaults::TECHNICIAN_CHECK_ACTION.to_string(),
                remedy: policy.remedy(&s.kpi).to_string(),
                anomaly_ratio: s.anomaly_ratio(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{kpi_keys, DEFAULT_REMEDY};

    fn summary(kpi: &str, peaks: usize, lows: usize, rows: usize) -> AnomalySummary {
        AnomalySummary {
            kpi: kpi.into(),
            kpi_label: kpi.into(),
            floor: "1".into(),
            peak_count: peaks,
            low_count: lows,
            row_count: rows,
            ok_count: rows,
            corrective_count: 0,
            nodata_count: 0,
        }
    }

    #[test]
    fn test_ratio_must_be_strictly_exceeded() {
        let builder = InsightBuilder::new(0.2);
        let policy = ThresholdPolicy::default();
        let out = builder.build(
            &[
                summary(kpi_keys::DOOR_FRICTION, 1, 1, 10),
                summary(kpi_keys::LOCK_HOOK_TIME, 2, 1, 10),
            ],
            &policy,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kpi, kpi_keys::LOCK_HOOK_TIME);
        assert_eq!(out[0].remedy, "Verify actuator response timing");
        assert!((out[0].anomaly_ratio - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_kpi_gets_default_remedy() {
        let out = InsightBuilder::new(0.2).build(&[summary("mystery", 5, 0, 5)], &ThresholdPolicy::default());
        assert_eq!(out[0].remedy, DEFAULT_REMEDY);
    }

    #[test]
    fn test_empty_summary_never_flags() {
        let out = InsightBuilder::new(0.0).build(&[summary("x", 0, 0, 0)], &ThresholdPolicy::default());
        assert!(out.is_empty());
    }
}
