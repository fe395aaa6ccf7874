//! Dispersion-based KPI stability scores
//!
//! `norm_std = std / (max_std + ε)` where the maximum is taken over the
//! current filtered set, so scores are relative to the equipment being
//! compared, not to any absolute scale.

use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{Reading, VariabilityScore};

#[derive(Debug, Clone, Copy)]
pub struct VariabilityScorer {
    epsilon: f64,
}

impl VariabilityScorer {
    pub const fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Score every (equipment, kpi) group present in `readings`.
    ///
    /// Groups without any non-null value are skipped. Output is ordered
    /// by (equipment, kpi).
    pub fn score(&self, readings: &[&Reading]) -> Vec<VariabilityScore> {
        let mut groups: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
        for r in readings {
            let values = groups
                .entry((r.equipment_id.as_str(), r.kpi_key.as_str()))
                .or_default();
            if let Some(v) = r.value {
                values.push(v);
            }
        }

        let stats: Vec<((&str, &str), usize, f64, f64)> = groups
            .into_iter()
            .filter_map(|(key, values)| {
                if values.is_empty() {
                    debug!(equipment = key.0, kpi = key.1, "No data for variability group");
                    return None;
                }
                let n = values.len();
                let mean = values.iter().mean();
                // sample std; a single point carries no dispersion
                let std = if n >= 2 { values.iter().std_dev() } else { 0.0 };
                Some((key, n, mean, std))
            })
            .collect();

        let max_std = stats.iter().map(|s| s.3).fold(0.0_f64, f64::max);

        stats
            .into_iter()
            .map(|((equipment_id, kpi), sample_count, mean, std)| {
                let normalized_std = std / (max_std + self.epsilon);
                VariabilityScore {
                    equipment_id: equipment_id.to_string(),
                    kpi: kpi.to_string(),
                    sample_count,
                    mean,
                    std,
                    normalized_std,
                    health_sub_score: normalized_std.mul_add(-100.0, 100.0).clamp(0.0, 100.0),
                }
            })
            .collect()
    }
}
