//! Weighted equipment health aggregation

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::HealthConfig;
use crate::types::{AnalysisError, EquipmentHealth, HealthStatus, VariabilityScore};

#[derive(Debug, Clone, Copy)]
pub struct HealthAggregator {
    default_weight: f64,
    excellent_min: f64,
    monitoring_min: f64,
}

impl HealthAggregator {
    pub const fn new(default_weight: f64, excellent_min: f64, monitoring_min: f64) -> Self {
        Self {
            default_weight,
            excellent_min,
            monitoring_min,
        }
    }

    pub const fn from_config(config: &HealthConfig) -> Self {
        Self::new(config.default_weight, config.excellent_min, config.monitoring_min)
    }

    pub fn classify(&self, score: f64) -> HealthStatus {
        if score >= self.excellent_min {
            HealthStatus::Excellent
        } else if score >= self.monitoring_min {
            HealthStatus::NeedsMonitoring
        } else {
            HealthStatus::Critical
        }
    }

    /// Combine sub-scores into one record per equipment, ordered by id.
    ///
    /// KPIs missing from `weights` use the default weight.
    pub fn aggregate(
        &self,
        scores: &[VariabilityScore],
        weights: &BTreeMap<String, f64>,
    ) -> Result<Vec<EquipmentHealth>, AnalysisError> {
        let mut by_equipment: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
        for s in scores {
            by_equipment
                .entry(s.equipment_id.as_str())
                .or_default()
                .insert(s.kpi.as_str(), s.health_sub_score);
        }

        let mut out = Vec::with_capacity(by_equipment.len());
        for (equipment_id, sub_scores) in by_equipment {
            let raw: BTreeMap<String, f64> = sub_scores
                .keys()
                .map(|kpi| {
                    let w = weights.get(*kpi).copied().unwrap_or(self.default_weight);
                    ((*kpi).to_string(), w)
                })
                .collect();
            let applied = normalize_weights(&raw)?;

            let health_score = applied
                .iter()
                .map(|(kpi, w)| w * sub_scores.get(kpi.as_str()).copied().unwrap_or(0.0))
                .sum::<f64>()
                .clamp(0.0, 100.0);
            let status = self.classify(health_score);

            debug!(equipment = equipment_id, score = health_score, status = %status, "Equipment health");
            out.push(EquipmentHealth {
                equipment_id: equipment_id.to_string(),
                health_score,
                status,
                kpi_count: sub_scores.len(),
                weights: applied,
            });
        }
        Ok(out)
    }
}

/// Re-normalize non-negative weights to sum to 1.
///
/// An all-zero set falls back to equal weights. Negative or non-finite
/// weights are rejected.
pub fn normalize_weights(
    weights: &BTreeMap<String, f64>,
) -> Result<BTreeMap<String, f64>, AnalysisError> {
    if let Some((kpi, &w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
        return Err(AnalysisError::InvalidWeight(kpi.clone(), w));
    }
    let total: f64 = weights.values().sum();
    if total > 0.0 {
        Ok(weights.iter().map(|(k, w)| (k.clone(), w / total)).collect())
    } else {
        let equal = 1.0 / weights.len().max(1) as f64;
        Ok(weights.keys().map(|k| (k.clone(), equal)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(eq: &str, kpi: &str, s: f64) -> VariabilityScore {
        VariabilityScore {
            equipment_id: eq.into(),
            kpi: kpi.into(),
            sample_count: 10,
            mean: 0.0,
            std: 0.0,
            normalized_std: 0.0,
            health_sub_score: s,
        }
    }

    fn aggregator() -> HealthAggregator {
        HealthAggregator::from_config(&HealthConfig::default())
    }

    #[test]
    fn test_equal_weights_average() {
        let scores = vec![score("EQ1", "a", 90.0), score("EQ1", "b", 50.0)];
        let weights = BTreeMap::from([("a".to_string(), 0.5), ("b".to_string(), 0.5)]);
        let out = aggregator().aggregate(&scores, &weights).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0].health_score - 70.0).abs() < 1e-9);
        assert_eq!(out[0].status, HealthStatus::NeedsMonitoring);
    }

    #[test]
    fn test_unweighted_kpis_use_default() {
        let scores = vec![score("EQ1", "a", 100.0), score("EQ1", "b", 40.0)];
        let weights = BTreeMap::from([("a".to_string(), 1.5)]);
        let out = aggregator().aggregate(&scores, &weights).unwrap();
        // 1.5 / 2.0 and 0.5 / 2.0
        assert!((out[0].health_score - 85.0).abs() < 1e-9);
        assert_eq!(out[0].status, HealthStatus::Excellent);
        assert!((out[0].weights["b"] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_mean() {
        let scores = vec![score("EQ1", "a", 80.0), score("EQ1", "b", 40.0)];
        let weights = BTreeMap::from([("a".to_string(), 0.0), ("b".to_string(), 0.0)]);
        let out = aggregator().aggregate(&scores, &weights).unwrap();
        assert!((out[0].health_score - 60.0).abs() < 1e-9);
        assert_eq!(out[0].status, HealthStatus::Critical);
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let scores = vec![score("EQ1", "a", 80.0)];
        let weights = BTreeMap::from([("a".to_string(), -0.1)]);
        assert!(matches!(
            aggregator().aggregate(&scores, &weights),
            Err(AnalysisError::InvalidWeight(_, _))
        ));
    }

    #[test]
    fn test_normalized_weights_sum_to_one() {
        let weights = BTreeMap::from([
            ("a".to_string(), 0.3),
            ("b".to_string(), 7.0),
            ("c".to_string(), 0.01),
        ]);
        let norm = normalize_weights(&weights).unwrap();
        assert!((norm.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_band_edges() {
        let agg = aggregator();
        assert_eq!(agg.classify(85.0), HealthStatus::Excellent);
        assert_eq!(agg.classify(84.999), HealthStatus::NeedsMonitoring);
        assert_eq!(agg.classify(70.0), HealthStatus::NeedsMonitoring);
        assert_eq!(agg.classify(69.999), HealthStatus::Critical);
    }
}
