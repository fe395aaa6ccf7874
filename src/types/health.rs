//! Variability scores and equipment health records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dispersion-based stability of one (equipment, kpi) group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariabilityScore {
    pub equipment_id: String,
    pub kpi: String,
    pub sample_count: usize,
    pub mean: f64,
    pub std: f64,
    /// std divided by the largest std in the current filtered set
    pub normalized_std: f64,
    /// `clip(100 - normalized_std * 100, 0, 100)`
    pub health_sub_score: f64,
}

/// Audit record of the sub-score feeding the equipment aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiHealthRecord {
    pub equipment_id: String,
    pub kpi: String,
    pub health_sub_score: f64,
}

impl From<&VariabilityScore> for KpiHealthRecord {
    fn from(score: &VariabilityScore) -> Self {
        Self {
            equipment_id: score.equipment_id.clone(),
            kpi: score.kpi.clone(),
            health_sub_score: score.health_sub_score,
        }
    }
}

/// Equipment health band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Critical,
    NeedsMonitoring,
    Excellent,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Excellent => write!(f, "Excellent"),
            HealthStatus::NeedsMonitoring => write!(f, "Needs Monitoring"),
            HealthStatus::Critical => write!(f, "Critical"),
        }
    }
}

/// Composite health of one equipment unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentHealth {
    pub equipment_id: String,
    pub health_score: f64,
    pub status: HealthStatus,
    pub kpi_count: usize,
    /// Weights actually applied, re-normalized to sum to 1
    pub weights: BTreeMap<String, f64>,
}

/// Health branch of an analysis report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub variability: Vec<VariabilityScore>,
    pub kpi_scores: Vec<KpiHealthRecord>,
    pub equipment: Vec<EquipmentHealth>,
}

impl HealthReport {
    /// Equipment ordered worst-first, ties broken by id
    pub fn ranked(&self) -> Vec<&EquipmentHealth> {
        let mut ranked: Vec<&EquipmentHealth> = self.equipment.iter().collect();
        ranked.sort_by(|a, b| {
            a.health_score
                .partial_cmp(&b.health_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.equipment_id.cmp(&b.equipment_id))
        });
        ranked
    }

    pub fn get(&self, equipment_id: &str) -> Option<&EquipmentHealth> {
        self.equipment.iter().find(|e| e.equipment_id == equipment_id)
    }
}
