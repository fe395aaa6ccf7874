//! Shared data structures for door-mechanism KPI analytics
//!
//! This module defines the records that flow through the analysis pipeline:
//! - Canonical readings and series keys (normalizer output)
//! - Threshold specs and point status (threshold policy)
//! - Anomaly, variability, health and forecast output records
//! - The explicit analysis context (filters, weights, horizon)

mod readings;
pub mod thresholds;
mod anomaly;
mod health;
mod forecast;
mod context;

pub use readings::*;
pub use thresholds::*;
pub use anomaly::*;
pub use health::*;
pub use forecast::*;
pub use context::*;
