//! Analysis Configuration Module
//!
//! Every analytic constant (thresholds, sensitivity, weights, forecast model
//! knobs, server settings) is an operator-tunable TOML value.
//!
//! ## Loading Order
//!
//! 1. `LIFTGUARD_CONFIG` environment variable (path to TOML file)
//! 2. `liftguard.toml` in the current working directory
//! 3. Built-in defaults (matching the dashboard constants)
//!
//! ## Usage
//!
//! The config is loaded once in `main` and handed to the service by value;
//! nothing reads it from global state.
//!
//! ```ignore
//! let config = AnalysisConfig::load();
//! let service = AnalysisService::new(config);
//! ```

mod analysis_config;
pub mod defaults;
pub mod validation;

pub use analysis_config::*;
