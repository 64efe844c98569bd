//! Analysis configuration parsing from environment variables.
//!
//! Significance testing for experiments and degradation checks for snapshots.

use crate::domain::experiment::SignificanceMethod;
use crate::domain::experiment::significance::DEFAULT_CONFIDENCE_LEVEL;
use crate::domain::performance::degradation::{
    DEFAULT_DEGRADATION_METRIC, DEFAULT_DEGRADATION_THRESHOLD,
};
use anyhow::{Context, Result, bail};
use std::env;

/// Analysis environment configuration
#[derive(Debug, Clone)]
pub struct AnalysisEnvConfig {
    pub significance_method: SignificanceMethod,
    pub confidence_level: f64,
    pub degradation_metric: String,
    pub degradation_threshold: f64,
}

impl Default for AnalysisEnvConfig {
    fn default() -> Self {
        Self {
            significance_method: SignificanceMethod::default(),
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            degradation_metric: DEFAULT_DEGRADATION_METRIC.to_string(),
            degradation_threshold: DEFAULT_DEGRADATION_THRESHOLD,
        }
    }
}

impl AnalysisEnvConfig {
    pub fn from_env() -> Result<Self> {
        let significance_method = env::var("SIGNIFICANCE_METHOD")
            .unwrap_or_else(|_| "heuristic".to_string())
            .parse::<SignificanceMethod>()
            .context("Failed to parse SIGNIFICANCE_METHOD")?;

        let confidence_level = env::var("CONFIDENCE_LEVEL")
            .unwrap_or_else(|_| DEFAULT_CONFIDENCE_LEVEL.to_string())
            .parse::<f64>()
            .context("Failed to parse CONFIDENCE_LEVEL")?;
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            bail!(
                "CONFIDENCE_LEVEL must be between 0 and 1 (exclusive), got {}",
                confidence_level
            );
        }

        Ok(Self {
            significance_method,
            confidence_level,
            degradation_metric: env::var("DEGRADATION_METRIC")
                .unwrap_or_else(|_| DEFAULT_DEGRADATION_METRIC.to_string()),
            degradation_threshold: env::var("DEGRADATION_THRESHOLD")
                .unwrap_or_else(|_| DEFAULT_DEGRADATION_THRESHOLD.to_string())
                .parse::<f64>()
                .context("Failed to parse DEGRADATION_THRESHOLD")?,
        })
    }
}
