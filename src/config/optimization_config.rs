//! Optimization configuration parsing from environment variables.
//!
//! Activation policy and the evaluation pool used by the orchestrator.

use anyhow::{Context, Result, bail};
use std::env;
use std::time::Duration;

pub const DEFAULT_ACTIVATION_THRESHOLD: f64 = 5.0;
pub const DEFAULT_EVAL_CONCURRENCY: usize = 1;

/// Optimization environment configuration
#[derive(Debug, Clone)]
pub struct OptimizationEnvConfig {
    /// Minimum improvement (percent) for a new version to become active
    pub activation_threshold: f64,
    pub eval_concurrency: usize,
    pub example_timeout: Option<Duration>,
    pub optimizer_timeout: Option<Duration>,
}

impl Default for OptimizationEnvConfig {
    fn default() -> Self {
        Self {
            activation_threshold: DEFAULT_ACTIVATION_THRESHOLD,
            eval_concurrency: DEFAULT_EVAL_CONCURRENCY,
            example_timeout: None,
            optimizer_timeout: None,
        }
    }
}

impl OptimizationEnvConfig {
    pub fn from_env() -> Result<Self> {
        let eval_concurrency = Self::parse_usize("EVAL_CONCURRENCY", DEFAULT_EVAL_CONCURRENCY)?;
        if eval_concurrency == 0 {
            bail!("EVAL_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            activation_threshold: Self::parse_f64(
                "ACTIVATION_THRESHOLD",
                DEFAULT_ACTIVATION_THRESHOLD,
            )?,
            eval_concurrency,
            example_timeout: Self::parse_optional_u64("EXAMPLE_TIMEOUT_MS")?
                .map(Duration::from_millis),
            optimizer_timeout: Self::parse_optional_u64("OPTIMIZER_TIMEOUT_SECS")?
                .map(Duration::from_secs),
        })
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_optional_u64(key: &str) -> Result<Option<u64>> {
        match env::var(key) {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<u64>()
                .map(Some)
                .context(format!("Failed to parse {}", key)),
            _ => Ok(None),
        }
    }
}
