//! Configuration module for promptlab.
//!
//! Structured configuration loaded from environment variables, organized by
//! concern: Storage, Optimization and Analysis.

mod analysis_config;
mod optimization_config;
mod storage_config;

pub use analysis_config::AnalysisEnvConfig;
pub use optimization_config::{
    DEFAULT_ACTIVATION_THRESHOLD, DEFAULT_EVAL_CONCURRENCY, OptimizationEnvConfig,
};
pub use storage_config::{DEFAULT_ARTIFACT_DIR, DEFAULT_DATABASE_URL, StorageEnvConfig};

use anyhow::{Context, Result};

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub storage: StorageEnvConfig,
    pub optimization: OptimizationEnvConfig,
    pub analysis: AnalysisEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            storage: StorageEnvConfig::from_env(),
            optimization: OptimizationEnvConfig::from_env()
                .context("Invalid optimization configuration")?,
            analysis: AnalysisEnvConfig::from_env().context("Invalid analysis configuration")?,
        })
    }

    /// In-memory database and the given content directory, defaults elsewhere
    pub fn for_tests(artifact_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            storage: StorageEnvConfig {
                database_url: "sqlite::memory:".to_string(),
                artifact_dir: artifact_dir.into(),
            },
            ..Self::default()
        }
    }
}
