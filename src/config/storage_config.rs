//! Storage configuration parsing from environment variables.
//!
//! Where the SQLite database and the artifact content directory live.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://promptlab.db";
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Storage environment configuration
#[derive(Debug, Clone)]
pub struct StorageEnvConfig {
    pub database_url: String,
    pub artifact_dir: PathBuf,
}

impl Default for StorageEnvConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
        }
    }
}

impl StorageEnvConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            artifact_dir: env::var("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACT_DIR)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageEnvConfig::default();
        assert_eq!(config.database_url, "sqlite://promptlab.db");
        assert_eq!(config.artifact_dir, PathBuf::from("artifacts"));
    }
}
