use crate::domain::types::{MetricMap, ParamMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// One registered version of an optimized module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub id: String,
    pub module_type: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    /// File name of the artifact inside the content directory
    pub artifact_ref: String,
    /// Hex-encoded SHA-256 of the artifact bytes
    pub checksum: String,
    pub metrics: MetricMap,
    pub training_example_count: Option<i64>,
    pub optimization_params: Option<ParamMap>,
    pub is_active: bool,
    pub notes: Option<String>,
}

impl ModelVersion {
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
}

/// Registration request for a new artifact
#[derive(Debug, Clone)]
pub struct NewModelVersion {
    pub module_type: String,
    pub artifact: Vec<u8>,
    pub metrics: MetricMap,
    pub training_example_count: Option<i64>,
    pub optimization_params: Option<ParamMap>,
    pub notes: Option<String>,
    /// Explicit version number; next free version when `None`
    pub version: Option<i64>,
}

impl NewModelVersion {
    pub fn new(module_type: impl Into<String>, artifact: Vec<u8>) -> Self {
        Self {
            module_type: module_type.into(),
            artifact,
            metrics: MetricMap::new(),
            training_example_count: None,
            optimization_params: None,
            notes: None,
            version: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricMap) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_training_count(mut self, count: usize) -> Self {
        self.training_example_count = Some(count as i64);
        self
    }

    pub fn with_params(mut self, params: ParamMap) -> Self {
        self.optimization_params = Some(params);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Ways of addressing a registered version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelector {
    Id(String),
    Active(String),
    Version { module_type: String, version: i64 },
}

impl ModelSelector {
    pub fn id(id: impl Into<String>) -> Self {
        ModelSelector::Id(id.into())
    }

    pub fn active(module_type: impl Into<String>) -> Self {
        ModelSelector::Active(module_type.into())
    }

    pub fn version(module_type: impl Into<String>, version: i64) -> Self {
        ModelSelector::Version {
            module_type: module_type.into(),
            version,
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelector::Id(id) => write!(f, "model {}", id),
            ModelSelector::Active(module_type) => write!(f, "active model for {}", module_type),
            ModelSelector::Version {
                module_type,
                version,
            } => write!(f, "{} v{}", module_type, version),
        }
    }
}

/// Deterministic artifact file name for a version. The sanitized stem is
/// followed by a digest of the raw module type, so distinct module types never
/// share a name.
pub fn artifact_file_name(module_type: &str, version: i64, created_at: DateTime<Utc>) -> String {
    let safe: String = module_type
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = hex::encode(Sha256::digest(module_type.as_bytes()));
    format!(
        "{}_v{}_{}_{}.bin",
        safe,
        version,
        created_at.timestamp_millis(),
        &digest[..8]
    )
}

/// Generated id of the form `<module_type>_<8 hex chars>`
pub fn generate_model_id(module_type: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", module_type, &suffix[..8])
}
