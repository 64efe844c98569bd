use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the registry, experiment and snapshot stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Artifact missing for model {model_id}: {path}")]
    ArtifactMissing { model_id: String, path: PathBuf },

    #[error("Artifact corrupted for model {model_id}: expected sha256 {expected}, got {actual}")]
    ArtifactCorrupted {
        model_id: String,
        expected: String,
        actual: String,
    },

    #[error("Artifact already exists at {path}")]
    ArtifactExists { path: PathBuf },

    #[error("Version conflict for {module_type}: v{version} already registered")]
    ConcurrencyConflict { module_type: String, version: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound { what: what.into() }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        StoreError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Errors that abort an optimization run
#[derive(Debug, Error)]
pub enum OptimizationError {
    #[error("Optimizer failed for {module_type}: {reason}")]
    OptimizerFailure { module_type: String, reason: String },

    #[error("Optimizer timed out for {module_type} after {timeout_secs}s")]
    OptimizerTimeout {
        module_type: String,
        timeout_secs: u64,
    },

    #[error("Module error for {module_type}: {reason}")]
    Module { module_type: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reason a single example was left out of an evaluation mean
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationSkip {
    #[error("evaluation failed: {0}")]
    Failed(String),

    #[error("evaluation timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },
}

/// Validation failures when building training examples
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingDataError {
    #[error("{field} must be between 0.0 and 1.0, got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("{field} too short: {len} chars < {min}")]
    TooShort {
        field: &'static str,
        len: usize,
        min: usize,
    },

    #[error("Unknown judge type: {0}")]
    UnknownJudgeType(String),
}
