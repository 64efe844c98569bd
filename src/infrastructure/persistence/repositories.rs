mod experiment_repository;
mod model_registry_repository;
mod performance_snapshot_repository;

pub use experiment_repository::SqliteExperimentStore;
pub use model_registry_repository::SqliteModelRegistry;
pub use performance_snapshot_repository::SqlitePerformanceTracker;

use crate::domain::errors::StoreError;
use crate::domain::types::MetricMap;
use chrono::{DateTime, TimeZone, Utc};

// Timestamps are stored as epoch milliseconds

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::invalid(format!("stored timestamp out of range: {}", ms)))
}

pub(crate) fn encode_metrics(metrics: &MetricMap) -> Result<String, StoreError> {
    Ok(serde_json::to_string(metrics)?)
}

pub(crate) fn decode_metrics(json: &str) -> Result<MetricMap, StoreError> {
    Ok(serde_json::from_str(json)?)
}
