use crate::domain::types::{MetricMap, metric_or_zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a module type's performance at a specific point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub module_type: String,
    pub model_id: Option<String>,
    pub metrics: MetricMap,
    pub sample_size: Option<i64>,
    pub notes: Option<String>,
}

impl PerformanceSnapshot {
    pub fn new(module_type: impl Into<String>, metrics: MetricMap) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            module_type: module_type.into(),
            model_id: None,
            metrics,
            sample_size: None,
            notes: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = Some(sample_size as i64);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Metric value, 0.0 when the snapshot did not record it
    pub fn metric(&self, key: &str) -> f64 {
        metric_or_zero(&self.metrics, key)
    }
}
