use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named float metrics attached to versions, evaluations and snapshots
pub type MetricMap = BTreeMap<String, f64>;

/// Free-form optimizer parameters recorded alongside a version
pub type ParamMap = BTreeMap<String, serde_json::Value>;

/// Reads `key` from a metric map, treating a missing entry as 0.0
pub fn metric_or_zero(metrics: &MetricMap, key: &str) -> f64 {
    metrics.get(key).copied().unwrap_or(0.0)
}

/// Arithmetic mean, 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Relative change of `current` against `reference` in percent, 0.0 when the
/// reference is zero
pub fn percent_change(reference: f64, current: f64) -> f64 {
    if reference == 0.0 {
        0.0
    } else {
        (current - reference) / reference * 100.0
    }
}

/// Builds a metric map from `(name, value)` pairs
pub fn metrics<I, K>(pairs: I) -> MetricMap
where
    I: IntoIterator<Item = (K, f64)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Opaque key/value record used for examples and predictions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields(pub BTreeMap<String, serde_json::Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(|v| v.as_f64())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
