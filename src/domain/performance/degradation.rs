use crate::domain::performance::performance_snapshot::PerformanceSnapshot;
use crate::domain::types::mean;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_DEGRADATION_METRIC: &str = "mean_score";
pub const DEFAULT_DEGRADATION_THRESHOLD: f64 = 0.1;
/// Newest snapshot plus up to nine predecessors forming the baseline
pub const DEGRADATION_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationReason {
    InsufficientData,
    ZeroBaseline,
    ThresholdExceeded,
    WithinThreshold,
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradationReason::InsufficientData => write!(f, "insufficient_data"),
            DegradationReason::ZeroBaseline => write!(f, "zero_baseline"),
            DegradationReason::ThresholdExceeded => write!(f, "threshold_exceeded"),
            DegradationReason::WithinThreshold => write!(f, "within_threshold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationReport {
    pub module_type: String,
    pub metric_key: String,
    pub degradation_detected: bool,
    pub reason: DegradationReason,
    pub current_value: Option<f64>,
    pub baseline_value: Option<f64>,
    /// Fractional drop of the newest value below the baseline mean
    pub drop_percent: Option<f64>,
    pub threshold: f64,
}

/// Checks the newest snapshot against the mean of its recent predecessors.
///
/// `history` must be ordered newest first; anything beyond
/// [`DEGRADATION_WINDOW`] entries is ignored. This is a threshold heuristic,
/// not a statistical test.
pub fn detect_degradation(
    module_type: &str,
    history: &[PerformanceSnapshot],
    metric_key: &str,
    threshold: f64,
) -> DegradationReport {
    let mut report = DegradationReport {
        module_type: module_type.to_string(),
        metric_key: metric_key.to_string(),
        degradation_detected: false,
        reason: DegradationReason::InsufficientData,
        current_value: None,
        baseline_value: None,
        drop_percent: None,
        threshold,
    };

    let window = &history[..history.len().min(DEGRADATION_WINDOW)];
    let Some((newest, previous)) = window.split_first() else {
        return report;
    };
    if previous.is_empty() {
        return report;
    }

    let current = newest.metric(metric_key);
    let baseline_values: Vec<f64> = previous.iter().map(|s| s.metric(metric_key)).collect();
    let baseline = mean(&baseline_values);

    report.current_value = Some(current);
    report.baseline_value = Some(baseline);

    if baseline == 0.0 {
        report.reason = DegradationReason::ZeroBaseline;
        return report;
    }

    let drop = (baseline - current) / baseline;
    report.drop_percent = Some(drop);
    report.degradation_detected = drop > threshold;
    report.reason = if report.degradation_detected {
        DegradationReason::ThresholdExceeded
    } else {
        DegradationReason::WithinThreshold
    };
    report
}
