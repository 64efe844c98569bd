use crate::domain::performance::performance_snapshot::PerformanceSnapshot;
use crate::domain::types::percent_change;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SUMMARY_WINDOW: usize = 100;
const TREND_METRIC: &str = "mean_score";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Declining => write!(f, "declining"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub module_type: String,
    pub snapshots_count: usize,
    pub latest: Option<PerformanceSnapshot>,
    pub trend: Option<Trend>,
    pub trend_percent: Option<f64>,
    pub first_snapshot: Option<DateTime<Utc>>,
    pub last_snapshot: Option<DateTime<Utc>>,
}

/// Two-point trend between the oldest and newest `mean_score` in the window.
///
/// `history` is newest first. The trend needs at least two snapshots.
pub fn summarize(module_type: &str, history: &[PerformanceSnapshot]) -> PerformanceSummary {
    let window = &history[..history.len().min(SUMMARY_WINDOW)];
    let newest = window.first();
    let oldest = window.last();

    let (trend, trend_percent) = match (newest, oldest) {
        (Some(newest), Some(oldest)) if window.len() >= 2 => {
            let first = oldest.metric(TREND_METRIC);
            let last = newest.metric(TREND_METRIC);
            let trend = if last > first {
                Trend::Improving
            } else {
                Trend::Declining
            };
            (Some(trend), Some(percent_change(first, last)))
        }
        _ => (None, None),
    };

    PerformanceSummary {
        module_type: module_type.to_string(),
        snapshots_count: window.len(),
        latest: newest.cloned(),
        trend,
        trend_percent,
        first_snapshot: oldest.map(|s| s.timestamp),
        last_snapshot: newest.map(|s| s.timestamp),
    }
}
