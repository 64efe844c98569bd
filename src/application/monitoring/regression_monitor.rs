use crate::config::AnalysisEnvConfig;
use crate::domain::optimization::EvaluationSummary;
use crate::domain::performance::degradation::{
    DEFAULT_DEGRADATION_METRIC, DEFAULT_DEGRADATION_THRESHOLD,
};
use crate::domain::performance::{DegradationReport, PerformanceSnapshot};
use crate::domain::repositories::{PerformanceTracker, StoreResult};
use crate::domain::types::metrics;
use std::sync::Arc;
use tracing::{info, warn};

pub struct RegressionMonitor {
    tracker: Arc<dyn PerformanceTracker>,
    metric_key: String,
    threshold: f64,
}

impl RegressionMonitor {
    pub fn new(tracker: Arc<dyn PerformanceTracker>) -> Self {
        Self {
            tracker,
            metric_key: DEFAULT_DEGRADATION_METRIC.to_string(),
            threshold: DEFAULT_DEGRADATION_THRESHOLD,
        }
    }

    pub fn with_config(mut self, config: &AnalysisEnvConfig) -> Self {
        self.metric_key = config.degradation_metric.clone();
        self.threshold = config.degradation_threshold;
        self
    }

    /// Appends a snapshot of an evaluation run under the monitored metric key
    pub async fn record_summary(
        &self,
        module_type: &str,
        model_id: Option<&str>,
        summary: &EvaluationSummary,
    ) -> StoreResult<i64> {
        let mut snapshot = PerformanceSnapshot::new(
            module_type,
            metrics([
                (self.metric_key.as_str(), summary.mean_score),
                ("skipped", summary.skipped as f64),
            ]),
        )
        .with_sample_size(summary.evaluated);
        if let Some(model_id) = model_id {
            snapshot = snapshot.with_model(model_id);
        }
        self.tracker.record_snapshot(snapshot).await
    }

    /// Checks every module type and returns only the regressions
    pub async fn sweep(&self, module_types: &[String]) -> StoreResult<Vec<DegradationReport>> {
        let mut regressions = Vec::new();
        for module_type in module_types {
            let report = self
                .tracker
                .detect_degradation_with(module_type, &self.metric_key, self.threshold)
                .await?;
            if report.degradation_detected {
                warn!(
                    "Regression in {}: {} down {:.1}% (threshold {:.1}%)",
                    module_type,
                    self.metric_key,
                    report.drop_percent.unwrap_or_default() * 100.0,
                    self.threshold * 100.0
                );
                regressions.push(report);
            }
        }

        info!(
            "Regression sweep: {} of {} module types degraded",
            regressions.len(),
            module_types.len()
        );
        Ok(regressions)
    }
}
