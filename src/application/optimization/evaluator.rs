use crate::domain::errors::EvaluationSkip;
use crate::domain::optimization::EvaluationSummary;
use crate::domain::ports::{Example, Metric, Module};
use futures_util::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Scores a module over a dataset on a bounded pool of concurrent forwards.
///
/// A failed or timed-out example is logged and left out of the mean; the
/// mean is order-independent so completion order does not matter.
#[derive(Debug, Clone)]
pub struct ModuleEvaluator {
    concurrency: usize,
    example_timeout: Option<Duration>,
}

impl Default for ModuleEvaluator {
    fn default() -> Self {
        Self::new(1, None)
    }
}

impl ModuleEvaluator {
    pub fn new(concurrency: usize, example_timeout: Option<Duration>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            example_timeout,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn evaluate(
        &self,
        label: &str,
        module: &dyn Module,
        dataset: &[Example],
        metric: &dyn Metric,
    ) -> EvaluationSummary {
        let outcomes: Vec<Result<f64, EvaluationSkip>> = stream::iter(dataset.iter().enumerate())
            .map(|(index, example)| async move {
                let result = self.score_one(module, example, metric).await;
                if let Err(skip) = &result {
                    warn!("{}: skipping example {}: {}", label, index, skip);
                }
                result
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let scores: Vec<f64> = outcomes.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        let summary = EvaluationSummary::from_scores(&scores, outcomes.len() - scores.len());

        if summary.all_failed() {
            error!(
                "{}: all {} examples failed, mean defaults to 0.0",
                label, summary.skipped
            );
        } else {
            debug!(
                "{}: mean {:.4} over {} examples ({} skipped)",
                label, summary.mean_score, summary.evaluated, summary.skipped
            );
        }
        summary
    }

    async fn score_one(
        &self,
        module: &dyn Module,
        example: &Example,
        metric: &dyn Metric,
    ) -> Result<f64, EvaluationSkip> {
        let forward = module.forward(&example.inputs);
        let prediction = match self.example_timeout {
            Some(limit) => tokio::time::timeout(limit, forward)
                .await
                .map_err(|_| EvaluationSkip::TimedOut {
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => forward.await,
        }
        .map_err(|e| EvaluationSkip::Failed(format!("{:#}", e)))?;

        Ok(metric.score(example, &prediction))
    }
}
