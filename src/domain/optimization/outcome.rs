use crate::domain::ports::Module;
use crate::domain::registry::ModelVersion;
use crate::domain::types::mean;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Steps of a single optimization run, executed strictly in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationStage {
    CollectBaseline,
    RunOptimizer,
    CollectOptimized,
    RegisterResult,
    ConditionallyActivate,
    Done,
}

impl fmt::Display for OptimizationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStage::CollectBaseline => write!(f, "collect_baseline"),
            OptimizationStage::RunOptimizer => write!(f, "run_optimizer"),
            OptimizationStage::CollectOptimized => write!(f, "collect_optimized"),
            OptimizationStage::RegisterResult => write!(f, "register_result"),
            OptimizationStage::ConditionallyActivate => write!(f, "conditionally_activate"),
            OptimizationStage::Done => write!(f, "done"),
        }
    }
}

/// Mean score over the examples that evaluated successfully
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub mean_score: f64,
    pub evaluated: usize,
    pub skipped: usize,
}

impl EvaluationSummary {
    pub fn from_scores(scores: &[f64], skipped: usize) -> Self {
        Self {
            mean_score: mean(scores),
            evaluated: scores.len(),
            skipped,
        }
    }

    /// Every example failed, so the mean defaulted to 0.0
    pub fn all_failed(&self) -> bool {
        self.evaluated == 0 && self.skipped > 0
    }
}

/// Result of a completed optimization run
pub struct OptimizationOutcome {
    pub model: ModelVersion,
    pub baseline: EvaluationSummary,
    pub optimized: EvaluationSummary,
    pub improvement_percent: f64,
    pub activated: bool,
    pub module: Arc<dyn Module>,
}

impl fmt::Debug for OptimizationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationOutcome")
            .field("model", &self.model)
            .field("baseline", &self.baseline)
            .field("optimized", &self.optimized)
            .field("improvement_percent", &self.improvement_percent)
            .field("activated", &self.activated)
            .finish_non_exhaustive()
    }
}
