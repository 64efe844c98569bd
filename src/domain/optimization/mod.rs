// Optimization domain: module kinds, run outcomes, metrics, training data
pub mod metrics;
pub mod module_kind;
pub mod outcome;
pub mod training_data;

pub use module_kind::{JudgeType, ModuleKind, OptimizerConfig};
pub use outcome::{EvaluationSummary, OptimizationOutcome, OptimizationStage};
