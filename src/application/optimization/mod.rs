// Optimization runs: per-example evaluation and the run state machine
pub mod evaluator;
pub mod orchestrator;

pub use evaluator::ModuleEvaluator;
pub use orchestrator::{OptimizationJob, OptimizationOrchestrator};
