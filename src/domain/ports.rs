//! Boundary traits for the collaborators the orchestrator drives but does not
//! implement: the module under test, the scoring metric, the optimizer and the
//! factory that instantiates modules of a given kind.

use crate::domain::optimization::module_kind::{ModuleKind, OptimizerConfig};
use crate::domain::types::Fields;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Training or validation example: named inputs plus expected outputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub inputs: Fields,
    pub labels: Fields,
}

impl Example {
    pub fn new(inputs: Fields, labels: Fields) -> Self {
        Self { inputs, labels }
    }
}

/// Callable mapping named inputs to a prediction with named outputs
#[async_trait]
pub trait Module: Send + Sync {
    async fn forward(&self, inputs: &Fields) -> Result<Fields>;

    /// Serialized form stored by the registry
    fn to_artifact(&self) -> Result<Vec<u8>>;
}

/// Pure scoring function returning a value in `[0, 1]`
pub trait Metric: Send + Sync {
    fn score(&self, example: &Example, prediction: &Fields) -> f64;
}

/// Black-box optimizer producing an improved module from a student
#[async_trait]
pub trait Optimizer: Send + Sync {
    async fn compile(
        &self,
        student: Arc<dyn Module>,
        trainset: &[Example],
        config: &OptimizerConfig,
    ) -> Result<Arc<dyn Module>>;
}

/// Builds fresh, unoptimized modules of a kind
pub trait ModuleFactory: Send + Sync {
    fn build(&self, kind: &ModuleKind) -> Result<Arc<dyn Module>>;
}
