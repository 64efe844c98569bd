//! Store Abstractions
//!
//! Traits for the three persistent stores, keeping the orchestrator and
//! monitors independent of the storage engine.
//!
//! - `ModelRegistry`: versioned artifacts with exclusive activation
//! - `ExperimentStore`: A/B experiments and their evaluations
//! - `PerformanceTracker`: append-only performance snapshots
//!
//! The SQLite implementations live in `infrastructure::persistence`.

use crate::domain::errors::StoreError;
use crate::domain::experiment::{
    Evaluation, Experiment, ExperimentResults, ExperimentStatus, NewExperiment, SignificanceMethod,
    Variant,
};
use crate::domain::experiment::significance::{DEFAULT_CONFIDENCE_LEVEL, DEFAULT_METRIC_KEY};
use crate::domain::performance::degradation::{
    DEFAULT_DEGRADATION_METRIC, DEFAULT_DEGRADATION_THRESHOLD,
};
use crate::domain::performance::{DegradationReport, PerformanceSnapshot, PerformanceSummary};
use crate::domain::registry::{ModelSelector, ModelVersion, NewModelVersion};
use crate::domain::types::MetricMap;
use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

/// Versioned artifact storage with at most one active version per module type
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Store the artifact and its metadata, returning the new version id
    async fn register(&self, request: NewModelVersion) -> StoreResult<String>;

    /// Artifact bytes of the selected version
    async fn load(&self, selector: &ModelSelector) -> StoreResult<Vec<u8>>;

    /// Metadata of the selected version
    async fn get(&self, selector: &ModelSelector) -> StoreResult<ModelVersion>;

    /// Make `id` the only active version of its module type
    async fn set_active(&self, id: &str) -> StoreResult<()>;

    async fn list(
        &self,
        module_type: Option<&str>,
        active_only: bool,
    ) -> StoreResult<Vec<ModelVersion>>;

    /// Remove metadata and artifact; never re-activates a sibling
    async fn delete(&self, id: &str) -> StoreResult<()>;

    async fn active_version(&self, module_type: &str) -> StoreResult<Option<ModelVersion>> {
        match self.get(&ModelSelector::active(module_type)).await {
            Ok(version) => Ok(Some(version)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A/B experiment lifecycle and analysis
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    async fn create_experiment(&self, request: NewExperiment) -> StoreResult<String>;

    async fn get_experiment(&self, id: &str) -> StoreResult<Experiment>;

    /// Random arm for the next request, weighted by the split ratio
    async fn assign_variant(&self, id: &str) -> StoreResult<Variant>;

    /// `variant` must be `"baseline"` or `"optimized"`
    async fn record_evaluation(
        &self,
        id: &str,
        variant: &str,
        metrics: MetricMap,
    ) -> StoreResult<String>;

    async fn evaluations(&self, id: &str) -> StoreResult<Vec<Evaluation>>;

    async fn analyze_results_with(
        &self,
        id: &str,
        metric_key: &str,
        confidence_level: f64,
        method: SignificanceMethod,
    ) -> StoreResult<ExperimentResults>;

    async fn analyze_results(&self, id: &str) -> StoreResult<ExperimentResults> {
        self.analyze_results_with(
            id,
            DEFAULT_METRIC_KEY,
            DEFAULT_CONFIDENCE_LEVEL,
            SignificanceMethod::Heuristic,
        )
        .await
    }

    async fn stop_experiment(&self, id: &str) -> StoreResult<()>;

    async fn list_experiments(
        &self,
        status: Option<ExperimentStatus>,
    ) -> StoreResult<Vec<Experiment>>;
}

/// Time-series of performance snapshots per module type
#[async_trait]
pub trait PerformanceTracker: Send + Sync {
    /// Append a snapshot; the store assigns id and timestamp
    async fn record_snapshot(&self, snapshot: PerformanceSnapshot) -> StoreResult<i64>;

    /// Newest first
    async fn get_history(
        &self,
        module_type: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<PerformanceSnapshot>>;

    async fn latest(&self, module_type: &str) -> StoreResult<Option<PerformanceSnapshot>> {
        Ok(self.get_history(module_type, Some(1)).await?.into_iter().next())
    }

    async fn detect_degradation_with(
        &self,
        module_type: &str,
        metric_key: &str,
        threshold: f64,
    ) -> StoreResult<DegradationReport>;

    async fn detect_degradation(&self, module_type: &str) -> StoreResult<DegradationReport> {
        self.detect_degradation_with(
            module_type,
            DEFAULT_DEGRADATION_METRIC,
            DEFAULT_DEGRADATION_THRESHOLD,
        )
        .await
    }

    async fn get_summary(&self, module_type: &str) -> StoreResult<PerformanceSummary>;
}
