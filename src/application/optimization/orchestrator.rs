use crate::application::optimization::evaluator::ModuleEvaluator;
use crate::config::{DEFAULT_ACTIVATION_THRESHOLD, OptimizationEnvConfig};
use crate::domain::errors::OptimizationError;
use crate::domain::optimization::{
    ModuleKind, OptimizationOutcome, OptimizationStage, OptimizerConfig,
};
use crate::domain::ports::{Example, Metric, Module, ModuleFactory, Optimizer};
use crate::domain::registry::{ModelSelector, NewModelVersion};
use crate::domain::repositories::ModelRegistry;
use crate::domain::types::{metrics, percent_change};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One unit of work for [`OptimizationOrchestrator::optimize_all`]
pub struct OptimizationJob {
    pub kind: ModuleKind,
    pub trainset: Vec<Example>,
    pub valset: Option<Vec<Example>>,
    pub metric: Arc<dyn Metric>,
    pub config: OptimizerConfig,
}

impl OptimizationJob {
    /// Job with the default optimizer config for `kind`
    pub fn new(kind: ModuleKind, trainset: Vec<Example>, metric: Arc<dyn Metric>) -> Self {
        Self {
            config: OptimizerConfig::for_kind(&kind),
            kind,
            trainset,
            valset: None,
            metric,
        }
    }

    pub fn with_valset(mut self, valset: Vec<Example>) -> Self {
        self.valset = Some(valset);
        self
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }
}

/// Drives a single optimization run from baseline measurement to activation.
///
/// Holds no persistent state of its own: every result goes through the
/// registry, and nothing is registered until the run reaches
/// [`OptimizationStage::RegisterResult`]. Dropping the returned future before
/// then leaves the registry untouched.
pub struct OptimizationOrchestrator {
    registry: Arc<dyn ModelRegistry>,
    optimizer: Arc<dyn Optimizer>,
    factory: Arc<dyn ModuleFactory>,
    evaluator: ModuleEvaluator,
    activation_threshold: f64,
    optimizer_timeout: Option<Duration>,
}

impl OptimizationOrchestrator {
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        optimizer: Arc<dyn Optimizer>,
        factory: Arc<dyn ModuleFactory>,
    ) -> Self {
        Self {
            registry,
            optimizer,
            factory,
            evaluator: ModuleEvaluator::default(),
            activation_threshold: DEFAULT_ACTIVATION_THRESHOLD,
            optimizer_timeout: None,
        }
    }

    pub fn with_config(mut self, config: &OptimizationEnvConfig) -> Self {
        self.evaluator = ModuleEvaluator::new(config.eval_concurrency, config.example_timeout);
        self.activation_threshold = config.activation_threshold;
        self.optimizer_timeout = config.optimizer_timeout;
        self
    }

    pub fn with_activation_threshold(mut self, threshold: f64) -> Self {
        self.activation_threshold = threshold;
        self
    }

    pub fn activation_threshold(&self) -> f64 {
        self.activation_threshold
    }

    pub async fn optimize(
        &self,
        kind: ModuleKind,
        trainset: &[Example],
        valset: Option<&[Example]>,
        metric: &dyn Metric,
        config: &OptimizerConfig,
    ) -> Result<OptimizationOutcome, OptimizationError> {
        let module_type = kind.module_type();
        let valset = valset.unwrap_or(trainset);
        info!(
            "Optimizing {}: {} training examples, {} validation examples",
            module_type,
            trainset.len(),
            valset.len()
        );

        let baseline_module =
            self.factory
                .build(&kind)
                .map_err(|e| OptimizationError::Module {
                    module_type: module_type.clone(),
                    reason: format!("{:#}", e),
                })?;

        debug!("{} entering {}", module_type, OptimizationStage::CollectBaseline);
        let baseline = self
            .evaluator
            .evaluate(
                &format!("{} baseline", module_type),
                baseline_module.as_ref(),
                valset,
                metric,
            )
            .await;
        info!(
            "{} baseline score: {:.4} ({} evaluated, {} skipped)",
            module_type, baseline.mean_score, baseline.evaluated, baseline.skipped
        );

        debug!("{} entering {}", module_type, OptimizationStage::RunOptimizer);
        let optimized_module = self
            .run_optimizer(&module_type, baseline_module, trainset, config)
            .await?;

        debug!("{} entering {}", module_type, OptimizationStage::CollectOptimized);
        let optimized = self
            .evaluator
            .evaluate(
                &format!("{} optimized", module_type),
                optimized_module.as_ref(),
                valset,
                metric,
            )
            .await;
        let improvement_percent = percent_change(baseline.mean_score, optimized.mean_score);
        info!(
            "{} optimized score: {:.4} ({:+.2}% vs baseline)",
            module_type, optimized.mean_score, improvement_percent
        );

        debug!("{} entering {}", module_type, OptimizationStage::RegisterResult);
        let artifact = optimized_module
            .to_artifact()
            .map_err(|e| OptimizationError::Module {
                module_type: module_type.clone(),
                reason: format!("{:#}", e),
            })?;
        let params = config
            .to_params()
            .map_err(|e| OptimizationError::Module {
                module_type: module_type.clone(),
                reason: format!("Failed to encode optimizer config: {}", e),
            })?;

        let request = NewModelVersion::new(&module_type, artifact)
            .with_metrics(metrics([
                ("baseline_score", baseline.mean_score),
                ("optimized_score", optimized.mean_score),
                ("improvement_percent", improvement_percent),
            ]))
            .with_training_count(trainset.len())
            .with_params(params)
            .with_notes(format!(
                "Optimized with {} trials, {} candidates",
                config.num_trials, config.num_candidates
            ));
        let model_id = self.registry.register(request).await?;

        let activated = improvement_percent > self.activation_threshold;
        if activated {
            debug!("{} entering {}", module_type, OptimizationStage::ConditionallyActivate);
            self.registry.set_active(&model_id).await?;
            info!(
                "{}: activated {} ({:+.2}% > {:.2}%)",
                module_type, model_id, improvement_percent, self.activation_threshold
            );
        } else {
            info!(
                "{}: kept {} inactive ({:+.2}% <= {:.2}%)",
                module_type, model_id, improvement_percent, self.activation_threshold
            );
        }

        let model = self.registry.get(&ModelSelector::id(&model_id)).await?;
        debug!("{} entering {}", module_type, OptimizationStage::Done);

        Ok(OptimizationOutcome {
            model,
            baseline,
            optimized,
            improvement_percent,
            activated,
            module: optimized_module,
        })
    }

    /// Runs each job in turn; failed kinds are logged and skipped
    pub async fn optimize_all(&self, jobs: Vec<OptimizationJob>) -> Vec<OptimizationOutcome> {
        let total = jobs.len();
        let mut outcomes = Vec::with_capacity(total);

        for job in jobs {
            let result = self
                .optimize(
                    job.kind,
                    &job.trainset,
                    job.valset.as_deref(),
                    job.metric.as_ref(),
                    &job.config,
                )
                .await;
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!("Skipping {}: {}", job.kind, e),
            }
        }

        info!(
            "Optimization sweep finished: {}/{} module kinds succeeded",
            outcomes.len(),
            total
        );
        outcomes
    }

    async fn run_optimizer(
        &self,
        module_type: &str,
        student: Arc<dyn Module>,
        trainset: &[Example],
        config: &OptimizerConfig,
    ) -> Result<Arc<dyn Module>, OptimizationError> {
        let compile = self.optimizer.compile(student, trainset, config);
        let result = match self.optimizer_timeout {
            Some(limit) => match tokio::time::timeout(limit, compile).await {
                Ok(result) => result,
                Err(_) => {
                    error!(
                        "Optimizer for {} timed out after {}s",
                        module_type,
                        limit.as_secs()
                    );
                    return Err(OptimizationError::OptimizerTimeout {
                        module_type: module_type.to_string(),
                        timeout_secs: limit.as_secs(),
                    });
                }
            },
            None => compile.await,
        };

        result.map_err(|e| {
            error!("Optimizer for {} failed: {:#}", module_type, e);
            OptimizationError::OptimizerFailure {
                module_type: module_type.to_string(),
                reason: format!("{:#}", e),
            }
        })
    }
}
