use promptlab::application::optimization::{OptimizationJob, OptimizationOrchestrator};
use promptlab::config::OptimizationEnvConfig;
use promptlab::domain::errors::OptimizationError;
use promptlab::domain::optimization::metrics::ScoreAgreementMetric;
use promptlab::domain::optimization::{JudgeType, ModuleKind, OptimizerConfig};
use promptlab::domain::ports::{Example, Module};
use promptlab::domain::registry::ModelSelector;
use promptlab::domain::repositories::ModelRegistry;
use promptlab::domain::types::Fields;
use promptlab::infrastructure::mock::{
    ScriptedOptimizer, StaticModule, StaticModuleFactory, UnserializableModule,
};
use promptlab::infrastructure::persistence::artifact_store::ArtifactStore;
use promptlab::infrastructure::persistence::database::Database;
use promptlab::infrastructure::persistence::repositories::SqliteModelRegistry;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const FIELD: &str = "reward_score";

async fn registry() -> (Arc<SqliteModelRegistry>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::in_memory().await.unwrap();
    let artifacts = ArtifactStore::open(dir.path()).await.unwrap();
    (Arc::new(SqliteModelRegistry::new(db.pool, artifacts)), dir)
}

fn module(name: &str, score: f64) -> StaticModule {
    StaticModule::new(name, Fields::new().with(FIELD, score))
}

/// Every example expects a perfect score, so a module scoring `s` averages `s`
fn dataset(texts: &[&str]) -> Vec<Example> {
    texts
        .iter()
        .map(|t| {
            Example::new(
                Fields::new().with("text", *t),
                Fields::new().with(FIELD, 1.0),
            )
        })
        .collect()
}

fn orchestrator(
    registry: Arc<SqliteModelRegistry>,
    optimizer: ScriptedOptimizer,
    baseline: StaticModule,
) -> OptimizationOrchestrator {
    OptimizationOrchestrator::new(
        registry,
        Arc::new(optimizer),
        Arc::new(StaticModuleFactory::new(baseline)),
    )
}

#[tokio::test]
async fn test_improvement_above_threshold_activates() {
    let (registry, _dir) = registry().await;
    let optimizer = ScriptedOptimizer::returning(Arc::new(module("optimized", 0.8)));
    let orchestrator = orchestrator(registry.clone(), optimizer, module("baseline", 0.5));

    let trainset = dataset(&["a", "b", "c", "d"]);
    let config = OptimizerConfig::rubric().with_extra("seed", 7);
    let outcome = orchestrator
        .optimize(
            ModuleKind::Rubric,
            &trainset,
            None,
            &ScoreAgreementMetric::new(FIELD),
            &config,
        )
        .await
        .unwrap();

    assert!((outcome.baseline.mean_score - 0.5).abs() < 1e-9);
    assert!((outcome.optimized.mean_score - 0.8).abs() < 1e-9);
    assert!((outcome.improvement_percent - 60.0).abs() < 1e-9);
    assert!(outcome.activated);

    let model = &outcome.model;
    assert_eq!(model.module_type, "rubric_optimizer");
    assert_eq!(model.version, 1);
    assert!(model.is_active);
    assert_eq!(model.training_example_count, Some(4));
    assert!((model.metric("baseline_score").unwrap() - 0.5).abs() < 1e-9);
    assert!((model.metric("optimized_score").unwrap() - 0.8).abs() < 1e-9);
    assert!((model.metric("improvement_percent").unwrap() - 60.0).abs() < 1e-9);

    let params = model.optimization_params.as_ref().unwrap();
    assert_eq!(params["num_trials"], serde_json::json!(100));
    assert_eq!(params["seed"], serde_json::json!(7));

    // The registered artifact is the optimized module
    let bytes = registry
        .load(&ModelSelector::active("rubric_optimizer"))
        .await
        .unwrap();
    assert_eq!(StaticModule::from_artifact(&bytes).unwrap().name, "optimized");
}

#[tokio::test]
async fn test_small_improvement_registers_inactive() {
    let (registry, _dir) = registry().await;
    let optimizer = ScriptedOptimizer::returning(Arc::new(module("optimized", 0.51)));
    let orchestrator = orchestrator(registry.clone(), optimizer, module("baseline", 0.5));
    let kind = ModuleKind::Judge(JudgeType::Safety);

    let outcome = orchestrator
        .optimize(
            kind,
            &dataset(&["a", "b"]),
            None,
            &ScoreAgreementMetric::new(FIELD),
            &OptimizerConfig::for_kind(&kind),
        )
        .await
        .unwrap();

    assert!(!outcome.activated);
    assert!(!outcome.model.is_active);
    assert!(registry.active_version("judge_safety").await.unwrap().is_none());
    assert_eq!(registry.list(Some("judge_safety"), false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_threshold_comes_from_config() {
    let (registry, _dir) = registry().await;
    let optimizer = ScriptedOptimizer::returning(Arc::new(module("optimized", 0.51)));
    let config = OptimizationEnvConfig {
        activation_threshold: 1.0,
        eval_concurrency: 4,
        ..OptimizationEnvConfig::default()
    };
    let orchestrator =
        orchestrator(registry, optimizer, module("baseline", 0.5)).with_config(&config);
    assert_eq!(orchestrator.activation_threshold(), 1.0);

    let outcome = orchestrator
        .optimize(
            ModuleKind::Rubric,
            &dataset(&["a", "b", "c"]),
            None,
            &ScoreAgreementMetric::new(FIELD),
            &OptimizerConfig::rubric(),
        )
        .await
        .unwrap();
    assert!(outcome.activated);
}

#[tokio::test]
async fn test_valset_is_used_for_scoring() {
    let (registry, _dir) = registry().await;
    // The optimized module fails on every validation example
    let optimizer = ScriptedOptimizer::returning(Arc::new(
        module("optimized", 0.9).failing_on("v1").failing_on("v2"),
    ));
    let orchestrator = orchestrator(registry, optimizer, module("baseline", 0.5));

    let trainset = dataset(&["t1", "t2", "t3"]);
    let valset = dataset(&["v1", "v2"]);
    let outcome = orchestrator
        .optimize(
            ModuleKind::Rubric,
            &trainset,
            Some(&valset),
            &ScoreAgreementMetric::new(FIELD),
            &OptimizerConfig::rubric(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.baseline.evaluated, 2);
    assert!(outcome.optimized.all_failed());
    assert_eq!(outcome.optimized.mean_score, 0.0);
    assert!(outcome.improvement_percent < 0.0);
    assert!(!outcome.activated);
    assert_eq!(outcome.model.training_example_count, Some(3));
}

#[tokio::test]
async fn test_failed_examples_are_skipped() {
    let (registry, _dir) = registry().await;
    let optimizer = ScriptedOptimizer::returning(Arc::new(module("optimized", 0.9)));
    let orchestrator = orchestrator(
        registry,
        optimizer,
        module("baseline", 0.6).failing_on("broken"),
    );

    let outcome = orchestrator
        .optimize(
            ModuleKind::Rubric,
            &dataset(&["a", "broken", "b"]),
            None,
            &ScoreAgreementMetric::new(FIELD),
            &OptimizerConfig::rubric(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.baseline.evaluated, 2);
    assert_eq!(outcome.baseline.skipped, 1);
    assert!((outcome.baseline.mean_score - 0.6).abs() < 1e-9);
    assert_eq!(outcome.optimized.evaluated, 3);
}

#[tokio::test]
async fn test_optimizer_failure_registers_nothing() {
    let (registry, _dir) = registry().await;
    let orchestrator = orchestrator(
        registry.clone(),
        ScriptedOptimizer::failing("search diverged"),
        module("baseline", 0.5),
    );

    let err = orchestrator
        .optimize(
            ModuleKind::Rubric,
            &dataset(&["a"]),
            None,
            &ScoreAgreementMetric::new(FIELD),
            &OptimizerConfig::rubric(),
        )
        .await
        .unwrap_err();

    match err {
        OptimizationError::OptimizerFailure {
            module_type,
            reason,
        } => {
            assert_eq!(module_type, "rubric_optimizer");
            assert!(reason.contains("search diverged"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(registry.list(None, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_optimizer_timeout_is_fatal() {
    let (registry, _dir) = registry().await;
    let optimizer = ScriptedOptimizer::returning(Arc::new(module("optimized", 0.9)))
        .with_delay(Duration::from_secs(5));
    let config = OptimizationEnvConfig {
        optimizer_timeout: Some(Duration::from_millis(20)),
        ..OptimizationEnvConfig::default()
    };
    let orchestrator =
        orchestrator(registry.clone(), optimizer, module("baseline", 0.5)).with_config(&config);

    let err = orchestrator
        .optimize(
            ModuleKind::Rubric,
            &dataset(&["a"]),
            None,
            &ScoreAgreementMetric::new(FIELD),
            &OptimizerConfig::rubric(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OptimizationError::OptimizerTimeout { .. }));
    assert!(registry.list(None, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unserializable_module_is_a_module_error() {
    let (registry, _dir) = registry().await;
    let optimized: Arc<dyn Module> = Arc::new(UnserializableModule {
        outputs: Fields::new().with(FIELD, 0.9),
    });
    let orchestrator = orchestrator(
        registry.clone(),
        ScriptedOptimizer::returning(optimized),
        module("baseline", 0.5),
    );

    let err = orchestrator
        .optimize(
            ModuleKind::Rubric,
            &dataset(&["a"]),
            None,
            &ScoreAgreementMetric::new(FIELD),
            &OptimizerConfig::rubric(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OptimizationError::Module { .. }));
    assert!(registry.list(None, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_run_registers_nothing() {
    let (registry, _dir) = registry().await;
    let optimizer = ScriptedOptimizer::returning(Arc::new(module("optimized", 0.9)))
        .with_delay(Duration::from_secs(5));
    let orchestrator = orchestrator(registry.clone(), optimizer, module("baseline", 0.5));

    let trainset = dataset(&["a"]);
    let metric = ScoreAgreementMetric::new(FIELD);
    let config = OptimizerConfig::rubric();
    let run = orchestrator.optimize(ModuleKind::Rubric, &trainset, None, &metric, &config);

    let cancelled = tokio::time::timeout(Duration::from_millis(20), run).await;
    assert!(cancelled.is_err());
    assert!(registry.list(None, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_optimize_all_skips_failed_kinds() {
    let (registry, _dir) = registry().await;
    let optimizer = Arc::new(ScriptedOptimizer::returning(Arc::new(module(
        "optimized", 0.9,
    ))));
    let factory = StaticModuleFactory::new(module("baseline", 0.5))
        .without(ModuleKind::Judge(JudgeType::Minimality));
    let orchestrator =
        OptimizationOrchestrator::new(registry.clone(), optimizer.clone(), Arc::new(factory));

    let metric = Arc::new(ScoreAgreementMetric::new(FIELD));
    let jobs = vec![
        OptimizationJob::new(ModuleKind::Rubric, dataset(&["a", "b"]), metric.clone()),
        OptimizationJob::new(
            ModuleKind::Judge(JudgeType::Minimality),
            dataset(&["a"]),
            metric.clone(),
        ),
        OptimizationJob::new(
            ModuleKind::Judge(JudgeType::Relevance),
            dataset(&["a", "b", "c"]),
            metric.clone(),
        )
        .with_valset(dataset(&["v"])),
    ];

    let outcomes = orchestrator.optimize_all(jobs).await;
    let types: Vec<&str> = outcomes
        .iter()
        .map(|o| o.model.module_type.as_str())
        .collect();
    assert_eq!(types, vec!["rubric_optimizer", "judge_relevance"]);
    assert_eq!(optimizer.calls(), 2);

    // Judge jobs pick up the judge defaults
    let relevance = registry.active_version("judge_relevance").await.unwrap().unwrap();
    let params = relevance.optimization_params.unwrap();
    assert_eq!(params["num_trials"], serde_json::json!(150));
}

#[tokio::test]
async fn test_repeated_runs_version_forward() {
    let (registry, _dir) = registry().await;
    let optimizer = ScriptedOptimizer::returning(Arc::new(module("optimized", 0.9)));
    let orchestrator = orchestrator(registry.clone(), optimizer, module("baseline", 0.5));
    let trainset = dataset(&["a", "b"]);
    let metric = ScoreAgreementMetric::new(FIELD);

    for _ in 0..3 {
        orchestrator
            .optimize(
                ModuleKind::Rubric,
                &trainset,
                None,
                &metric,
                &OptimizerConfig::rubric(),
            )
            .await
            .unwrap();
    }

    let versions = registry.list(Some("rubric_optimizer"), false).await.unwrap();
    assert_eq!(versions.len(), 3);
    let active: Vec<i64> = versions
        .iter()
        .filter(|v| v.is_active)
        .map(|v| v.version)
        .collect();
    assert_eq!(active, vec![3]);
}
