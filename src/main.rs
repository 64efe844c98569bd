use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use promptlab::application::bootstrap::{PersistenceBootstrap, PersistenceHandle};
use promptlab::application::monitoring::RegressionMonitor;
use promptlab::application::optimization::OptimizationOrchestrator;
use promptlab::config::Config;
use promptlab::domain::experiment::{ExperimentStatus, NewExperiment, SignificanceMethod};
use promptlab::domain::experiment::significance::DEFAULT_METRIC_KEY;
use promptlab::domain::optimization::metrics::ScoreAgreementMetric;
use promptlab::domain::optimization::training_data::{JudgeTrainingFactory, RubricTrainingFactory};
use promptlab::domain::optimization::{ModuleKind, OptimizerConfig};
use promptlab::domain::registry::ModelSelector;
use promptlab::domain::types::Fields;
use promptlab::infrastructure::mock::{ScriptedOptimizer, StaticModule, StaticModuleFactory};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Versioned prompt module registry and experiment tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered versions
    List {
        /// Restrict to one module type (e.g. judge_safety)
        #[arg(short, long)]
        module_type: Option<String>,

        /// Only show active versions
        #[arg(short, long)]
        active: bool,
    },

    /// Make a version the active one for its module type
    Activate { id: String },

    /// Delete a version and its artifact
    Delete { id: String },

    /// Copy an artifact out of the registry
    Export {
        module_type: String,

        /// Version number; the active version when omitted
        #[arg(short, long)]
        version: Option<i64>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create an A/B experiment
    CreateExperiment {
        name: String,
        module_type: String,

        #[arg(long)]
        baseline: Option<String>,

        #[arg(long)]
        optimized: Option<String>,

        /// Share of traffic routed to the baseline
        #[arg(long, default_value = "0.5")]
        split: f64,
    },

    /// List experiments
    Experiments {
        /// active or stopped
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Compare the two arms of an experiment
    Analyze {
        id: String,

        #[arg(short, long, default_value = DEFAULT_METRIC_KEY)]
        metric: String,

        /// heuristic or student_t; defaults to SIGNIFICANCE_METHOD
        #[arg(long)]
        method: Option<String>,
    },

    /// Stop an experiment
    Stop { id: String },

    /// Show recent performance snapshots
    History {
        module_type: String,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Check module types for a performance regression
    CheckDegradation {
        /// Module types to check (all known kinds when empty)
        module_types: Vec<String>,
    },

    /// Summarize the performance trend of a module type
    Summary { module_type: String },

    /// Run an offline optimization with in-process stand-in modules
    Demo {
        #[arg(short, long, default_value = "rubric_optimizer")]
        kind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let persistence = PersistenceBootstrap::init(&config).await?;

    let result = run(cli.command, &config, &persistence).await;
    persistence.close().await;
    result
}

async fn run(command: Commands, config: &Config, p: &PersistenceHandle) -> Result<()> {
    match command {
        Commands::List {
            module_type,
            active,
        } => {
            let versions = p.registry.list(module_type.as_deref(), active).await?;
            if versions.is_empty() {
                println!("No versions registered");
            }
            for v in versions {
                println!(
                    "{:<28} v{:<4} {} {} improvement={:+.2}%  {}",
                    v.module_type,
                    v.version,
                    if v.is_active { "*" } else { " " },
                    v.id,
                    v.metric("improvement_percent").unwrap_or_default(),
                    v.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::Activate { id } => {
            p.registry.set_active(&id).await?;
            println!("Activated {}", id);
        }
        Commands::Delete { id } => {
            p.registry.delete(&id).await?;
            println!("Deleted {}", id);
        }
        Commands::Export {
            module_type,
            version,
            output,
        } => {
            let selector = match version {
                Some(v) => ModelSelector::version(module_type, v),
                None => ModelSelector::active(module_type),
            };
            let bytes = p.registry.load(&selector).await?;
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), output.display());
        }
        Commands::CreateExperiment {
            name,
            module_type,
            baseline,
            optimized,
            split,
        } => {
            let request = NewExperiment::new(name, module_type)
                .with_refs(baseline, optimized)
                .with_split_ratio(split);
            let id = p.experiments.create_experiment(request).await?;
            println!("{}", id);
        }
        Commands::Experiments { status } => {
            let status = status
                .map(|s| s.parse::<ExperimentStatus>())
                .transpose()?;
            for e in p.experiments.list_experiments(status).await? {
                println!(
                    "{} {:<8} {:<24} {:<20} split={:.2}",
                    e.id,
                    e.status.as_str(),
                    e.name,
                    e.module_type,
                    e.split_ratio
                );
            }
        }
        Commands::Analyze { id, metric, method } => {
            let method = match method {
                Some(m) => m.parse::<SignificanceMethod>()?,
                None => config.analysis.significance_method,
            };
            let r = p
                .experiments
                .analyze_results_with(&id, &metric, config.analysis.confidence_level, method)
                .await?;
            println!("{}", serde_json::to_string_pretty(&r)?);
        }
        Commands::Stop { id } => {
            p.experiments.stop_experiment(&id).await?;
            println!("Stopped {}", id);
        }
        Commands::History { module_type, limit } => {
            for s in p.tracker.get_history(&module_type, Some(limit)).await? {
                println!(
                    "{} {} {}",
                    s.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                    s.model_id.as_deref().unwrap_or("-"),
                    serde_json::to_string(&s.metrics)?
                );
            }
        }
        Commands::CheckDegradation { module_types } => {
            let module_types = if module_types.is_empty() {
                all_module_types()
            } else {
                module_types
            };
            let monitor = RegressionMonitor::new(p.tracker.clone()).with_config(&config.analysis);
            let regressions = monitor.sweep(&module_types).await?;
            println!("{}", serde_json::to_string_pretty(&regressions)?);
        }
        Commands::Summary { module_type } => {
            let summary = p.tracker.get_summary(&module_type).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Demo { kind } => {
            let kind: ModuleKind = kind.parse()?;
            run_demo(kind, config, p).await?;
        }
    }
    Ok(())
}

fn all_module_types() -> Vec<String> {
    let mut kinds = vec![ModuleKind::Rubric.module_type()];
    kinds.extend(
        promptlab::domain::optimization::JudgeType::ALL
            .iter()
            .map(|j| ModuleKind::Judge(*j).module_type()),
    );
    kinds
}

async fn run_demo(kind: ModuleKind, config: &Config, p: &PersistenceHandle) -> Result<()> {
    // Constant-output modules scored against the seed labels
    let (trainset, field, baseline_value, optimized_value) = match kind {
        ModuleKind::Rubric => (
            RubricTrainingFactory::new().create_synthetic_examples()?,
            "reward_score",
            0.2,
            0.55,
        ),
        ModuleKind::Judge(judge) => (
            JudgeTrainingFactory::new().create_synthetic_examples(judge.as_str())?,
            "confidence",
            0.5,
            0.95,
        ),
    };

    let baseline = StaticModule::new("baseline", Fields::new().with(field, baseline_value));
    let optimized = StaticModule::new("optimized", Fields::new().with(field, optimized_value));

    let orchestrator = OptimizationOrchestrator::new(
        p.registry.clone(),
        Arc::new(ScriptedOptimizer::returning(Arc::new(optimized))),
        Arc::new(StaticModuleFactory::new(baseline)),
    )
    .with_config(&config.optimization);

    let metric = ScoreAgreementMetric::new(field);
    let outcome = orchestrator
        .optimize(kind, &trainset, None, &metric, &OptimizerConfig::for_kind(&kind))
        .await?;

    RegressionMonitor::new(p.tracker.clone())
        .with_config(&config.analysis)
        .record_summary(&kind.module_type(), Some(&outcome.model.id), &outcome.optimized)
        .await?;

    info!(
        "Demo registered {} v{} (activated: {})",
        outcome.model.module_type, outcome.model.version, outcome.activated
    );
    println!(
        "{} v{}: baseline {:.3} -> optimized {:.3} ({:+.2}%), active={}",
        outcome.model.module_type,
        outcome.model.version,
        outcome.baseline.mean_score,
        outcome.optimized.mean_score,
        outcome.improvement_percent,
        outcome.activated
    );
    Ok(())
}
