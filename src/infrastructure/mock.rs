//! In-process stand-ins for the module, optimizer and factory ports.
//!
//! Used by the integration tests and the CLI `demo` command; none of them
//! talk to a language model.

use crate::domain::optimization::{ModuleKind, OptimizerConfig};
use crate::domain::ports::{Example, Module, ModuleFactory, Optimizer};
use crate::domain::types::Fields;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Module returning the same prediction for every input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticModule {
    pub name: String,
    pub outputs: Fields,
    /// Inputs whose `text` field equals one of these fail
    #[serde(default)]
    pub fail_on: Vec<String>,
    #[serde(skip)]
    pub delay: Option<Duration>,
}

impl StaticModule {
    pub fn new(name: impl Into<String>, outputs: Fields) -> Self {
        Self {
            name: name.into(),
            outputs,
            fail_on: Vec::new(),
            delay: None,
        }
    }

    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.fail_on.push(text.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn from_artifact(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to decode StaticModule artifact")
    }
}

#[async_trait]
impl Module for StaticModule {
    async fn forward(&self, inputs: &Fields) -> Result<Fields> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(text) = inputs.get_str("text")
            && self.fail_on.iter().any(|f| f == text)
        {
            bail!("{} refused input '{}'", self.name, text);
        }
        Ok(self.outputs.clone())
    }

    fn to_artifact(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to encode StaticModule artifact")
    }
}

/// Module whose serialization always fails
pub struct UnserializableModule {
    pub outputs: Fields,
}

#[async_trait]
impl Module for UnserializableModule {
    async fn forward(&self, _inputs: &Fields) -> Result<Fields> {
        Ok(self.outputs.clone())
    }

    fn to_artifact(&self) -> Result<Vec<u8>> {
        bail!("module holds state that cannot be serialized")
    }
}

enum Script {
    Return(Arc<dyn Module>),
    Fail(String),
}

/// Optimizer that hands back a preset module, optionally after a delay
pub struct ScriptedOptimizer {
    script: Script,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedOptimizer {
    pub fn returning(module: Arc<dyn Module>) -> Self {
        Self {
            script: Script::Return(module),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            script: Script::Fail(reason.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Optimizer for ScriptedOptimizer {
    async fn compile(
        &self,
        _student: Arc<dyn Module>,
        trainset: &[Example],
        config: &OptimizerConfig,
    ) -> Result<Arc<dyn Module>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(
            "ScriptedOptimizer: compiling over {} examples ({} trials)",
            trainset.len(),
            config.num_trials
        );
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Return(module) => Ok(module.clone()),
            Script::Fail(reason) => bail!("{}", reason),
        }
    }
}

/// Factory building a [`StaticModule`] baseline for every kind
pub struct StaticModuleFactory {
    baseline: StaticModule,
    unsupported: HashSet<ModuleKind>,
}

impl StaticModuleFactory {
    pub fn new(baseline: StaticModule) -> Self {
        Self {
            baseline,
            unsupported: HashSet::new(),
        }
    }

    pub fn without(mut self, kind: ModuleKind) -> Self {
        self.unsupported.insert(kind);
        self
    }
}

impl ModuleFactory for StaticModuleFactory {
    fn build(&self, kind: &ModuleKind) -> Result<Arc<dyn Module>> {
        if self.unsupported.contains(kind) {
            bail!("No module available for {}", kind);
        }
        info!("StaticModuleFactory: building baseline for {}", kind);
        let mut module = self.baseline.clone();
        module.name = format!("{}_baseline", kind);
        Ok(Arc::new(module))
    }
}
