use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::domain::repositories::{ExperimentStore, ModelRegistry, PerformanceTracker};
use crate::infrastructure::persistence::artifact_store::ArtifactStore;
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::{
    SqliteExperimentStore, SqliteModelRegistry, SqlitePerformanceTracker,
};

const MEMORY_URL: &str = "sqlite::memory:";

pub struct PersistenceHandle {
    pub db: Database,
    pub registry: Arc<dyn ModelRegistry>,
    pub experiments: Arc<dyn ExperimentStore>,
    pub tracker: Arc<dyn PerformanceTracker>,
}

impl PersistenceHandle {
    pub async fn close(&self) {
        self.db.close().await;
    }
}

pub struct PersistenceBootstrap;

impl PersistenceBootstrap {
    pub async fn init(config: &Config) -> Result<PersistenceHandle> {
        let db_url = &config.storage.database_url;
        info!("Initializing Database at {}", db_url);

        let db = if db_url == MEMORY_URL {
            Database::in_memory().await
        } else {
            Database::new(db_url).await
        }
        .context("Failed to initialize database")?;

        let artifacts = ArtifactStore::open(&config.storage.artifact_dir)
            .await
            .context("Failed to open artifact directory")?;

        let registry = Arc::new(SqliteModelRegistry::new(db.pool.clone(), artifacts));
        let experiments = Arc::new(SqliteExperimentStore::new(db.pool.clone()));
        let tracker = Arc::new(SqlitePerformanceTracker::new(db.pool.clone()));

        Ok(PersistenceHandle {
            db,
            registry,
            experiments,
            tracker,
        })
    }
}
