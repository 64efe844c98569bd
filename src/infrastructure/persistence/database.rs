use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

const MEMORY_URL: &str = "sqlite::memory:";

/// Shared SQLite pool backing all stores
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal); // Better for concurrency

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Private in-memory database. A single connection that never idles out,
    /// since each SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str(MEMORY_URL)?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Model Versions
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS model_versions (
                id TEXT PRIMARY KEY,
                module_type TEXT NOT NULL,
                version INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                artifact_ref TEXT NOT NULL,
                checksum TEXT NOT NULL,
                metrics_json TEXT NOT NULL,
                training_example_count INTEGER,
                optimization_params_json TEXT,
                is_active BOOLEAN NOT NULL DEFAULT 0,
                notes TEXT,
                UNIQUE (module_type, version)
            );
            CREATE INDEX IF NOT EXISTS idx_model_versions_module_type
            ON model_versions (module_type);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_model_versions_one_active
            ON model_versions (module_type) WHERE is_active = 1;
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create model_versions table")?;

        // 2. Experiments
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS experiments (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                module_type TEXT NOT NULL,
                baseline_ref TEXT,
                optimized_ref TEXT,
                split_ratio REAL NOT NULL,
                created_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                notes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_experiments_created
            ON experiments (status, created_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create experiments table")?;

        // 3. Evaluations
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS evaluations (
                id TEXT PRIMARY KEY,
                experiment_id TEXT NOT NULL REFERENCES experiments (id),
                variant TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                metrics_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_evaluations_experiment
            ON evaluations (experiment_id);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create evaluations table")?;

        // 4. Performance Snapshots
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS performance_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                module_type TEXT NOT NULL,
                model_id TEXT,
                metrics_json TEXT NOT NULL,
                sample_size INTEGER,
                notes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_perf_snapshot_module_time
            ON performance_snapshots (module_type, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create performance_snapshots table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
