use super::{decode_metrics, encode_metrics, from_millis, to_millis};
use crate::domain::errors::StoreError;
use crate::domain::registry::model_version::{artifact_file_name, generate_model_id};
use crate::domain::registry::{ModelSelector, ModelVersion, NewModelVersion};
use crate::domain::repositories::{ModelRegistry, StoreResult};
use crate::domain::types::ParamMap;
use crate::infrastructure::persistence::artifact_store::ArtifactStore;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// SQLite-backed registry. Writes that touch versioning or activation hold a
/// per-module-type lock so version numbers stay gapless and at most one
/// version is active.
pub struct SqliteModelRegistry {
    pool: SqlitePool,
    artifacts: ArtifactStore,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SqliteModelRegistry {
    pub fn new(pool: SqlitePool, artifacts: ArtifactStore) -> Self {
        Self {
            pool,
            artifacts,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Number of module types currently tracked by the lock map
    pub fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Entries nobody holds are pruned, so the map stays bounded by the number
    /// of module types with a write in flight.
    fn module_lock(&self, module_type: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(module_type.to_string()).or_default().clone()
    }

    async fn next_version(&self, module_type: &str) -> StoreResult<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(version), 0) + 1 AS next FROM model_versions WHERE module_type = ?",
        )
        .bind(module_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("next")?)
    }

    async fn version_exists(&self, module_type: &str, version: i64) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM model_versions WHERE module_type = ? AND version = ?")
            .bind(module_type)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    fn map_row(row: &SqliteRow) -> StoreResult<ModelVersion> {
        let metrics_json: String = row.try_get("metrics_json")?;
        let params_json: Option<String> = row.try_get("optimization_params_json")?;
        let optimization_params = params_json
            .map(|json| serde_json::from_str::<ParamMap>(&json))
            .transpose()?;

        Ok(ModelVersion {
            id: row.try_get("id")?,
            module_type: row.try_get("module_type")?,
            version: row.try_get("version")?,
            created_at: from_millis(row.try_get("created_at")?)?,
            artifact_ref: row.try_get("artifact_ref")?,
            checksum: row.try_get("checksum")?,
            metrics: decode_metrics(&metrics_json)?,
            training_example_count: row.try_get("training_example_count")?,
            optimization_params,
            is_active: row.try_get("is_active")?,
            notes: row.try_get("notes")?,
        })
    }
}

#[async_trait]
impl ModelRegistry for SqliteModelRegistry {
    async fn register(&self, request: NewModelVersion) -> StoreResult<String> {
        let module_type = request.module_type.clone();
        let lock = self.module_lock(&module_type);
        let _guard = lock.lock().await;

        let version = match request.version {
            Some(v) if v < 1 => {
                return Err(StoreError::invalid(format!(
                    "version must be >= 1, got {}",
                    v
                )));
            }
            Some(v) => {
                if self.version_exists(&module_type, v).await? {
                    return Err(StoreError::ConcurrencyConflict {
                        module_type,
                        version: v,
                    });
                }
                v
            }
            None => self.next_version(&module_type).await?,
        };

        let id = generate_model_id(&module_type);
        let created_at = Utc::now();
        let artifact_ref = artifact_file_name(&module_type, version, created_at);
        let metrics_json = encode_metrics(&request.metrics)?;
        let params_json = request
            .optimization_params
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let checksum = self.artifacts.write(&artifact_ref, &request.artifact).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO model_versions
            (id, module_type, version, created_at, artifact_ref, checksum, metrics_json,
             training_example_count, optimization_params_json, is_active, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&id)
        .bind(&module_type)
        .bind(version)
        .bind(to_millis(created_at))
        .bind(&artifact_ref)
        .bind(&checksum)
        .bind(&metrics_json)
        .bind(request.training_example_count)
        .bind(&params_json)
        .bind(&request.notes)
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            // No orphaned blob behind a failed insert
            if let Err(cleanup) = self.artifacts.remove(&artifact_ref).await {
                warn!("Failed to remove artifact {} after insert error: {}", artifact_ref, cleanup);
            }
            return Err(match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::ConcurrencyConflict {
                        module_type,
                        version,
                    }
                }
                other => other.into(),
            });
        }

        info!(
            "Registered {} v{} as {} ({} bytes)",
            module_type,
            version,
            id,
            request.artifact.len()
        );
        Ok(id)
    }

    async fn load(&self, selector: &ModelSelector) -> StoreResult<Vec<u8>> {
        let version = self.get(selector).await?;
        self.artifacts
            .read(&version.id, &version.artifact_ref, &version.checksum)
            .await
    }

    async fn get(&self, selector: &ModelSelector) -> StoreResult<ModelVersion> {
        let row = match selector {
            ModelSelector::Id(id) => {
                sqlx::query("SELECT * FROM model_versions WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            ModelSelector::Active(module_type) => {
                sqlx::query("SELECT * FROM model_versions WHERE module_type = ? AND is_active = 1")
                    .bind(module_type)
                    .fetch_optional(&self.pool)
                    .await?
            }
            ModelSelector::Version {
                module_type,
                version,
            } => {
                sqlx::query("SELECT * FROM model_versions WHERE module_type = ? AND version = ?")
                    .bind(module_type)
                    .bind(version)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        match row {
            Some(row) => Self::map_row(&row),
            None => Err(StoreError::not_found(selector.to_string())),
        }
    }

    async fn set_active(&self, id: &str) -> StoreResult<()> {
        let target = self.get(&ModelSelector::id(id)).await?;
        let lock = self.module_lock(&target.module_type);
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;

        // Re-check inside the transaction in case of a concurrent delete
        let still_there = sqlx::query("SELECT 1 FROM model_versions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if still_there.is_none() {
            return Err(StoreError::not_found(format!("model {}", id)));
        }

        sqlx::query(
            "UPDATE model_versions SET is_active = 0 WHERE module_type = ? AND id != ? AND is_active = 1",
        )
        .bind(&target.module_type)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE model_versions SET is_active = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if !target.is_active {
            info!(
                "Activated {} v{} ({})",
                target.module_type, target.version, id
            );
        }
        Ok(())
    }

    async fn list(
        &self,
        module_type: Option<&str>,
        active_only: bool,
    ) -> StoreResult<Vec<ModelVersion>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM model_versions WHERE 1 = 1");
        if let Some(module_type) = module_type {
            query.push(" AND module_type = ").push_bind(module_type);
        }
        if active_only {
            query.push(" AND is_active = 1");
        }
        query.push(" ORDER BY module_type ASC, version DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let target = self.get(&ModelSelector::id(id)).await?;
        let lock = self.module_lock(&target.module_type);
        let _guard = lock.lock().await;

        let result = sqlx::query("DELETE FROM model_versions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("model {}", id)));
        }

        if !self.artifacts.remove(&target.artifact_ref).await? {
            warn!(
                "Artifact {} for {} was already missing",
                target.artifact_ref, id
            );
        }

        if target.is_active {
            warn!(
                "Deleted active version {} v{}; no version of {} is active now",
                target.module_type, target.version, target.module_type
            );
        } else {
            info!("Deleted {} v{} ({})", target.module_type, target.version, id);
        }
        Ok(())
    }
}
