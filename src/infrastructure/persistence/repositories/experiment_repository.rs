use super::{decode_metrics, encode_metrics, from_millis, to_millis};
use crate::domain::errors::StoreError;
use crate::domain::experiment::significance::analyze;
use crate::domain::experiment::{
    Evaluation, Experiment, ExperimentResults, ExperimentStatus, NewExperiment, SignificanceMethod,
    Variant,
};
use crate::domain::repositories::{ExperimentStore, StoreResult};
use crate::domain::types::{MetricMap, metric_or_zero};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

pub struct SqliteExperimentStore {
    pool: SqlitePool,
}

impl SqliteExperimentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_experiment(row: &SqliteRow) -> StoreResult<Experiment> {
        let status: String = row.try_get("status")?;
        Ok(Experiment {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            module_type: row.try_get("module_type")?,
            baseline_ref: row.try_get("baseline_ref")?,
            optimized_ref: row.try_get("optimized_ref")?,
            split_ratio: row.try_get("split_ratio")?,
            created_at: from_millis(row.try_get("created_at")?)?,
            status: status.parse()?,
            notes: row.try_get("notes")?,
        })
    }

    fn map_evaluation(row: &SqliteRow) -> StoreResult<Evaluation> {
        let variant: String = row.try_get("variant")?;
        let metrics_json: String = row.try_get("metrics_json")?;
        Ok(Evaluation {
            id: row.try_get("id")?,
            experiment_id: row.try_get("experiment_id")?,
            variant: variant.parse()?,
            timestamp: from_millis(row.try_get("timestamp")?)?,
            metrics: decode_metrics(&metrics_json)?,
        })
    }
}

#[async_trait]
impl ExperimentStore for SqliteExperimentStore {
    async fn create_experiment(&self, request: NewExperiment) -> StoreResult<String> {
        request.validate()?;

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO experiments
            (id, name, module_type, baseline_ref, optimized_ref, split_ratio, created_at, status, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&request.module_type)
        .bind(&request.baseline_ref)
        .bind(&request.optimized_ref)
        .bind(request.split_ratio)
        .bind(to_millis(Utc::now()))
        .bind(ExperimentStatus::Active.as_str())
        .bind(&request.notes)
        .execute(&self.pool)
        .await?;

        info!(
            "Created experiment '{}' ({}) for {} with split {:.2}",
            request.name, id, request.module_type, request.split_ratio
        );
        Ok(id)
    }

    async fn get_experiment(&self, id: &str) -> StoreResult<Experiment> {
        let row = sqlx::query("SELECT * FROM experiments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::map_experiment(&row),
            None => Err(StoreError::not_found(format!("experiment {}", id))),
        }
    }

    async fn assign_variant(&self, id: &str) -> StoreResult<Variant> {
        let experiment = self.get_experiment(id).await?;
        let draw: f64 = rand::rng().random();
        let variant = experiment.choose_variant(draw);
        debug!("Experiment {} assigned {} (draw {:.4})", id, variant, draw);
        Ok(variant)
    }

    async fn record_evaluation(
        &self,
        id: &str,
        variant: &str,
        metrics: MetricMap,
    ) -> StoreResult<String> {
        let variant: Variant = variant.parse()?;
        // Surface a missing experiment as NotFound rather than a foreign key error
        self.get_experiment(id).await?;

        let evaluation_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO evaluations (id, experiment_id, variant, timestamp, metrics_json)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&evaluation_id)
        .bind(id)
        .bind(variant.as_str())
        .bind(to_millis(Utc::now()))
        .bind(encode_metrics(&metrics)?)
        .execute(&self.pool)
        .await?;

        debug!("Recorded {} evaluation for experiment {}", variant, id);
        Ok(evaluation_id)
    }

    async fn evaluations(&self, id: &str) -> StoreResult<Vec<Evaluation>> {
        let rows = sqlx::query(
            "SELECT * FROM evaluations WHERE experiment_id = ? ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_evaluation).collect()
    }

    async fn analyze_results_with(
        &self,
        id: &str,
        metric_key: &str,
        confidence_level: f64,
        method: SignificanceMethod,
    ) -> StoreResult<ExperimentResults> {
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(StoreError::invalid(format!(
                "confidence_level must be in (0, 1), got {}",
                confidence_level
            )));
        }

        let evaluations = self.evaluations(id).await?;
        if evaluations.is_empty() {
            return Err(StoreError::not_found(format!(
                "evaluations for experiment {}",
                id
            )));
        }

        let (baseline, optimized): (Vec<&Evaluation>, Vec<&Evaluation>) = evaluations
            .iter()
            .partition(|e| e.variant == Variant::Baseline);
        let extract = |evals: &[&Evaluation]| -> Vec<f64> {
            evals
                .iter()
                .map(|e| metric_or_zero(&e.metrics, metric_key))
                .collect()
        };

        let results = analyze(
            &extract(baseline.as_slice()),
            &extract(optimized.as_slice()),
            confidence_level,
            method,
        );

        info!(
            "Experiment {} [{}]: baseline {:.4} (n={}), optimized {:.4} (n={}), improvement {:.2}%, p={} ({})",
            id,
            metric_key,
            results.baseline_mean,
            results.baseline_count,
            results.optimized_mean,
            results.optimized_count,
            results.improvement_percent,
            results.p_value,
            method
        );
        Ok(results)
    }

    async fn stop_experiment(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE experiments SET status = ? WHERE id = ?")
            .bind(ExperimentStatus::Stopped.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("experiment {}", id)));
        }
        info!("Stopped experiment {}", id);
        Ok(())
    }

    async fn list_experiments(
        &self,
        status: Option<ExperimentStatus>,
    ) -> StoreResult<Vec<Experiment>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM experiments");
        if let Some(status) = status {
            query.push(" WHERE status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at DESC, rowid DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::map_experiment).collect()
    }
}
