use super::{decode_metrics, encode_metrics, from_millis, to_millis};
use crate::domain::performance::degradation::{DEGRADATION_WINDOW, detect_degradation};
use crate::domain::performance::summary::{SUMMARY_WINDOW, summarize};
use crate::domain::performance::{DegradationReport, PerformanceSnapshot, PerformanceSummary};
use crate::domain::repositories::{PerformanceTracker, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info, warn};

pub struct SqlitePerformanceTracker {
    pool: SqlitePool,
}

impl SqlitePerformanceTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> StoreResult<PerformanceSnapshot> {
        let metrics_json: String = row.try_get("metrics_json")?;
        Ok(PerformanceSnapshot {
            id: Some(row.try_get("id")?),
            timestamp: from_millis(row.try_get("timestamp")?)?,
            module_type: row.try_get("module_type")?,
            model_id: row.try_get("model_id")?,
            metrics: decode_metrics(&metrics_json)?,
            sample_size: row.try_get("sample_size")?,
            notes: row.try_get("notes")?,
        })
    }
}

#[async_trait]
impl PerformanceTracker for SqlitePerformanceTracker {
    async fn record_snapshot(&self, snapshot: PerformanceSnapshot) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO performance_snapshots
            (timestamp, module_type, model_id, metrics_json, sample_size, notes)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(to_millis(Utc::now()))
        .bind(&snapshot.module_type)
        .bind(&snapshot.model_id)
        .bind(encode_metrics(&snapshot.metrics)?)
        .bind(snapshot.sample_size)
        .bind(&snapshot.notes)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(
            "Recorded snapshot {} for {} ({} metrics)",
            id,
            snapshot.module_type,
            snapshot.metrics.len()
        );
        Ok(id)
    }

    async fn get_history(
        &self,
        module_type: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<PerformanceSnapshot>> {
        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT * FROM performance_snapshots WHERE module_type = ");
        query.push_bind(module_type);
        query.push(" ORDER BY timestamp DESC, id DESC");
        if let Some(limit) = limit {
            query.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn detect_degradation_with(
        &self,
        module_type: &str,
        metric_key: &str,
        threshold: f64,
    ) -> StoreResult<DegradationReport> {
        let history = self
            .get_history(module_type, Some(DEGRADATION_WINDOW))
            .await?;
        let report = detect_degradation(module_type, &history, metric_key, threshold);

        if report.degradation_detected {
            warn!(
                "Degradation detected for {}: {} dropped {:.1}% (current {:.4}, baseline {:.4})",
                module_type,
                metric_key,
                report.drop_percent.unwrap_or_default() * 100.0,
                report.current_value.unwrap_or_default(),
                report.baseline_value.unwrap_or_default()
            );
        } else {
            debug!("No degradation for {}: {}", module_type, report.reason);
        }
        Ok(report)
    }

    async fn get_summary(&self, module_type: &str) -> StoreResult<PerformanceSummary> {
        let history = self.get_history(module_type, Some(SUMMARY_WINDOW)).await?;
        let summary = summarize(module_type, &history);
        if let (Some(trend), Some(pct)) = (summary.trend, summary.trend_percent) {
            info!(
                "{}: {} snapshots, trend {} ({:+.2}%)",
                module_type, summary.snapshots_count, trend, pct
            );
        }
        Ok(summary)
    }
}
