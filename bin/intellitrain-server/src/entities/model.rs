use std::future::Future;

use intellitrain_core::Modality;

use super::{ModelArtifactRecord, SqliteStore, TaskStatus, parse_modality, parse_timestamp, timestamp};

type ArtifactRow = (String, String, Vec<u8>, String, String, f64, String, Option<String>, String);

pub trait ModelStore: Send + Sync + 'static {
    fn insert_artifact(&self, record: ModelArtifactRecord) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Mark `task_id` succeeded with `result_data` and store `record` in one
    /// transaction. Nothing is written and `false` is returned when the task
    /// is no longer pending or running.
    fn commit_trained_artifact(
        &self,
        task_id: &str,
        result_data: &str,
        record: ModelArtifactRecord,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// The current model: most recent artifact of `modality`, weights included.
    fn latest_artifact(
        &self,
        modality: Modality,
    ) -> impl Future<Output = Result<Option<ModelArtifactRecord>, sqlx::Error>> + Send;

    /// History, newest first, with `weights` left empty.
    fn list_artifacts(
        &self,
        modality: Modality,
    ) -> impl Future<Output = Result<Vec<ModelArtifactRecord>, sqlx::Error>> + Send;
}

fn to_record(row: ArtifactRow) -> ModelArtifactRecord {
    let (id, modality, weights, label_encoder, architecture, accuracy, classes, task_id, created_at) = row;
    ModelArtifactRecord {
        id,
        modality: parse_modality(&modality),
        weights,
        label_encoder,
        architecture,
        accuracy,
        classes,
        task_id,
        created_at: parse_timestamp(&created_at, "model_artifacts.created_at"),
    }
}

const INSERT_ARTIFACT: &str = "INSERT INTO model_artifacts \
     (id, modality, weights, label_encoder, architecture, accuracy, classes, task_id, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

impl ModelStore for SqliteStore {
    async fn insert_artifact(&self, record: ModelArtifactRecord) -> Result<(), sqlx::Error> {
        sqlx::query(INSERT_ARTIFACT)
            .bind(&record.id)
            .bind(record.modality.as_str())
            .bind(&record.weights)
            .bind(&record.label_encoder)
            .bind(&record.architecture)
            .bind(record.accuracy)
            .bind(&record.classes)
            .bind(&record.task_id)
            .bind(timestamp(&record.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn commit_trained_artifact(
        &self,
        task_id: &str,
        result_data: &str,
        record: ModelArtifactRecord,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE tasks SET status = ?1, result_data = ?2, error_msg = NULL, updated_at = ?3 \
             WHERE id = ?4 AND status IN ('pending', 'running')",
        )
        .bind(TaskStatus::Succeeded.as_ref())
        .bind(result_data)
        .bind(timestamp(&chrono::Utc::now()))
        .bind(task_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(INSERT_ARTIFACT)
            .bind(&record.id)
            .bind(record.modality.as_str())
            .bind(&record.weights)
            .bind(&record.label_encoder)
            .bind(&record.architecture)
            .bind(record.accuracy)
            .bind(&record.classes)
            .bind(&record.task_id)
            .bind(timestamp(&record.created_at))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn latest_artifact(&self, modality: Modality) -> Result<Option<ModelArtifactRecord>, sqlx::Error> {
        let row: Option<ArtifactRow> = sqlx::query_as(
            "SELECT id, modality, weights, label_encoder, architecture, accuracy, classes, task_id, created_at \
             FROM model_artifacts WHERE modality = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(modality.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(to_record))
    }

    async fn list_artifacts(&self, modality: Modality) -> Result<Vec<ModelArtifactRecord>, sqlx::Error> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(
            "SELECT id, modality, X'' AS weights, label_encoder, architecture, accuracy, classes, task_id, created_at \
             FROM model_artifacts WHERE modality = ?1 ORDER BY created_at DESC, rowid DESC",
        )
        .bind(modality.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(to_record).collect())
    }
}
