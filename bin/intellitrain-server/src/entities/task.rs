use std::future::Future;

use chrono::Utc;

use super::{SqliteStore, TaskRecord, parse_timestamp, timestamp};

type TaskRow = (String, String, String, Option<String>, Option<String>, Option<String>, String, String);

const TASK_COLUMNS: &str = "id, task_type, status, input_data, result_data, error_msg, created_at, updated_at";

pub trait TaskStore: Send + Sync + 'static {
    fn insert_task(&self, record: TaskRecord) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn update_task_status(
        &self,
        id: &str,
        status: &str,
        result_data: Option<&str>,
        error_msg: Option<&str>,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Like [`TaskStore::update_task_status`] but only applies while the task
    /// is still pending or running. Returns `false` when the task already
    /// reached a final state (e.g. it was cancelled).
    fn update_active_task(
        &self,
        id: &str,
        status: &str,
        result_data: Option<&str>,
        error_msg: Option<&str>,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    fn get_task(&self, id: &str) -> impl Future<Output = Result<Option<TaskRecord>, sqlx::Error>> + Send;

    fn list_tasks(&self, task_type: Option<&str>) -> impl Future<Output = Result<Vec<TaskRecord>, sqlx::Error>> + Send;

    /// Most recent pending/running task of `task_type`.
    fn active_task(&self, task_type: &str) -> impl Future<Output = Result<Option<TaskRecord>, sqlx::Error>> + Send;

    fn latest_task(&self, task_type: &str) -> impl Future<Output = Result<Option<TaskRecord>, sqlx::Error>> + Send;

    /// Mark every pending/running task as interrupted; used at startup.
    fn interrupt_running_tasks(&self) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

fn to_record(row: TaskRow) -> TaskRecord {
    let (id, task_type, status, input_data, result_data, error_msg, created_at, updated_at) = row;
    TaskRecord {
        id,
        task_type,
        status,
        input_data,
        result_data,
        error_msg,
        created_at: parse_timestamp(&created_at, "tasks.created_at"),
        updated_at: parse_timestamp(&updated_at, "tasks.updated_at"),
    }
}

impl TaskStore for SqliteStore {
    async fn insert_task(&self, record: TaskRecord) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ))
        .bind(&record.id)
        .bind(&record.task_type)
        .bind(&record.status)
        .bind(&record.input_data)
        .bind(&record.result_data)
        .bind(&record.error_msg)
        .bind(timestamp(&record.created_at))
        .bind(timestamp(&record.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_task_status(
        &self,
        id: &str,
        status: &str,
        result_data: Option<&str>,
        error_msg: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET status = ?1, result_data = ?2, error_msg = ?3, updated_at = ?4 WHERE id = ?5")
            .bind(status)
            .bind(result_data)
            .bind(error_msg)
            .bind(timestamp(&Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_active_task(
        &self,
        id: &str,
        status: &str,
        result_data: Option<&str>,
        error_msg: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?1, result_data = ?2, error_msg = ?3, updated_at = ?4 \
             WHERE id = ?5 AND status IN ('pending', 'running')",
        )
        .bind(status)
        .bind(result_data)
        .bind(error_msg)
        .bind(timestamp(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>, sqlx::Error> {
        let row: Option<TaskRow> = sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(to_record))
    }

    async fn list_tasks(&self, task_type: Option<&str>) -> Result<Vec<TaskRecord>, sqlx::Error> {
        let rows: Vec<TaskRow> = if let Some(tt) = task_type {
            sqlx::query_as(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE task_type = ?1 ORDER BY created_at DESC, rowid DESC"
            ))
            .bind(tt)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, rowid DESC"))
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.into_iter().map(to_record).collect())
    }

    async fn active_task(&self, task_type: &str) -> Result<Option<TaskRecord>, sqlx::Error> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE task_type = ?1 AND status IN ('pending', 'running') \
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(task_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(to_record))
    }

    async fn latest_task(&self, task_type: &str) -> Result<Option<TaskRecord>, sqlx::Error> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE task_type = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(task_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(to_record))
    }

    async fn interrupt_running_tasks(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status = 'interrupted', updated_at = ?1 WHERE status IN ('pending', 'running')",
        )
        .bind(timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
