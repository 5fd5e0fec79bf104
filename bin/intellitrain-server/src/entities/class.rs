use std::future::Future;

use intellitrain_core::Modality;

use super::{ClassRecord, SqliteStore, parse_modality, parse_timestamp, timestamp};

type ClassRow = (String, String, String, i64, String);

const CLASS_COLUMNS: &str = "id, modality, name, is_default, created_at";

pub trait ClassStore: Send + Sync + 'static {
    /// Return the class named `name`, creating it when missing. The flag is
    /// `true` when this call created it.
    fn get_or_create_class(
        &self,
        modality: Modality,
        name: &str,
        is_default: bool,
    ) -> impl Future<Output = Result<(ClassRecord, bool), sqlx::Error>> + Send;

    /// Insert a new class; fails with a unique-constraint error when the
    /// name is taken.
    fn insert_class(&self, record: ClassRecord) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn get_class(
        &self,
        modality: Modality,
        name: &str,
    ) -> impl Future<Output = Result<Option<ClassRecord>, sqlx::Error>> + Send;

    fn list_classes(&self, modality: Modality) -> impl Future<Output = Result<Vec<ClassRecord>, sqlx::Error>> + Send;

    fn count_classes(&self, modality: Modality) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Returns `false` when no such class exists.
    fn delete_class(&self, modality: Modality, name: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

fn to_record((id, modality, name, is_default, created_at): ClassRow) -> ClassRecord {
    ClassRecord {
        id,
        modality: parse_modality(&modality),
        name,
        is_default: is_default != 0,
        created_at: parse_timestamp(&created_at, "classes.created_at"),
    }
}

impl ClassStore for SqliteStore {
    async fn get_or_create_class(
        &self,
        modality: Modality,
        name: &str,
        is_default: bool,
    ) -> Result<(ClassRecord, bool), sqlx::Error> {
        let candidate = ClassRecord::new(modality, name, is_default);
        let inserted = sqlx::query(
            "INSERT INTO classes (id, modality, name, is_default, created_at) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (modality, name) DO NOTHING",
        )
        .bind(&candidate.id)
        .bind(modality.as_str())
        .bind(name)
        .bind(is_default as i64)
        .bind(timestamp(&candidate.created_at))
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;
        if inserted {
            return Ok((candidate, true));
        }
        let existing = self.get_class(modality, name).await?.ok_or(sqlx::Error::RowNotFound)?;
        Ok((existing, false))
    }

    async fn insert_class(&self, record: ClassRecord) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO classes (id, modality, name, is_default, created_at) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(&record.id)
            .bind(record.modality.as_str())
            .bind(&record.name)
            .bind(record.is_default as i64)
            .bind(timestamp(&record.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_class(&self, modality: Modality, name: &str) -> Result<Option<ClassRecord>, sqlx::Error> {
        let row: Option<ClassRow> =
            sqlx::query_as(&format!("SELECT {CLASS_COLUMNS} FROM classes WHERE modality = ?1 AND name = ?2"))
                .bind(modality.as_str())
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(to_record))
    }

    async fn list_classes(&self, modality: Modality) -> Result<Vec<ClassRecord>, sqlx::Error> {
        let rows: Vec<ClassRow> = sqlx::query_as(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes WHERE modality = ?1 ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(modality.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(to_record).collect())
    }

    async fn count_classes(&self, modality: Modality) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM classes WHERE modality = ?1")
            .bind(modality.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_class(&self, modality: Modality, name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM classes WHERE modality = ?1 AND name = ?2")
            .bind(modality.as_str())
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::memory_store;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = memory_store().await;
        let (first, created) = store.get_or_create_class(Modality::Audio, "dog", false).await.unwrap();
        assert!(created);
        let (second, created) = store.get_or_create_class(Modality::Audio, "dog", false).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_classes(Modality::Audio).await.unwrap(), 1);
        assert_eq!(store.count_classes(Modality::Image).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_insert_fails() {
        let store = memory_store().await;
        store.insert_class(ClassRecord::new(Modality::Image, "cat", false)).await.unwrap();
        assert!(store.insert_class(ClassRecord::new(Modality::Image, "cat", false)).await.is_err());
        // same name under the other modality is a different class
        store.insert_class(ClassRecord::new(Modality::Audio, "cat", false)).await.unwrap();
    }

    #[tokio::test]
    async fn list_preserves_creation_order_and_delete_reports_missing() {
        let store = memory_store().await;
        for name in ["b", "a", "c"] {
            store.get_or_create_class(Modality::Audio, name, false).await.unwrap();
        }
        let names: Vec<String> = store.list_classes(Modality::Audio).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert!(store.delete_class(Modality::Audio, "a").await.unwrap());
        assert!(!store.delete_class(Modality::Audio, "a").await.unwrap());
    }
}
