use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use intellitrain_core::Modality;
use tracing::warn;

use super::dao::{decode_embedding, encode_embedding};
use super::{BlobRecord, SampleRecord, SqliteStore, StoredSample, parse_modality, parse_timestamp, timestamp};

type SampleRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<Vec<u8>>,
    Option<String>,
    String,
);

const SAMPLE_COLUMNS: &str =
    "id, modality, class_name, blob_id, inline_b64, filename, content_type, embedding, extractor, created_at";

pub trait SampleStore: Send + Sync + 'static {
    /// Persist a sample and, for blob-backed payloads, its blob.
    ///
    /// The two writes are not wrapped in a transaction; a failure between
    /// them leaves an orphan blob.
    fn create_sample(
        &self,
        sample: SampleRecord,
        blob: Option<BlobRecord>,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Remove the sample (and its blob). `None` when the id is unknown.
    fn delete_sample(
        &self,
        modality: Modality,
        id: &str,
    ) -> impl Future<Output = Result<Option<SampleRecord>, sqlx::Error>> + Send;

    fn get_sample(
        &self,
        modality: Modality,
        id: &str,
    ) -> impl Future<Output = Result<Option<SampleRecord>, sqlx::Error>> + Send;

    /// Every sample of `modality` with its class, its decoded payload and
    /// any stored embedding.
    fn read_all(&self, modality: Modality) -> impl Future<Output = Result<Vec<StoredSample>, sqlx::Error>> + Send;

    /// Raw bytes and content type of one sample.
    fn read_payload(
        &self,
        modality: Modality,
        id: &str,
    ) -> impl Future<Output = Result<Option<(Vec<u8>, String)>, sqlx::Error>> + Send;

    /// Metadata only; newest first.
    fn list_samples(
        &self,
        modality: Modality,
        class_name: Option<&str>,
    ) -> impl Future<Output = Result<Vec<SampleRecord>, sqlx::Error>> + Send;

    fn count_samples(&self, modality: Modality) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
}

fn to_record(row: SampleRow) -> SampleRecord {
    let (id, modality, class_name, blob_id, inline_b64, filename, content_type, embedding, extractor, created_at) = row;
    SampleRecord {
        embedding: embedding.as_deref().and_then(decode_embedding),
        extractor,
        id,
        modality: parse_modality(&modality),
        class_name,
        blob_id,
        inline_b64,
        filename,
        content_type,
        created_at: parse_timestamp(&created_at, "samples.created_at"),
    }
}

fn decode_inline(id: &str, b64: &str) -> Option<Vec<u8>> {
    BASE64
        .decode(b64)
        .map_err(|e| warn!(sample_id = %id, error = %e, "stored base64 payload is corrupt"))
        .ok()
}

impl SampleStore for SqliteStore {
    async fn create_sample(&self, sample: SampleRecord, blob: Option<BlobRecord>) -> Result<(), sqlx::Error> {
        if let Some(blob) = &blob {
            sqlx::query(
                "INSERT INTO blobs (id, data, filename, content_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&blob.id)
            .bind(&blob.data)
            .bind(&blob.filename)
            .bind(&blob.content_type)
            .bind(timestamp(&blob.created_at))
            .execute(&self.pool)
            .await?;
        }
        sqlx::query(&format!(
            "INSERT INTO samples ({SAMPLE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ))
        .bind(&sample.id)
        .bind(sample.modality.as_str())
        .bind(&sample.class_name)
        .bind(&sample.blob_id)
        .bind(&sample.inline_b64)
        .bind(&sample.filename)
        .bind(&sample.content_type)
        .bind(sample.embedding.as_deref().map(encode_embedding))
        .bind(&sample.extractor)
        .bind(timestamp(&sample.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_sample(&self, modality: Modality, id: &str) -> Result<Option<SampleRecord>, sqlx::Error> {
        let Some(sample) = self.get_sample(modality, id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM samples WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if let Some(blob_id) = &sample.blob_id {
            sqlx::query("DELETE FROM blobs WHERE id = ?1")
                .bind(blob_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(Some(sample))
    }

    async fn get_sample(&self, modality: Modality, id: &str) -> Result<Option<SampleRecord>, sqlx::Error> {
        let row: Option<SampleRow> =
            sqlx::query_as(&format!("SELECT {SAMPLE_COLUMNS} FROM samples WHERE modality = ?1 AND id = ?2"))
                .bind(modality.as_str())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(to_record))
    }

    async fn read_all(&self, modality: Modality) -> Result<Vec<StoredSample>, sqlx::Error> {
        type Row = (String, String, Option<Vec<u8>>, Option<String>, Option<String>, Option<Vec<u8>>);
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT s.id, s.class_name, s.embedding, s.extractor, s.inline_b64, b.data \
             FROM samples s LEFT JOIN blobs b ON b.id = s.blob_id \
             WHERE s.modality = ?1 ORDER BY s.created_at ASC, s.rowid ASC",
        )
        .bind(modality.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, class_name, embedding, extractor, inline_b64, blob)| {
                let payload = blob.or_else(|| inline_b64.as_deref().and_then(|b| decode_inline(&id, b)));
                StoredSample {
                    embedding: embedding.as_deref().and_then(decode_embedding),
                    extractor,
                    id,
                    class_name,
                    payload,
                }
            })
            .collect())
    }

    async fn read_payload(&self, modality: Modality, id: &str) -> Result<Option<(Vec<u8>, String)>, sqlx::Error> {
        let row: Option<(Option<String>, Option<String>, Option<Vec<u8>>, Option<String>)> = sqlx::query_as(
            "SELECT s.inline_b64, s.content_type, b.data, b.content_type \
             FROM samples s LEFT JOIN blobs b ON b.id = s.blob_id \
             WHERE s.modality = ?1 AND s.id = ?2",
        )
        .bind(modality.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some((inline_b64, sample_type, blob, blob_type)) = row else {
            return Ok(None);
        };
        let content_type = blob_type
            .or(sample_type)
            .unwrap_or_else(|| "application/octet-stream".to_owned());
        let bytes = match (blob, inline_b64) {
            (Some(data), _) => Some(data),
            (None, Some(b64)) => decode_inline(id, &b64),
            (None, None) => None,
        };
        Ok(bytes.map(|b| (b, content_type)))
    }

    async fn list_samples(&self, modality: Modality, class_name: Option<&str>) -> Result<Vec<SampleRecord>, sqlx::Error> {
        let rows: Vec<SampleRow> = if let Some(class_name) = class_name {
            sqlx::query_as(&format!(
                "SELECT {SAMPLE_COLUMNS} FROM samples WHERE modality = ?1 AND class_name = ?2 \
                 ORDER BY created_at DESC, rowid DESC"
            ))
            .bind(modality.as_str())
            .bind(class_name)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(&format!(
                "SELECT {SAMPLE_COLUMNS} FROM samples WHERE modality = ?1 ORDER BY created_at DESC, rowid DESC"
            ))
            .bind(modality.as_str())
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows.into_iter().map(to_record).collect())
    }

    async fn count_samples(&self, modality: Modality) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM samples WHERE modality = ?1")
            .bind(modality.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::memory_store;
    use chrono::Utc;

    fn audio_sample(class_name: &str, bytes: &[u8]) -> (SampleRecord, BlobRecord) {
        let blob = BlobRecord {
            id: uuid::Uuid::new_v4().to_string(),
            data: bytes.to_vec(),
            filename: Some("clip.wav".into()),
            content_type: "audio/wav".into(),
            created_at: Utc::now(),
        };
        let sample = SampleRecord {
            id: uuid::Uuid::new_v4().to_string(),
            modality: Modality::Audio,
            class_name: class_name.into(),
            blob_id: Some(blob.id.clone()),
            inline_b64: None,
            filename: blob.filename.clone(),
            content_type: Some(blob.content_type.clone()),
            embedding: Some(vec![1.0, 2.0]),
            extractor: Some("spectral-v1".into()),
            created_at: Utc::now(),
        };
        (sample, blob)
    }

    #[tokio::test]
    async fn create_read_and_delete_audio_sample() {
        let store = memory_store().await;
        let (sample, blob) = audio_sample("dog", b"RIFF....");
        let id = sample.id.clone();
        store.create_sample(sample, Some(blob)).await.unwrap();

        let all = store.read_all(Modality::Audio).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].embedding.as_deref(), Some(&[1.0, 2.0][..]));
        assert_eq!(all[0].extractor.as_deref(), Some("spectral-v1"));
        assert_eq!(all[0].payload.as_deref(), Some(&b"RIFF...."[..]));

        let (bytes, content_type) = store.read_payload(Modality::Audio, &id).await.unwrap().unwrap();
        assert_eq!(bytes, b"RIFF....");
        assert_eq!(content_type, "audio/wav");

        assert!(store.delete_sample(Modality::Audio, &id).await.unwrap().is_some());
        assert!(store.delete_sample(Modality::Audio, &id).await.unwrap().is_none());
        assert_eq!(store.count_samples(Modality::Audio).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn inline_payload_is_decoded_for_training() {
        let store = memory_store().await;
        let sample = SampleRecord {
            id: "img-1".into(),
            modality: Modality::Image,
            class_name: "cat".into(),
            blob_id: None,
            inline_b64: Some(BASE64.encode(b"png-bytes")),
            filename: None,
            content_type: Some("image/png".into()),
            embedding: None,
            extractor: None,
            created_at: Utc::now(),
        };
        store.create_sample(sample, None).await.unwrap();
        let all = store.read_all(Modality::Image).await.unwrap();
        assert_eq!(all[0].payload.as_deref(), Some(&b"png-bytes"[..]));
        assert!(store.read_all(Modality::Audio).await.unwrap().is_empty());
        // modality scopes lookups
        assert!(store.get_sample(Modality::Audio, "img-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_embedding_keeps_its_audio_for_re_embedding() {
        let store = memory_store().await;
        let (mut sample, blob) = audio_sample("dog", b"RIFF-old");
        sample.embedding = Some(vec![0.5, 0.5]);
        sample.extractor = Some("old-extractor".into());
        store.create_sample(sample, Some(blob)).await.unwrap();

        let all = store.read_all(Modality::Audio).await.unwrap();
        assert_eq!(all[0].payload.as_deref(), Some(&b"RIFF-old"[..]));
        assert!(all[0].embedding_for("spectral-v1", 2).is_none());
        assert!(all[0].embedding_for("old-extractor", 2).is_some());
    }

    #[tokio::test]
    async fn list_filters_by_class() {
        let store = memory_store().await;
        for class_name in ["a", "b", "a"] {
            let (sample, blob) = audio_sample(class_name, b"x");
            store.create_sample(sample, Some(blob)).await.unwrap();
        }
        assert_eq!(store.list_samples(Modality::Audio, Some("a")).await.unwrap().len(), 2);
        assert_eq!(store.list_samples(Modality::Audio, None).await.unwrap().len(), 3);
    }
}
