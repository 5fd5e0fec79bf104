//! Persistence layer.
//!
//! Each concern has a store trait ([`ClassStore`], [`SampleStore`],
//! [`ModelStore`], [`TaskStore`]) implemented by [`SqliteStore`]. Trait
//! methods return `impl Future` so no `async-trait` is needed.

pub mod class;
pub mod dao;
pub mod model;
pub mod sample;
pub mod task;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use intellitrain_core::Modality;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use class::ClassStore;
pub use dao::{BlobRecord, ClassRecord, ModelArtifactRecord, SampleRecord, StoredSample, TaskRecord, TaskStatus};
pub use model::ModelStore;
pub use sample::SampleStore;
pub use task::TaskStore;

/// SQLite-backed store for classes, samples, model artifacts and tasks.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://intellitrain.db"` or
    /// `"sqlite::memory:"` for tests. In-memory databases are pinned to a
    /// single connection that is never recycled.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

// ── row helpers ──────────────────────────────────────────────────────────────

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str, column: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, column, error = %e, "failed to parse timestamp; using now");
        Utc::now()
    })
}

pub(crate) fn parse_modality(raw: &str) -> Modality {
    Modality::from_str(raw).unwrap_or_else(|_| {
        tracing::warn!(raw = %raw, "unknown modality in database; assuming audio");
        Modality::Audio
    })
}

#[cfg(test)]
pub(crate) async fn memory_store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
}
