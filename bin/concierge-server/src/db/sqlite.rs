//! SQLite implementation of [`ContentStore`] and [`SettingsStore`].
//!
//! Migrations under `./migrations` are embedded at compile time and run on
//! connect. Queries use the runtime-checked `sqlx::query` form so no
//! `DATABASE_URL` is needed to build.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use concierge_core::content::{ContentDraft, ContentPatch, duplicate_key};
use concierge_core::{ContentKind, ContentStatus};
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ContentRecord, ContentStore, SettingsStore};

type DocumentRow = (String, String, String, String, String);

/// SQLite-backed document store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and run pending migrations.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::migrate(pool).await
    }

    /// Private in-memory database, used by tests.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool
    /// is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn timestamp(t: DateTime<Utc>) -> String {
    // Fixed precision keeps lexicographic order equal to time order.
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        warn!(raw, error = %e, "failed to parse stored timestamp; using now");
        Utc::now()
    })
}

fn to_record(kind: ContentKind, row: DocumentRow) -> ContentRecord {
    let (id, status, data, created_at, updated_at) = row;
    let status = ContentStatus::parse(&status).unwrap_or_else(|_| {
        warn!(%id, raw = %status, "unknown stored status; treating as draft");
        ContentStatus::Draft
    });
    let data = match serde_json::from_str::<Value>(&data) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(%id, "stored document data is not a JSON object");
            Map::new()
        }
    };
    ContentRecord {
        id,
        kind,
        status,
        data,
        created_at: parse_time(&created_at),
        updated_at: parse_time(&updated_at),
    }
}

impl ContentStore for SqliteStore {
    async fn insert_document(&self, kind: ContentKind, draft: ContentDraft) -> Result<String, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let now = timestamp(Utc::now());
        let data = Value::Object(draft.data).to_string();

        sqlx::query(
            "INSERT INTO documents (id, collection, status, data, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(&id)
        .bind(kind.as_ref())
        .bind(draft.status.as_ref())
        .bind(&data)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(%id, collection = %kind, "document inserted");
        Ok(id)
    }

    async fn get_document(&self, kind: ContentKind, id: &str) -> Result<Option<ContentRecord>, sqlx::Error> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT id, status, data, created_at, updated_at \
             FROM documents WHERE collection = ?1 AND id = ?2",
        )
        .bind(kind.as_ref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| to_record(kind, r)))
    }

    async fn list_documents(
        &self,
        kind: ContentKind,
        status: Option<ContentStatus>,
    ) -> Result<Vec<ContentRecord>, sqlx::Error> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, status, data, created_at, updated_at \
             FROM documents \
             WHERE collection = ?1 AND (?2 IS NULL OR status = ?2) \
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(kind.as_ref())
        .bind(status.map(|s| s.as_ref().to_owned()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| to_record(kind, r)).collect())
    }

    async fn update_document(
        &self,
        kind: ContentKind,
        id: &str,
        patch: ContentPatch,
    ) -> Result<Option<ContentRecord>, sqlx::Error> {
        let mut changes = patch.data;
        // json_patch deletes keys whose patch value is null.
        changes.retain(|_, v| !v.is_null());

        // Merge and write in one statement.
        let row: Option<DocumentRow> = sqlx::query_as(
            "UPDATE documents \
             SET data = json_patch(data, ?1), status = COALESCE(?2, status), updated_at = ?3 \
             WHERE collection = ?4 AND id = ?5 \
             RETURNING id, status, data, created_at, updated_at",
        )
        .bind(Value::Object(changes).to_string())
        .bind(patch.status.map(|s| s.as_ref().to_owned()))
        .bind(timestamp(Utc::now()))
        .bind(kind.as_ref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let record = row.map(|r| to_record(kind, r));
        if let Some(record) = &record {
            debug!(%id, collection = %kind, status = %record.status, "document updated");
        }
        Ok(record)
    }

    async fn delete_document(&self, kind: ContentKind, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(kind.as_ref())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_duplicates(&self, kind: ContentKind) -> Result<u64, sqlx::Error> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, status, data, created_at, updated_at \
             FROM documents WHERE collection = ?1 \
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(kind.as_ref())
        .fetch_all(&self.pool)
        .await?;

        let mut seen = HashSet::new();
        let doomed: Vec<String> = rows
            .into_iter()
            .map(|r| to_record(kind, r))
            .filter(|record| duplicate_key(&record.data).is_some_and(|key| !seen.insert(key)))
            .map(|record| record.id)
            .collect();

        if doomed.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for id in &doomed {
            removed += sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(kind.as_ref())
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        info!(collection = %kind, removed, "duplicate documents removed");
        Ok(removed)
    }
}

impl SettingsStore for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
