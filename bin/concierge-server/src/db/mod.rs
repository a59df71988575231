//! Document store abstraction.
//!
//! [`ContentStore`] persists content records; [`SettingsStore`] holds
//! operator-editable key/value settings. The default implementation of both
//! is [`sqlite::SqliteStore`]. To swap to another database, implement the
//! traits for a new type and change the concrete type in
//! [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures, so no
//! `async-trait` boxing is needed here.

pub mod sqlite;

use std::future::Future;

use chrono::{DateTime, Utc};
use concierge_core::ContentKind;
use concierge_core::ContentStatus;
use concierge_core::content::{ContentDraft, ContentPatch};
use serde_json::{Map, Value};

/// One stored content record.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub id: String,
    pub kind: ContentKind,
    pub status: ContentStatus,
    /// Client-owned fields (title, tags, body, ...).
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Flatten into the JSON document shape served to clients: the client
    /// fields plus `id`, `type`, `status`, `createdAt` and `updatedAt`.
    pub fn to_document(&self) -> Value {
        let mut doc = self.data.clone();
        doc.insert("id".into(), Value::String(self.id.clone()));
        doc.insert("type".into(), Value::String(self.kind.to_string()));
        doc.insert("status".into(), Value::String(self.status.to_string()));
        doc.insert("createdAt".into(), Value::String(self.created_at.to_rfc3339()));
        doc.insert("updatedAt".into(), Value::String(self.updated_at.to_rfc3339()));
        Value::Object(doc)
    }
}

pub trait ContentStore: Send + Sync + 'static {
    /// Insert a new record with a generated id and server timestamps.
    /// Returns the id. Identical drafts produce distinct records.
    fn insert_document(
        &self,
        kind: ContentKind,
        draft: ContentDraft,
    ) -> impl Future<Output = Result<String, sqlx::Error>> + Send;

    fn get_document(
        &self,
        kind: ContentKind,
        id: &str,
    ) -> impl Future<Output = Result<Option<ContentRecord>, sqlx::Error>> + Send;

    /// Newest first, optionally restricted to one status.
    fn list_documents(
        &self,
        kind: ContentKind,
        status: Option<ContentStatus>,
    ) -> impl Future<Output = Result<Vec<ContentRecord>, sqlx::Error>> + Send;

    /// Merge `patch` into an existing record and bump `updated_at`.
    /// Returns `None` when the record does not exist.
    fn update_document(
        &self,
        kind: ContentKind,
        id: &str,
        patch: ContentPatch,
    ) -> impl Future<Output = Result<Option<ContentRecord>, sqlx::Error>> + Send;

    /// Returns `true` if a record was deleted.
    fn delete_document(
        &self,
        kind: ContentKind,
        id: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Keep the oldest record per duplicate key (normalized title) and
    /// delete the rest. Returns the number of deleted records.
    fn remove_duplicates(
        &self,
        kind: ContentKind,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

pub trait SettingsStore: Send + Sync + 'static {
    fn get_setting(&self, key: &str) -> impl Future<Output = Result<Option<String>, sqlx::Error>> + Send;

    fn set_setting(&self, key: &str, value: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Returns `true` if the key existed.
    fn delete_setting(&self, key: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}
