//! Content records (ideas, case studies, tools) and their validation rules.
//!
//! Records are schema-less JSON objects. Only a handful of fields are
//! interpreted here: the collection, the status, `tags`, and `title` for
//! duplicate detection. `id`, `type`, `status` and the timestamps are
//! server-managed and never taken verbatim from a client payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Fields owned by the server, stripped from client data.
pub const MANAGED_FIELDS: [&str; 5] = ["id", "type", "status", "createdAt", "updatedAt"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("invalid content type '{0}'; expected one of ideas, cases, tools")]
    InvalidType(String),

    #[error("`data` must be a JSON object")]
    InvalidPayload,

    #[error("invalid status '{0}'; expected one of draft, published, featured")]
    InvalidStatus(String),

    #[error("`tags` must be a list of strings")]
    InvalidTags,
}

/// The three publishable collections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentKind {
    Ideas,
    Cases,
    Tools,
}

impl ContentKind {
    pub fn parse(raw: &str) -> Result<Self, ContentError> {
        raw.parse().map_err(|_| ContentError::InvalidType(raw.to_owned()))
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    Featured,
}

impl ContentStatus {
    pub fn parse(raw: &str) -> Result<Self, ContentError> {
        raw.parse().map_err(|_| ContentError::InvalidStatus(raw.to_owned()))
    }
}

/// A validated payload ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDraft {
    pub data: Map<String, Value>,
    pub status: ContentStatus,
}

/// A validated partial update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentPatch {
    pub data: Map<String, Value>,
    pub status: Option<ContentStatus>,
}

/// Validate a publish payload.
///
/// `data.status` is honoured when valid, defaults to draft when absent and
/// is rejected otherwise.
pub fn prepare_draft(data: Option<Value>) -> Result<ContentDraft, ContentError> {
    let patch = prepare_patch(data)?;
    Ok(ContentDraft { data: patch.data, status: patch.status.unwrap_or_default() })
}

/// Validate an edit payload. Same rules as [`prepare_draft`] but the status
/// stays untouched when absent.
pub fn prepare_patch(data: Option<Value>) -> Result<ContentPatch, ContentError> {
    let Some(Value::Object(mut data)) = data else {
        return Err(ContentError::InvalidPayload);
    };

    let status = match data.remove("status") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(ContentStatus::parse(&s)?),
        Some(other) => return Err(ContentError::InvalidStatus(other.to_string())),
    };

    for field in MANAGED_FIELDS {
        data.remove(field);
    }

    if let Some(tags) = data.get_mut("tags") {
        *tags = normalize_tags(tags)?;
    }

    Ok(ContentPatch { data, status })
}

/// Tags form a set: strings only, trimmed, blank and repeated entries
/// dropped, first-seen order kept.
fn normalize_tags(tags: &Value) -> Result<Value, ContentError> {
    let Value::Array(items) = tags else {
        return Err(ContentError::InvalidTags);
    };

    let mut seen: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let tag = item.as_str().ok_or(ContentError::InvalidTags)?.trim();
        if !tag.is_empty() && !seen.iter().any(|t| t == tag) {
            seen.push(tag.to_owned());
        }
    }
    Ok(Value::Array(seen.into_iter().map(Value::String).collect()))
}

/// Key used to spot duplicate records: the trimmed, lower-cased title.
pub fn duplicate_key(data: &Map<String, Value>) -> Option<String> {
    data.get("title")
        .and_then(Value::as_str)
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
}
