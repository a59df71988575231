//! Conversation messages as accepted at the HTTP boundary.
//!
//! Chat widgets send message content in several shapes: a plain `content`
//! string, a `parts` array of `{type, text}` objects, or a bare `text` field.
//! [`Message`] deserializes from all of them through [`RawMessage`] so the
//! rest of the crate only ever sees one normalized shape.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Author of a conversation message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single normalized conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Wire shape before normalization.
#[derive(Debug, Deserialize)]
struct RawMessage {
    role: String,
    #[serde(default)]
    content: Option<RawContent>,
    #[serde(default)]
    parts: Option<Vec<RawPart>>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Parts(Vec<RawPart>),
}

#[derive(Debug, Deserialize)]
struct RawPart {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

fn join_parts(parts: Vec<RawPart>) -> String {
    parts
        .into_iter()
        .filter(|p| p.kind.as_deref().is_none_or(|k| k == "text"))
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("")
}

impl TryFrom<RawMessage> for Message {
    type Error = String;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let role: Role = raw
            .role
            .parse()
            .map_err(|_| format!("unsupported message role '{}'", raw.role))?;

        let content = match (raw.content, raw.parts, raw.text) {
            (Some(RawContent::Text(s)), _, _) => s,
            (Some(RawContent::Parts(parts)), _, _) => join_parts(parts),
            (None, Some(parts), _) => join_parts(parts),
            (None, None, Some(text)) => text,
            (None, None, None) => String::new(),
        };

        Ok(Self { role, content })
    }
}

/// Drop empty messages and any assistant-authored prefix so the history
/// handed upstream always opens with a user turn.
///
/// Returns an empty vector when the conversation holds no user message.
pub fn prepare_history(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|m| !m.content.trim().is_empty())
        .skip_while(|m| m.role != Role::User)
        .collect()
}

/// Total content size in bytes, used for request-size limits.
pub fn content_len(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.len()).sum()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
