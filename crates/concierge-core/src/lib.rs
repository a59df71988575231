//! concierge-core: the pieces of the concierge that do not depend on HTTP.
//!
//! - [`message`]: normalized conversation messages
//! - [`prompt`]: system-instruction composition
//! - [`llm`]: the hosted chat-model seam and its OpenAI-compatible client
//! - [`relay`]: streaming conversation relay with tool calls
//! - [`tools`]: model-callable tools, including the lead notification
//! - [`mail`]: transactional email
//! - [`content`]: content collections, statuses and payload validation

pub mod content;
pub mod llm;
pub mod mail;
pub mod message;
pub mod prompt;
pub mod relay;
pub mod tools;

pub use content::{ContentError, ContentKind, ContentStatus};
pub use llm::{ChatModel, LlmError};
pub use mail::{MailError, Mailer};
pub use message::{Message, Role};
pub use relay::{Relay, RelayError, ReplyStream};
pub use tools::{Tool, ToolRegistry};
