//! Hosted chat-model abstraction.
//!
//! [`ChatModel`] is the seam between the relay and a concrete provider. The
//! only production implementation is [`openai::OpenAiCompatModel`], which
//! speaks the OpenAI-compatible `chat/completions` streaming protocol; tests
//! substitute scripted models.

pub mod error;
pub mod openai;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::LlmError;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments exactly as the model produced them.
    pub arguments: String,
}

/// Function-style tool description advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// One entry of the transcript sent upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatTurn {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        call_id: String,
        content: String,
    },
}

/// A single model call.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub turns: Vec<ChatTurn>,
    pub tools: Vec<ToolDefinition>,
}

/// Incremental output of a streaming model call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// A fragment of assistant text.
    Text(String),
    /// A piece of a tool call. Fragments with the same `index` concatenate.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    /// The model finished this call.
    Finished { reason: Option<String> },
}

pub type EventStream = BoxStream<'static, Result<ModelEvent, LlmError>>;

/// A hosted generative model that streams its answer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider / model label for logs.
    fn name(&self) -> &str;

    /// Open one streaming completion.
    ///
    /// Connection and HTTP-status failures are reported here rather than
    /// through the returned stream, so callers can fail before emitting any
    /// output.
    async fn stream(&self, request: CompletionRequest) -> Result<EventStream, LlmError>;
}
