use concierge_core::Message;
use concierge_core::prompt::UserContext;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation so far. Each message is `{role, content}` where content
    /// may be a string, a `parts` array, or a `text` field.
    #[validate(length(min = 1, max = 200))]
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<Message>,

    /// Optional visitor context (page, name, company, ...).
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub user_context: Option<UserContext>,
}
