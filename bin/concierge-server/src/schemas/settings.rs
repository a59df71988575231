use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemPromptView {
    /// Template currently in effect.
    pub template: String,
    /// `true` when the built-in default is in effect.
    pub is_default: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SetSystemPromptBody {
    #[validate(length(min = 1, max = 32768))]
    pub template: String,
}
