//! System prompt management.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::get;
use axum::{Json, Router};
use concierge_core::prompt::{DEFAULT_SYSTEM_PROMPT, SYSTEM_PROMPT_KEY};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::db::SettingsStore;
use crate::error::{ServerError, method_not_allowed};
use crate::schemas::settings::{SetSystemPromptBody, SystemPromptView};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_system_prompt, set_system_prompt, reset_system_prompt),
    components(schemas(SystemPromptView, SetSystemPromptBody))
)]
pub struct SettingsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/settings/system-prompt",
        get(get_system_prompt)
            .put(set_system_prompt)
            .delete(reset_system_prompt)
            .fallback(method_not_allowed),
    )
}

async fn current(state: &AppState) -> Result<SystemPromptView, ServerError> {
    let view = match state.store.get_setting(SYSTEM_PROMPT_KEY).await? {
        Some(template) => SystemPromptView { template, is_default: false },
        None => SystemPromptView { template: DEFAULT_SYSTEM_PROMPT.to_owned(), is_default: true },
    };
    Ok(view)
}

#[utoipa::path(
    get,
    path = "/admin/settings/system-prompt",
    tag = "admin",
    responses(
        (status = 200, description = "Template in effect", body = SystemPromptView),
        (status = 401, description = "Missing or wrong API key"),
    )
)]
pub async fn get_system_prompt(State(state): State<Arc<AppState>>) -> Result<Json<SystemPromptView>, ServerError> {
    Ok(Json(current(&state).await?))
}

#[utoipa::path(
    put,
    path = "/admin/settings/system-prompt",
    tag = "admin",
    request_body = SetSystemPromptBody,
    responses(
        (status = 200, description = "Template stored", body = SystemPromptView),
        (status = 400, description = "Empty or oversized template"),
        (status = 401, description = "Missing or wrong API key"),
    )
)]
pub async fn set_system_prompt(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetSystemPromptBody>, JsonRejection>,
) -> Result<Json<SystemPromptView>, ServerError> {
    let Json(body) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    body.validate().map_err(|e| ServerError::BadRequest(e.to_string()))?;
    if body.template.trim().is_empty() {
        return Err(ServerError::BadRequest("template must not be blank".into()));
    }

    state.store.set_setting(SYSTEM_PROMPT_KEY, &body.template).await?;
    info!(chars = body.template.chars().count(), "system prompt replaced");
    Ok(Json(current(&state).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/settings/system-prompt",
    tag = "admin",
    responses(
        (status = 200, description = "Default restored", body = SystemPromptView),
        (status = 401, description = "Missing or wrong API key"),
    )
)]
pub async fn reset_system_prompt(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemPromptView>, ServerError> {
    if state.store.delete_setting(SYSTEM_PROMPT_KEY).await? {
        info!("system prompt reset to default");
    }
    Ok(Json(current(&state).await?))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::testing::{TEST_KEY, json, send, state_with};

    const URI: &str = "/admin/settings/system-prompt";

    #[tokio::test]
    async fn default_until_replaced_then_reset() {
        let state = state_with(None, Some(TEST_KEY)).await;

        let (status, bytes) = send(&state, "GET", URI, Some(TEST_KEY), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&bytes)["is_default"], true);

        let (status, bytes) =
            send(&state, "PUT", URI, Some(TEST_KEY), Some(json!({ "template": "Be brief." }))).await;
        assert_eq!(status, StatusCode::OK);
        let view = json(&bytes);
        assert_eq!(view["template"], "Be brief.");
        assert_eq!(view["is_default"], false);

        let (_, bytes) = send(&state, "DELETE", URI, Some(TEST_KEY), None).await;
        assert_eq!(json(&bytes)["is_default"], true);
    }

    #[tokio::test]
    async fn blank_template_is_rejected() {
        let state = state_with(None, Some(TEST_KEY)).await;
        for template in ["", "   "] {
            let (status, _) =
                send(&state, "PUT", URI, Some(TEST_KEY), Some(json!({ "template": template }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn requires_the_key() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let (status, _) = send(&state, "GET", URI, Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
