//! Concierge chat relay route.
//!
//! `POST /api/chat` takes `{messages, userContext?}`, composes the system
//! instruction from the stored (or default) template and streams the model's
//! reply. The body is plain text by default; clients sending
//! `Accept: text/event-stream` get SSE events of the form `{"delta": "..."}`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use concierge_core::message::content_len;
use concierge_core::prompt::{self, SYSTEM_PROMPT_KEY};
use concierge_core::RelayError;
use futures::StreamExt;
use serde_json::json;
use tracing::debug;
use utoipa::OpenApi;
use validator::Validate;

use crate::db::SettingsStore;
use crate::error::{ServerError, method_not_allowed};
use crate::schemas::chat::ChatRequest;
use crate::state::AppState;

/// Maximum accepted conversation size in bytes.
const MAX_CONVERSATION_BYTES: usize = 128 * 1024;

#[derive(OpenApi)]
#[openapi(paths(chat), components(schemas(ChatRequest)))]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat).fallback(method_not_allowed))
}

/// Relay a conversation to the concierge model and stream the reply.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Streamed reply (text/plain or text/event-stream)", body = String),
        (status = 400, description = "Invalid conversation"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Model not configured or unavailable"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    req.validate().map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let size = content_len(&req.messages);
    if size > MAX_CONVERSATION_BYTES {
        return Err(ServerError::BadRequest(format!(
            "conversation too large ({size} bytes); maximum is {MAX_CONVERSATION_BYTES} bytes"
        )));
    }

    let relay = state
        .relay
        .as_ref()
        .ok_or(ServerError::NotConfigured("CONCIERGE_MODEL_API_KEY"))?;

    let template = state.store.get_setting(SYSTEM_PROMPT_KEY).await?;
    let system = prompt::compose(template.as_deref(), req.user_context.as_ref());

    debug!(messages = req.messages.len(), bytes = size, custom_prompt = template.is_some(), "chat request");
    let replies = relay.start(system, req.messages).await?;

    if wants_event_stream(&headers) {
        let events = replies.map(to_sse_event);
        return Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response());
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(replies),
    )
        .into_response())
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"))
}

fn to_sse_event(chunk: Result<String, RelayError>) -> Result<Event, Infallible> {
    let event = match chunk {
        Ok(delta) => Event::default().data(json!({ "delta": delta }).to_string()),
        // Already logged by the relay; the client only learns that it ended badly.
        Err(_) => Event::default()
            .event("error")
            .data(json!({ "error": "upstream_error" }).to_string()),
    };
    Ok(event)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
