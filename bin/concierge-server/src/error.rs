//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body of the form
//! `{"error": <kind>, "message": <text>}` with a matching status code.
//!
//! Server-side failures (database, upstream model, missing configuration) are
//! logged with full detail; the caller only sees a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use concierge_core::{ContentError, LlmError, RelayError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the document store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Propagated from the conversation relay.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    /// A content payload failed validation.
    #[error("invalid content: {0}")]
    Content(#[from] ContentError),

    /// A required secret or service is not configured.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m.clone()),
            ServerError::Content(e) => (StatusCode::BAD_REQUEST, "bad_request", e.to_string()),
            ServerError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid API key".to_owned(),
            ),
            ServerError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed",
                "method not allowed".to_owned(),
            ),
            ServerError::Relay(RelayError::EmptyConversation) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "conversation must contain a user message".to_owned(),
            ),

            ServerError::NotConfigured(what) => {
                error!(missing = *what, "request needs unconfigured service");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "service is not configured".to_owned(),
                )
            }
            ServerError::Relay(RelayError::Model(LlmError::MissingApiKey)) => {
                error!("model provider API key missing");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "service is not configured".to_owned(),
                )
            }
            ServerError::Relay(RelayError::Model(e)) => {
                error!(error = %e, "model provider error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "upstream_error",
                    "the assistant is unavailable right now".to_owned(),
                )
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

/// Fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed() -> ServerError {
    ServerError::MethodNotAllowed
}
