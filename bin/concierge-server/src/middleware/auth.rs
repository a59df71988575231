use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::ServerError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Require `x-api-key` to match the configured CMS key.
///
/// An unconfigured key fails closed with 500 rather than letting requests
/// through.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config.cms_api_key.as_deref() else {
        return ServerError::NotConfigured("CONCIERGE_CMS_API_KEY").into_response();
    };

    let provided = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    match provided {
        Some(key) if keys_match(key, expected) => next.run(req).await,
        _ => {
            warn!(path = %req.uri().path(), present = provided.is_some(), "rejected API key");
            ServerError::Unauthorized.into_response()
        }
    }
}

/// Compare SHA-256 digests so the comparison time depends on neither the
/// key length nor the position of the first differing byte.
fn keys_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
