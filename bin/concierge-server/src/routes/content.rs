//! Content publish route (`POST /api/content`), guarded by the CMS API key.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router, middleware};
use concierge_core::ContentKind;
use concierge_core::content::prepare_draft;
use tracing::info;
use utoipa::OpenApi;

use crate::db::ContentStore;
use crate::error::{ServerError, method_not_allowed};
use crate::middleware::auth;
use crate::schemas::content::{PublishRequest, PublishResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(publish_content), components(schemas(PublishRequest, PublishResponse)))]
pub struct ContentApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // The key check wraps POST only, so other methods get 405 with or without a key.
    Router::new().route(
        "/content",
        post(publish_content)
            .route_layer(middleware::from_fn_with_state(state, auth::require_api_key))
            .fallback(method_not_allowed),
    )
}

/// Store a new idea, case study or tool.
///
/// Every call creates a new record, even for identical payloads.
#[utoipa::path(
    post,
    path = "/api/content",
    tag = "content",
    request_body = PublishRequest,
    params(("x-api-key" = String, Header, description = "CMS API key")),
    responses(
        (status = 201, description = "Record created", body = PublishResponse),
        (status = 400, description = "Unknown type or invalid data"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "API key not configured or storage failure"),
    )
)]
pub async fn publish_content(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishResponse>), ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let kind = ContentKind::parse(&req.kind)?;
    let draft = prepare_draft(req.data)?;
    let status = draft.status;

    let id = state.store.insert_document(kind, draft).await?;
    info!(%kind, %id, %status, "content published");

    Ok((StatusCode::CREATED, Json(PublishResponse { success: true, id })))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use concierge_core::{ContentKind, ContentStatus};
    use serde_json::json;
    use tracing_test::traced_test;

    use crate::db::ContentStore;
    use crate::routes::testing::{TEST_KEY, json, send, state_with};

    fn publish_body() -> serde_json::Value {
        json!({ "type": "ideas", "data": { "title": "Data strategy", "tags": ["ai", "ai"] } })
    }

    #[tokio::test]
    async fn valid_publish_creates_a_draft() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let (status, bytes) = send(&state, "POST", "/api/content", Some(TEST_KEY), Some(publish_body())).await;
        assert_eq!(status, StatusCode::CREATED);

        let body = json(&bytes);
        assert_eq!(body["success"], true);
        let id = body["id"].as_str().unwrap();

        let record = state.store.get_document(ContentKind::Ideas, id).await.unwrap().unwrap();
        assert_eq!(record.status, ContentStatus::Draft);
        assert_eq!(record.data["title"], "Data strategy");
        assert_eq!(record.data["tags"], json!(["ai"]));
        assert_eq!(record.created_at, record.updated_at);
    }

    #[tokio::test]
    async fn explicit_status_is_kept() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let body = json!({ "type": "tools", "data": { "title": "Audit", "status": "published" } });
        let (_, bytes) = send(&state, "POST", "/api/content", Some(TEST_KEY), Some(body)).await;
        let id = json(&bytes)["id"].as_str().unwrap().to_owned();

        let record = state.store.get_document(ContentKind::Tools, &id).await.unwrap().unwrap();
        assert_eq!(record.status, ContentStatus::Published);
    }

    #[tokio::test]
    async fn unknown_type_is_400_and_writes_nothing() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let body = json!({ "type": "users", "data": { "title": "x" } });
        let (status, bytes) = send(&state, "POST", "/api/content", Some(TEST_KEY), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&bytes)["error"], "bad_request");

        for kind in [ContentKind::Ideas, ContentKind::Cases, ContentKind::Tools] {
            assert!(state.store.list_documents(kind, None).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn invalid_status_or_data_is_400() {
        let state = state_with(None, Some(TEST_KEY)).await;
        for body in [
            json!({ "type": "cases", "data": { "status": "archived" } }),
            json!({ "type": "cases", "data": "text" }),
            json!({ "type": "cases" }),
        ] {
            let (status, _) = send(&state, "POST", "/api/content", Some(TEST_KEY), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn wrong_or_missing_key_is_401() {
        let state = state_with(None, Some(TEST_KEY)).await;
        for key in [None, Some("wrong")] {
            let (status, bytes) = send(&state, "POST", "/api/content", key, Some(publish_body())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(json(&bytes)["error"], "unauthorized");
        }
        assert!(state.store.list_documents(ContentKind::Ideas, None).await.unwrap().is_empty());
        assert!(logs_contain("rejected API key"));
    }

    #[tokio::test]
    async fn unconfigured_key_fails_closed() {
        let state = state_with(None, None).await;
        let (status, _) = send(&state, "POST", "/api/content", Some("anything"), Some(publish_body())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn repeated_publish_creates_distinct_records() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let (_, first) = send(&state, "POST", "/api/content", Some(TEST_KEY), Some(publish_body())).await;
        let (_, second) = send(&state, "POST", "/api/content", Some(TEST_KEY), Some(publish_body())).await;
        assert_ne!(json(&first)["id"], json(&second)["id"]);
        assert_eq!(state.store.list_documents(ContentKind::Ideas, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_post_is_405_regardless_of_key() {
        let state = state_with(None, Some(TEST_KEY)).await;
        for (method, key) in [("GET", Some(TEST_KEY)), ("GET", None), ("PUT", Some("wrong")), ("DELETE", None)] {
            let (status, bytes) = send(&state, method, "/api/content", key, None).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method} key={key:?}");
            assert_eq!(json(&bytes)["error"], "method_not_allowed");
        }

        let unconfigured = state_with(None, None).await;
        let (status, _) = send(&unconfigured, "GET", "/api/content", None, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
