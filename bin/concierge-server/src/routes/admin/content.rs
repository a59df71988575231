//! Content management endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use concierge_core::content::{ContentPatch, prepare_patch};
use concierge_core::{ContentKind, ContentStatus};
use serde_json::Value;
use tracing::info;
use utoipa::OpenApi;

use crate::db::ContentStore;
use crate::error::{ServerError, method_not_allowed};
use crate::schemas::content::{DedupeResponse, DeleteResponse, ListQuery, StatusBody};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_content, get_content, update_content, set_content_status, delete_content, dedupe_content),
    components(schemas(StatusBody, DedupeResponse, DeleteResponse))
)]
pub struct AdminContentApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/content/{kind}", get(list_content).fallback(method_not_allowed))
        .route(
            "/content/{kind}/{id}",
            get(get_content)
                .patch(update_content)
                .delete(delete_content)
                .fallback(method_not_allowed),
        )
        .route("/content/{kind}/{id}/status", put(set_content_status).fallback(method_not_allowed))
        .route("/content/{kind}/dedupe", post(dedupe_content).fallback(method_not_allowed))
}

fn not_found(kind: ContentKind, id: &str) -> ServerError {
    ServerError::NotFound(format!("{kind} record '{id}' not found"))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

#[utoipa::path(
    get,
    path = "/admin/content/{kind}",
    tag = "admin",
    params(("kind" = String, Path, description = "ideas, cases or tools"), ListQuery),
    responses(
        (status = 200, description = "Records, newest first", body = Vec<Object>),
        (status = 400, description = "Unknown type or status"),
        (status = 401, description = "Missing or wrong API key"),
    )
)]
pub async fn list_content(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ServerError> {
    let kind = ContentKind::parse(&kind)?;
    let status = query.status.as_deref().map(ContentStatus::parse).transpose()?;
    let records = state.store.list_documents(kind, status).await?;
    Ok(Json(records.iter().map(|r| r.to_document()).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/content/{kind}/{id}",
    tag = "admin",
    responses(
        (status = 200, description = "The record", body = Object),
        (status = 401, description = "Missing or wrong API key"),
        (status = 404, description = "No such record"),
    )
)]
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Value>, ServerError> {
    let kind = ContentKind::parse(&kind)?;
    let record = state.store.get_document(kind, &id).await?.ok_or_else(|| not_found(kind, &id))?;
    Ok(Json(record.to_document()))
}

/// Merge fields into a record. Server-managed fields in the body are ignored.
#[utoipa::path(
    patch,
    path = "/admin/content/{kind}/{id}",
    tag = "admin",
    request_body = Object,
    responses(
        (status = 200, description = "The updated record", body = Object),
        (status = 400, description = "Invalid fields or status"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 404, description = "No such record"),
    )
)]
pub async fn update_content(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let kind = ContentKind::parse(&kind)?;
    let patch = prepare_patch(Some(json_body(payload)?))?;
    let record = state
        .store
        .update_document(kind, &id, patch)
        .await?
        .ok_or_else(|| not_found(kind, &id))?;
    info!(%kind, %id, "content updated");
    Ok(Json(record.to_document()))
}

#[utoipa::path(
    put,
    path = "/admin/content/{kind}/{id}/status",
    tag = "admin",
    request_body = StatusBody,
    responses(
        (status = 200, description = "The updated record", body = Object),
        (status = 400, description = "Invalid status"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 404, description = "No such record"),
    )
)]
pub async fn set_content_status(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let kind = ContentKind::parse(&kind)?;
    let status = ContentStatus::parse(&json_body(payload)?.status)?;
    let patch = ContentPatch { status: Some(status), ..ContentPatch::default() };
    let record = state
        .store
        .update_document(kind, &id, patch)
        .await?
        .ok_or_else(|| not_found(kind, &id))?;
    info!(%kind, %id, %status, "content status changed");
    Ok(Json(record.to_document()))
}

#[utoipa::path(
    delete,
    path = "/admin/content/{kind}/{id}",
    tag = "admin",
    responses(
        (status = 200, description = "Record deleted", body = DeleteResponse),
        (status = 401, description = "Missing or wrong API key"),
        (status = 404, description = "No such record"),
    )
)]
pub async fn delete_content(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ServerError> {
    let kind = ContentKind::parse(&kind)?;
    if !state.store.delete_document(kind, &id).await? {
        return Err(not_found(kind, &id));
    }
    info!(%kind, %id, "content deleted");
    Ok(Json(DeleteResponse { deleted: true }))
}

/// Keep the oldest record per normalized title and delete the rest.
#[utoipa::path(
    post,
    path = "/admin/content/{kind}/dedupe",
    tag = "admin",
    responses(
        (status = 200, description = "Number of removed duplicates", body = DedupeResponse),
        (status = 401, description = "Missing or wrong API key"),
    )
)]
pub async fn dedupe_content(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<DedupeResponse>, ServerError> {
    let kind = ContentKind::parse(&kind)?;
    let removed = state.store.remove_duplicates(kind).await?;
    info!(%kind, removed, "duplicate content removed");
    Ok(Json(DedupeResponse { removed }))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use concierge_core::ContentKind;
    use concierge_core::content::prepare_draft;
    use serde_json::json;

    use crate::db::ContentStore;
    use crate::routes::testing::{TEST_KEY, json, send, state_with};
    use crate::state::AppState;

    async fn seed(state: &Arc<AppState>, kind: ContentKind, data: serde_json::Value) -> String {
        state.store.insert_document(kind, prepare_draft(Some(data)).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn admin_routes_require_the_key() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let (status, _) = send(&state, "GET", "/admin/content/ideas", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let state = state_with(None, Some(TEST_KEY)).await;
        seed(&state, ContentKind::Cases, json!({ "title": "A" })).await;
        seed(&state, ContentKind::Cases, json!({ "title": "B", "status": "featured" })).await;

        let (status, bytes) = send(&state, "GET", "/admin/content/cases", Some(TEST_KEY), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&bytes).as_array().unwrap().len(), 2);

        let (_, bytes) =
            send(&state, "GET", "/admin/content/cases?status=featured", Some(TEST_KEY), None).await;
        let docs = json(&bytes);
        assert_eq!(docs.as_array().unwrap().len(), 1);
        assert_eq!(docs[0]["title"], "B");
        assert_eq!(docs[0]["type"], "cases");

        let (status, _) =
            send(&state, "GET", "/admin/content/cases?status=archived", Some(TEST_KEY), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_collection_is_400() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let (status, _) = send(&state, "GET", "/admin/content/users", Some(TEST_KEY), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_patch_and_delete() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let id = seed(&state, ContentKind::Ideas, json!({ "title": "Old", "summary": "s" })).await;
        let uri = format!("/admin/content/ideas/{id}");

        let (status, bytes) = send(&state, "GET", &uri, Some(TEST_KEY), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&bytes)["id"], id.as_str());

        let patch = json!({ "title": "New", "id": "hijack", "status": "published" });
        let (status, bytes) = send(&state, "PATCH", &uri, Some(TEST_KEY), Some(patch)).await;
        assert_eq!(status, StatusCode::OK);
        let doc = json(&bytes);
        assert_eq!(doc["id"], id.as_str());
        assert_eq!(doc["title"], "New");
        assert_eq!(doc["summary"], "s");
        assert_eq!(doc["status"], "published");

        let (status, _) = send(&state, "DELETE", &uri, Some(TEST_KEY), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, bytes) = send(&state, "GET", &uri, Some(TEST_KEY), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&bytes)["error"], "not_found");
    }

    #[tokio::test]
    async fn status_change_validates() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let id = seed(&state, ContentKind::Tools, json!({ "title": "T" })).await;
        let uri = format!("/admin/content/tools/{id}/status");

        let (status, bytes) =
            send(&state, "PUT", &uri, Some(TEST_KEY), Some(json!({ "status": "featured" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&bytes)["status"], "featured");

        let (status, _) =
            send(&state, "PUT", &uri, Some(TEST_KEY), Some(json!({ "status": "archived" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            "PUT",
            "/admin/content/tools/missing/status",
            Some(TEST_KEY),
            Some(json!({ "status": "draft" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dedupe_keeps_one_per_title() {
        let state = state_with(None, Some(TEST_KEY)).await;
        let first = seed(&state, ContentKind::Ideas, json!({ "title": "Same" })).await;
        seed(&state, ContentKind::Ideas, json!({ "title": " same " })).await;
        seed(&state, ContentKind::Ideas, json!({ "title": "Other" })).await;

        let (status, bytes) =
            send(&state, "POST", "/admin/content/ideas/dedupe", Some(TEST_KEY), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&bytes)["removed"], 1);

        let remaining = state.store.list_documents(ContentKind::Ideas, None).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().any(|r| r.id == first));
    }
}
