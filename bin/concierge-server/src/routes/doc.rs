use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{admin, chat, content, health};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(info(
    title = "concierge-server",
    description = "Concierge chat relay and content publishing API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(content::ContentApi::openapi());
    root.merge(admin::api_docs());
    root
}

pub fn router() -> Router<Arc<AppState>> {
    let doc = get_docs();
    Router::new().route("/api-docs/openapi.json", get(move || async move { Json(doc) }))
}
