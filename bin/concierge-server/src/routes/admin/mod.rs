pub mod content;
pub mod settings;

use std::sync::Arc;

use axum::{Router, middleware};
use utoipa::OpenApi;

use crate::middleware::auth;
use crate::state::AppState;

// Routes nested under `/admin` (content, settings).
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(content::router())
        .merge(settings::router())
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_key))
}

#[derive(OpenApi)]
#[openapi()]
pub struct AdminApi;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = AdminApi::openapi();
    spec.merge(content::AdminContentApi::openapi());
    spec.merge(settings::SettingsApi::openapi());
    spec
}
