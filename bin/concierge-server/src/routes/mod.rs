//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - middleware layers (CORS, per-request trace id)
//! - optional OpenAPI document (disable with `CONCIERGE_ENABLE_DOCS=false`)
//! - health check
//! - public `/api` routes (chat relay, content publishing)
//! - `/admin` routes protected by the CMS API key

mod admin;
mod chat;
mod content;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use tower::ServiceBuilder;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(chat::router())
        .merge(content::router(state.clone()));

    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api_router)
        .nest("/admin", admin::router(state.clone()));

    if state.config.enable_docs {
        app = app.merge(doc::router());
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
