//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use concierge_core::Relay;

use crate::config::Config;
use crate::db::sqlite::SqliteStore;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Content documents and settings.
    pub store: Arc<SqliteStore>,
    /// Conversation relay; `None` when no model API key is configured.
    pub relay: Option<Relay>,
}
