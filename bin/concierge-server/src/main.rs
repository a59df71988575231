//! concierge-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Build the conversation relay (model client, lead tool, mailer).
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use concierge_core::llm::openai::{OpenAiCompatConfig, OpenAiCompatModel};
use concierge_core::mail::ResendMailer;
use concierge_core::tools::lead::LeadNotificationTool;
use concierge_core::{Relay, ToolRegistry};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::sqlite::SqliteStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: CONCIERGE_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), config = ?cfg, "concierge-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Conversation relay ──────────────────────────────────────────────────
    let relay = build_relay(&cfg)?;
    if relay.is_none() {
        warn!("no model API key configured; /api/chat will answer 500");
    }
    if cfg.cms_api_key.is_none() {
        warn!("no CMS API key configured; publishing and admin routes will answer 500");
    }

    let state = Arc::new(AppState { config: Arc::new(cfg.clone()), store: Arc::new(store), relay });

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("concierge-server stopped");
    Ok(())
}

/// Wire the model client, mailer and lead tool together. Returns `None`
/// when no model API key is configured.
fn build_relay(cfg: &Config) -> anyhow::Result<Option<Relay>> {
    if cfg.model_api_key.is_none() {
        return Ok(None);
    }

    let model = OpenAiCompatModel::new(OpenAiCompatConfig {
        api_key: cfg.model_api_key.clone(),
        base_url: cfg.model_base_url.clone(),
        model: cfg.model.clone(),
    })?;

    let mailer = ResendMailer::new(cfg.mail_api_key.clone(), cfg.mail_from.clone());
    if !mailer.has_credentials() {
        warn!("no mail API key configured; lead notifications will report failure");
    }
    let tools = ToolRegistry::new()
        .register(Arc::new(LeadNotificationTool::new(Arc::new(mailer), cfg.lead_inbox.clone())));

    info!(model = %cfg.model, base_url = %cfg.model_base_url, max_steps = cfg.max_steps, "relay ready");
    Ok(Some(Relay::new(Arc::new(model), tools).with_max_steps(cfg.max_steps)))
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
