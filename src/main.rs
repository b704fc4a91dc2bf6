//! Specialist relay - conversational front end for a categorizing AI backend
//!
//! Each chat session keeps its own history, forwards every user message to
//! the backend and renders the reply, announcing a specialist hand-off when
//! the backend switches topic.

mod api;
mod backend;
mod config;
mod notices;
mod runtime;
mod session;
mod state_machine;

use api::{create_router, AppState};
use backend::{BackendClient, HttpBackend, LoggingBackend};
use config::Config;
use runtime::{RelaySetup, SessionManager, DEFAULT_DISCONNECT_GRACE};
use std::time::Duration;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "specialist_relay=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let port: u16 = std::env::var("RELAY_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let disconnect_grace = std::env::var("SESSION_DISCONNECT_GRACE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map_or(DEFAULT_DISCONNECT_GRACE, Duration::from_secs);

    // A bad configuration still serves, so every chat start can explain it
    let sessions = match Config::from_env() {
        Ok(config) => {
            let http = HttpBackend::new(&config.api_url, &config.api_secret, config.backend_timeout)?;
            let backend: Arc<dyn BackendClient> = Arc::new(LoggingBackend::new(Arc::new(http)));

            tracing::info!(
                url = %config.api_url,
                bot_name = %config.persona.bot_name,
                timeout_secs = config.backend_timeout.as_secs(),
                no_transition = ?config.handoff.no_transition,
                "Backend configured"
            );
            SessionManager::new(RelaySetup::new(&config, backend))
        }
        Err(e) => {
            tracing::error!(error = %e, "Configuration error; sessions will be blocked");
            SessionManager::misconfigured(e)
        }
    };

    let state = AppState::new(sessions.with_disconnect_grace(disconnect_grace));

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Specialist relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
