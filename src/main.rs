//! SQL Advisor API - schema snapshots and metered SQL generation
//!
//! Validates connection strings locally, fetches structural snapshots
//! through an upstream introspection function, keeps named snapshots with
//! diffs between versions, and meters every SQL generation call into a
//! cumulative usage odometer.
//!
//! Only catalog-only database roles are accepted: the introspection
//! function rejects roles with row-level access, and that rejection is
//! surfaced as a non-fatal, user-actionable outcome.

mod annotate;
mod config;
mod connection;
mod error;
mod gate;
mod introspection;
mod models;
mod routes;
mod snapshot;
mod state;
mod upstream;
mod usage;

use crate::config::Settings;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting SQL Advisor API...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    if settings.upstream.api_key.is_none() {
        warn!("⚠️  UPSTREAM_API_KEY not set, upstream functions are called without a bearer token");
    }
    if !settings.pricing.is_enabled() {
        warn!("⚠️  PRICE_INPUT_PER_1K / PRICE_OUTPUT_PER_1K not set, costs will read as $0");
    }

    let state = Arc::new(AppState::from_settings(&settings)?);
    info!("🔗 Upstream functions at {}", settings.upstream.functions_url);

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Connections ───");
    info!("   POST /api/connections/validate - Check a connection string locally");
    info!("   POST /api/schema/fetch         - Fetch a snapshot (catalog-only roles)");
    info!("");
    info!("   ─── SQL Generation ───");
    info!("   POST /api/sql/generate         - Natural language to SQL");
    info!("");
    info!("   ─── Named Snapshots ───");
    info!("   GET  /api/schemas              - List saved snapshots");
    info!("   POST /api/schemas              - save | update | delete | diff");
    info!("   GET  /api/schemas/{{name}}       - Get a saved snapshot");
    info!("   DELETE /api/schemas/{{name}}     - Delete a saved snapshot");
    info!("");
    info!("   ─── Usage ───");
    info!("   GET  /api/usage                - Cumulative cost and tokens");
    info!("   POST /api/usage/reset          - Reset the odometer");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sql_advisor_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
