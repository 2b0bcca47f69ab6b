//! HTTP server
//!
//! JSON API over the model-building workflow: upload a dataset, configure
//! preprocessing, train and compare models, fetch metrics and save
//! artifacts.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ApiError;
pub use state::AppState;

use crate::config::AppConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Start the server with the given configuration
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        models_dir = %config.models_dir.display(),
        started_at = %start_time.to_rfc3339(),
        "Initializing server directories"
    );
    std::fs::create_dir_all(&config.models_dir)?;

    if config.allow_debug_sessions {
        warn!("Debug sessions endpoint is enabled; do not expose this server publicly");
    }

    let state = Arc::new(AppState::from_config(config.clone()).await);
    if let Err(e) = state.workflow.store().health_check().await {
        warn!(error = %e, "Durable session tier failed its health check");
    }
    let app = create_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        address = %addr,
        durable_sessions = state.workflow.store().has_durable_tier(),
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        "ML builder server starting"
    );
    info!(url = %format!("http://{}/api/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
