mod app;
mod config;
mod error;
mod queue;
mod regen;
mod render;
mod routes;
mod services;
mod state;
mod store;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::config::DataPaths;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let paths = DataPaths::from_env();
    let secret = config::shared_secret();
    if secret.is_none() {
        tracing::warn!("REALMMAP_SECRET is not set, privileged routes will reject every request");
    }
    match paths.publish_dir.as_deref() {
        Some(dir) => tracing::info!(
            data_dir = %paths.root.display(),
            publish_dir = %dir.display(),
            "data directories resolved"
        ),
        None => tracing::info!(
            data_dir = %paths.root.display(),
            "data directory resolved, publishing disabled"
        ),
    }
    if !paths.province_raster().exists() {
        tracing::warn!(
            path = %paths.province_raster().display(),
            "province raster not found, lookups and regeneration will fail until it exists"
        );
    }

    let state = AppState::new(paths, secret);
    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("realmmap server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
