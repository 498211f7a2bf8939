use anyhow::{Context, Result};
use std::{
    io::ErrorKind,
    net::{IpAddr, UdpSocket},
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting object store with config: {:?}", cfg);

    // --- Initialize storage root ---
    let storage = services::storage_service::StorageService::init(&cfg.storage_dir)
        .await
        .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;
    tracing::info!("Storing buckets under {}", storage.base_path.display());

    // --- Build router ---
    let app = routes::routes::app(storage, &cfg);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    let local_addr = listener.local_addr()?;
    tracing::info!("Server listening on http://{}", local_addr);
    if local_addr.ip().is_unspecified() {
        if let Some(ip) = lan_ip() {
            tracing::info!(
                "Access from other machines using: http://{}:{}",
                ip,
                local_addr.port()
            );
        }
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Address of the interface that routes to the public internet.
///
/// Connecting a UDP socket only selects a route; no packet is sent.
fn lan_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
