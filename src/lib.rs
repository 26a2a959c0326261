//! Railwatch -- depot maintenance tracking and fleet health scoring.
//!
//! This crate provides the maintenance log for a rail depot: technicians
//! report anomalies and conformity interventions, the scoring engine turns
//! those reports into per-anomaly criticality and per-train health figures,
//! and managers read the aggregated fleet state over a JSON API.

pub mod api;
pub mod config;
pub mod fleet;
pub mod scoring;
pub mod storage;

use anyhow::Result;

use crate::config::Config;
use crate::fleet::workshop::Workshop;

/// Start the railwatch daemon: open the database, wire the workshop, serve
/// the API.
pub async fn serve(cfg: Config) -> Result<()> {
    tracing::info!(db_path = %cfg.storage.db_path, "Initializing database");
    if let Some(parent) = std::path::Path::new(&cfg.storage.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let pool = storage::open_pool(&cfg.storage.db_path)?;

    let workshop = Workshop::new(pool.clone(), cfg.scoring.clone());
    let state = api::state::AppState::new(pool, workshop);

    let addr: std::net::SocketAddr = cfg.server.bind.parse()?;
    let app = api::router(state);

    tracing::info!(%addr, "railwatch listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
