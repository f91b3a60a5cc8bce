//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use stowage_core::ServiceConfig;
use stowage_storage::{ScratchSweeper, SweeperHandle};

/// Initialize the entire application
///
/// Storage directories exist once this returns; the router is ready to serve.
pub async fn initialize_app(config: ServiceConfig) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.is_production())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let state = AppState::init(config)
        .await
        .context("Failed to initialize upload storage")?;
    let state = Arc::new(state);

    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}

/// Start the decode-directory sweeper if an interval is configured.
pub fn start_sweeper(state: &AppState) -> Option<SweeperHandle> {
    let config = &state.config;
    if config.scratch_sweep_interval_secs == 0 {
        return None;
    }

    let sweeper = Arc::new(ScratchSweeper::new(
        state.upload.storage.decode_dir(),
        Duration::from_secs(config.scratch_max_age_secs),
        Duration::from_secs(config.scratch_sweep_interval_secs),
    ));

    tracing::info!(
        interval_secs = config.scratch_sweep_interval_secs,
        max_age_secs = config.scratch_max_age_secs,
        "Scratch sweeper started"
    );

    Some(sweeper.start())
}
