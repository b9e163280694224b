//! Application startup and initialization logic.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_state::AppState;
use crate::config::Config;
use crate::services::{PayloadDispatcher, ShotgridClient, TaskProcessor, ToolkitBridge};

/// Wire the tracking client, toolkit bridge and dispatcher into an AppState.
///
/// Nothing here talks to the network; credentials are first exercised when a
/// task is processed.
pub fn initialize_app(config: Config) -> Result<AppState> {
    let tracking = ShotgridClient::new(config.shotgrid.clone())
        .context("Failed to build ShotGrid HTTP client")?;
    info!("✅ ShotGrid client initialized (site: {})", config.shotgrid.site);

    let bridge = ToolkitBridge::from_config(&config.toolkit);
    info!(
        "✅ Toolkit bridge configured (command: {} {})",
        config.toolkit.bridge_command,
        config.toolkit.bridge_args.join(" ")
    );

    let processor = TaskProcessor::new(
        Arc::new(tracking),
        Arc::new(bridge),
        config.toolkit.clone(),
    );
    let dispatcher = PayloadDispatcher::new(Arc::new(processor));
    info!("✅ Payload dispatcher initialized");

    Ok(AppState::new(config, dispatcher))
}
