//! Buildcast server binary.
//!
//! Serves live build logs for every configured target over HTTP and
//! `WebSocket`.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `buildcast-config.yaml` (or `BUILDCAST_CONFIG`)
//! 3. Spawn one session controller per build target
//! 4. Serve until `Ctrl-C`

use std::path::PathBuf;
use std::sync::Arc;

use buildcast_core::{BuildcastConfig, ConfigError, ProcessLauncher, TokioLauncher, DEFAULT_CONFIG_PATH};
use buildcast_server::{start_server, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point for the Buildcast server.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the server fails to
/// bind or serve.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("buildcast starting");

    let config = load_config()?;
    if config.targets.is_empty() {
        warn!("No build targets configured; every build request will return 404");
    }

    let launcher: Arc<dyn ProcessLauncher> = Arc::new(TokioLauncher);
    let state = Arc::new(AppState::from_config(&config, &launcher));

    start_server(&config.server, state).await?;

    info!("buildcast stopped");
    Ok(())
}

/// Load configuration from `BUILDCAST_CONFIG` or `buildcast-config.yaml`.
///
/// Falls back to defaults when the file does not exist.
fn load_config() -> Result<BuildcastConfig, ConfigError> {
    let config_path = std::env::var_os("BUILDCAST_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    let config = if config_path.exists() {
        BuildcastConfig::from_file(&config_path)?
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        BuildcastConfig::from_env()?
    };

    info!(
        host = config.server.host,
        port = config.server.port,
        targets = config.targets.len(),
        "Configuration loaded"
    );
    Ok(config)
}
