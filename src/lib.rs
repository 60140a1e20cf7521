pub mod bridge;
pub mod commands;
pub mod config;
pub mod console;
pub mod link;
pub mod serial;

pub use bridge::Bridge;

use std::path::PathBuf;

use anyhow::Context;
use config::{BridgeConfig, CONFIG_PATH_ENV};
use tracing_subscriber::EnvFilter;

/// Install the log subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let installed = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(true)
    .try_init();
  if installed.is_err() {
    eprintln!("Logging already initialized");
  }
}

pub async fn run() -> anyhow::Result<()> {
  init_logging();

  let config_path = std::env::args()
    .nth(1)
    .map(PathBuf::from)
    .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
  let config = BridgeConfig::load(config_path.as_deref()).context("Failed to load bridge config")?;

  log::info!(
    "Robot bridge ready (device {}, {} baud, poll every {} ms)",
    config.device_path,
    config.baud_rate,
    config.poll_interval_ms
  );

  let bridge = Bridge::new(config);
  let result = console::run_console(&bridge).await;

  // Stop the poller and release the port on every exit path
  bridge.shutdown().await;
  result.context("Console input failed")?;

  log::info!("Robot bridge stopped");
  Ok(())
}
