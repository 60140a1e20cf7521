use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::link::{
    ConnectOutcome, DisconnectOutcome, LinkManager, LinkStatus, Result, SentCommand,
    TelemetryReading,
};
use crate::serial::{SerialPortOpener, TransportOpener};

/// Surface the HTTP layer calls into. Cheap to clone; all clones share one link.
#[derive(Clone)]
pub struct Bridge {
    link: Arc<LinkManager>,
    config: Arc<BridgeConfig>,
}

impl Bridge {
    /// Bridge backed by a real serial port.
    pub fn new(config: BridgeConfig) -> Self {
        let opener = Arc::new(SerialPortOpener::new(
            config.open_timeout(),
            config.io_timeout(),
        ));
        Self::with_opener(config, opener)
    }

    pub fn with_opener(config: BridgeConfig, opener: Arc<dyn TransportOpener>) -> Self {
        let link = LinkManager::new(opener, config.link_settings());
        Self {
            link: Arc::new(link),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Connect to the configured device.
    pub async fn connect(&self) -> Result<ConnectOutcome> {
        self.link
            .connect(&self.config.device_path, self.config.baud_rate)
            .await
    }

    pub async fn connect_to(&self, path: &str, baud_rate: u32) -> Result<ConnectOutcome> {
        self.link.connect(path, baud_rate).await
    }

    pub async fn disconnect(&self) -> Result<DisconnectOutcome> {
        self.link.disconnect().await
    }

    pub async fn send_command(&self, name: &str) -> Result<SentCommand> {
        self.link.send_command(name).await
    }

    pub fn latest_telemetry(&self) -> TelemetryReading {
        self.link.latest_telemetry()
    }

    pub fn status_snapshot(&self) -> LinkStatus {
        self.link.status_snapshot()
    }

    /// Release the link on process exit.
    pub async fn shutdown(&self) {
        match self.link.disconnect().await {
            Ok(DisconnectOutcome::Closed) => log::info!("Serial link closed on shutdown"),
            Ok(DisconnectOutcome::NotConnected) => {}
            Err(e) => log::warn!("Error closing serial link on shutdown: {}", e),
        }
    }
}
