use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::worker::{mark_faulted, LinkWorker, SharedTransport};
use super::{
    ConnectOutcome, ConnectionState, DisconnectOutcome, LinkError, LinkStatus, Result,
    SentCommand, TelemetryReading,
};
use crate::serial::command_table;
use crate::serial::protocol::encode_command;
use crate::serial::{SerialError, TransportOpener};

/// Timing for the per-connection worker.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub poll_interval: Duration,
    pub read_timeout_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1500),
            read_timeout_ms: 25,
        }
    }
}

/// An open connection: the handle plus the worker that polls and reads it.
struct Session {
    id: Uuid,
    transport: SharedTransport,
    worker: LinkWorker,
}

/// Owns the single serial connection to the robot.
/// Handles the connect/disconnect lifecycle, command writes and telemetry polling
pub struct LinkManager {
    opener: Arc<dyn TransportOpener>,
    settings: LinkSettings,
    session: Mutex<Option<Session>>,
    status_tx: watch::Sender<LinkStatus>,
}

impl LinkManager {
    pub fn new(opener: Arc<dyn TransportOpener>, settings: LinkSettings) -> Self {
        let (status_tx, _status_rx) = watch::channel(LinkStatus::new());
        Self {
            opener,
            settings,
            session: Mutex::new(None),
            status_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status_tx.borrow().state
    }

    /// Open the link and start polling. A no-op while already connected or connecting.
    pub async fn connect(&self, path: &str, baud_rate: u32) -> Result<ConnectOutcome> {
        let current = self.state();
        if current.is_active() {
            log::info!("Connect requested while {}, ignoring", current.as_str());
            return Ok(ConnectOutcome::AlreadyActive(current));
        }

        let mut session_guard = self.session.lock().await;

        // Another caller may have finished connecting while we waited
        let current = self.state();
        if current.is_active() {
            log::info!("Connect requested while {}, ignoring", current.as_str());
            return Ok(ConnectOutcome::AlreadyActive(current));
        }

        if let Some(stale) = session_guard.take() {
            log::info!("Releasing faulted session {} before reconnecting", stale.id);
            let (_, close_result) = self.teardown(stale).await;
            if let Err(e) = close_result {
                log::warn!("Ignoring close error on faulted link: {}", e);
            }
        }

        self.status_tx.send_modify(|status| {
            status.update_state(ConnectionState::Connecting);
            status.last_error = None;
        });

        log::info!("Attempting to connect to {} at {} baud", path, baud_rate);
        let transport = match self.opener.open(path, baud_rate).await {
            Ok(transport) => transport,
            Err(e) => {
                log::error!("Error connecting to {}: {}", path, e);
                let message = e.to_string();
                self.status_tx.send_modify(|status| {
                    status.update_state(ConnectionState::Disconnected);
                    status.last_error = Some(message);
                });
                return Err(LinkError::DeviceOpen {
                    path: path.to_string(),
                    source: e,
                });
            }
        };

        let session_id = Uuid::new_v4();
        let transport: SharedTransport = Arc::new(Mutex::new(Some(transport)));
        self.status_tx.send_modify(|status| {
            status.update_state(ConnectionState::Connected);
            status.session_id = Some(session_id);
            status.port_name = Some(path.to_string());
        });

        let worker = LinkWorker::spawn(
            transport.clone(),
            self.status_tx.clone(),
            session_id,
            self.settings.clone(),
        );
        *session_guard = Some(Session {
            id: session_id,
            transport,
            worker,
        });

        log::info!("Connected to robot on {} (session {})", path, session_id);
        Ok(ConnectOutcome::Opened)
    }

    /// Stop polling and close the link. Always ends `Disconnected`.
    pub async fn disconnect(&self) -> Result<DisconnectOutcome> {
        let mut session_guard = self.session.lock().await;

        let Some(session) = session_guard.take() else {
            log::debug!("Disconnect requested with no open link");
            return Ok(DisconnectOutcome::NotConnected);
        };

        let session_id = session.id;
        let (was_faulted, close_result) = self.teardown(session).await;

        self.status_tx.send_modify(|status| {
            status.update_state(ConnectionState::Disconnected);
            status.session_id = None;
            status.port_name = None;
        });

        match close_result {
            Ok(()) => {
                log::info!("Disconnected from robot (session {})", session_id);
                Ok(DisconnectOutcome::Closed)
            }
            Err(e) if was_faulted => {
                log::warn!("Ignoring close error on faulted link: {}", e);
                Ok(DisconnectOutcome::Closed)
            }
            Err(e) => {
                log::error!("Error closing serial port: {}", e);
                self.status_tx
                    .send_modify(|status| status.last_error = Some(e.to_string()));
                Err(LinkError::Close(e))
            }
        }
    }

    /// Encode and write a movement command by its logical name.
    pub async fn send_command(&self, name: &str) -> Result<SentCommand> {
        let command = command_table::resolve(name)
            .ok_or_else(|| LinkError::UnknownCommand(name.to_string()))?;

        let session_guard = self.session.lock().await;
        let session = match session_guard.as_ref() {
            Some(session) if self.state() == ConnectionState::Connected => session,
            _ => return Err(LinkError::NotConnected),
        };

        let frame = encode_command(command.opcode());
        let write_result = {
            let mut transport = session.transport.lock().await;
            match transport.as_mut() {
                Some(port) => port.send_data(&frame).await,
                None => Err(SerialError::Closed),
            }
        };

        match write_result {
            Ok(bytes_written) => {
                log::info!(
                    "Sent command: {} ({})",
                    command.name(),
                    hex::encode(&frame)
                );
                Ok(SentCommand {
                    command,
                    opcode: command.opcode(),
                    bytes_written,
                })
            }
            Err(e) => {
                log::error!("Error sending command {}: {}", command.name(), e);
                session.worker.signal_stop();
                mark_faulted(
                    &self.status_tx,
                    session.id,
                    format!("Write failed: {}", e),
                );
                Err(LinkError::Write(e))
            }
        }
    }

    /// Last decoded voltage, or the unknown sentinel. Never waits on I/O.
    pub fn latest_telemetry(&self) -> TelemetryReading {
        self.status_tx.borrow().telemetry
    }

    pub fn status_snapshot(&self) -> LinkStatus {
        self.status_tx.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status_tx.subscribe()
    }

    /// Stop the worker, then release the handle. Reports whether the link had faulted.
    async fn teardown(&self, session: Session) -> (bool, std::result::Result<(), SerialError>) {
        // Stop the poller before touching the handle so nothing writes after close
        session.worker.stop().await;
        let was_faulted = self.state() == ConnectionState::Faulted;
        let close_result = Self::close_transport(&session.transport).await;
        (was_faulted, close_result)
    }

    async fn close_transport(transport: &SharedTransport) -> std::result::Result<(), SerialError> {
        let mut guard = transport.lock().await;
        match guard.take() {
            Some(mut port) => port.close().await,
            None => Ok(()),
        }
    }
}
