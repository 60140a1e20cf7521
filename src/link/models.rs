use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::serial::MoveCommand;

/// Link connection state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Faulted,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Faulted => "faulted",
        }
    }

    /// Connected or on its way there; a second open must not happen.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

/// Most recent supply voltage reported by the robot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct TelemetryReading {
    pub voltage: f64,
    /// `None` until the first voltage frame has been decoded.
    pub received_at: Option<DateTime<Utc>>,
}

impl TelemetryReading {
    pub fn new(voltage: f64) -> Self {
        Self {
            voltage,
            received_at: Some(Utc::now()),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.received_at.is_some()
    }
}

/// Point-in-time view of the link, published on every change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub telemetry: TelemetryReading,
    pub port_name: Option<String>,
    pub session_id: Option<Uuid>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LinkStatus {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            telemetry: TelemetryReading::unknown(),
            port_name: None,
            session_id: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn update_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    pub fn record_voltage(&mut self, voltage: f64) {
        self.telemetry = TelemetryReading::new(voltage);
        self.updated_at = Utc::now();
    }
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Opened,
    /// Nothing was opened; the link was already in this state.
    AlreadyActive(ConnectionState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Closed,
    NotConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SentCommand {
    pub command: MoveCommand,
    pub opcode: u8,
    pub bytes_written: usize,
}
