pub mod command_table;
pub mod fake;
pub mod interface;
pub mod protocol;

pub use command_table::MoveCommand;
pub use interface::{LinkTransport, SerialInterface, SerialPortOpener, TransportOpener};
pub use protocol::{DecodedFrame, FrameDecoder};

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Failed to open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Communication timeout")]
    Timeout,

    #[error("Port handle already closed")]
    Closed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

impl SerialError {
    /// Read timeouts are the idle case of a polled port, not a fault.
    pub fn is_timeout(&self) -> bool {
        match self {
            SerialError::Timeout => true,
            SerialError::IoError(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SerialError>;
