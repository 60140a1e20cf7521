pub mod manager;
pub mod models;
mod worker;

pub use manager::{LinkManager, LinkSettings};
pub use models::*;

use crate::serial::SerialError;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Device open failed: {source}")]
    DeviceOpen {
        path: String,
        #[source]
        source: SerialError,
    },

    #[error("Robot not connected")]
    NotConnected,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Write failed: {0}")]
    Write(#[source] SerialError),

    #[error("Close failed: {0}")]
    Close(#[source] SerialError),
}

pub type Result<T> = std::result::Result<T, LinkError>;
