use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use serialport::SerialPort;
use tokio::time::timeout;

use super::{Result, SerialError};

/// Byte-stream side of an open link. The link manager is the only owner.
#[async_trait]
pub trait LinkTransport: Send {
    /// Write a whole frame and flush it.
    async fn send_data(&mut self, data: &[u8]) -> Result<usize>;

    /// Read whatever is available, waiting at most `timeout_ms`.
    /// Returns `SerialError::Timeout` when nothing arrived.
    async fn read_data(&mut self, buffer: &mut [u8], timeout_ms: u64) -> Result<usize>;

    /// Release the underlying handle. Further calls fail with `SerialError::Closed`.
    async fn close(&mut self) -> Result<()>;

    fn port_name(&self) -> &str;
}

/// Opens transports. Swapped for an in-memory opener in tests.
#[async_trait]
pub trait TransportOpener: Send + Sync {
    async fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn LinkTransport>>;
}

/// Opens real serial ports through `serialport`.
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    /// Upper bound on the blocking `open()` call.
    open_timeout: Duration,
    /// Per-call blocking I/O timeout handed to the port.
    io_timeout: Duration,
}

impl SerialPortOpener {
    pub fn new(open_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            open_timeout,
            io_timeout,
        }
    }
}

#[async_trait]
impl TransportOpener for SerialPortOpener {
    async fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn LinkTransport>> {
        let path_owned = path.to_string();
        let io_timeout = self.io_timeout;

        let port = open_blocking(path, self.open_timeout, move || {
            serialport::new(&path_owned, baud_rate)
                .timeout(io_timeout)
                .open()
        })
        .await?;

        log::info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(Box::new(SerialInterface::new(path, port)))
    }
}

/// Run a synchronous open off the runtime, giving up after `open_timeout`.
/// A timed-out open keeps its blocking thread until the OS returns.
async fn open_blocking<T, F>(path: &str, open_timeout: Duration, open: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, serialport::Error> + Send + 'static,
{
    let open_failed = |reason: String| SerialError::OpenFailed {
        path: path.to_string(),
        reason,
    };

    match timeout(open_timeout, tokio::task::spawn_blocking(open)).await {
        Ok(Ok(Ok(port))) => Ok(port),
        Ok(Ok(Err(e))) => Err(open_failed(e.to_string())),
        Ok(Err(join_error)) => Err(open_failed(join_error.to_string())),
        Err(_) => {
            log::warn!("Opening {} did not finish within {:?}", path, open_timeout);
            Err(open_failed(format!("open timed out after {:?}", open_timeout)))
        }
    }
}

pub struct SerialInterface {
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
}

impl SerialInterface {
    pub fn new(port_name: &str, port: Box<dyn SerialPort>) -> Self {
        Self {
            port: Some(port),
            port_name: port_name.to_string(),
        }
    }
}

#[async_trait]
impl LinkTransport for SerialInterface {
    async fn send_data(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port.as_mut().ok_or(SerialError::Closed)?;

        port.write_all(data).map_err(SerialError::IoError)?;
        port.flush().map_err(SerialError::IoError)?;

        Ok(data.len())
    }

    async fn read_data(&mut self, buffer: &mut [u8], timeout_ms: u64) -> Result<usize> {
        let port = self.port.as_mut().ok_or(SerialError::Closed)?;

        let read_operation = async {
            loop {
                match port.bytes_to_read() {
                    Ok(0) => {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    Ok(_) => match port.read(buffer) {
                        Ok(bytes_read) => return Ok(bytes_read),
                        Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                            tokio::time::sleep(Duration::from_millis(5)).await;
                        }
                        Err(e) => return Err(SerialError::IoError(e)),
                    },
                    Err(e) => return Err(SerialError::SerialportError(e)),
                }
            }
        };

        timeout(Duration::from_millis(timeout_ms), read_operation)
            .await
            .map_err(|_| SerialError::Timeout)?
    }

    async fn close(&mut self) -> Result<()> {
        let mut port = self.port.take().ok_or(SerialError::Closed)?;
        log::info!("Closing serial port {}", self.port_name);
        // Dropping the handle closes it; a failed flush is the only close error we can observe
        port.flush().map_err(SerialError::IoError)
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }
}
