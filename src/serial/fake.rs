use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{LinkTransport, Result, SerialError, TransportOpener};

#[derive(Default)]
struct FakeState {
    inbound: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    open_error: Option<String>,
    open_delay: Option<Duration>,
    fail_writes: bool,
    fail_reads: bool,
    fail_close: bool,
    open_count: usize,
    close_count: usize,
    is_open: bool,
}

/// In-memory stand-in for a serial device, used in tests to script inbound
/// bytes, inspect writes and inject failures.
#[derive(Clone, Default)]
pub struct FakeLink {
    state: Arc<Mutex<FakeState>>,
}

impl FakeLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn opener(&self) -> FakeOpener {
        FakeOpener { link: self.clone() }
    }

    /// Queue one read event. Each call is delivered as a separate chunk.
    pub fn inject(&self, bytes: &[u8]) {
        self.state().inbound.push_back(bytes.to_vec());
    }

    /// Every `send_data` call, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    pub fn written_bytes(&self) -> Vec<u8> {
        self.state().writes.concat()
    }

    pub fn count_writes(&self, frame: &[u8]) -> usize {
        self.state().writes.iter().filter(|w| w.as_slice() == frame).count()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    pub fn fail_open(&self, reason: &str) {
        self.state().open_error = Some(reason.to_string());
    }

    /// Make every later open take `delay` before it completes.
    pub fn set_open_delay(&self, delay: Duration) {
        self.state().open_delay = Some(delay);
    }

    pub fn allow_open(&self) {
        self.state().open_error = None;
    }

    pub fn set_write_failure(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn set_read_failure(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    pub fn set_close_failure(&self, fail: bool) {
        self.state().fail_close = fail;
    }

    pub fn open_count(&self) -> usize {
        self.state().open_count
    }

    pub fn close_count(&self) -> usize {
        self.state().close_count
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open
    }
}

pub struct FakeOpener {
    link: FakeLink,
}

#[async_trait]
impl TransportOpener for FakeOpener {
    async fn open(&self, path: &str, _baud_rate: u32) -> Result<Box<dyn LinkTransport>> {
        let delay = self.link.state().open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.link.state();
        if let Some(reason) = state.open_error.clone() {
            return Err(SerialError::OpenFailed {
                path: path.to_string(),
                reason,
            });
        }
        state.open_count += 1;
        state.is_open = true;
        Ok(Box::new(FakeTransport {
            link: self.link.clone(),
            port_name: path.to_string(),
            closed: false,
        }))
    }
}

pub struct FakeTransport {
    link: FakeLink,
    port_name: String,
    closed: bool,
}

#[async_trait]
impl LinkTransport for FakeTransport {
    async fn send_data(&mut self, data: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(SerialError::Closed);
        }
        let mut state = self.link.state();
        if state.fail_writes {
            return Err(SerialError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "fake write failure",
            )));
        }
        state.writes.push(data.to_vec());
        Ok(data.len())
    }

    async fn read_data(&mut self, buffer: &mut [u8], timeout_ms: u64) -> Result<usize> {
        if self.closed {
            return Err(SerialError::Closed);
        }
        {
            let mut state = self.link.state();
            if state.fail_reads {
                return Err(SerialError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "fake read failure",
                )));
            }
            if let Some(mut chunk) = state.inbound.pop_front() {
                let n = chunk.len().min(buffer.len());
                buffer[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    state.inbound.push_front(chunk.split_off(n));
                }
                return Ok(n);
            }
        }
        tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
        Err(SerialError::Timeout)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(SerialError::Closed);
        }
        self.closed = true;
        let mut state = self.link.state();
        state.is_open = false;
        state.close_count += 1;
        if state.fail_close {
            return Err(SerialError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "fake close failure",
            )));
        }
        Ok(())
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }
}
