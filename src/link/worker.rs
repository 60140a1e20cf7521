//! Per-connection background task: drains inbound bytes into the frame
//! decoder and issues voltage requests on the poll interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use uuid::Uuid;

use super::{ConnectionState, LinkSettings, LinkStatus};
use crate::serial::protocol::{encode_voltage_request, DecodedFrame, FrameDecoder};
use crate::serial::{LinkTransport, SerialError};

pub(crate) type SharedTransport = Arc<Mutex<Option<Box<dyn LinkTransport>>>>;

const READ_CHUNK_SIZE: usize = 256;
const STOP_GRACE: Duration = Duration::from_secs(2);

pub(crate) struct LinkWorker {
    stop_tx: mpsc::Sender<()>,
    task_handle: JoinHandle<()>,
}

impl LinkWorker {
    pub(crate) fn spawn(
        transport: SharedTransport,
        status_tx: watch::Sender<LinkStatus>,
        session_id: Uuid,
        settings: LinkSettings,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let task_handle =
            tokio::spawn(run_worker(transport, status_tx, session_id, settings, stop_rx));
        Self {
            stop_tx,
            task_handle,
        }
    }

    /// Ask the task to stop without waiting for it.
    pub(crate) fn signal_stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Stop the task and wait until it no longer touches the transport.
    pub(crate) async fn stop(mut self) {
        self.signal_stop();
        if timeout(STOP_GRACE, &mut self.task_handle).await.is_err() {
            log::warn!("Link worker did not stop within {:?}, aborting", STOP_GRACE);
            self.task_handle.abort();
        }
    }
}

async fn run_worker(
    transport: SharedTransport,
    status_tx: watch::Sender<LinkStatus>,
    session_id: Uuid,
    settings: LinkSettings,
    mut stop_rx: mpsc::Receiver<()>,
) {
    let mut decoder = FrameDecoder::new();
    let mut poll = interval_at(
        Instant::now() + settings.poll_interval,
        settings.poll_interval,
    );
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::debug!("Link worker started for session {}", session_id);

    loop {
        tokio::select! {
            biased;

            _ = stop_rx.recv() => {
                log::debug!("Link worker for session {} received stop signal", session_id);
                break;
            }

            _ = poll.tick() => {
                if let Err(e) = request_voltage(&transport).await {
                    log::error!("Voltage poll failed: {}", e);
                    mark_faulted(
                        &status_tx,
                        session_id,
                        format!("Voltage poll failed: {}", e),
                    );
                    break;
                }
            }

            read = read_chunk(&transport, settings.read_timeout_ms) => {
                match read {
                    Ok(chunk) => {
                        for frame in decoder.push(&chunk) {
                            apply_frame(&status_tx, frame);
                        }
                    }
                    Err(e) if e.is_timeout() => {}
                    Err(e) => {
                        log::error!("Serial read failed: {}", e);
                        mark_faulted(
                            &status_tx,
                            session_id,
                            format!("Serial read failed: {}", e),
                        );
                        break;
                    }
                }
            }
        }
    }

    log::debug!("Link worker for session {} stopped", session_id);
}

async fn request_voltage(transport: &SharedTransport) -> Result<(), SerialError> {
    let mut guard = transport.lock().await;
    // The manager always stops this task before releasing the handle
    debug_assert!(guard.is_some(), "poll tick fired with no open transport");
    let Some(port) = guard.as_mut() else {
        return Err(SerialError::Closed);
    };
    let frame = encode_voltage_request();
    log::debug!("Requesting voltage: {}", hex::encode(&frame));
    port.send_data(&frame).await.map(|_| ())
}

async fn read_chunk(
    transport: &SharedTransport,
    timeout_ms: u64,
) -> Result<Vec<u8>, SerialError> {
    let mut guard = transport.lock().await;
    let port = guard.as_mut().ok_or(SerialError::Closed)?;
    let mut buf = [0u8; READ_CHUNK_SIZE];
    let n = port.read_data(&mut buf, timeout_ms).await?;
    log::debug!("Data from robot: {}", hex::encode(&buf[..n]));
    Ok(buf[..n].to_vec())
}

fn apply_frame(status_tx: &watch::Sender<LinkStatus>, frame: DecodedFrame) {
    match frame {
        DecodedFrame::Voltage(voltage) => {
            log::debug!("Updated voltage: {:.2}", voltage);
            status_tx.send_modify(|status| status.record_voltage(voltage));
        }
    }
}

/// Move a still-connected session to `Faulted`. Stale sessions are ignored.
pub(crate) fn mark_faulted(
    status_tx: &watch::Sender<LinkStatus>,
    session_id: Uuid,
    reason: String,
) {
    status_tx.send_modify(|status| {
        if status.session_id == Some(session_id) && status.state == ConnectionState::Connected {
            status.update_state(ConnectionState::Faulted);
            status.last_error = Some(reason);
        }
    });
}
