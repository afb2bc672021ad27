// src/connection/supervisor.rs

//! The connection supervisor task.
//!
//! It owns connecting and reading: it dials the server, hands the write half to
//! the controller, forwards every decoded reply tagged with the connection's
//! epoch, and when the socket goes away reports it and reconnects with
//! exponential backoff. It never touches the command queues.

use super::transport::{BoxedReader, BoxedWriter, Connector};
use crate::config::ReconnectConfig;
use crate::core::protocol::{RespFrame, RespFrameCodec};
use crate::core::queue::ConnectionEpoch;
use futures::StreamExt;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// Socket-side events, consumed by the controller in arrival order.
pub enum ConnectionEvent {
    Connected {
        epoch: ConnectionEpoch,
        writer: BoxedWriter,
    },
    Frame {
        epoch: ConnectionEpoch,
        frame: RespFrame,
    },
    Disconnected {
        epoch: ConnectionEpoch,
        reason: String,
    },
    Reconnecting {
        attempt: u32,
        delay: Duration,
    },
    /// Reconnection attempts are exhausted; the supervisor has stopped.
    GaveUp { reason: String },
}

/// How a connected read loop ended.
enum ReadOutcome {
    Lost(String),
    Shutdown,
}

pub struct Supervisor {
    connector: Arc<dyn Connector>,
    config: ReconnectConfig,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    /// Epochs the controller wants torn down (write failure, protocol violation).
    reset_rx: mpsc::UnboundedReceiver<ConnectionEpoch>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Supervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: ReconnectConfig,
        events_tx: mpsc::UnboundedSender<ConnectionEvent>,
        reset_rx: mpsc::UnboundedReceiver<ConnectionEpoch>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            connector,
            config,
            events_tx,
            reset_rx,
            shutdown_rx,
        }
    }

    /// Runs until shutdown, until the controller goes away, or until the
    /// configured number of consecutive failed attempts is reached.
    pub async fn run(mut self) {
        let target = self.connector.describe();
        let mut epoch = ConnectionEpoch::default();
        let mut current_delay = self.config.initial_delay;
        let mut failures: u32 = 0;

        loop {
            let connector = Arc::clone(&self.connector);
            let attempt = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    debug!("Connection supervisor for {target} shutting down.");
                    return;
                }
                result = connector.connect() => result,
            };

            match attempt {
                Ok((reader, writer)) => {
                    epoch = epoch.next();
                    failures = 0;
                    current_delay = self.config.initial_delay;
                    info!("Connected to {target} (epoch {epoch}).");
                    if self
                        .events_tx
                        .send(ConnectionEvent::Connected { epoch, writer })
                        .is_err()
                    {
                        return;
                    }

                    match self.read_loop(epoch, reader).await {
                        ReadOutcome::Shutdown => return,
                        ReadOutcome::Lost(reason) => {
                            info!("Connection to {target} lost (epoch {epoch}): {reason}");
                            if self
                                .events_tx
                                .send(ConnectionEvent::Disconnected { epoch, reason })
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!("Connection attempt {failures} to {target} failed: {e}");
                    if let Some(max) = self.config.max_attempts
                        && failures >= max
                    {
                        let reason = format!("gave up on {target} after {failures} attempts: {e}");
                        let _ = self.events_tx.send(ConnectionEvent::GaveUp { reason });
                        return;
                    }
                }
            }

            // Exponential backoff with jitter before the next attempt.
            let jitter_ms = self.config.jitter.as_millis() as u64;
            let jitter = if jitter_ms > 0 {
                Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
            } else {
                Duration::ZERO
            };
            let wait_time = current_delay + jitter;
            debug!("Will try to reconnect to {target} in {wait_time:?}");
            if self
                .events_tx
                .send(ConnectionEvent::Reconnecting {
                    attempt: failures + 1,
                    delay: wait_time,
                })
                .is_err()
            {
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(wait_time) => {}
                _ = self.shutdown_rx.recv() => {
                    debug!("Connection supervisor for {target} shutting down during backoff.");
                    return;
                }
            }

            if failures > 0 {
                current_delay = (current_delay * 2).min(self.config.max_delay);
            }
        }
    }

    /// Forwards replies until the socket closes, the controller asks for a reset
    /// of this epoch, or shutdown is requested.
    async fn read_loop(&mut self, epoch: ConnectionEpoch, reader: BoxedReader) -> ReadOutcome {
        let mut framed = FramedRead::new(reader, RespFrameCodec);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => return ReadOutcome::Shutdown,
                reset = self.reset_rx.recv() => match reset {
                    Some(target) if target == epoch => {
                        return ReadOutcome::Lost("connection reset by client".to_string());
                    }
                    // A reset aimed at an epoch that is already gone.
                    Some(_) => continue,
                    None => return ReadOutcome::Shutdown,
                },
                next = framed.next() => match next {
                    Some(Ok(frame)) => {
                        if self.events_tx.send(ConnectionEvent::Frame { epoch, frame }).is_err() {
                            return ReadOutcome::Shutdown;
                        }
                    }
                    Some(Err(e)) => return ReadOutcome::Lost(format!("read error: {e}")),
                    None => return ReadOutcome::Lost("closed by peer".to_string()),
                }
            }
        }
    }
}
