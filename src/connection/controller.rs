// src/connection/controller.rs

//! The connection controller: a single task that owns the socket's write half,
//! the reply FIFO and the offline queue.
//!
//! Every mutation of the queues happens here, in the order messages and socket
//! events arrive, so concurrent callers observe one global submission order.
//! State transitions reconcile the queues in one step, with no await in
//! between, so a disconnect can never interleave with a submission.

use super::state::{ClientEvent, ConnectionState};
use super::supervisor::ConnectionEvent;
use super::transport::BoxedWriter;
use crate::config::QueueOptions;
use crate::core::commands::PendingCommand;
use crate::core::protocol::RespFrame;
use crate::core::queue::{
    ConnectionEpoch, OfflineQueue, Outbound, PendingEntry, ReplyMatcher, TransactionBatch,
};
use crate::core::{ClientError, RespValue};
use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

// Upper bound on messages folded into one socket write.
const MAX_MESSAGES_PER_FLUSH: usize = 256;

/// Requests sent from `Client` handles to the controller.
pub enum ControlMessage {
    Submit(PendingCommand),
    Exec(TransactionBatch),
    /// Sends `QUIT`; the connection closing afterwards ends the client
    /// instead of triggering a reconnect.
    Quit(PendingCommand),
    SetOptions(QueueOptions),
    Close,
}

/// Whether the controller's main loop should keep running.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub struct Controller {
    state: ConnectionState,
    options: QueueOptions,
    epoch: ConnectionEpoch,
    next_seq: u64,
    /// Set once `QUIT` has been sent; the next disconnect is final.
    quitting: bool,
    writer: Option<BoxedWriter>,
    /// Encoded requests not yet handed to the socket.
    out: BytesMut,
    matcher: ReplyMatcher,
    offline: OfflineQueue,
    control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    reset_tx: mpsc::UnboundedSender<ConnectionEpoch>,
    shutdown_tx: broadcast::Sender<()>,
    state_tx: watch::Sender<ConnectionState>,
    client_events_tx: broadcast::Sender<ClientEvent>,
}

impl Controller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        options: QueueOptions,
        control_rx: mpsc::UnboundedReceiver<ControlMessage>,
        events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
        reset_tx: mpsc::UnboundedSender<ConnectionEpoch>,
        shutdown_tx: broadcast::Sender<()>,
        state_tx: watch::Sender<ConnectionState>,
        client_events_tx: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            state: ConnectionState::Connecting,
            options,
            epoch: ConnectionEpoch::default(),
            next_seq: 0,
            quitting: false,
            writer: None,
            out: BytesMut::with_capacity(4096),
            matcher: ReplyMatcher::new(),
            offline: OfflineQueue::with_limit(options.offline_queue_limit),
            control_rx,
            events_rx,
            reset_tx,
            shutdown_tx,
            state_tx,
            client_events_tx,
        }
    }

    /// The controller's main loop. Socket events are handled before new
    /// requests so that a pending disconnect is reconciled before anything
    /// else is written.
    pub async fn run(mut self) {
        info!("Connection controller started.");
        loop {
            let flow = tokio::select! {
                biased;
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        self.close(ClientError::ConnectionClosed(
                            "connection supervisor stopped".to_string(),
                        ));
                        Flow::Stop
                    }
                },
                message = self.control_rx.recv() => match message {
                    Some(message) => {
                        let mut flow = self.handle_message(message);
                        let mut batched = 1;
                        while flow == Flow::Continue && batched < MAX_MESSAGES_PER_FLUSH {
                            match self.control_rx.try_recv() {
                                Ok(message) => {
                                    flow = self.handle_message(message);
                                    batched += 1;
                                }
                                Err(_) => break,
                            }
                        }
                        flow
                    }
                    None => {
                        debug!("All client handles dropped; closing connection.");
                        self.close(ClientError::ConnectionClosed(
                            "client dropped".to_string(),
                        ));
                        Flow::Stop
                    }
                },
            };

            if flow == Flow::Stop {
                break;
            }
            self.flush().await;
        }

        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        info!("Connection controller stopped.");
    }

    fn handle_event(&mut self, event: ConnectionEvent) -> Flow {
        match event {
            ConnectionEvent::Connected { epoch, writer } => self.on_connected(epoch, writer),
            ConnectionEvent::Frame { epoch, frame } => self.on_frame(epoch, frame),
            ConnectionEvent::Disconnected { epoch, reason } => self.on_disconnected(epoch, reason),
            ConnectionEvent::Reconnecting { attempt, delay } => {
                let _ = self
                    .client_events_tx
                    .send(ClientEvent::Reconnecting { attempt, delay });
                Flow::Continue
            }
            ConnectionEvent::GaveUp { reason } => {
                error!("{reason}");
                self.close(ClientError::ConnectionClosed(reason));
                Flow::Stop
            }
        }
    }

    fn handle_message(&mut self, message: ControlMessage) -> Flow {
        match message {
            ControlMessage::Submit(mut command) => {
                command.seq = self.take_seq();
                self.submit(Outbound::Single(command));
                Flow::Continue
            }
            ControlMessage::Exec(mut batch) => {
                batch.seq = self.take_seq();
                self.submit(Outbound::Transaction(batch));
                Flow::Continue
            }
            ControlMessage::Quit(mut command) => {
                command.seq = self.take_seq();
                if self.state.is_ready() {
                    self.quitting = true;
                    self.write_outbound(Outbound::Single(command));
                    Flow::Continue
                } else {
                    command.resolve(RespValue::SimpleString("OK".into()));
                    self.close(ClientError::ConnectionClosed(
                        "Connection is closed.".to_string(),
                    ));
                    Flow::Stop
                }
            }
            ControlMessage::SetOptions(options) => {
                debug!("Queue options updated: {options:?}");
                self.options = options;
                self.offline.set_limit(options.offline_queue_limit);
                Flow::Continue
            }
            ControlMessage::Close => {
                self.close(ClientError::ConnectionClosed(
                    "Connection is closed.".to_string(),
                ));
                Flow::Stop
            }
        }
    }

    fn take_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Routes newly submitted work: straight to the wire when ready, otherwise
    /// to the offline queue if it is enabled, otherwise rejected.
    fn submit(&mut self, item: Outbound) {
        match self.state {
            ConnectionState::Ready => self.write_outbound(item),
            ConnectionState::Closed => {
                item.reject(ClientError::ConnectionClosed("Connection is closed.".to_string()))
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                if !self.options.enable_offline_queue {
                    item.reject(ClientError::QueueRejected(
                        "Stream isn't writeable and enableOfflineQueue options is false"
                            .to_string(),
                    ));
                    return;
                }
                match self.offline.push(item) {
                    Ok(()) => debug!(
                        "Queued command while {} ({} waiting).",
                        self.state,
                        self.offline.len()
                    ),
                    Err(item) => item.reject(ClientError::QueueRejected(format!(
                        "offline queue is full ({} commands)",
                        self.options.offline_queue_limit
                    ))),
                }
            }
        }
    }

    /// Encodes the work into the outgoing buffer and gives it its reply slot.
    /// The slot is taken before the bytes leave, so a reply can never arrive
    /// for a command the FIFO does not know about.
    fn write_outbound(&mut self, item: Outbound) {
        let (frames, entry) = match item {
            Outbound::Single(command) => {
                let frames = vec![command.command.to_frame()];
                (frames, PendingEntry::single(command, self.epoch))
            }
            Outbound::Transaction(batch) => {
                let frames = batch.frames();
                (frames, PendingEntry::transaction(batch, self.epoch))
            }
        };

        match self.matcher.enqueue(entry) {
            Ok(()) => {
                for frame in &frames {
                    frame.write_to(&mut self.out);
                }
            }
            Err(entry) => {
                warn!("Reply queue is sealed; returning command to the offline queue.");
                self.offline.push_front_all(vec![entry.into_outbound()]);
            }
        }
    }

    /// Hands buffered requests to the socket. A failed write is a lost connection.
    async fn flush(&mut self) {
        if self.out.is_empty() {
            return;
        }
        let Some(writer) = self.writer.as_mut() else {
            // Nothing can be in the buffer without a writer; the entries behind
            // these bytes were already reconciled on disconnect.
            self.out.clear();
            return;
        };
        let buf = self.out.split().freeze();
        let result = async {
            writer.write_all(&buf).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            warn!("Write to connection {} failed: {e}", self.epoch);
            self.reset_connection(format!("write failed: {e}"));
        }
    }

    fn on_connected(&mut self, epoch: ConnectionEpoch, writer: BoxedWriter) -> Flow {
        if self.state.is_closed() {
            return Flow::Stop;
        }
        let previous = self.state;
        self.epoch = epoch;
        self.writer = Some(writer);
        self.out.clear();
        let _ = self.client_events_tx.send(ClientEvent::Connected { epoch });

        self.set_state(ConnectionState::Ready);
        self.matcher.open();

        let mut pending = Vec::with_capacity(self.offline.len());
        let flushed = self.offline.drain_to(|item| pending.push(item));
        for item in pending {
            self.write_outbound(item);
        }
        if previous == ConnectionState::Reconnecting {
            info!("Reconnected (epoch {epoch}); sending {flushed} queued commands.");
        } else {
            info!("Connection ready (epoch {epoch}); sending {flushed} queued commands.");
        }
        let _ = self.client_events_tx.send(ClientEvent::Ready { epoch });
        Flow::Continue
    }

    fn on_frame(&mut self, epoch: ConnectionEpoch, frame: RespFrame) -> Flow {
        if epoch != self.epoch || !self.state.is_ready() {
            debug!(
                "Dropping reply from stale connection {epoch} (current {}).",
                self.epoch
            );
            return Flow::Continue;
        }
        if let Err(e) = self.matcher.on_reply(epoch, frame) {
            error!("{e}; resetting connection {}.", self.epoch);
            self.reset_connection(e.to_string());
        }
        Flow::Continue
    }

    fn on_disconnected(&mut self, epoch: ConnectionEpoch, reason: String) -> Flow {
        if epoch != self.epoch || !self.state.is_ready() {
            debug!("Ignoring disconnect of connection {epoch}: already handled.");
            return Flow::Continue;
        }
        if self.quitting {
            self.close(ClientError::ConnectionClosed("Connection is closed.".to_string()));
            return Flow::Stop;
        }
        self.enter_reconnecting(reason);
        Flow::Continue
    }

    /// Tears down the current connection from this side and reconciles as if
    /// the peer had dropped it.
    fn reset_connection(&mut self, reason: String) {
        let _ = self.reset_tx.send(self.epoch);
        if self.quitting {
            self.close(ClientError::ConnectionClosed(reason));
            return;
        }
        if self.state.is_ready() {
            self.enter_reconnecting(reason);
        }
    }

    /// `ready -> reconnecting`. Nothing written on the lost connection can be
    /// answered any more, so the reply FIFO is emptied here: unanswered single
    /// commands go back to the front of the offline queue when resend is
    /// enabled and fail otherwise. Transactions always fail as a whole.
    fn enter_reconnecting(&mut self, reason: String) {
        let epoch = self.epoch;
        self.writer = None;
        self.out.clear();
        self.matcher.seal();
        self.set_state(ConnectionState::Reconnecting);
        let _ = self.client_events_tx.send(ClientEvent::Disconnected {
            epoch,
            reason: reason.clone(),
        });

        let entries = self.matcher.take_all();
        let mut resend = Vec::new();
        let mut failed = 0;
        let mut aborted_transactions = 0;
        for entry in entries {
            match entry {
                PendingEntry::Single { command, .. }
                    if self.options.auto_resend_unfulfilled_commands =>
                {
                    resend.push(Outbound::Single(command));
                }
                PendingEntry::Single { command, .. } => {
                    failed += 1;
                    command.reject(ClientError::ConnectionClosed(reason.clone()));
                }
                PendingEntry::Transaction { transaction, .. } => {
                    aborted_transactions += 1;
                    transaction.reject(ClientError::ConnectionClosed(format!(
                        "transaction aborted: {reason}"
                    )));
                }
            }
        }

        let resent = resend.len();
        self.offline.push_front_all(resend);
        info!(
            "Connection {epoch} lost ({reason}): {resent} commands queued for resend, {failed} failed, {aborted_transactions} transactions aborted, {} waiting in total.",
            self.offline.len()
        );
    }

    /// `any -> closed`. Rejects everything outstanding and stops the supervisor.
    fn close(&mut self, err: ClientError) {
        if self.state.is_closed() {
            return;
        }
        self.matcher.seal();
        self.out.clear();
        let in_flight = self.matcher.on_fatal_disconnect(err.clone());
        let queued = self.offline.reject_all(err);
        self.set_state(ConnectionState::Closed);
        let _ = self.shutdown_tx.send(());
        let _ = self.client_events_tx.send(ClientEvent::Closed);
        info!("Connection closed: rejected {in_flight} in-flight and {queued} queued commands.");
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("Connection state: {} -> {}", self.state, state);
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }
}
