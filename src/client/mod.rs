// src/client/mod.rs

//! The public entry point: a cheaply cloneable `Client` handle.
//!
//! Every handle talks to the same controller task, which owns the connection
//! and the command queues. Submitting never blocks; each call returns a
//! future that settles exactly once.

mod reply;
mod transaction;

pub use reply::{ExecFuture, ReplyFuture};
pub use transaction::Transaction;

use crate::config::{ClientConfig, QueueOptions};
use crate::connection::{
    ClientEvent, ConnectionState, Connector, ControlMessage, Controller, Supervisor, TcpConnector,
};
use crate::core::commands::PendingCommand;
use crate::core::queue::TransactionBatch;
use crate::core::{ClientError, Command};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::debug;

// Capacity of the lifecycle event channel; slow subscribers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    control_tx: mpsc::UnboundedSender<ControlMessage>,
    state_rx: watch::Receiver<ConnectionState>,
    events_tx: broadcast::Sender<ClientEvent>,
    /// Set while a `Transaction` handle is open on this client.
    transaction_open: AtomicBool,
}

impl Client {
    /// Starts a client for the TCP address in `config`. Must be called from
    /// within a Tokio runtime. Returns immediately; commands submitted before
    /// the connection is ready are queued according to `config.queue`.
    pub fn new(config: ClientConfig) -> Self {
        let connector = TcpConnector::new(config.address(), config.connect_timeout);
        Self::with_connector(config, Arc::new(connector))
    }

    /// Starts a client over a custom transport.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (reset_tx, reset_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (client_events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        debug!("Starting client for {}", connector.describe());
        let supervisor = Supervisor::new(
            connector,
            config.reconnect.clone(),
            events_tx,
            reset_rx,
            shutdown_rx,
        );
        let controller = Controller::new(
            config.queue,
            control_rx,
            events_rx,
            reset_tx,
            shutdown_tx,
            state_tx,
            client_events_tx.clone(),
        );
        tokio::spawn(supervisor.run());
        tokio::spawn(controller.run());

        Self {
            inner: Arc::new(ClientInner {
                control_tx,
                state_rx,
                events_tx: client_events_tx,
                transaction_open: AtomicBool::new(false),
            }),
        }
    }

    /// Submits a command. The returned future resolves with its reply, or
    /// rejects with a `ClientError` naming why it could not be fulfilled.
    pub fn send(&self, command: Command) -> ReplyFuture {
        if command.is_transaction_control() {
            return ReplyFuture::ready(Err(ClientError::InvalidRequest(format!(
                "'{}' must be issued through Client::multi",
                command.name()
            ))));
        }
        let (pending, rx) = PendingCommand::with_channel(command);
        self.dispatch(ControlMessage::Submit(pending));
        ReplyFuture::new(rx)
    }

    pub fn ping(&self, message: Option<&str>) -> ReplyFuture {
        self.send(Command::ping(message))
    }

    pub fn echo(&self, message: impl Into<Bytes>) -> ReplyFuture {
        self.send(Command::echo(message))
    }

    pub fn get(&self, key: impl Into<Bytes>) -> ReplyFuture {
        self.send(Command::get(key))
    }

    pub fn set(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> ReplyFuture {
        self.send(Command::set(key, value))
    }

    pub fn del<I, K>(&self, keys: I) -> ReplyFuture
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        self.send(Command::del(keys))
    }

    /// Opens a transaction. Commands staged on the returned handle are sent as
    /// one `MULTI ... EXEC` block when it is executed.
    ///
    /// A client has at most one open transaction. Until the handle is
    /// executed, discarded or dropped, further calls fail with
    /// `ClientError::InvalidState`.
    pub fn multi(&self) -> Result<Transaction, ClientError> {
        Transaction::begin(self.clone())
    }

    /// Replaces the queueing policy. Takes effect from the next decision the
    /// controller makes (next submission or next disconnect).
    pub fn set_options(&self, options: QueueOptions) {
        let _ = self.inner.control_tx.send(ControlMessage::SetOptions(options));
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    /// Subscribes to lifecycle events from now on.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Waits until the connection is ready. Fails if the client closes first.
    pub async fn wait_until_ready(&self) -> Result<(), ClientError> {
        let mut state_rx = self.inner.state_rx.clone();
        let state = state_rx
            .wait_for(|s| s.is_ready() || s.is_closed())
            .await
            .map_err(|_| ClientError::ConnectionClosed("client stopped".to_string()))?;
        if state.is_ready() {
            Ok(())
        } else {
            Err(ClientError::ConnectionClosed("Connection is closed.".to_string()))
        }
    }

    /// Sends `QUIT` and closes the client once the server acknowledges it.
    /// Work still outstanding when the connection ends is rejected.
    pub async fn quit(&self) -> Result<(), ClientError> {
        let (pending, rx) = PendingCommand::with_channel(Command::new("QUIT"));
        self.dispatch(ControlMessage::Quit(pending));
        let result = ReplyFuture::new(rx).await;
        self.close();
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_connection_error() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Closes the client immediately, rejecting all outstanding work with
    /// `ConnectionClosed`.
    pub fn close(&self) {
        let _ = self.inner.control_tx.send(ControlMessage::Close);
    }

    pub(crate) fn claim_transaction(&self) -> bool {
        self.inner
            .transaction_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_transaction(&self) {
        self.inner.transaction_open.store(false, Ordering::Release);
    }

    pub(crate) fn submit_transaction(&self, batch: TransactionBatch) {
        self.dispatch(ControlMessage::Exec(batch));
    }

    /// Hands a message to the controller. If the controller has stopped, the
    /// message is dropped and its futures resolve with `ConnectionClosed`.
    fn dispatch(&self, message: ControlMessage) {
        if self.inner.control_tx.send(message).is_err() {
            debug!("Client is closed; dropping request.");
        }
    }
}
