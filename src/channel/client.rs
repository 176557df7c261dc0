use super::backoff::ReconnectPolicy;
use super::message::{names, Envelope, Outbound};
use super::transport::Connector;
use crate::config::ChannelConfig;
use crate::error::ChannelError;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Callback for one inbound message name
pub type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}

/// Persistent, auto-reconnecting duplex channel to the recognition service.
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct ChannelClient {
    status: Arc<watch::Sender<ConnectionStatus>>,
    writer: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    handlers: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    max_frame_bytes: usize,
}

impl ChannelClient {
    pub fn new(max_frame_bytes: usize) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            status: Arc::new(status),
            writer: Arc::new(Mutex::new(None)),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
            task: Arc::new(Mutex::new(None)),
            max_frame_bytes,
        }
    }

    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.max_frame_bytes)
    }

    /// Register a handler for `name`. Handlers for the same name run in the
    /// order they were registered.
    pub fn on<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(name.to_string())
            .or_default()
            .push(Arc::new(handler));
        debug!("Registered handler for '{}'", name);
    }

    /// Start the connection loop. Calling again while it runs is a no-op.
    pub fn start<C: Connector>(&self, connector: C, policy: ReconnectPolicy) {
        let mut task = self.task.lock();
        if task.is_some() {
            debug!("Channel already started");
            return;
        }

        let worker = ConnectionWorker {
            status: Arc::clone(&self.status),
            writer: Arc::clone(&self.writer),
            handlers: Arc::clone(&self.handlers),
            cancel: self.cancel.clone(),
            max_frame_bytes: self.max_frame_bytes,
        };

        *task = Some(tokio::spawn(worker.run(connector, policy)));
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Queue a request for the live connection
    pub fn send(&self, outbound: &Outbound) -> Result<(), ChannelError> {
        let envelope = outbound.to_envelope().map_err(|e| ChannelError::Malformed {
            details: e.to_string(),
        })?;
        self.send_envelope(&envelope)
    }

    pub fn send_envelope(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        let line = envelope.to_line().map_err(|e| ChannelError::Malformed {
            details: e.to_string(),
        })?;

        let writer = self.writer.lock();
        let tx = writer.as_ref().ok_or(ChannelError::NotConnected)?;
        tx.send(line).map_err(|_| ChannelError::NotConnected)?;

        trace!("Queued '{}' {:?}", envelope.event, envelope.correlation_id);
        Ok(())
    }

    /// Stop the connection loop and close the stream
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Channel task ended abnormally: {}", e);
            }
        }
        *self.writer.lock() = None;
        self.status.send_replace(ConnectionStatus::Disconnected);
        info!("Channel shut down");
    }
}

struct ConnectionWorker {
    status: Arc<watch::Sender<ConnectionStatus>>,
    writer: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    handlers: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
    cancel: CancellationToken,
    max_frame_bytes: usize,
}

impl ConnectionWorker {
    async fn run<C: Connector>(self, connector: C, mut policy: ReconnectPolicy) {
        let address = connector.address();
        info!("Channel connecting to {}", address);

        loop {
            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = connector.connect() => result,
            };

            match attempt {
                Ok(stream) => {
                    policy.reset();
                    self.serve(stream, &address).await;
                }
                Err(e) => warn!("{}", e),
            }

            if self.cancel.is_cancelled() {
                break;
            }

            let delay = policy.next_delay();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!("Channel loop for {} stopped", address);
    }

    async fn serve<S>(&self, stream: S, address: &str)
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(self.max_frame_bytes));
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        *self.writer.lock() = Some(tx);
        self.status.send_replace(ConnectionStatus::Connected);
        info!("Connected to recognition service at {}", address);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                Some(line) = rx.recv() => {
                    if let Err(e) = framed.send(line).await {
                        warn!("Write to {} failed: {}", address, e);
                        break;
                    }
                }

                frame = framed.next() => match frame {
                    Some(Ok(line)) => self.dispatch(&line),
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!("Dropping frame over {} bytes", self.max_frame_bytes);
                    }
                    Some(Err(e)) => {
                        warn!("Read from {} failed: {}", address, e);
                        break;
                    }
                    None => {
                        info!("Recognition service closed the connection");
                        break;
                    }
                },
            }
        }

        // Requests still queued for this connection are dropped with it
        *self.writer.lock() = None;
        self.status.send_replace(ConnectionStatus::Disconnected);
        info!("Disconnected from {}", address);
    }

    fn dispatch(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        let envelope = match Envelope::from_line(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return;
            }
        };

        if envelope.event == names::CONNECTION_RESPONSE {
            debug!("Service handshake: {}", envelope.data);
        }

        // Clone out so handlers may register further handlers
        let handlers = self
            .handlers
            .read()
            .get(&envelope.event)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!("No handler for '{}'", envelope.event);
            return;
        }

        trace!(
            "Dispatching '{}' {:?} to {} handler(s)",
            envelope.event,
            envelope.correlation_id,
            handlers.len()
        );
        for handler in handlers {
            handler(&envelope);
        }
    }
}
