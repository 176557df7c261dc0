use crate::config::ChannelConfig;
use crate::error::ChannelError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

/// Opens byte streams to the recognition service
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self) -> Result<Self::Stream, ChannelError>;

    /// Human-readable endpoint for logs
    fn address(&self) -> String;
}

pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl From<&ChannelConfig> for TcpConnector {
    fn from(config: &ChannelConfig) -> Self {
        Self::new(config.address())
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream, ChannelError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| ChannelError::Connect {
                address: self.address.clone(),
                details: e.to_string(),
            })?;
        // Frames are small and latency matters more than batching
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY on {}: {}", self.address, e);
        }
        Ok(stream)
    }

    fn address(&self) -> String {
        self.address.clone()
    }
}

/// In-process connector. Each connect hands the far end of a fresh duplex
/// pipe to the paired [`DuplexServer`].
pub struct DuplexConnector {
    incoming: mpsc::UnboundedSender<DuplexStream>,
    refusing: Arc<AtomicBool>,
    buffer_size: usize,
}

pub struct DuplexServer {
    incoming: mpsc::UnboundedReceiver<DuplexStream>,
    refusing: Arc<AtomicBool>,
}

impl DuplexConnector {
    pub fn pair(buffer_size: usize) -> (DuplexConnector, DuplexServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let refusing = Arc::new(AtomicBool::new(false));
        (
            DuplexConnector {
                incoming: tx,
                refusing: Arc::clone(&refusing),
                buffer_size,
            },
            DuplexServer {
                incoming: rx,
                refusing,
            },
        )
    }
}

#[async_trait]
impl Connector for DuplexConnector {
    type Stream = DuplexStream;

    async fn connect(&self) -> Result<DuplexStream, ChannelError> {
        if self.refusing.load(Ordering::SeqCst) {
            return Err(ChannelError::Connect {
                address: self.address(),
                details: "connection refused".to_string(),
            });
        }

        let (client, server) = tokio::io::duplex(self.buffer_size);
        self.incoming
            .send(server)
            .map_err(|_| ChannelError::Connect {
                address: self.address(),
                details: "server side dropped".to_string(),
            })?;
        Ok(client)
    }

    fn address(&self) -> String {
        "duplex".to_string()
    }
}

impl DuplexServer {
    /// Next connection opened by the client
    pub async fn accept(&mut self) -> Option<DuplexStream> {
        self.incoming.recv().await
    }

    /// Refuse (or stop refusing) further connection attempts
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}
