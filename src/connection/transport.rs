// src/connection/transport.rs

//! The transport seam: something that can open a fresh byte stream to the
//! server. The rest of the client only ever sees boxed read/write halves.

use crate::core::ClientError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Opens connections to the server. Called once for the initial connect and
/// again for every reconnection attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<(BoxedReader, BoxedWriter), ClientError>;

    /// A human-readable description of the target, used in logs.
    fn describe(&self) -> String;
}

/// Plain TCP connector with a connect timeout.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<(BoxedReader, BoxedWriter), ClientError> {
        let stream =
            tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
                .await
                .map_err(|_| {
                    ClientError::ConnectionClosed(format!(
                        "connect to {} timed out after {:?}",
                        self.address, self.connect_timeout
                    ))
                })??;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok((Box::new(reader), Box::new(writer)))
    }

    fn describe(&self) -> String {
        self.address.clone()
    }
}
