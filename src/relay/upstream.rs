//! Origin connection management.
//!
//! # Responsibilities
//! - Open origin connections through a [`Connector`]
//! - Hold at most one origin connection per session, tagged with its hostname
//! - Decide between reusing and replacing that connection per request
//!
//! # Design Decisions
//! - Reuse requires persistence to be on and an exact hostname match
//! - Replacing a connection always closes the old one first
//! - Close errors are ignored

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::http::framing::{FramingOptions, FramingReader};
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::relay::close_quietly;

/// Opens byte streams to origin servers.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(&self, host: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP connector targeting one fixed port on every host.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    port: u16,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        Self { port, connect_timeout }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, host: &str) -> impl Future<Output = io::Result<TcpStream>> + Send {
        let addr = (host.to_string(), self.port);
        let deadline = self.connect_timeout;
        async move {
            let stream = tokio::time::timeout(deadline, TcpStream::connect(addr))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
    }
}

/// An open origin connection.
#[derive(Debug)]
pub struct UpstreamConnection<S> {
    id: ConnectionId,
    host: String,
    reader: FramingReader<S>,
}

impl<S> UpstreamConnection<S> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Hostname this connection was opened for.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn reader(&mut self) -> &mut FramingReader<S> {
        &mut self.reader
    }
}

/// The single origin connection slot of a relay session.
pub struct UpstreamSlot<C: Connector> {
    connector: Arc<C>,
    options: FramingOptions,
    current: Option<UpstreamConnection<C::Stream>>,
}

impl<C: Connector> UpstreamSlot<C> {
    pub fn new(connector: Arc<C>, options: FramingOptions) -> Self {
        Self {
            connector,
            options,
            current: None,
        }
    }

    /// Connection for `host`, reusing the open one when `reuse` is set and the host matches.
    pub async fn acquire(
        &mut self,
        host: &str,
        reuse: bool,
    ) -> io::Result<&mut UpstreamConnection<C::Stream>> {
        let reusable = reuse && self.current.as_ref().is_some_and(|conn| conn.host == host);

        if reusable {
            tracing::trace!(host, "Reusing origin connection");
        } else {
            self.release().await;
            let stream = self.connector.connect(host).await?;
            metrics::record_upstream_connect();
            let conn = UpstreamConnection {
                id: ConnectionId::new(),
                host: host.to_string(),
                reader: FramingReader::new(stream, self.options),
            };
            tracing::debug!(connection_id = %conn.id, host, "Origin connection opened");
            self.current = Some(conn);
        }

        self.current
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no origin connection"))
    }

    pub fn current_mut(&mut self) -> Option<&mut UpstreamConnection<C::Stream>> {
        self.current.as_mut()
    }

    /// Close the open connection, if any.
    pub async fn release(&mut self) {
        if let Some(mut conn) = self.current.take() {
            close_quietly(conn.reader.get_mut()).await;
            tracing::debug!(connection_id = %conn.id(), host = conn.host(), "Origin connection closed");
        }
    }
}
