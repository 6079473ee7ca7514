//! Accept loop and session dispatch.
//!
//! # Responsibilities
//! - Accept client connections and register them
//! - Hand each connection to a [`RelaySession`] according to the dispatch mode
//! - Drain and then force-close sessions on shutdown; abort any that still linger
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → ConnectionRegistry::register (guard)
//!     → RelaySession::run  (JoinSet task)
//!
//! Inline:     accept → await session → accept → ...
//! Concurrent: accept → spawn → accept → ...
//! ```
//!
//! # Design Decisions
//! - Both modes run sessions on the JoinSet so shutdown can observe them
//! - Inline mode stops polling the listener while a session is live
//! - Accept failures are logged and the loop keeps going

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::{JoinError, JoinSet};

use crate::config::DispatchMode;
use crate::context::ProxyContext;
use crate::lifecycle::ShutdownListener;
use crate::net::Listener;
use crate::relay::{Connector, RelaySession, TcpConnector, TerminateReason};

/// How long force-closed sessions get to tear down before their tasks are aborted.
const FORCE_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// The forwarding proxy server.
pub struct ProxyServer<C: Connector = TcpConnector> {
    ctx: Arc<ProxyContext>,
    connector: Arc<C>,
}

impl ProxyServer<TcpConnector> {
    /// Server that reaches origins over TCP on the configured upstream port.
    pub fn new(ctx: Arc<ProxyContext>) -> Self {
        let config = ctx.config();
        let connector = TcpConnector::new(
            config.upstream.port,
            Duration::from_secs(config.timeouts.connect_secs),
        );
        Self::with_connector(ctx, Arc::new(connector))
    }
}

impl<C: Connector> ProxyServer<C> {
    pub fn with_connector(ctx: Arc<ProxyContext>, connector: Arc<C>) -> Self {
        Self { ctx, connector }
    }

    /// Serve until `shutdown` fires, then drain. The listener is closed on return.
    pub async fn run(&self, listener: Listener, mut shutdown: ShutdownListener) {
        let inline = self.ctx.dispatch() == DispatchMode::Inline;
        let mut sessions = JoinSet::new();

        loop {
            if inline && !sessions.is_empty() {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break,
                    Some(joined) = sessions.join_next() => reap(joined),
                }
                continue;
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => reap(joined),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(&mut sessions, stream, peer),
                    Err(e) => tracing::warn!(error = %e, "Accept failed"),
                },
            }
        }

        drop(listener);
        self.drain(sessions).await;
    }

    fn spawn_session(
        &self,
        sessions: &mut JoinSet<TerminateReason>,
        stream: TcpStream,
        peer: SocketAddr,
    ) {
        let _ = stream.set_nodelay(true);
        let guard = self.ctx.registry().register(peer);
        tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, "Session started");

        let session = RelaySession::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.connector),
            stream,
            guard,
        );
        sessions.spawn(session.run());
    }

    async fn drain(&self, mut sessions: JoinSet<TerminateReason>) {
        self.ctx.stop();
        tracing::info!(active = sessions.len(), "Stopped accepting, draining sessions");

        let deadline = Duration::from_secs(self.ctx.config().timeouts.drain_secs);
        let drained = tokio::time::timeout(deadline, async {
            while let Some(joined) = sessions.join_next().await {
                reap(joined);
            }
        })
        .await;

        if drained.is_err() {
            let peers = self.ctx.registry().peers();
            let closed = self.ctx.registry().close_all();
            tracing::warn!(closed, peers = ?peers, "Drain deadline passed, force-closing sessions");

            let closed_in_time = tokio::time::timeout(FORCE_CLOSE_GRACE, async {
                while let Some(joined) = sessions.join_next().await {
                    reap(joined);
                }
            })
            .await;
            if closed_in_time.is_err() {
                tracing::error!(remaining = sessions.len(), "Sessions ignored force-close, aborting");
                sessions.shutdown().await;
            }
        }

        tracing::info!("All sessions closed");
    }
}

fn reap(joined: Result<TerminateReason, JoinError>) {
    match joined {
        Ok(reason) => tracing::trace!(reason = %reason, "Session finished"),
        Err(e) => tracing::error!(error = %e, "Session task failed"),
    }
}
