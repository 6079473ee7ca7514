//! Registry of live client connections.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track every open client connection for coordinated shutdown
//! - Force-close all remaining sessions on request
//!
//! # Design Decisions
//! - Entries are removed by a guard on drop, so a panicking session still deregisters
//! - Force-close is a notification: the owning session closes its own sockets
//! - Notifications are latched, so a session that is between reads still sees them

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
struct Entry {
    peer: SocketAddr,
    closer: Arc<Notify>,
}

/// Process-wide set of open client connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    entries: Arc<DashMap<ConnectionId, Entry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly accepted client connection. Returns a guard that deregisters on drop.
    pub fn register(&self, peer: SocketAddr) -> ConnectionGuard {
        let id = ConnectionId::new();
        let closer = Arc::new(Notify::new());
        self.entries.insert(
            id,
            Entry {
                peer,
                closer: Arc::clone(&closer),
            },
        );
        metrics::set_active_connections(self.entries.len());
        tracing::trace!(connection_id = %id, peer_addr = %peer, "Connection registered");

        ConnectionGuard {
            id,
            peer,
            closer,
            entries: Arc::clone(&self.entries),
        }
    }

    /// Number of registered connections.
    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    /// Peer addresses of every registered connection.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.entries.iter().map(|entry| entry.peer).collect()
    }

    /// Ask every registered session to close its sockets. Returns how many were notified.
    pub fn close_all(&self) -> usize {
        let mut notified = 0;
        for entry in self.entries.iter() {
            entry.closer.notify_one();
            notified += 1;
        }
        notified
    }
}

/// Guard that tracks a client connection's lifetime.
/// Removes the registry entry when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: ConnectionId,
    peer: SocketAddr,
    closer: Arc<Notify>,
    entries: Arc<DashMap<ConnectionId, Entry>>,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Resolves once the registry asks this connection to close.
    pub async fn close_requested(&self) {
        self.closer.notified().await
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.entries.remove(&self.id);
        metrics::set_active_connections(self.entries.len());
        tracing::trace!(connection_id = %self.id, "Connection deregistered");
    }
}
