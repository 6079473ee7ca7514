//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! Client connection
//!     → session.rs (per-connection state machine)
//!         → framing reader (request from client)
//!         → target.rs (origin hostname, scheme check)
//!         → upstream.rs (reuse or open origin connection)
//!         → framing reader (response from origin)
//!     → Response written back to client
//! ```
//!
//! # Design Decisions
//! - One outstanding request per session; no pipelining toward the origin
//! - Every failure ends the session; nothing is retried
//! - Teardown is best-effort and never fails

pub mod session;
pub mod target;
pub mod upstream;

pub use session::{RelaySession, TerminateReason};
pub use upstream::{Connector, TcpConnector, UpstreamSlot};

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Shut down the write half of a stream, ignoring any error.
///
/// Used for every socket close: an already closed or reset socket is not a failure.
pub async fn close_quietly<S: AsyncWrite + Unpin>(stream: &mut S) {
    if let Err(e) = stream.shutdown().await {
        tracing::trace!(error = %e, "Ignoring close error");
    }
}
