//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → registry.rs (registered for coordinated shutdown)
//!     → Hand off to a relay session
//! ```
//!
//! # Design Decisions
//! - Each client connection is registered so shutdown can force-close it
//! - No bound on concurrent connections; dispatch mode decides concurrency

pub mod listener;
pub mod registry;

pub use listener::{Listener, ListenerError};
pub use registry::{ConnectionGuard, ConnectionId, ConnectionRegistry};
