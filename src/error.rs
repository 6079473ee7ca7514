//! Error taxonomy.
//!
//! # Responsibilities
//! - Framing errors raised while reading a message off a socket
//! - Process-level errors raised during startup
//!
//! # Design Decisions
//! - Every framing error terminates the session that hit it; there is no
//!   partial recovery and no error response is written to the client
//! - Close errors are never represented here: teardown ignores them

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::net::listener::ListenerError;

/// Errors produced while reading one HTTP message from a stream.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Underlying socket error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the stream while a message was expected.
    #[error("peer disconnected")]
    Disconnected,

    /// No bytes arrived within the idle timeout.
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// The buffer holds no `\r\n` after the start line or no `\r\n\r\n` after the headers.
    #[error("missing header separator")]
    MissingHeaderSeparator,

    /// A header line has no `:` or the header block is not valid UTF-8.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// A chunk size line is not a hexadecimal number.
    #[error("invalid chunk size: {0:?}")]
    InvalidChunkSize(String),

    /// A chunk payload is not terminated by CRLF.
    #[error("chunk payload not terminated by CRLF")]
    MalformedChunk,

    /// The `Content-Length` header is not a non-negative integer.
    #[error("invalid content length: {0:?}")]
    InvalidContentLength(String),

    /// The header section grew past the configured limit.
    #[error("header section exceeds {0} bytes")]
    HeaderTooLarge(usize),
}

impl FramingError {
    /// Whether this error is a transport failure rather than a malformed message.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FramingError::Io(_) | FramingError::Disconnected | FramingError::Timeout(_)
        )
    }
}

/// Errors that stop the proxy process.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The listening socket could not be set up.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Other socket error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
