//! Forwarding HTTP/1.1 proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                    FORWARD PROXY                      │
//!   Client        │  ┌──────────┐   ┌──────────────┐   ┌──────────────┐  │
//!   ──────────────┼─▶│   net    │──▶│    server    │──▶│ relay        │  │
//!                 │  │ listener │   │ accept loop  │   │ session      │  │
//!                 │  └──────────┘   └──────┬───────┘   └──────┬───────┘  │
//!                 │                        │                  │          │
//!                 │                 ┌──────▼───────┐   ┌──────▼───────┐  │   Origin
//!                 │                 │ net registry │   │ http framing │◀─┼─────────▶
//!                 │                 └──────────────┘   └──────────────┘  │   :80
//!                 │                                                       │
//!                 │  config · context · lifecycle · observability · cli   │
//!                 └──────────────────────────────────────────────────────┘
//! ```
//!
//! Requests arrive in absolute form (`GET http://host/path HTTP/1.1`). Each
//! one is forwarded verbatim apart from the `Proxy-Connection` and
//! `Connection` headers. Chunked bodies are reassembled and re-emitted with
//! `Content-Length` framing.

// Core
pub mod http;
pub mod net;
pub mod relay;
pub mod server;

// Shared state and configuration
pub mod cli;
pub mod config;
pub mod context;
pub mod error;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use context::ProxyContext;
pub use error::{FramingError, ProxyError};
pub use http::{FramingReader, Message};
pub use lifecycle::Shutdown;
pub use server::ProxyServer;
