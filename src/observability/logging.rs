//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Emit one event per completed or rejected exchange
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured filter
//! - Exchange lines carry the counter so concurrent sessions can be told apart

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::http::message::{Message, CONTENT_LENGTH, CONTENT_TYPE};

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Log a relayed request/response pair.
pub fn log_exchange(exchange: u64, client: SocketAddr, request: &Message, response: &Message) {
    tracing::info!(
        exchange,
        client = %client,
        request = request.start_line(),
        response = response.start_line(),
        content_type = response.header(CONTENT_TYPE),
        content_length = response.header(CONTENT_LENGTH),
        "Exchange relayed"
    );
}

/// Log a request refused because its target is not plain HTTP.
pub fn log_rejected(exchange: u64, client: SocketAddr, request: &Message) {
    tracing::warn!(
        exchange,
        client = %client,
        request = request.start_line(),
        "Unsupported scheme, closing connection"
    );
}
