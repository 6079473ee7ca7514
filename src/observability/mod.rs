//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions and the server loop produce:
//!     → logging.rs (structured log events, one per exchange)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```

pub mod logging;
pub mod metrics;
