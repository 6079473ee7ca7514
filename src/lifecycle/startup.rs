//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate the final configuration
//! - Initialize metrics before any traffic
//! - Bind the listener and serve until a signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::sync::Arc;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, DispatchMode, ProxyConfig};
use crate::context::ProxyContext;
use crate::error::ProxyError;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::lifecycle::Shutdown;
use crate::net::Listener;
use crate::observability::metrics;
use crate::server::ProxyServer;

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

/// Run the proxy until SIGINT or SIGTERM, then shut down in order.
pub async fn run(config: ProxyConfig) -> Result<(), ProxyError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        port = local_addr.port(),
        multithreading = on_off(config.proxy.dispatch == DispatchMode::Concurrent),
        persistent = on_off(config.proxy.persistent_connections),
        "Proxy listening"
    );

    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(shutdown.clone());

    let ctx = Arc::new(ProxyContext::new(config));
    ProxyServer::new(ctx).run(listener, shutdown.subscribe()).await;

    signals.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_config_fails_before_binding() {
        let mut config = ProxyConfig::default();
        config.limits.read_chunk_size = 0;
        let err = run(config).await.unwrap_err();
        assert!(matches!(err, ProxyError::Config(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = ProxyConfig::default();
        config.listener.bind_address = holder.local_addr().unwrap().to_string();
        let err = run(config).await.unwrap_err();
        assert!(matches!(err, ProxyError::Listener(_)));
    }
}
