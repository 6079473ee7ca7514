//! Process-wide proxy state shared by the server loop and every session.
//!
//! # Responsibilities
//! - Own the validated configuration
//! - Hold the running flag checked by sessions between exchanges
//! - Number exchanges for log correlation
//! - Own the registry of live client connections
//!
//! # Design Decisions
//! - Shared via `Arc`; all mutable state is atomic or internally synchronized
//! - Nothing here is global: tests build as many contexts as they like

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::{DispatchMode, ProxyConfig};
use crate::http::framing::FramingOptions;
use crate::net::ConnectionRegistry;

#[derive(Debug)]
pub struct ProxyContext {
    config: ProxyConfig,
    running: AtomicBool,
    exchange_counter: AtomicU64,
    registry: ConnectionRegistry,
}

impl ProxyContext {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(true),
            exchange_counter: AtomicU64::new(1),
            registry: ConnectionRegistry::new(),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Whether client and origin connections are kept open across exchanges.
    pub fn persistent(&self) -> bool {
        self.config.proxy.persistent_connections
    }

    pub fn dispatch(&self) -> DispatchMode {
        self.config.proxy.dispatch
    }

    pub fn framing_options(&self) -> FramingOptions {
        FramingOptions::from(&self.config)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clear the running flag. Sessions finish their current exchange and stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Next exchange number, starting at 1.
    pub fn next_exchange(&self) -> u64 {
        self.exchange_counter.fetch_add(1, Ordering::Relaxed)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}
