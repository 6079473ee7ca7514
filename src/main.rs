//! forward-proxy binary.
//!
//! ```text
//! forward-proxy [--config <path>] <port> [-mt] [-pc]
//! ```

use clap::Parser;

use forward_proxy::cli::Cli;
use forward_proxy::config::loader::read_config;
use forward_proxy::config::ProxyConfig;
use forward_proxy::lifecycle::startup;
use forward_proxy::observability::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);

    init_logging(&config.observability.log_filter);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream_port = config.upstream.port,
        idle_timeout_secs = config.timeouts.idle_secs,
        "forward-proxy starting"
    );

    startup::run(config).await?;
    Ok(())
}
