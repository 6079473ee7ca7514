//! Command-line interface.
//!
//! ```text
//! forward-proxy [--config <path>] <port> [-mt] [-pc]
//! ```
//!
//! `-mt` runs every session as its own task, `-pc` keeps client and origin
//! connections open across exchanges. Unrecognized trailing tokens are ignored.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{DispatchMode, ProxyConfig};

#[derive(Debug, Parser)]
#[command(name = "forward-proxy", version, about = "Forwarding HTTP/1.1 proxy")]
pub struct Cli {
    /// TOML configuration file. Command-line values override it.
    #[arg(long, env = "FORWARD_PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on.
    pub port: u16,

    /// Mode flags: -mt (concurrent sessions), -pc (persistent connections).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub options: Vec<String>,
}

/// Mode switches given after the port.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModeFlags {
    pub multithreading: bool,
    pub persistent: bool,
}

impl ModeFlags {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = Self::default();
        for token in tokens {
            match token.as_ref() {
                "-mt" => flags.multithreading = true,
                "-pc" => flags.persistent = true,
                _ => {}
            }
        }
        flags
    }
}

impl Cli {
    pub fn mode_flags(&self) -> ModeFlags {
        ModeFlags::from_tokens(&self.options)
    }

    /// Layer command-line values over a loaded configuration.
    ///
    /// Flags only switch modes on; a config file that already enables them stays enabled.
    pub fn apply(&self, config: &mut ProxyConfig) {
        config.listener.set_port(self.port);

        let flags = self.mode_flags();
        if flags.multithreading {
            config.proxy.dispatch = DispatchMode::Concurrent;
        }
        if flags.persistent {
            config.proxy.persistent_connections = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_only_keeps_defaults() {
        let cli = Cli::try_parse_from(["forward-proxy", "8080"]).unwrap();
        let mut config = ProxyConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.proxy.dispatch, DispatchMode::Inline);
        assert!(!config.proxy.persistent_connections);
    }

    #[test]
    fn mode_flags_in_any_order() {
        for args in [
            ["forward-proxy", "3128", "-mt", "-pc"],
            ["forward-proxy", "3128", "-pc", "-mt"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(
                cli.mode_flags(),
                ModeFlags {
                    multithreading: true,
                    persistent: true
                }
            );
        }
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let cli = Cli::try_parse_from(["forward-proxy", "3128", "-x", "extra", "-pc"]).unwrap();
        assert_eq!(
            cli.mode_flags(),
            ModeFlags {
                multithreading: false,
                persistent: true
            }
        );
    }

    #[test]
    fn config_path_is_optional() {
        let cli = Cli::try_parse_from(["forward-proxy", "--config", "proxy.toml", "3128"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("proxy.toml")));
        assert_eq!(cli.port, 3128);
    }

    #[test]
    fn port_is_required_and_numeric() {
        assert!(Cli::try_parse_from(["forward-proxy"]).is_err());
        assert!(Cli::try_parse_from(["forward-proxy", "eighty"]).is_err());
    }

    #[test]
    fn port_override_keeps_bind_host() {
        let cli = Cli::try_parse_from(["forward-proxy", "9000"]).unwrap();
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "127.0.0.1:1".to_string();
        config.proxy.persistent_connections = true;
        cli.apply(&mut config);

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert!(config.proxy.persistent_connections);
    }
}
