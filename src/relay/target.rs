//! Request-target resolution.
//!
//! Only absolute-form `http://` targets are relayed. The origin is always
//! contacted on the configured upstream port; a port in the URL is ignored.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    /// The target parsed but its scheme is not `http`.
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    /// The target is not an absolute URL (origin-form, authority-form, garbage).
    #[error("request target is not an absolute URL: {0}")]
    NotAbsolute(#[from] url::ParseError),

    /// An `http` URL without a host.
    #[error("request target has no host")]
    MissingHost,
}

/// Hostname of the origin a request should be forwarded to.
pub fn origin_host(target: &str) -> Result<String, TargetError> {
    let url = Url::parse(target)?;
    if url.scheme() != "http" {
        return Err(TargetError::UnsupportedScheme(url.scheme().to_string()));
    }
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .ok_or(TargetError::MissingHost)
}
