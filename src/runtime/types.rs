// ABOUTME: Engine endpoint selection parsed from the -H flag.
// ABOUTME: Local defaults, a unix socket path, or a plain HTTP address.

use std::fmt;
use std::str::FromStr;

use super::error::{InvalidEndpointSnafu, RuntimeError};

/// Where to reach the container engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EngineEndpoint {
    /// The engine client's local defaults (`DOCKER_HOST` or the default socket).
    #[default]
    Local,
    /// A unix socket path.
    Unix(String),
    /// An HTTP address, `host:port`.
    Http(String),
}

impl FromStr for EngineEndpoint {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return InvalidEndpointSnafu { endpoint: s }.fail();
            }
            return Ok(EngineEndpoint::Unix(path.to_string()));
        }
        if s.starts_with('/') {
            return Ok(EngineEndpoint::Unix(s.to_string()));
        }
        let addr = s
            .strip_prefix("tcp://")
            .or_else(|| s.strip_prefix("http://"))
            .unwrap_or(s);
        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(EngineEndpoint::Http(addr.to_string()))
            }
            _ => InvalidEndpointSnafu { endpoint: s }.fail(),
        }
    }
}

impl fmt::Display for EngineEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEndpoint::Local => write!(f, "local"),
            EngineEndpoint::Unix(path) => write!(f, "unix://{}", path),
            EngineEndpoint::Http(addr) => write!(f, "tcp://{}", addr),
        }
    }
}
