//! Configuration for the agent.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use crate::exec::DEFAULT_CMD_TIMEOUT;
use crate::status::DEFAULT_STATUS_TIMEOUT;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8222;

/// Configuration for the rpi-remote agent.
#[derive(Clone)]
pub struct AgentConfig {
    /// HTTP server bind address.
    pub http_addr: SocketAddr,

    /// Wall-clock budget for `/cmd` (default: 300s).
    pub cmd_timeout: Duration,

    /// Wall-clock budget for each `/status` probe (default: 30s).
    pub status_timeout: Duration,

    /// Bearer token required on POST requests. `None` leaves the agent open.
    pub token: Option<String>,
}

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            cmd_timeout: DEFAULT_CMD_TIMEOUT,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            token: None,
        }
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("http_addr", &self.http_addr)
            .field("cmd_timeout", &self.cmd_timeout)
            .field("status_timeout", &self.status_timeout)
            .field("token", &self.token.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl AgentConfig {
    /// Load configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `PORT` | `8222` |
    /// | `RPI_REMOTE_HOST` | `0.0.0.0` |
    /// | `RPI_REMOTE_CMD_TIMEOUT` | `300` (seconds) |
    /// | `RPI_REMOTE_STATUS_TIMEOUT` | `30` (seconds) |
    /// | `RPI_REMOTE_TOKEN` | unset |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let host: IpAddr = parse_var(&lookup, "RPI_REMOTE_HOST")?.unwrap_or(default.http_addr.ip());
        let port: u16 = parse_var(&lookup, "PORT")?.unwrap_or(default.http_addr.port());

        Ok(Self {
            http_addr: SocketAddr::new(host, port),
            cmd_timeout: parse_var(&lookup, "RPI_REMOTE_CMD_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(default.cmd_timeout),
            status_timeout: parse_var(&lookup, "RPI_REMOTE_STATUS_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(default.status_timeout),
            token: lookup("RPI_REMOTE_TOKEN").filter(|t| !t.is_empty()),
        })
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
