use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Port the credential service listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 19455;
/// Idle connections are closed after this long without a new request.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

pub const ENV_HOST: &str = "KDBXKEY_HOST";
pub const ENV_PORT: &str = "KDBXKEY_PORT";
pub const ENV_IDLE_TIMEOUT: &str = "KDBXKEY_IDLE_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    host: IpAddr,
    port: u16,
    idle_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            // all interfaces
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl ServiceConfig {
    pub fn new(host: IpAddr, port: u16, idle_timeout: Duration) -> Result<Self> {
        let config = Self {
            host,
            port,
            idle_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads overrides from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("failed to load .env file"),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from defaults plus whatever `lookup` returns for the
    /// `KDBXKEY_*` variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let host = match lookup(ENV_HOST) {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_HOST} is not an IP address: '{v}'"))?,
            None => default.host,
        };

        let port = match lookup(ENV_PORT) {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_PORT} is not a port number: '{v}'"))?,
            None => default.port,
        };

        let idle_timeout = match lookup(ENV_IDLE_TIMEOUT) {
            Some(v) => Duration::from_secs(
                v.trim().parse().with_context(|| {
                    format!("{ENV_IDLE_TIMEOUT} is not a number of seconds: '{v}'")
                })?,
            ),
            None => default.idle_timeout,
        };

        Self::new(host, port, idle_timeout)
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            bail!("idle timeout must be at least one second");
        }
        Ok(())
    }
}
