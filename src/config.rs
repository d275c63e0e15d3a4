use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::{Error, Result};

/// Multicast group the registry listens on for discovery datagrams.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);
pub const DISCOVERY_PORT: u16 = 32001;
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(4);

/// Hard ceiling for any encoded message, on TCP and UDP alike.
pub const MAX_FRAME_SIZE: usize = 0x10000;

pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Pause after a failed accept before trying again.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Name carried in discovery requests.
pub const REGISTRY_SERVICE_NAME: &str = "registry";

#[derive(Debug, Clone)]
pub struct Config {
    pub multicast_group: Ipv4Addr,
    pub discovery_port: u16,
    pub discovery_timeout: Duration,
    /// Host the registry control listener and service call listeners bind to.
    pub bind_host: IpAddr,
    /// Upper bound on in-flight connections per accept loop.
    pub max_connections: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            multicast_group: MULTICAST_GROUP,
            discovery_port: DISCOVERY_PORT,
            discovery_timeout: DISCOVERY_TIMEOUT,
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    /// Builds a configuration from `SVCREGISTRY_*` environment variables,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let discovery_timeout = match env::var("SVCREGISTRY_DISCOVERY_TIMEOUT_MS") {
            Ok(ms) => Duration::from_millis(ms.trim().parse::<u64>()?),
            Err(_) => defaults.discovery_timeout,
        };

        let config = Config {
            multicast_group: env_or("SVCREGISTRY_MULTICAST_GROUP", defaults.multicast_group)?,
            discovery_port: env_or("SVCREGISTRY_DISCOVERY_PORT", defaults.discovery_port)?,
            discovery_timeout,
            bind_host: env_or("SVCREGISTRY_BIND_HOST", defaults.bind_host)?,
            max_connections: env_or("SVCREGISTRY_MAX_CONNECTIONS", defaults.max_connections)?,
        };

        config.validate()
    }

    fn validate(self) -> Result<Self> {
        if !self.multicast_group.is_multicast() {
            return Err(Error::Parse(format!(
                "{} is not a multicast address",
                self.multicast_group
            )));
        }
        if self.max_connections == 0 {
            return Err(Error::Parse("max connections must be at least 1".into()));
        }
        if self.max_connections > Semaphore::MAX_PERMITS {
            return Err(Error::Parse(format!(
                "max connections must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(self)
    }

    pub fn with_discovery_port(mut self, port: u16) -> Self {
        self.discovery_port = port;
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn with_bind_host(mut self, host: IpAddr) -> Self {
        self.bind_host = host;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections.clamp(1, Semaphore::MAX_PERMITS);
        self
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| Error::Parse(format!("{}={:?}: {}", key, value, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.multicast_group, MULTICAST_GROUP);
        assert_eq!(config.discovery_port, 32001);
        assert_eq!(config.discovery_timeout, Duration::from_secs(4));
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_env_or() -> Result<()> {
        env::set_var("SVCREGISTRY_TEST_PORT", "4242");
        let port: u16 = env_or("SVCREGISTRY_TEST_PORT", 1)?;
        assert_eq!(port, 4242);

        let missing: u16 = env_or("SVCREGISTRY_TEST_UNSET", 7)?;
        assert_eq!(missing, 7);

        env::set_var("SVCREGISTRY_TEST_BAD_PORT", "not-a-port");
        let bad: Result<u16> = env_or("SVCREGISTRY_TEST_BAD_PORT", 1);
        assert!(matches!(bad, Err(Error::Parse(_))));
        Ok(())
    }

    #[test]
    fn test_max_connections_floor() {
        let config = Config::default().with_max_connections(0);
        assert_eq!(config.max_connections, 1);
    }

    #[test]
    fn test_max_connections_ceiling() {
        let config = Config::default().with_max_connections(usize::MAX);
        assert_eq!(config.max_connections, Semaphore::MAX_PERMITS);
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let mut config = Config::default();
        config.max_connections = Semaphore::MAX_PERMITS + 1;
        assert!(matches!(config.validate(), Err(Error::Parse(_))));

        let mut config = Config::default();
        config.max_connections = 0;
        assert!(matches!(config.validate(), Err(Error::Parse(_))));

        let mut config = Config::default();
        config.multicast_group = Ipv4Addr::new(10, 0, 0, 1);
        assert!(matches!(config.validate(), Err(Error::Parse(_))));

        let config = Config::default().with_max_connections(Semaphore::MAX_PERMITS);
        assert!(config.validate().is_ok());
    }
}
