//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::constants::*;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Outbound events buffered per connection before it counts as stalled
    pub outbound_capacity: usize,

    /// WebSocket upgrade must complete within this time
    pub handshake_timeout: Duration,

    /// Interval between keepalive pings
    pub ping_interval: Duration,

    /// A single socket write must finish within this time
    pub write_timeout: Duration,

    /// Delay before force-closing a peer removed with `remove-peer`
    pub removal_grace: Duration,

    /// Force-close removed peers after `removal_grace`
    pub close_removed_peers: bool,

    /// Only relay offers, answers, chat and video sync within a group
    pub enforce_group_scope: bool,

    /// Length of assigned peer IDs
    pub id_length: usize,

    /// Stats logging interval
    pub stats_interval: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            max_connections: 0, // Unlimited
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            handshake_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(25),
            write_timeout: Duration::from_secs(10),
            removal_grace: Duration::from_millis(500),
            close_removed_peers: true,
            enforce_group_scope: true,
            id_length: DEFAULT_ID_LENGTH,
            stats_interval: Duration::from_secs(60),
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Defaults overlaid with environment variables
    ///
    /// Reads `PORT`, `RELAY_HOST`, `RELAY_MAX_CONNECTIONS`,
    /// `RELAY_ENFORCE_GROUP_SCOPE` and `RELAY_ID_LENGTH`.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(port) = var("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got {:?}", port)))?;
            self.bind_addr.set_port(port);
        }

        if let Some(host) = var("RELAY_HOST") {
            let ip: IpAddr = host.trim().parse().map_err(|_| {
                Error::Config(format!("RELAY_HOST must be an IP address, got {:?}", host))
            })?;
            self.bind_addr.set_ip(ip);
        }

        if let Some(max) = var("RELAY_MAX_CONNECTIONS") {
            self.max_connections = max.trim().parse().map_err(|_| {
                Error::Config(format!("RELAY_MAX_CONNECTIONS must be a number, got {:?}", max))
            })?;
        }

        if let Some(flag) = var("RELAY_ENFORCE_GROUP_SCOPE") {
            self.enforce_group_scope = parse_flag(&flag).ok_or_else(|| {
                Error::Config(format!(
                    "RELAY_ENFORCE_GROUP_SCOPE must be true/false, got {:?}",
                    flag
                ))
            })?;
        }

        if let Some(length) = var("RELAY_ID_LENGTH") {
            let length: usize = length.trim().parse().map_err(|_| {
                Error::Config(format!("RELAY_ID_LENGTH must be a number, got {:?}", length))
            })?;
            self = self.id_length(length);
        }

        Ok(self)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set per-connection outbound queue depth
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set keepalive ping interval (at least one second)
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(Duration::from_secs(1));
        self
    }

    /// Set socket write timeout (at least one millisecond)
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// Set grace delay before a removed peer is closed
    pub fn removal_grace(mut self, grace: Duration) -> Self {
        self.removal_grace = grace;
        self
    }

    /// Keep removed peers connected; they only get the `remove-peer` notice
    pub fn keep_removed_peers(mut self) -> Self {
        self.close_removed_peers = false;
        self
    }

    /// Relay to any connected peer, not just group members
    pub fn disable_group_scope(mut self) -> Self {
        self.enforce_group_scope = false;
        self
    }

    /// Set peer ID length (clamped to the supported range)
    pub fn id_length(mut self, length: usize) -> Self {
        self.id_length = length.clamp(MIN_ID_LENGTH, MAX_ID_LENGTH);
        self
    }

    /// Set stats logging interval; zero disables stats logging
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::default().apply_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.outbound_capacity, DEFAULT_OUTBOUND_CAPACITY);
        assert_eq!(config.id_length, DEFAULT_ID_LENGTH);
        assert!(config.enforce_group_scope);
        assert!(config.close_removed_peers);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:5001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 5001);
    }

    #[test]
    fn test_builder_id_length_capped() {
        assert_eq!(ServerConfig::default().id_length(2).id_length, MIN_ID_LENGTH);
        assert_eq!(ServerConfig::default().id_length(99).id_length, MAX_ID_LENGTH);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .outbound_capacity(0)
            .removal_grace(Duration::from_millis(20))
            .ping_interval(Duration::from_secs(5))
            .handshake_timeout(Duration::from_secs(2))
            .keep_removed_peers()
            .disable_group_scope();

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.outbound_capacity, 1);
        assert_eq!(config.removal_grace, Duration::from_millis(20));
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.handshake_timeout, Duration::from_secs(2));
        assert!(!config.close_removed_peers);
        assert!(!config.enforce_group_scope);
    }

    #[test]
    fn test_env_overrides() {
        let config = from_vars(&[
            ("PORT", "8080"),
            ("RELAY_HOST", "127.0.0.1"),
            ("RELAY_MAX_CONNECTIONS", "200"),
            ("RELAY_ENFORCE_GROUP_SCOPE", "off"),
            ("RELAY_ID_LENGTH", "8"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_connections, 200);
        assert!(!config.enforce_group_scope);
        assert_eq!(config.id_length, 8);
    }

    #[test]
    fn test_env_id_length_clamped() {
        let config = from_vars(&[("RELAY_ID_LENGTH", "1")]).unwrap();
        assert_eq!(config.id_length, MIN_ID_LENGTH);
    }

    #[test]
    fn test_env_without_vars_keeps_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.bind_addr, ServerConfig::default().bind_addr);
    }

    #[test]
    fn test_env_invalid_values() {
        assert!(matches!(from_vars(&[("PORT", "http")]), Err(Error::Config(_))));
        assert!(matches!(
            from_vars(&[("RELAY_HOST", "localhost:1")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            from_vars(&[("RELAY_ENFORCE_GROUP_SCOPE", "maybe")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            from_vars(&[("RELAY_ID_LENGTH", "five")]),
            Err(Error::Config(_))
        ));
    }
}
