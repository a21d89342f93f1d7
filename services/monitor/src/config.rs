//! Monitor configuration.
//!
//! Loaded from a TOML file when one is given; every field has a default so
//! a missing file section degrades to the local-server defaults. CLI flags
//! override file values in `main`.

use std::net::Ipv4Addr;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Control server host.
    pub host: String,
    /// TCP stream port on the control server.
    pub stream_port: u16,
    /// Multicast group mirroring the broadcast feed.
    pub multicast_group: Ipv4Addr,
    /// Multicast group port.
    pub multicast_port: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            stream_port: 19083,
            multicast_group: Ipv4Addr::new(239, 0, 0, 1),
            multicast_port: 19084,
        }
    }
}

impl MonitorConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn stream_endpoint(&self) -> String {
        format!("{}:{}", self.host, self.stream_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_server() {
        let config = MonitorConfig::default();
        assert_eq!(config.stream_endpoint(), "127.0.0.1:19083");
        assert_eq!(config.multicast_group, Ipv4Addr::new(239, 0, 0, 1));
        assert_eq!(config.multicast_port, 19084);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            host = "10.1.2.3"
            multicast_port = 20000
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "10.1.2.3");
        assert_eq!(config.stream_port, 19083);
        assert_eq!(config.multicast_port, 20000);
    }
}
