//! Emulator configuration.
//!
//! [`EmulatorConfig`] is fixed when the server is constructed and never
//! changes while it runs; every listener task shares it read-only through an
//! `Arc`.  It can be built in code (tests, embedding) or loaded from a TOML
//! file (the `rtmc-emulator` binary):
//!
//! ```toml
//! api_token = "dummy_token"
//! service = "rtmc-tcp-1.0-emulator"
//! tcp_port = 65001
//! udp_port = 65002
//!
//! device = "bare-bones-emulator"
//! serial_number = "1234ABCD"
//! firmware_version = "0.0.0"
//! ```
//!
//! Every field is optional in the file; missing fields take the defaults
//! listed on [`EmulatorConfig::default`].

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// All runtime configuration for the emulation server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Shared secret a client must present with `auth <token>`.
    pub api_token: String,

    /// Service name matched against discovery patterns.
    pub service: String,

    /// Address the TCP control listener binds to.
    ///
    /// The UDP discovery socket ignores this and always binds the IPv4
    /// wildcard address, because a socket bound to a unicast address does
    /// not receive multicast queries.  Discovery is therefore answered on
    /// every interface even when this is `127.0.0.1`; the address is only
    /// used to pick the interface for the multicast membership.
    pub bind_address: IpAddr,

    /// TCP control-channel port.  `0` lets the OS pick a free port.
    pub tcp_port: u16,

    /// Whether the UDP discovery listener runs at all.
    pub udp_enabled: bool,

    /// UDP discovery port.  `0` lets the OS pick a free port.
    pub udp_port: u16,

    /// Multicast group the discovery socket joins.
    pub udp_multicast_group: Ipv4Addr,

    /// Device name reported by discovery.
    pub device: String,

    /// Serial number reported by discovery.
    pub serial_number: String,

    /// Firmware version reported by discovery.
    pub firmware_version: String,

    /// Upper bound on each blocking accept/receive, in milliseconds.
    ///
    /// Listener loops re-check the running flag at least this often.
    pub poll_interval_ms: u64,
}

impl Default for EmulatorConfig {
    /// | Field               | Default                   |
    /// |---------------------|---------------------------|
    /// | api_token           | `""`                      |
    /// | service             | `rtmc-tcp-1.0-emulator`   |
    /// | bind_address        | `127.0.0.1`               |
    /// | tcp_port            | `65001`                   |
    /// | udp_enabled         | `true`                    |
    /// | udp_port            | `65002`                   |
    /// | udp_multicast_group | `239.255.0.100`           |
    /// | device              | `bare-bones-emulator`     |
    /// | serial_number       | `1234ABCD`                |
    /// | firmware_version    | `0.0.0`                   |
    /// | poll_interval_ms    | `100`                     |
    fn default() -> Self {
        Self {
            api_token: String::new(),
            service: "rtmc-tcp-1.0-emulator".to_string(),
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            tcp_port: 65001,
            udp_enabled: true,
            udp_port: 65002,
            udp_multicast_group: Ipv4Addr::new(239, 255, 0, 100),
            device: "bare-bones-emulator".to_string(),
            serial_number: "1234ABCD".to_string(),
            firmware_version: "0.0.0".to_string(),
            poll_interval_ms: 100,
        }
    }
}

impl EmulatorConfig {
    /// Default configuration accepting `api_token`.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or mistyped fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Accept/receive poll interval as a [`Duration`], at least 1 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Loads an [`EmulatorConfig`] from the TOML file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if its content is not a valid config.
pub fn load_config(path: &Path) -> Result<EmulatorConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    EmulatorConfig::from_toml_str(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
