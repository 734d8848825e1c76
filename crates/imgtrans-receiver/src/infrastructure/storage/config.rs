//! TOML configuration for the receiver binary.
//!
//! # Example file (for beginners)
//!
//! ```toml
//! transport = "tcp"
//! server_host = "192.168.1.10"
//! port = 4444
//! framing = "length_prefixed"   # or "marker" for the legacy scan
//! output_dir = "frames"
//! ```
//!
//! For UDP the receiver also binds a local socket, `bind_host:bind_port`
//! (default `0.0.0.0:4445`), which the sender learns from the handshake.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use imgtrans_core::{domain::endpoint::DEFAULT_PORT, FramingMode, SessionError, Transport};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::udp_receiver::{DEFAULT_BIND_PORT, DEFAULT_READ_TIMEOUT};
use crate::infrastructure::network::{TcpReceiverConfig, UdpReceiverConfig};

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "imgtrans-receiver.toml";

/// Error type for configuration loading and receiver construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A host/port pair did not resolve to any address.
    #[error("cannot resolve address {0:?}")]
    InvalidAddress(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

// ── Config schema ─────────────────────────────────────────────────────────────

/// Receiver configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub transport: Transport,
    /// Host name or IP of the sender.
    #[serde(default = "default_server_host")]
    pub server_host: String,
    /// Sender port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Local UDP bind address.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    /// TCP reassembly strategy.
    #[serde(default)]
    pub framing: FramingMode,
    /// Bound on each UDP read.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: f64,
    /// Bound on each TCP read.  Absent blocks until the sender writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_read_timeout_secs: Option<f64>,
    /// TCP connect timeout in seconds.  Absent uses the OS default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<f64>,
    /// Re-send the UDP handshake after every read timeout.
    #[serde(default = "default_true")]
    pub reannounce: bool,
    /// Directory decoded frames are written to.  Absent discards them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}
fn default_bind_port() -> u16 {
    DEFAULT_BIND_PORT
}
fn default_read_timeout_secs() -> f64 {
    DEFAULT_READ_TIMEOUT.as_secs_f64()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            server_host: default_server_host(),
            port: default_port(),
            bind_host: default_bind_host(),
            bind_port: default_bind_port(),
            framing: FramingMode::default(),
            read_timeout_secs: default_read_timeout_secs(),
            tcp_read_timeout_secs: None,
            connect_timeout_secs: None,
            reannounce: default_true(),
            output_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl ReceiverConfig {
    /// Resolves `server_host:port`, preferring an IPv4 result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if nothing resolves.
    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve(&self.server_host, self.port)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if nothing resolves.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve(&self.bind_host, self.bind_port)
    }

    /// The read timeout, falling back to the default for invalid values.
    pub fn read_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.read_timeout_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_READ_TIMEOUT)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if the server does not resolve.
    pub fn tcp_config(&self) -> Result<TcpReceiverConfig, ConfigError> {
        Ok(TcpReceiverConfig {
            server: self.server_addr()?,
            framing: self.framing,
            connect_timeout: positive_secs(self.connect_timeout_secs),
            read_timeout: positive_secs(self.tcp_read_timeout_secs),
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if either address does not resolve.
    pub fn udp_config(&self) -> Result<UdpReceiverConfig, ConfigError> {
        Ok(UdpReceiverConfig {
            bind: self.bind_addr()?,
            server: self.server_addr()?,
            read_timeout: self.read_timeout(),
            reannounce: self.reannounce,
        })
    }
}

/// Converts optional fractional seconds, dropping zero and invalid values.
fn positive_secs(secs: Option<f64>) -> Option<Duration> {
    secs.and_then(|s| Duration::try_from_secs_f64(s).ok())
        .filter(|d| !d.is_zero())
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::InvalidAddress(format!("{host}:{port}"));
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs().map_err(|_| invalid())?.collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(invalid)
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads a [`ReceiverConfig`], returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ReceiverConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ReceiverConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &ReceiverConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("imgtrans-receiver-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_receiver_config_defaults() {
        // Arrange / Act
        let cfg = ReceiverConfig::default();

        // Assert
        assert_eq!(cfg.transport, Transport::Tcp);
        assert_eq!(cfg.port, 4444);
        assert_eq!(cfg.bind_port, 4445);
        assert_eq!(cfg.framing, FramingMode::LengthPrefixed);
        assert_eq!(cfg.read_timeout(), Duration::from_secs(1));
        assert!(cfg.output_dir.is_none());
    }

    #[test]
    fn test_framing_parses_snake_case() {
        let cfg: ReceiverConfig = toml::from_str("framing = \"marker\"").expect("parse");
        assert_eq!(cfg.framing, FramingMode::Marker);
    }

    #[test]
    fn test_invalid_read_timeout_falls_back_to_default() {
        for secs in [0.0, -3.0, f64::NAN] {
            let cfg = ReceiverConfig {
                read_timeout_secs: secs,
                ..Default::default()
            };
            assert_eq!(cfg.read_timeout(), Duration::from_secs(1), "{secs}");
        }
    }

    #[test]
    fn test_tcp_config_blocks_unless_timeout_given() {
        let blocking = ReceiverConfig::default().tcp_config().unwrap();
        assert!(blocking.read_timeout.is_none());

        let bounded = ReceiverConfig {
            tcp_read_timeout_secs: Some(0.25),
            ..Default::default()
        }
        .tcp_config()
        .unwrap();
        assert_eq!(bounded.read_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_server_addr_resolves_literal_ip() {
        let cfg = ReceiverConfig {
            server_host: "10.1.2.3".into(),
            port: 5000,
            ..Default::default()
        };
        assert_eq!(cfg.server_addr().unwrap(), "10.1.2.3:5000".parse().unwrap());
    }

    #[test]
    fn test_udp_config_uses_bind_and_server() {
        let cfg = ReceiverConfig {
            transport: Transport::Udp,
            bind_host: "127.0.0.1".into(),
            bind_port: 0,
            ..Default::default()
        };
        let udp = cfg.udp_config().unwrap();
        assert_eq!(udp.bind, "127.0.0.1:0".parse().unwrap());
        assert_eq!(udp.server, "127.0.0.1:4444".parse().unwrap());
        assert!(udp.reannounce);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let cfg = load_config_from(&temp_path("missing.toml")).expect("defaults");
        assert_eq!(cfg, ReceiverConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        // Arrange
        let path = temp_path("roundtrip.toml");
        let cfg = ReceiverConfig {
            transport: Transport::Udp,
            framing: FramingMode::Marker,
            output_dir: Some(PathBuf::from("frames")),
            ..Default::default()
        };

        // Act
        save_config_to(&path, &cfg).expect("save");
        let restored = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(restored, cfg);
        let _ = std::fs::remove_file(&path);
    }
}
