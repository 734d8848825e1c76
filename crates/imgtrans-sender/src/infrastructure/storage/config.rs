//! TOML configuration for the sender binary.
//!
//! # Example file (for beginners)
//!
//! ```toml
//! transport = "udp"
//! interface = "eth0"        # or a dotted quad such as "192.168.1.10"
//! port = 4444
//! udp_quality = 95
//! discovery_timeout_ms = 500
//! clients = ["192.168.1.20", "192.168.1.21:5000"]   # bare IP means port 4445
//! client_ttl_secs = 30
//! frame_interval_ms = 33
//! log_level = "info"
//! ```
//!
//! Every field has a `#[serde(default = "...")]` helper, so an empty file (or
//! no file at all) yields a working TCP sender on `0.0.0.0:4444`.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use imgtrans_core::{
    codec::jpeg::{DEFAULT_QUALITY, TCP_QUALITY},
    domain::endpoint::{DEFAULT_PORT, DEFAULT_RECEIVER_PORT},
    EndpointError, EndpointIdentity, InterfaceResolver, SessionError, Transport,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::{TcpSenderConfig, UdpSenderConfig};

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "imgtrans-sender.toml";

/// Error type for configuration loading and sender construction.
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

    /// A `clients` entry is neither `ip` nor `ip:port`.
    #[error("invalid client address {0:?}; expected \"ip\" or \"ip:port\"")]
    InvalidClientAddress(String),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

// ── Config schema ─────────────────────────────────────────────────────────────

/// Sender configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SenderConfig {
    #[serde(default)]
    pub transport: Transport,
    /// Interface name or dotted-quad IPv4 address to bind.
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// TCP accept timeout in (fractional) seconds.  Absent blocks forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    #[serde(default = "default_tcp_quality")]
    pub tcp_quality: u8,
    #[serde(default = "default_udp_quality")]
    pub udp_quality: u8,
    /// Bound on one UDP discovery wait.
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    /// UDP receivers registered without a handshake.  A bare IP uses the
    /// receivers' default bind port, 4445.
    #[serde(default)]
    pub clients: Vec<String>,
    /// Evict discovered UDP receivers silent for this long.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ttl_secs: Option<u64>,
    /// Pause between frames in the streaming loop.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_interface() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_tcp_quality() -> u8 {
    TCP_QUALITY
}
fn default_udp_quality() -> u8 {
    DEFAULT_QUALITY
}
fn default_discovery_timeout_ms() -> u64 {
    500
}
fn default_frame_interval_ms() -> u64 {
    33
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            interface: default_interface(),
            port: default_port(),
            timeout_secs: None,
            tcp_quality: default_tcp_quality(),
            udp_quality: default_udp_quality(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            clients: Vec::new(),
            client_ttl_secs: None,
            frame_interval_ms: default_frame_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl SenderConfig {
    /// Resolves the configured interface into the address to bind.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] for a malformed address or an interface
    /// with no IPv4 address.
    pub fn endpoint(&self, resolver: &dyn InterfaceResolver) -> Result<EndpointIdentity, EndpointError> {
        EndpointIdentity::resolve(&self.interface, self.port, resolver)
    }

    /// Accept timeout, or `None` to block.  Negative values also block.
    pub fn accept_timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Parses `clients`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidClientAddress`] for the first bad entry.
    pub fn client_addrs(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.clients
            .iter()
            .map(|c| parse_client_addr(c, DEFAULT_RECEIVER_PORT))
            .collect()
    }

    pub fn tcp_config(&self, endpoint: EndpointIdentity) -> TcpSenderConfig {
        TcpSenderConfig {
            endpoint,
            accept_timeout: self.accept_timeout(),
            quality: self.tcp_quality,
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidClientAddress`] for a bad `clients` entry.
    pub fn udp_config(&self, endpoint: EndpointIdentity) -> Result<UdpSenderConfig, ConfigError> {
        Ok(UdpSenderConfig {
            endpoint,
            discovery_timeout: Duration::from_millis(self.discovery_timeout_ms),
            quality: self.udp_quality,
            clients: self.client_addrs()?,
            client_ttl: self.client_ttl_secs.map(Duration::from_secs),
        })
    }
}

/// Parses `"ip"` (using `default_port`) or `"ip:port"`.
fn parse_client_addr(value: &str, default_port: u16) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, default_port))
        .map_err(|_| ConfigError::InvalidClientAddress(value.to_string()))
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads a [`SenderConfig`], returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<SenderConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SenderConfig::default()),
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
pub fn save_config_to(path: &Path, config: &SenderConfig) -> Result<(), ConfigError> {
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
