//! UdpSender: fans each frame out to every registered receiver.
//!
//! # How discovery works (for beginners)
//!
//! UDP has no connections, so the sender cannot "accept" a receiver the way
//! the TCP sender does.  Instead, a receiver announces itself by sending the
//! 7-byte datagram `connect` to the sender's port.  The sender records the
//! datagram's source address in its [`ClientRegistry`] and from then on sends
//! every frame to that address.
//!
//! [`UdpSender::connecting`] waits for *one* handshake, bounded by the
//! discovery timeout (0.5 s by default), so a streaming loop can interleave
//! discovery with sending without stalling.
//!
//! # Wire format
//!
//! ```text
//! [payload_len:4 BE][payload:N]["EOF"]
//! ```
//!
//! A frame that does not fit one datagram is dropped with a warning.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use imgtrans_core::{
    codec::jpeg::DEFAULT_QUALITY,
    domain::endpoint::DEFAULT_PORT,
    protocol::framing::{build_datagram, is_handshake},
    ClientRegistry, EndpointIdentity, FrameCodec, Image, ImageSender, JpegCodec, SessionError,
};
use tracing::{debug, error, info, warn};

use super::is_timeout_error;

/// Default bound on one discovery wait.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(500);

/// Receive buffer for handshakes.  Larger than any handshake so stray
/// datagrams are read whole rather than erroring on some platforms.
const HANDSHAKE_BUF_SIZE: usize = 2048;

/// Registry shared between the sender and anyone inspecting its receivers.
pub type SharedRegistry = Arc<Mutex<ClientRegistry>>;

/// Configuration for a [`UdpSender`].
#[derive(Debug, Clone)]
pub struct UdpSenderConfig {
    pub endpoint: EndpointIdentity,
    /// Bound on one `connecting()` call.
    pub discovery_timeout: Duration,
    /// JPEG quality used by [`UdpSender::send`].
    pub quality: u8,
    /// Receivers registered up front, without a handshake.
    pub clients: Vec<SocketAddr>,
    /// Evict discovered receivers not heard from within this long.
    pub client_ttl: Option<Duration>,
}

impl Default for UdpSenderConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointIdentity::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            quality: DEFAULT_QUALITY,
            clients: Vec::new(),
            client_ttl: None,
        }
    }
}

/// Outcome of one fan-out: the per-receiver result of every send attempt.
#[derive(Debug, Default)]
pub struct FanoutReport {
    pub outcomes: Vec<(SocketAddr, io::Result<usize>)>,
}

impl FanoutReport {
    /// Number of receivers a send was attempted to.
    pub fn attempts(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of receivers the datagram was handed to the OS for.
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_ok()).count()
    }

    /// Receivers whose send failed.
    pub fn failed(&self) -> Vec<SocketAddr> {
        self.outcomes
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(addr, _)| *addr)
            .collect()
    }

    pub fn all_delivered(&self) -> bool {
        self.outcomes.iter().all(|(_, r)| r.is_ok())
    }
}

/// UDP fan-out sender.
pub struct UdpSender {
    config: UdpSenderConfig,
    codec: JpegCodec,
    socket: Option<UdpSocket>,
    registry: SharedRegistry,
    local_addr: Option<SocketAddr>,
    unavailable: bool,
}

impl UdpSender {
    /// Creates a closed sender.  Manual clients are registered immediately.
    pub fn new(config: UdpSenderConfig) -> Self {
        let mut registry = ClientRegistry::new();
        for addr in &config.clients {
            registry.add_manual(*addr);
        }
        let codec = JpegCodec::new(config.quality);
        Self {
            config,
            codec,
            socket: None,
            registry: Arc::new(Mutex::new(registry)),
            local_addr: None,
            unavailable: false,
        }
    }

    /// Creates a sender and binds its socket.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::BindFailed`] if the endpoint cannot be bound.
    pub fn bind(config: UdpSenderConfig) -> Result<Self, SessionError> {
        let mut sender = Self::new(config);
        sender.open()?;
        Ok(sender)
    }

    /// A handle to the receiver registry.
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Registers a receiver without waiting for its handshake.
    pub fn add_client(&self, addr: SocketAddr) -> bool {
        self.lock_registry().add_manual(addr)
    }

    /// Current transmission targets.
    pub fn clients(&self) -> Vec<SocketAddr> {
        self.lock_registry().targets()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    /// Frames `payload` and sends it to every target, reporting each result.
    ///
    /// Returns `Ok(None)` if the payload is too large for one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unavailable`] if the socket is not open.
    pub fn fanout(&mut self, payload: &[u8]) -> Result<Option<FanoutReport>, SessionError> {
        let datagram = match build_datagram(payload) {
            Ok(d) => d,
            Err(e) => {
                warn!("frame dropped: {e}");
                return Ok(None);
            }
        };
        let Some(socket) = self.socket.as_ref() else {
            return Err(SessionError::Unavailable);
        };

        let targets = self.lock_registry().targets();
        if targets.is_empty() {
            debug!("no receivers registered; frame not sent");
        }

        let outcomes = targets
            .into_iter()
            .map(|addr| {
                let result = socket.send_to(&datagram, addr);
                if let Err(e) = &result {
                    warn!("send to {addr} failed: {e}");
                }
                (addr, result)
            })
            .collect();
        Ok(Some(FanoutReport { outcomes }))
    }

    fn lock_registry(&self) -> MutexGuard<'_, ClientRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops and rebinds the socket after a transient failure.
    fn reopen(&mut self) {
        self.socket = None;
        if let Err(e) = self.open() {
            warn!("UDP socket reopen failed: {e}");
        }
    }
}

impl ImageSender for UdpSender {
    fn open(&mut self) -> Result<(), SessionError> {
        if self.socket.is_some() {
            return Ok(());
        }

        let addr = self
            .local_addr
            .unwrap_or_else(|| self.config.endpoint.socket_addr());
        let socket = match UdpSocket::bind(addr) {
            Ok(s) => s,
            Err(source) => {
                error!("UDP sender could not bind {addr}: {source}");
                self.unavailable = true;
                return Err(SessionError::BindFailed { addr, source });
            }
        };

        if let Err(e) = socket.set_broadcast(true) {
            debug!("broadcast not enabled on {addr}: {e}");
        }
        // A zero read timeout is rejected by the OS, so clamp to 1 ms.
        let timeout = self.config.discovery_timeout.max(Duration::from_millis(1));
        socket.set_read_timeout(Some(timeout))?;

        let local = socket.local_addr().unwrap_or(addr);
        self.lock_registry().set_self_addr(local);
        self.local_addr = Some(local);
        self.socket = Some(socket);
        info!("UDP sender bound to {local}");
        Ok(())
    }

    fn connecting(&mut self) -> Result<bool, SessionError> {
        if self.unavailable {
            return Err(SessionError::Unavailable);
        }
        if self.socket.is_none() {
            self.open()?;
        }
        if let Some(ttl) = self.config.client_ttl {
            for addr in self.lock_registry().prune_stale(ttl) {
                info!("receiver {addr} expired");
            }
        }
        let Some(socket) = self.socket.as_ref() else {
            return Err(SessionError::Unavailable);
        };

        let mut buf = [0u8; HANDSHAKE_BUF_SIZE];
        match socket.recv_from(&mut buf) {
            Ok((n, src)) if is_handshake(&buf[..n]) => {
                if Some(src) == self.local_addr {
                    debug!("ignoring handshake from own address");
                    return Ok(false);
                }
                if self.lock_registry().add(src) {
                    info!("receiver {src} registered");
                } else {
                    debug!("receiver {src} refreshed");
                }
                Ok(true)
            }
            Ok((n, src)) => {
                debug!("ignoring {n}-byte datagram from {src}");
                Ok(false)
            }
            Err(e) if is_timeout_error(&e) => Ok(false),
            Err(e) => {
                warn!("discovery socket error: {e}; reopening");
                self.reopen();
                Ok(false)
            }
        }
    }

    fn send(&mut self, image: &Image) -> Result<bool, SessionError> {
        match self.codec.encode(image) {
            Ok(payload) => self.send_encoded(&payload),
            Err(e) => {
                warn!("no frame sent: {e}");
                Ok(false)
            }
        }
    }

    fn send_encoded(&mut self, payload: &[u8]) -> Result<bool, SessionError> {
        Ok(self.fanout(payload)?.is_some())
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("UDP socket closed");
        }
    }

    fn has_peer(&self) -> bool {
        !self.lock_registry().targets().is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
