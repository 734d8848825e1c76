//! UdpReceiver: subscribes to a UDP fan-out sender.
//!
//! Construction binds a local socket and fires one `connect` handshake at
//! the sender.  No acknowledgement comes back; the first frame datagram is
//! the only sign that registration worked.
//!
//! # Read outcomes
//!
//! | situation                                 | `read()` returns                  |
//! |-------------------------------------------|-----------------------------------|
//! | valid datagram from the sender            | `(true, Some(img))`               |
//! | nothing within the read timeout           | `(false, Some(placeholder))`      |
//! | datagram from another host                | `(false, None)`, warning logged   |
//! | bad prefix, sentinel, or JPEG             | `(false, None)`                   |
//!
//! The timeout placeholder is a 320x240 dark image labelled `TIMEOUT` so a
//! viewer shows *something* when the stream stalls.
//!
//! With `reannounce` enabled, every timeout also re-sends the handshake, so
//! a restarted sender or one that evicts idle receivers picks us back up.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use imgtrans_core::{
    domain::endpoint::{DEFAULT_PORT, DEFAULT_RECEIVER_PORT},
    protocol::framing::{parse_datagram, HANDSHAKE, MAX_DATAGRAM_SIZE},
    timeout_placeholder, FrameCodec, Image, ImageReceiver, JpegCodec, SessionError,
};
use tracing::{debug, info, warn};

use super::is_timeout_error;

/// Default local port, one above the sender's so both fit on one host.
pub const DEFAULT_BIND_PORT: u16 = DEFAULT_RECEIVER_PORT;

/// Default bound on one `read()`.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a [`UdpReceiver`].
#[derive(Debug, Clone)]
pub struct UdpReceiverConfig {
    /// Local address to bind.
    pub bind: SocketAddr,
    /// The sender; also the only accepted datagram origin.
    pub server: SocketAddr,
    pub read_timeout: Duration,
    /// Re-send the handshake whenever a read times out.
    pub reannounce: bool,
}

impl Default for UdpReceiverConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_BIND_PORT)),
            server: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            read_timeout: DEFAULT_READ_TIMEOUT,
            reannounce: true,
        }
    }
}

/// UDP frame subscriber.
pub struct UdpReceiver {
    socket: Option<UdpSocket>,
    server: SocketAddr,
    reannounce: bool,
    codec: JpegCodec,
    buf: Vec<u8>,
}

impl UdpReceiver {
    /// Binds the local socket and announces this receiver to the sender.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::BindFailed`] if the local address cannot be
    /// bound.  A failed handshake send is only logged.
    pub fn connect(config: UdpReceiverConfig) -> Result<Self, SessionError> {
        let socket = UdpSocket::bind(config.bind).map_err(|source| {
            warn!("UDP receiver could not bind {}: {source}", config.bind);
            SessionError::BindFailed {
                addr: config.bind,
                source,
            }
        })?;
        // A zero read timeout is rejected by the OS, so clamp to 1 ms.
        socket.set_read_timeout(Some(config.read_timeout.max(Duration::from_millis(1))))?;

        let receiver = Self {
            socket: Some(socket),
            server: config.server,
            reannounce: config.reannounce,
            codec: JpegCodec::default(),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        };
        receiver.announce();
        info!(
            "UDP receiver bound to {:?}, subscribed to {}",
            receiver.local_addr(),
            receiver.server
        );
        Ok(receiver)
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Sends the `connect` handshake to the sender.  Failures are logged.
    pub fn announce(&self) {
        let Some(socket) = self.socket.as_ref() else {
            return;
        };
        match socket.send_to(HANDSHAKE, self.server) {
            Ok(_) => debug!("handshake sent to {}", self.server),
            Err(e) => warn!("handshake to {} failed: {e}", self.server),
        }
    }
}

impl ImageReceiver for UdpReceiver {
    fn read(&mut self) -> (bool, Option<Image>) {
        let Some(socket) = self.socket.as_ref() else {
            return (false, None);
        };

        let (n, src) = match socket.recv_from(&mut self.buf) {
            Ok(received) => received,
            Err(e) if is_timeout_error(&e) => {
                debug!("no datagram within the read timeout");
                if self.reannounce {
                    self.announce();
                }
                return (false, Some(timeout_placeholder()));
            }
            Err(e) => {
                warn!("UDP receive failed: {e}");
                return (false, None);
            }
        };

        if src.ip() != self.server.ip() {
            warn!("discarding datagram from untrusted origin {src}");
            return (false, None);
        }

        let payload = match parse_datagram(&self.buf[..n]) {
            Ok(p) => p,
            Err(e) => {
                warn!("malformed datagram from {src}: {e}");
                return (false, None);
            }
        };

        match self.codec.decode(payload) {
            Some(image) => (true, Some(image)),
            None => (false, None),
        }
    }

    fn release(&mut self) {
        if self.socket.take().is_some() {
            debug!("UDP receiver socket closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.socket.is_none()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
