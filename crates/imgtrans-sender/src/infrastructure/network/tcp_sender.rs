//! TcpSender: serves a live frame stream to one receiver over TCP.
//!
//! The sender is the *server*: it binds and listens, waits for one receiver
//! to connect, then writes frames on that connection until it breaks.
//!
//! Each frame is written as:
//!
//! ```text
//! [payload_len:4 LE]  flush
//! [payload:N]         flush
//! [0x00000000]        flush
//! ```
//!
//! Flushing after the prefix lets a slow receiver see a frame start as soon
//! as possible.
//!
//! # Reconnection contract
//!
//! When a write fails because the peer reset, aborted, or closed the
//! connection, the sender closes *all* of its sockets, moves to
//! [`ConnectionState::Closed`], and returns
//! [`SessionError::ReconnectRequired`].  Every later `send` returns the same
//! error until [`TcpSender::connecting`] reopens the listener and accepts a
//! new peer.

use std::io::{self, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use imgtrans_core::{
    codec::jpeg::TCP_QUALITY,
    domain::endpoint::DEFAULT_PORT,
    protocol::framing::{encode_length_le, TCP_TERMINATOR},
    ConnectionState, EndpointIdentity, FrameCodec, Image, ImageSender, JpegCodec, SessionError,
};
use tracing::{debug, error, info, warn};

use super::{is_connection_lost, is_timeout_error};

/// How often a timed accept re-checks the non-blocking listener.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for a [`TcpSender`].
#[derive(Debug, Clone)]
pub struct TcpSenderConfig {
    /// Local address and port to listen on.
    pub endpoint: EndpointIdentity,
    /// Upper bound on one `connecting()` call; `None` blocks until a peer arrives.
    pub accept_timeout: Option<Duration>,
    /// JPEG quality used by [`TcpSender::send`].
    pub quality: u8,
}

impl Default for TcpSenderConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointIdentity::new(std::net::Ipv4Addr::UNSPECIFIED, DEFAULT_PORT),
            accept_timeout: None,
            quality: TCP_QUALITY,
        }
    }
}

/// Single-peer TCP frame server.
pub struct TcpSender {
    config: TcpSenderConfig,
    codec: JpegCodec,
    listener: Option<TcpListener>,
    connection: Option<BufWriter<TcpStream>>,
    state: ConnectionState,
    /// Address actually bound, so a reopen reuses an OS-assigned port.
    bound_addr: Option<SocketAddr>,
    unavailable: bool,
}

impl TcpSender {
    /// Creates a sender in the `Closed` state.  Call [`open`](ImageSender::open)
    /// or [`connecting`](ImageSender::connecting) to start listening.
    pub fn new(config: TcpSenderConfig) -> Self {
        let codec = JpegCodec::new(config.quality);
        Self {
            config,
            codec,
            listener: None,
            connection: None,
            state: ConnectionState::Closed,
            bound_addr: None,
            unavailable: false,
        }
    }

    /// Creates a sender and immediately binds its listener.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::BindFailed`] if the endpoint cannot be bound.
    pub fn bind(config: TcpSenderConfig) -> Result<Self, SessionError> {
        let mut sender = Self::new(config);
        sender.open()?;
        Ok(sender)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// `true` once a bind has failed; the sender will not retry.
    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    /// The address the listener is (or was last) bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound_addr
    }

    /// Installs a freshly accepted stream, superseding any current peer.
    fn attach(&mut self, stream: TcpStream, peer: SocketAddr) {
        if let Some(old) = self.connection.take() {
            let old_peer = self.state.peer();
            info!("receiver {peer} supersedes {old_peer:?}; closing previous connection");
            shutdown_writer(old);
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle on {peer}: {e}");
        }
        self.connection = Some(BufWriter::new(stream));
        self.state = ConnectionState::Connected { peer };
        info!("receiver connected from {peer}");
    }

    /// Handles a failed frame write.
    fn on_write_error(&mut self, e: io::Error) -> SessionError {
        if is_connection_lost(&e) {
            warn!(
                "lost receiver {:?}: {e}; closing sockets, reconnect required",
                self.state.peer()
            );
            self.close();
            SessionError::ReconnectRequired
        } else {
            error!("frame write failed: {e}");
            SessionError::Io(e)
        }
    }
}

impl ImageSender for TcpSender {
    fn open(&mut self) -> Result<(), SessionError> {
        if self.listener.is_some() {
            return Ok(());
        }

        let addr = self
            .bound_addr
            .unwrap_or_else(|| self.config.endpoint.socket_addr());
        match TcpListener::bind(addr) {
            Ok(listener) => {
                let local = listener.local_addr().unwrap_or(addr);
                info!("TCP sender listening on {local}");
                self.bound_addr = Some(local);
                self.listener = Some(listener);
                self.state = ConnectionState::Listening;
                Ok(())
            }
            Err(source) => {
                error!("TCP sender could not bind {addr}: {source}");
                self.close();
                self.unavailable = true;
                Err(SessionError::BindFailed { addr, source })
            }
        }
    }

    fn connecting(&mut self) -> Result<bool, SessionError> {
        if self.unavailable {
            return Err(SessionError::Unavailable);
        }
        if self.listener.is_none() {
            debug!("listener closed; reopening before accept");
            self.open()?;
        }
        let Some(listener) = self.listener.as_ref() else {
            return Err(SessionError::Unavailable);
        };

        info!("waiting for a receiver to connect");
        let accepted = match self.config.accept_timeout {
            Some(timeout) => accept_with_timeout(listener, timeout),
            None => listener.accept().map(Some),
        };

        match accepted {
            Ok(Some((stream, peer))) => {
                self.attach(stream, peer);
                Ok(true)
            }
            Ok(None) => {
                debug!("no receiver connected within {:?}", self.config.accept_timeout);
                Ok(false)
            }
            Err(e) if is_timeout_error(&e) => Ok(false),
            Err(e) => {
                error!("accept failed: {e}");
                Err(SessionError::Io(e))
            }
        }
    }

    fn send(&mut self, image: &Image) -> Result<bool, SessionError> {
        if !self.state.is_connected() {
            return Err(SessionError::ReconnectRequired);
        }
        match self.codec.encode(image) {
            Ok(payload) => self.send_encoded(&payload),
            Err(e) => {
                warn!("no frame sent: {e}");
                Ok(false)
            }
        }
    }

    fn send_encoded(&mut self, payload: &[u8]) -> Result<bool, SessionError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(SessionError::ReconnectRequired);
        };
        let Ok(len) = u32::try_from(payload.len()) else {
            warn!("frame of {} bytes does not fit the length prefix", payload.len());
            return Ok(false);
        };

        match write_frame(connection, len, payload) {
            Ok(()) => Ok(true),
            Err(e) => Err(self.on_write_error(e)),
        }
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            shutdown_writer(connection);
        }
        if self.listener.take().is_some() {
            debug!("TCP listener closed");
        }
        self.state = ConnectionState::Closed;
    }

    fn has_peer(&self) -> bool {
        self.state.is_connected()
    }
}

/// Writes one frame: prefix, payload, terminator, flushing after each part.
fn write_frame<W: Write>(writer: &mut W, len: u32, payload: &[u8]) -> io::Result<()> {
    writer.write_all(&encode_length_le(len))?;
    writer.flush()?;
    writer.write_all(payload)?;
    writer.flush()?;
    writer.write_all(&TCP_TERMINATOR)?;
    writer.flush()
}

/// Accepts one connection, giving up after `timeout`.
///
/// Returns `Ok(None)` on timeout.  The listener is restored to blocking mode
/// before returning.
fn accept_with_timeout(
    listener: &TcpListener,
    timeout: Duration,
) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    listener.set_nonblocking(true)?;
    let deadline = Instant::now() + timeout;

    let result = loop {
        match listener.accept() {
            Ok(pair) => break Ok(Some(pair)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let now = Instant::now();
                if now >= deadline {
                    break Ok(None);
                }
                thread::sleep(ACCEPT_POLL_INTERVAL.min(deadline - now));
            }
            Err(e) => break Err(e),
        }
    };

    listener.set_nonblocking(false)?;
    let accepted = result?;
    if let Some((stream, _)) = &accepted {
        // Some platforms hand back a socket that inherits O_NONBLOCK.
        stream.set_nonblocking(false)?;
    }
    Ok(accepted)
}

/// Best-effort flush and shutdown; failures are logged and ignored.
fn shutdown_writer(mut writer: BufWriter<TcpStream>) {
    if let Err(e) = writer.flush() {
        debug!("dropping unflushed frame bytes: {e}");
    }
    let (stream, _unflushed) = writer.into_parts();
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        debug!("socket shutdown failed: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn loopback_config() -> TcpSenderConfig {
        TcpSenderConfig {
            endpoint: EndpointIdentity::new(Ipv4Addr::LOCALHOST, 0),
            accept_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_default_port_and_quality() {
        let cfg = TcpSenderConfig::default();
        assert_eq!(cfg.endpoint.port(), 4444);
        assert_eq!(cfg.quality, 70);
        assert!(cfg.accept_timeout.is_none());
    }

    #[test]
    fn test_new_sender_is_closed() {
        let sender = TcpSender::new(loopback_config());
        assert_eq!(sender.state(), ConnectionState::Closed);
        assert!(sender.local_addr().is_none());
    }

    #[test]
    fn test_open_moves_to_listening() {
        // Arrange
        let mut sender = TcpSender::new(loopback_config());

        // Act
        sender.open().expect("bind loopback");

        // Assert
        assert_eq!(sender.state(), ConnectionState::Listening);
        assert_ne!(sender.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_open_on_busy_port_marks_unavailable() {
        // Arrange: occupy a port
        let holder = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let mut sender = TcpSender::new(TcpSenderConfig {
            endpoint: EndpointIdentity::new(Ipv4Addr::LOCALHOST, port),
            ..loopback_config()
        });

        // Act
        let result = sender.open();

        // Assert
        assert!(matches!(result, Err(SessionError::BindFailed { .. })));
        assert!(sender.is_unavailable());
        assert_eq!(sender.state(), ConnectionState::Closed);
        assert!(matches!(sender.connecting(), Err(SessionError::Unavailable)));
    }

    #[test]
    fn test_connecting_times_out_and_stays_listening() {
        let mut sender = TcpSender::bind(loopback_config()).unwrap();
        let started = Instant::now();

        let connected = sender.connecting().unwrap();

        assert!(!connected);
        assert_eq!(sender.state(), ConnectionState::Listening);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_send_before_connecting_requires_reconnect() {
        let mut sender = TcpSender::bind(loopback_config()).unwrap();
        let result = sender.send_encoded(b"frame");
        assert!(matches!(result, Err(SessionError::ReconnectRequired)));
    }

    #[test]
    fn test_close_is_idempotent_and_leaves_closed() {
        let mut sender = TcpSender::bind(loopback_config()).unwrap();
        sender.close();
        sender.close();
        assert_eq!(sender.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_connecting_after_close_reopens_same_port() {
        // Arrange
        let mut sender = TcpSender::bind(loopback_config()).unwrap();
        let addr = sender.local_addr().unwrap();
        sender.close();

        // Act
        let client = thread::spawn(move || {
            for _ in 0..200 {
                if let Ok(s) = TcpStream::connect(addr) {
                    return Some(s);
                }
                thread::sleep(Duration::from_millis(5));
            }
            None
        });
        let mut connected = false;
        for _ in 0..100 {
            if sender.connecting().unwrap() {
                connected = true;
                break;
            }
        }
        let _stream = client.join().unwrap();

        // Assert
        assert!(connected);
        assert_eq!(sender.local_addr(), Some(addr));
        assert!(sender.state().is_connected());
    }

    #[test]
    fn test_write_frame_layout() {
        // Arrange
        let mut out = Vec::new();

        // Act
        write_frame(&mut out, 3, b"abc").unwrap();

        // Assert
        assert_eq!(out, vec![3, 0, 0, 0, b'a', b'b', b'c', 0, 0, 0, 0]);
    }
}
