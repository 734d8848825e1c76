//! Session facade: the uniform lifecycle shared by every transport variant.
//!
//! There are four concrete session types, split across the sender and
//! receiver crates:
//!
//! | Role     | TCP           | UDP           |
//! |----------|---------------|---------------|
//! | sender   | `TcpSender`   | `UdpSender`   |
//! | receiver | `TcpReceiver` | `UdpReceiver` |
//!
//! Senders implement [`ImageSender`] (`open` → `connecting` → `send` →
//! `close`); receivers implement [`ImageReceiver`] (`read` → `release`).
//! Application code holds a `Box<dyn ImageSender>` or
//! `Box<dyn ImageReceiver>` and never sees transport-specific state.
//!
//! [`ImageReceiver`] is also the shape of any local frame source, such as a
//! camera, so a receiver and a capture device are interchangeable wherever
//! frames are pulled.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::Image;
use crate::domain::endpoint::EndpointError;

/// Error type shared by all session variants.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The endpoint could not be constructed from its configuration.
    #[error("endpoint configuration error: {0}")]
    Endpoint(#[from] EndpointError),

    /// The local socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The outbound connection to the server could not be established.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A previous bind failed; the session cannot be used.
    #[error("session is unavailable: the endpoint could not be opened")]
    Unavailable,

    /// The peer connection was lost.  Call `connecting()` before sending again.
    #[error("peer connection lost; reconnect required")]
    ReconnectRequired,

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Returns `true` for the distinguished reconnect-required signal.
    pub fn is_reconnect_required(&self) -> bool {
        matches!(self, Self::ReconnectRequired)
    }
}

/// Which transport a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(format!("unknown transport {other:?}; expected \"tcp\" or \"udp\"")),
        }
    }
}

/// The sending half of a session.
pub trait ImageSender: Send {
    /// Binds the local endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::BindFailed`]; the session is then unavailable.
    fn open(&mut self) -> Result<(), SessionError>;

    /// Waits for a peer (TCP accept, or one UDP discovery handshake).
    ///
    /// Returns `Ok(false)` when the configured timeout elapses without a peer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] for unrecoverable socket failures.
    fn connecting(&mut self) -> Result<bool, SessionError>;

    /// Encodes and transmits one image.
    ///
    /// Returns `Ok(false)` if the image could not be encoded or framed; the
    /// stream is unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ReconnectRequired`] when a TCP peer has gone
    /// away; other variants for I/O failures.
    fn send(&mut self, image: &Image) -> Result<bool, SessionError>;

    /// Transmits an already encoded payload.
    ///
    /// # Errors
    ///
    /// As for [`send`](Self::send).
    fn send_encoded(&mut self, payload: &[u8]) -> Result<bool, SessionError>;

    /// Releases every owned socket.  Never fails.
    fn close(&mut self);

    /// `true` when at least one peer would receive the next frame.
    fn has_peer(&self) -> bool;
}

/// The receiving half of a session, and the shape of any frame source.
pub trait ImageReceiver: Send {
    /// Reads one frame.
    ///
    /// Returns `(true, image)` on success.  `(false, _)` means nothing usable
    /// arrived this call; the caller decides whether to keep polling.
    fn read(&mut self) -> (bool, Option<Image>);

    /// Releases the underlying socket or device.
    fn release(&mut self);

    /// `true` once no further read can succeed: the peer closed the stream,
    /// the stream broke, or the receiver was released.
    fn is_closed(&self) -> bool {
        false
    }
}
