//! Connection state of a TCP sender.
//!
//! ```text
//! Closed ──open()──► Listening ──connecting() ok──► Connected(A)
//!                     │    ▲                          │
//!                     └────┘ connecting() timeout     ├─ connecting() ok ──► Connected(B)
//!                                                     │
//! Closed ◄────────── close() / peer reset ────────────┘
//!
//! connecting() from Closed reopens the listener first.
//! ```
//!
//! A sender serves at most one peer.  Accepting a new peer while connected
//! supersedes the old one; the sender shuts the old stream down explicitly so
//! the superseded viewer sees EOF instead of a silent stall.

use std::fmt;
use std::net::SocketAddr;

/// Current state of a TCP sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No sockets are open.
    #[default]
    Closed,
    /// The listening socket is bound; no peer yet.
    Listening,
    /// A peer completed the TCP handshake and frames may be sent.
    Connected { peer: SocketAddr },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// The current peer, if connected.
    pub fn peer(&self) -> Option<SocketAddr> {
        match self {
            Self::Connected { peer } => Some(*peer),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Listening => f.write_str("listening"),
            Self::Connected { peer } => write!(f, "connected to {peer}"),
        }
    }
}
