//! Network adapters: the TCP stream server and the UDP fan-out broadcaster.

pub mod tcp_sender;
pub mod udp_sender;

pub use tcp_sender::{TcpSender, TcpSenderConfig};
pub use udp_sender::{FanoutReport, SharedRegistry, UdpSender, UdpSenderConfig};

use std::io;

/// Returns `true` if an I/O error is a read or accept timeout.
///
/// Different platforms report an expired socket timeout as either
/// `WouldBlock` or `TimedOut`.
pub(crate) fn is_timeout_error(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Returns `true` if a write failed because the peer went away.
pub(crate) fn is_connection_lost(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
    )
}
