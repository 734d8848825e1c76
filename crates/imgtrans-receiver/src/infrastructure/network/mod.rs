//! Network adapters: the TCP stream client and the UDP fan-out subscriber.

pub mod tcp_receiver;
pub mod udp_receiver;

pub use tcp_receiver::{TcpReceiver, TcpReceiverConfig};
pub use udp_receiver::{UdpReceiver, UdpReceiverConfig};

use std::io;

/// Returns `true` if an I/O error is a read timeout.
///
/// Different platforms report an expired `SO_RCVTIMEO` as either
/// `WouldBlock` or `TimedOut`.
pub(crate) fn is_timeout_error(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
