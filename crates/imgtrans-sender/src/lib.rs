//! imgtrans-sender library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the sender do? (for beginners)
//!
//! The sender owns the frame source (a camera, or here a test pattern) and
//! pushes JPEG frames to receivers over the network.  It runs in one of two
//! modes:
//!
//! - **TCP**: the sender listens, one receiver connects, and frames flow
//!   over that single stream until it breaks.  A broken stream is reported
//!   as `ReconnectRequired` and the sender goes back to listening.
//! - **UDP**: receivers announce themselves with a `connect` datagram and
//!   the sender fans every frame out to all of them, one datagram per frame.
//!
//! [`open_sender`] turns a [`SenderConfig`] into a ready `Box<dyn ImageSender>`
//! so callers never name the concrete transport.

/// Application layer: the streaming use case.
pub mod application;

/// Infrastructure layer: sockets, config files, and frame sources.
pub mod infrastructure;

use imgtrans_core::{ImageSender, InterfaceResolver, Transport};
use tracing::info;

use infrastructure::network::{TcpSender, UdpSender};
pub use infrastructure::storage::{ConfigError, SenderConfig};

/// Builds the sender named by `config.transport` and binds it.
///
/// # Errors
///
/// Returns [`ConfigError::Endpoint`] if the interface cannot be resolved,
/// [`ConfigError::InvalidClientAddress`] for a bad UDP client entry, and
/// [`ConfigError::Session`] if the socket cannot be bound.
pub fn open_sender(
    config: &SenderConfig,
    resolver: &dyn InterfaceResolver,
) -> Result<Box<dyn ImageSender>, ConfigError> {
    let endpoint = config.endpoint(resolver)?;
    info!("opening {} sender on {endpoint}", config.transport);

    let mut sender: Box<dyn ImageSender> = match config.transport {
        Transport::Tcp => Box::new(TcpSender::new(config.tcp_config(endpoint))),
        Transport::Udp => Box::new(UdpSender::new(config.udp_config(endpoint)?)),
    };
    sender.open()?;
    Ok(sender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgtrans_core::SystemInterfaceResolver;

    fn loopback(transport: Transport) -> SenderConfig {
        SenderConfig {
            transport,
            interface: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_sender_tcp_has_no_peer_yet() {
        let sender = open_sender(&loopback(Transport::Tcp), &SystemInterfaceResolver).unwrap();
        assert!(!sender.has_peer());
    }

    #[test]
    fn test_open_sender_udp_with_manual_client_has_peer() {
        let config = SenderConfig {
            clients: vec!["127.0.0.1:5999".into()],
            ..loopback(Transport::Udp)
        };
        let sender = open_sender(&config, &SystemInterfaceResolver).unwrap();
        assert!(sender.has_peer());
    }

    #[test]
    fn test_open_sender_rejects_bad_address() {
        let config = SenderConfig {
            interface: "300.1.1.1".into(),
            ..loopback(Transport::Tcp)
        };
        assert!(matches!(
            open_sender(&config, &SystemInterfaceResolver),
            Err(ConfigError::Endpoint(_))
        ));
    }
}
