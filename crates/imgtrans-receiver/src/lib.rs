//! imgtrans-receiver library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the receiver do? (for beginners)
//!
//! The receiver is the viewing end of a stream.  It either connects to a TCP
//! sender and reads frames off the stream, or announces itself to a UDP
//! sender and waits for frame datagrams.  Either way the caller only sees
//! `read() -> (bool, Option<Image>)`, the same shape a local camera has.
//!
//! [`open_receiver`] turns a [`ReceiverConfig`] into a ready
//! `Box<dyn ImageReceiver>`.

/// Application layer: the receiving use case.
pub mod application;

/// Infrastructure layer: sockets, config files, and frame output.
pub mod infrastructure;

use imgtrans_core::{ImageReceiver, Transport};
use tracing::info;

use infrastructure::network::{TcpReceiver, UdpReceiver};
pub use infrastructure::storage::{ConfigError, ReceiverConfig};

/// Builds and connects the receiver named by `config.transport`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidAddress`] if an address does not resolve and
/// [`ConfigError::Session`] if the socket cannot connect or bind.
pub fn open_receiver(config: &ReceiverConfig) -> Result<Box<dyn ImageReceiver>, ConfigError> {
    info!(
        "opening {} receiver for {}:{}",
        config.transport, config.server_host, config.port
    );
    let receiver: Box<dyn ImageReceiver> = match config.transport {
        Transport::Tcp => Box::new(TcpReceiver::connect(config.tcp_config()?)?),
        Transport::Udp => Box::new(UdpReceiver::connect(config.udp_config()?)?),
    };
    Ok(receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgtrans_core::SessionError;

    #[test]
    fn test_open_receiver_tcp_without_sender_fails() {
        // Arrange: a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = ReceiverConfig {
            port,
            ..Default::default()
        };

        // Act / Assert
        assert!(matches!(
            open_receiver(&config),
            Err(ConfigError::Session(SessionError::ConnectFailed { .. }))
        ));
    }

    #[test]
    fn test_open_receiver_udp_binds_without_sender() {
        let config = ReceiverConfig {
            transport: Transport::Udp,
            bind_host: "127.0.0.1".into(),
            bind_port: 0,
            ..Default::default()
        };
        assert!(open_receiver(&config).is_ok());
    }
}
