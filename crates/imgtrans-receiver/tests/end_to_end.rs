//! End-to-end tests: a real sender and real receivers over loopback.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use imgtrans_core::{
    EndpointIdentity, FrameCodec, FramingMode, Image, ImageReceiver, ImageSender, JpegCodec,
    SessionError,
};
use imgtrans_receiver::application::receive_frames::{
    DiscardSink, ReadOutcome, ReceiveFramesUseCase,
};
use imgtrans_receiver::infrastructure::network::{
    TcpReceiver, TcpReceiverConfig, UdpReceiver, UdpReceiverConfig,
};
use imgtrans_sender::infrastructure::network::{
    TcpSender, TcpSenderConfig, UdpSender, UdpSenderConfig,
};

fn gradient(width: u32, height: u32) -> Image {
    Image::from_fn(width, height, |x, y| {
        image::Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 128])
    })
}

fn tcp_pair(framing: FramingMode) -> (TcpSender, TcpReceiver) {
    let mut sender = TcpSender::bind(TcpSenderConfig {
        endpoint: EndpointIdentity::new(Ipv4Addr::LOCALHOST, 0),
        accept_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    })
    .expect("bind sender");

    // The kernel completes the handshake from the listen backlog, so the
    // receiver can connect before the sender calls accept.
    let receiver = TcpReceiver::connect(TcpReceiverConfig {
        server: sender.local_addr().expect("bound"),
        framing,
        read_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    })
    .expect("connect receiver");
    assert!(sender.connecting().expect("accept"));
    (sender, receiver)
}

fn udp_sender() -> UdpSender {
    UdpSender::bind(UdpSenderConfig {
        endpoint: EndpointIdentity::new(Ipv4Addr::LOCALHOST, 0),
        discovery_timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .expect("bind sender")
}

fn udp_receiver(server: SocketAddr) -> UdpReceiver {
    UdpReceiver::connect(UdpReceiverConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        server,
        read_timeout: Duration::from_secs(2),
        reannounce: false,
    })
    .expect("bind receiver")
}

#[test]
fn test_tcp_fake_100_byte_payload_reads_true_without_image() {
    // Arrange
    let (mut sender, mut receiver) = tcp_pair(FramingMode::LengthPrefixed);

    // Act
    assert!(sender.send_encoded(&[0x5A; 100]).unwrap());
    let result = receiver.read();

    // Assert
    assert_eq!(result, (true, None));
}

#[test]
fn test_tcp_length_prefixed_streams_several_images() {
    let (mut sender, mut receiver) = tcp_pair(FramingMode::LengthPrefixed);

    for (w, h) in [(64, 48), (32, 32), (80, 20)] {
        assert!(sender.send(&gradient(w, h)).unwrap());
        let (ok, image) = receiver.read();
        assert!(ok);
        assert_eq!(image.expect("decoded").dimensions(), (w, h));
    }
}

#[test]
fn test_tcp_marker_mode_reads_length_prefixed_sender() {
    // Arrange
    let (mut sender, mut receiver) = tcp_pair(FramingMode::Marker);
    sender.send(&gradient(100, 60)).unwrap();
    sender.send(&gradient(50, 30)).unwrap();

    // Act: marker mode may need several reads per frame
    let mut dims = Vec::new();
    for _ in 0..200 {
        if let (true, Some(image)) = receiver.read() {
            dims.push(image.dimensions());
            if dims.len() == 2 {
                break;
            }
        }
    }

    // Assert
    assert_eq!(dims, vec![(100, 60), (50, 30)]);
}

#[test]
fn test_tcp_receiver_release_triggers_reconnect_required() {
    // Arrange
    let (mut sender, mut receiver) = tcp_pair(FramingMode::LengthPrefixed);

    // Act
    receiver.release();
    let mut outcome = Ok(true);
    for _ in 0..200 {
        outcome = sender.send_encoded(&[1u8; 4096]);
        if outcome.is_err() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    // Assert
    assert!(matches!(outcome, Err(SessionError::ReconnectRequired)));
    assert!(!sender.has_peer());
}

#[test]
fn test_udp_handshake_then_frame_is_received() {
    // Arrange
    let mut sender = udp_sender();
    let mut receiver = udp_receiver(sender.local_addr().unwrap());
    assert!(sender.connecting().unwrap(), "handshake registers the receiver");

    // Act
    assert!(sender.send(&gradient(120, 90)).unwrap());
    let (ok, image) = receiver.read();

    // Assert
    assert!(ok);
    assert_eq!(image.expect("decoded").dimensions(), (120, 90));
}

#[test]
fn test_udp_fanout_reaches_three_receivers() {
    // Arrange
    let mut sender = udp_sender();
    let server = sender.local_addr().unwrap();
    let mut receivers: Vec<UdpReceiver> = (0..3).map(|_| udp_receiver(server)).collect();
    for _ in 0..3 {
        assert!(sender.connecting().unwrap());
    }

    // Act
    let payload = JpegCodec::default().encode(&gradient(40, 40)).unwrap();
    let report = sender
        .fanout(&payload)
        .unwrap()
        .expect("fits one datagram");

    // Assert
    assert_eq!(report.attempts(), 3);
    for receiver in &mut receivers {
        let (ok, image) = receiver.read();
        assert!(ok);
        assert_eq!(image.unwrap().dimensions(), (40, 40));
    }
}

#[test]
fn test_receive_use_case_counts_udp_frames() {
    // Arrange
    let mut sender = udp_sender();
    let receiver = udp_receiver(sender.local_addr().unwrap());
    assert!(sender.connecting().unwrap());
    let mut uc = ReceiveFramesUseCase::new(Box::new(receiver), Box::new(DiscardSink));

    // Act
    sender.send(&gradient(16, 16)).unwrap();
    let outcome = uc.step();

    // Assert
    assert_eq!(outcome, ReadOutcome::Frame);
    assert_eq!(uc.stats().frames_received, 1);
}

#[test]
fn test_receive_use_case_stops_when_sender_drops_stream() {
    // Arrange
    let (mut sender, receiver) = tcp_pair(FramingMode::LengthPrefixed);
    assert!(sender.send(&gradient(16, 16)).unwrap());
    let mut uc = ReceiveFramesUseCase::new(Box::new(receiver), Box::new(DiscardSink));
    sender.close();

    // Act: nothing clears the flag, so only the disconnect can end the run
    let started = Instant::now();
    let stats = uc.run(&AtomicBool::new(true), None);

    // Assert
    assert_eq!(stats.frames_received, 1);
    assert!(stats.failures >= 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}
