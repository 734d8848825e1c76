//! Protocol module containing the frame wire formats.

pub mod framing;
pub mod marker;

pub use framing::{
    build_datagram, build_tcp_frame, parse_datagram, parse_tcp_frame, FramingError, FramingMode,
};
pub use marker::StreamBuffer;
