//! # imgtrans-core
//!
//! Shared library for ImgTrans containing the frame wire protocol, the frame
//! codec, and the domain types used by both the sender and the receiver.
//!
//! This crate is used by both the sender and receiver applications.
//! It has zero dependencies on network sockets: everything here is either a
//! pure function over byte slices or a plain in-memory data structure.
//!
//! # Architecture overview (for beginners)
//!
//! ImgTrans moves a live sequence of JPEG still images from one producer (a
//! camera host such as a Raspberry Pi) to one or more viewers over a local
//! network.  Two transports are supported:
//!
//! - **TCP**: one persistent connection, one viewer.  Frames are written as a
//!   continuous length-prefixed byte stream.
//! - **UDP**: one datagram per frame, fanned out to every viewer that
//!   announced itself with a `connect` handshake datagram.
//!
//! This crate (`imgtrans-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How frames travel over the wire: length prefixes,
//!   terminators, the UDP datagram layout, and marker-delimited extraction
//!   from a raw byte stream.
//!
//! - **`codec`** – The [`FrameCodec`] capability that turns an image into
//!   encoded bytes and back, plus the JPEG implementation.
//!
//! - **`domain`** – Endpoint identity, the UDP client registry, and the TCP
//!   connection state machine.
//!
//! - **`session`** – The uniform open / send-or-read / close surface that
//!   every transport variant implements.

pub mod codec;
pub mod domain;
pub mod protocol;
pub mod session;

// Re-export the most-used types at the crate root so callers can write
// `imgtrans_core::ClientRegistry` instead of `imgtrans_core::domain::registry::ClientRegistry`.
pub use codec::{timeout_placeholder, CodecError, FrameCodec, Image, JpegCodec};
pub use domain::endpoint::{EndpointError, EndpointIdentity, InterfaceResolver, SystemInterfaceResolver};
pub use domain::registry::ClientRegistry;
pub use domain::state::ConnectionState;
pub use protocol::framing::{FramingError, FramingMode};
pub use protocol::marker::StreamBuffer;
pub use session::{ImageReceiver, ImageSender, SessionError, Transport};
