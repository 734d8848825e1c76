//! Length-prefixed frame encoding for the TCP stream and UDP datagrams.
//!
//! TCP wire format (little-endian throughout):
//! ```text
//! [payload_len:4 LE][payload:N][terminator:4 LE = 0x00000000]
//! ```
//!
//! UDP wire format (one frame per datagram, big-endian prefix):
//! ```text
//! [payload_len:4 BE][payload:N]["EOF":3]
//! ```
//!
//! The byte-order difference between the two transports is part of the wire
//! contract shared with existing peers and must not be unified.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of every length prefix, in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// The zero-valued word written after each TCP payload.
pub const TCP_TERMINATOR: [u8; LENGTH_PREFIX_SIZE] = [0; LENGTH_PREFIX_SIZE];

/// Trailing end-of-frame sentinel appended to every UDP datagram.
pub const UDP_SENTINEL: &[u8; 3] = b"EOF";

/// Handshake payload a UDP receiver sends to register with a sender.
pub const HANDSHAKE: &[u8] = b"connect";

/// Receive buffer size for one UDP datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Largest payload an IPv4 UDP datagram can actually carry.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Upper bound on a TCP frame length accepted by a receiver.
pub const MAX_TCP_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Errors that can occur while building or parsing a frame.
#[derive(Debug, Error, PartialEq)]
pub enum FramingError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The declared payload length does not match the bytes available.
    #[error("payload length mismatch: prefix says {declared}, available is {available}")]
    LengthMismatch { declared: usize, available: usize },

    /// The trailing sentinel / terminator is not the expected value.
    #[error("end-of-frame sentinel mismatch: got {0:02X?}")]
    SentinelMismatch(Vec<u8>),

    /// The frame would not fit in the transport's size limit.
    #[error("frame too large: {len} bytes exceeds limit of {limit}")]
    FrameTooLarge { len: usize, limit: usize },
}

/// How a TCP receiver locates frame boundaries in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// Scan for the JPEG start / end markers; ignores the outer framing.
    Marker,
    /// Read the 4-byte LE prefix, then exactly that many payload bytes.
    #[default]
    LengthPrefixed,
}

impl FromStr for FramingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "marker" => Ok(Self::Marker),
            "length_prefixed" => Ok(Self::LengthPrefixed),
            other => Err(format!(
                "unknown framing {other:?}; expected \"marker\" or \"length_prefixed\""
            )),
        }
    }
}

// ── Length prefixes ───────────────────────────────────────────────────────────

/// Encodes `len` as the little-endian prefix used on the TCP stream.
pub fn encode_length_le(len: u32) -> [u8; LENGTH_PREFIX_SIZE] {
    len.to_le_bytes()
}

/// Decodes a little-endian TCP length prefix from the start of `bytes`.
///
/// # Errors
///
/// Returns [`FramingError::InsufficientData`] if fewer than 4 bytes are given.
pub fn decode_length_le(bytes: &[u8]) -> Result<u32, FramingError> {
    Ok(u32::from_le_bytes(read_prefix(bytes)?))
}

/// Encodes `len` as the big-endian prefix used in UDP datagrams.
pub fn encode_length_be(len: u32) -> [u8; LENGTH_PREFIX_SIZE] {
    len.to_be_bytes()
}

/// Decodes a big-endian UDP length prefix from the start of `bytes`.
///
/// # Errors
///
/// Returns [`FramingError::InsufficientData`] if fewer than 4 bytes are given.
pub fn decode_length_be(bytes: &[u8]) -> Result<u32, FramingError> {
    Ok(u32::from_be_bytes(read_prefix(bytes)?))
}

// ── TCP frames ────────────────────────────────────────────────────────────────

/// Builds one complete TCP frame: LE prefix, payload, zero terminator.
///
/// Senders that need to flush between the parts write them individually;
/// this function exists for callers that want the whole frame at once.
///
/// # Errors
///
/// Returns [`FramingError::FrameTooLarge`] if the payload length does not fit
/// in the 32-bit prefix.
///
/// # Examples
///
/// ```rust
/// use imgtrans_core::protocol::framing::{build_tcp_frame, parse_tcp_frame};
///
/// let frame = build_tcp_frame(b"jpeg").unwrap();
/// assert_eq!(frame.len(), 4 + 4 + 4);
/// let (payload, consumed) = parse_tcp_frame(&frame).unwrap();
/// assert_eq!(payload, b"jpeg");
/// assert_eq!(consumed, frame.len());
/// ```
pub fn build_tcp_frame(payload: &[u8]) -> Result<Vec<u8>, FramingError> {
    let len = payload_len_u32(payload.len())?;
    let mut buf = Vec::with_capacity(2 * LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&encode_length_le(len));
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&TCP_TERMINATOR);
    Ok(buf)
}

/// Parses one TCP frame from the beginning of `bytes`.
///
/// Returns the payload and the total number of bytes consumed (prefix +
/// payload + terminator), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`FramingError`] if the frame is truncated or the terminator is
/// not zero.
pub fn parse_tcp_frame(bytes: &[u8]) -> Result<(&[u8], usize), FramingError> {
    let declared = decode_length_le(bytes)? as usize;
    let body = &bytes[LENGTH_PREFIX_SIZE..];
    let total = LENGTH_PREFIX_SIZE + declared + LENGTH_PREFIX_SIZE;
    if bytes.len() < total {
        return Err(FramingError::LengthMismatch {
            declared,
            available: body.len(),
        });
    }

    let terminator = &body[declared..declared + LENGTH_PREFIX_SIZE];
    if terminator != TCP_TERMINATOR {
        return Err(FramingError::SentinelMismatch(terminator.to_vec()));
    }
    Ok((&body[..declared], total))
}

// ── UDP datagrams ─────────────────────────────────────────────────────────────

/// Builds one UDP datagram: BE prefix, payload, `EOF` sentinel.
///
/// # Errors
///
/// Returns [`FramingError::FrameTooLarge`] if the datagram would exceed
/// [`MAX_UDP_PAYLOAD`].
pub fn build_datagram(payload: &[u8]) -> Result<Vec<u8>, FramingError> {
    let total = LENGTH_PREFIX_SIZE + payload.len() + UDP_SENTINEL.len();
    if total > MAX_UDP_PAYLOAD {
        return Err(FramingError::FrameTooLarge {
            len: total,
            limit: MAX_UDP_PAYLOAD,
        });
    }

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&encode_length_be(payload.len() as u32));
    buf.extend_from_slice(payload);
    buf.extend_from_slice(UDP_SENTINEL);
    Ok(buf)
}

/// Parses a UDP datagram and returns the payload slice.
///
/// The sentinel must immediately follow the declared payload and end the
/// datagram.
///
/// # Errors
///
/// Returns [`FramingError`] for a short datagram, a prefix that overruns
/// the datagram, or a missing / wrong sentinel.
pub fn parse_datagram(datagram: &[u8]) -> Result<&[u8], FramingError> {
    let declared = decode_length_be(datagram)? as usize;
    let body = &datagram[LENGTH_PREFIX_SIZE..];
    if body.len() < declared {
        return Err(FramingError::LengthMismatch {
            declared,
            available: body.len(),
        });
    }

    let (payload, trailer) = body.split_at(declared);
    if trailer != UDP_SENTINEL {
        return Err(FramingError::SentinelMismatch(trailer.to_vec()));
    }
    Ok(payload)
}

/// Returns `true` if `datagram` is exactly the `connect` handshake.
pub fn is_handshake(datagram: &[u8]) -> bool {
    datagram == HANDSHAKE
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn read_prefix(bytes: &[u8]) -> Result<[u8; LENGTH_PREFIX_SIZE], FramingError> {
    bytes
        .get(..LENGTH_PREFIX_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or(FramingError::InsufficientData {
            needed: LENGTH_PREFIX_SIZE,
            available: bytes.len(),
        })
}

fn payload_len_u32(len: usize) -> Result<u32, FramingError> {
    u32::try_from(len).map_err(|_| FramingError::FrameTooLarge {
        len,
        limit: u32::MAX as usize,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
