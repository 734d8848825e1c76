//! TcpReceiver: pulls frames from a TCP sender.
//!
//! The receiver is the *client*: it connects once at construction and never
//! reconnects.  A lost connection turns every later `read()` into
//! `(false, None)`; the caller builds a new receiver to try again.
//!
//! # Framing modes (for beginners)
//!
//! The sender always writes `[len:4 LE][jpeg][0u32]`.  There are two ways to
//! carve frames back out of that byte stream:
//!
//! - [`FramingMode::LengthPrefixed`] trusts the prefix: read 4 bytes, read
//!   exactly `len` bytes, then read and check the 4-byte terminator.
//! - [`FramingMode::Marker`] ignores the prefix and scans for the JPEG
//!   start-of-image (`FF D8`) and end-of-image (`FF D9`) markers.  This is
//!   how older receivers worked.  It needs no cooperation from the sender but
//!   assumes `FF D9` never appears inside the image data.
//!
//! # Return values
//!
//! | situation                               | `read()` returns   |
//! |-----------------------------------------|--------------------|
//! | frame reassembled and decoded           | `(true, Some(img))`|
//! | frame reassembled, not a valid JPEG     | `(true, None)`     |
//! | marker mode, frame not complete yet     | `(false, None)`    |
//! | timeout, I/O error, or disconnected     | `(false, None)`    |
//!
//! In length-prefixed mode a frame that stalls or breaks after its first
//! byte, or ends in a non-zero terminator, leaves the stream out of
//! alignment.  The receiver then counts as disconnected, so later reads never
//! treat payload bytes as a length prefix.

use std::io::{self, BufRead, BufReader, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use imgtrans_core::{
    domain::endpoint::DEFAULT_PORT,
    protocol::framing::{decode_length_le, LENGTH_PREFIX_SIZE, MAX_TCP_FRAME_LEN, TCP_TERMINATOR},
    FrameCodec, FramingMode, Image, ImageReceiver, JpegCodec, SessionError, StreamBuffer,
};
use tracing::{debug, info, warn};

use super::is_timeout_error;

/// Bytes requested from the socket per marker-mode read.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Configuration for a [`TcpReceiver`].
#[derive(Debug, Clone)]
pub struct TcpReceiverConfig {
    pub server: SocketAddr,
    pub framing: FramingMode,
    /// Bound on the initial connect; `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Bound on each socket read; `None` blocks.
    pub read_timeout: Option<Duration>,
}

impl Default for TcpReceiverConfig {
    fn default() -> Self {
        Self {
            server: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            framing: FramingMode::default(),
            connect_timeout: None,
            read_timeout: None,
        }
    }
}

/// Single-connection TCP frame client.
pub struct TcpReceiver {
    reader: Option<BufReader<TcpStream>>,
    server: SocketAddr,
    framing: FramingMode,
    buffer: StreamBuffer,
    codec: JpegCodec,
    disconnected: bool,
}

impl TcpReceiver {
    /// Connects to the sender.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConnectFailed`] if the connection cannot be
    /// established.  There is no retry.
    pub fn connect(config: TcpReceiverConfig) -> Result<Self, SessionError> {
        let server = config.server;
        let connected = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&server, timeout),
            None => TcpStream::connect(server),
        };
        let stream = connected.map_err(|source| {
            warn!("could not connect to sender at {server}: {source}");
            SessionError::ConnectFailed {
                addr: server,
                source,
            }
        })?;
        stream.set_read_timeout(config.read_timeout)?;
        info!("connected to sender at {server} ({:?} framing)", config.framing);

        Ok(Self {
            reader: Some(BufReader::with_capacity(READ_CHUNK_SIZE, stream)),
            server,
            framing: config.framing,
            buffer: StreamBuffer::with_capacity(READ_CHUNK_SIZE * 2),
            codec: JpegCodec::default(),
            disconnected: false,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    pub fn framing(&self) -> FramingMode {
        self.framing
    }

    /// `true` once the sender has closed the stream or a read has failed hard.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected || self.reader.is_none()
    }

    /// Bytes held in the marker-mode reassembly buffer.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn read_marker(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(frame) = self.buffer.next_frame() {
            return Ok(Some(frame));
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        self.buffer.extend(&chunk[..n]);
        Ok(self.buffer.next_frame())
    }

    fn read_length_prefixed(&mut self) -> io::Result<Option<Vec<u8>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };

        // Waiting for the first byte consumes nothing, so a timeout here
        // leaves the stream aligned.
        if reader.fill_buf()?.is_empty() {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }

        match read_framed(reader) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                warn!("stream from {} lost frame alignment: {e}", self.server);
                self.disconnected = true;
                Ok(None)
            }
        }
    }

    fn on_read_error(&mut self, e: &io::Error) {
        if is_timeout_error(e) {
            debug!("no frame from {} within the read timeout", self.server);
            return;
        }
        warn!("read from {} failed: {e}", self.server);
        if matches!(
            e.kind(),
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::InvalidData
        ) {
            self.disconnected = true;
        }
    }
}

/// Reads one `[len][payload][terminator]` frame.  Any error leaves the reader
/// somewhere inside the frame.
fn read_framed(reader: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut prefix)?;
    let len = decode_length_le(&prefix)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))? as usize;
    if len > MAX_TCP_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("declared frame length {len} exceeds {MAX_TCP_FRAME_LEN}"),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    let mut terminator = [0u8; LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut terminator)?;
    if terminator != TCP_TERMINATOR {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame terminator was {terminator:02x?}, expected zeros"),
        ));
    }
    Ok(payload)
}

impl ImageReceiver for TcpReceiver {
    fn read(&mut self) -> (bool, Option<Image>) {
        if self.is_disconnected() {
            return (false, None);
        }

        let frame = match self.framing {
            FramingMode::Marker => self.read_marker(),
            FramingMode::LengthPrefixed => self.read_length_prefixed(),
        };

        match frame {
            Ok(Some(bytes)) => {
                let image = self.codec.decode(&bytes);
                if image.is_none() {
                    debug!("received {}-byte frame that is not a decodable JPEG", bytes.len());
                }
                (true, image)
            }
            Ok(None) => (false, None),
            Err(e) => {
                self.on_read_error(&e);
                (false, None)
            }
        }
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.get_ref().shutdown(Shutdown::Both) {
                debug!("socket shutdown failed: {e}");
            }
        }
        self.buffer.clear();
        debug!("TCP receiver for {} released", self.server);
    }

    fn is_closed(&self) -> bool {
        self.is_disconnected()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
