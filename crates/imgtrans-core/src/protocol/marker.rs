//! Marker-delimited frame extraction from a continuous byte stream.
//!
//! The legacy TCP receiver ignores the outer length framing entirely and
//! instead scans the raw stream for the JPEG start-of-image (`FF D8`) and
//! end-of-image (`FF D9`) markers.  Everything between the first start marker
//! and the first end marker after it (inclusive) is one frame.
//!
//! # Format assumption
//!
//! This relies on the JPEG format placing `FF D9` only at the true end of the
//! image.  Baseline encoders byte-stuff `FF` inside entropy-coded data, so the
//! assumption holds for frames produced by [`crate::JpegCodec`], but a payload
//! with an embedded thumbnail would be split early.  The length-prefixed mode
//! has no such restriction.

use tracing::warn;

use super::framing::MAX_TCP_FRAME_LEN;

/// JPEG start-of-image marker.
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker.
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Accumulates unconsumed stream bytes and yields complete marker frames.
///
/// After each successful [`next_frame`](Self::next_frame) every byte up to
/// and including the extracted frame's end marker has been discarded, so a
/// frame is never delivered twice.
///
/// A started frame may grow to `limit` bytes (default
/// [`MAX_TCP_FRAME_LEN`]).  Past that it is abandoned and scanning resumes at
/// the next start marker.
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    bytes: Vec<u8>,
    limit: usize,
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            limit: MAX_TCP_FRAME_LEN,
        }
    }
}

impl StreamBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Creates an empty buffer that abandons frames longer than `limit`.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Appends a chunk read from the socket.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Extracts the next complete `[SOI .. EOI]` frame, if one is buffered.
    ///
    /// When no start marker is present at all, the bytes are unusable and are
    /// dropped, except for a trailing `FF` that may be the first half of a
    /// marker split across two reads.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let Some(start) = find_marker(&self.bytes, SOI, 0) else {
            self.discard_garbage();
            return None;
        };
        let Some(eoi) = find_marker(&self.bytes, EOI, start + SOI.len()) else {
            if self.bytes.len() - start > self.limit {
                self.abandon_frame(start);
            }
            return None;
        };
        let end = eoi + EOI.len();

        let frame = self.bytes[start..end].to_vec();
        self.bytes.drain(..end);
        Some(frame)
    }

    /// The bytes currently held and not yet consumed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Drops the unterminated frame at `start`, keeping any later start marker.
    fn abandon_frame(&mut self, start: usize) {
        warn!(
            "no end marker within {} bytes; dropping partial frame",
            self.limit
        );
        match find_marker(&self.bytes, SOI, start + SOI.len()) {
            Some(next) => {
                self.bytes.drain(..next);
            }
            None => {
                self.bytes.drain(..start + SOI.len());
                self.discard_garbage();
            }
        }
    }

    fn discard_garbage(&mut self) {
        let keep_tail = self.bytes.last() == Some(&SOI[0]);
        let cut = self.bytes.len() - usize::from(keep_tail);
        self.bytes.drain(..cut);
    }
}

/// Returns the index of the first occurrence of `marker` at or after `from`.
fn find_marker(haystack: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jpeg(body: &[u8]) -> Vec<u8> {
        let mut v = SOI.to_vec();
        v.extend_from_slice(body);
        v.extend_from_slice(&EOI);
        v
    }

    #[test]
    fn test_next_frame_returns_none_until_end_marker_arrives() {
        // Arrange
        let mut buf = StreamBuffer::new();
        buf.extend(&[0xFF, 0xD8, 1, 2, 3]);

        // Act / Assert
        assert!(buf.next_frame().is_none());
        buf.extend(&[0xFF, 0xD9]);
        assert_eq!(buf.next_frame().unwrap(), vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_next_frame_skips_leading_bytes_and_keeps_trailing() {
        // Arrange: length prefix before the frame, next prefix after it
        let mut buf = StreamBuffer::new();
        buf.extend(&[9, 0, 0, 0]);
        buf.extend(&fake_jpeg(&[7, 7]));
        buf.extend(&[0, 0, 0, 0, 5]);

        // Act
        let frame = buf.next_frame().unwrap();

        // Assert
        assert_eq!(frame, fake_jpeg(&[7, 7]));
        assert_eq!(buf.as_bytes(), &[0, 0, 0, 0, 5]);
    }

    #[test]
    fn test_next_frame_ignores_end_marker_before_start_marker() {
        let mut buf = StreamBuffer::new();
        buf.extend(&[0xFF, 0xD9, 0xFF, 0xD8, 4, 0xFF, 0xD9]);
        assert_eq!(buf.next_frame().unwrap(), vec![0xFF, 0xD8, 4, 0xFF, 0xD9]);
    }

    #[test]
    fn test_next_frame_delivers_each_frame_once() {
        // Arrange
        let mut buf = StreamBuffer::new();
        buf.extend(&fake_jpeg(&[1]));
        buf.extend(&fake_jpeg(&[2]));

        // Act
        let first = buf.next_frame();
        let second = buf.next_frame();
        let third = buf.next_frame();

        // Assert
        assert_eq!(first.unwrap(), fake_jpeg(&[1]));
        assert_eq!(second.unwrap(), fake_jpeg(&[2]));
        assert!(third.is_none());
    }

    #[test]
    fn test_next_frame_marker_split_across_reads() {
        let frame = fake_jpeg(&[10, 20, 30, 40]);
        for split in 1..frame.len() {
            let mut buf = StreamBuffer::new();
            buf.extend(&frame[..split]);
            let early = buf.next_frame();
            buf.extend(&frame[split..]);
            let got = early.or_else(|| buf.next_frame());
            assert_eq!(got.as_deref(), Some(&frame[..]), "split at {split}");
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_garbage_without_start_marker_is_discarded() {
        // Arrange
        let mut buf = StreamBuffer::new();
        buf.extend(&[1, 2, 3, 4]);

        // Act
        assert!(buf.next_frame().is_none());

        // Assert
        assert!(buf.is_empty());
    }

    #[test]
    fn test_garbage_discard_keeps_half_marker() {
        let mut buf = StreamBuffer::new();
        buf.extend(&[1, 2, 0xFF]);
        assert!(buf.next_frame().is_none());
        assert_eq!(buf.as_bytes(), &[0xFF]);

        buf.extend(&[0xD8, 0xFF, 0xD9]);
        assert_eq!(buf.next_frame().unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn test_unterminated_frame_past_limit_is_dropped() {
        // Arrange
        let mut buf = StreamBuffer::with_limit(8);
        buf.extend(&SOI);
        buf.extend(&[0x11; 20]);

        // Act
        let frame = buf.next_frame();

        // Assert
        assert!(frame.is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_overlong_frame_resyncs_on_next_start_marker() {
        // Arrange: a runaway frame followed by the start of a real one
        let mut buf = StreamBuffer::with_limit(8);
        buf.extend(&SOI);
        buf.extend(&[0x22; 12]);
        buf.extend(&[0xFF, 0xD8, 5]);

        // Act
        assert!(buf.next_frame().is_none());
        buf.extend(&EOI);
        let frame = buf.next_frame();

        // Assert
        assert_eq!(frame.unwrap(), vec![0xFF, 0xD8, 5, 0xFF, 0xD9]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_frame_within_limit_is_kept_while_waiting() {
        let mut buf = StreamBuffer::with_limit(8);
        buf.extend(&[0xFF, 0xD8, 1, 2, 3, 4]);
        assert!(buf.next_frame().is_none());
        assert_eq!(buf.len(), 6);
        assert_eq!(StreamBuffer::new().limit(), MAX_TCP_FRAME_LEN);
    }

    #[test]
    fn test_start_marker_alone_is_retained() {
        let mut buf = StreamBuffer::new();
        buf.extend(&[0, 0xFF, 0xD8, 1]);
        assert!(buf.next_frame().is_none());
        assert_eq!(buf.len(), 4);
    }
}
