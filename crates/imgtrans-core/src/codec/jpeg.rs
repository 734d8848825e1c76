//! JPEG implementation of [`FrameCodec`] backed by the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use tracing::debug;

use super::{CodecError, FrameCodec, Image};

/// Conventional codec default quality, used on the UDP path.
pub const DEFAULT_QUALITY: u8 = 95;

/// Fixed quality for the TCP length-prefixed path.
pub const TCP_QUALITY: u8 = 70;

/// Baseline JPEG codec with a configurable quality (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    /// Creates a codec; `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl FrameCodec for JpegCodec {
    fn encode(&self, image: &Image) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(image)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Option<Image> {
        match image::load_from_memory_with_format(bytes, ImageFormat::Jpeg) {
            Ok(decoded) => Some(decoded.to_rgb8()),
            Err(e) => {
                debug!("frame payload is not a decodable JPEG: {e}");
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
