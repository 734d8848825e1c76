//! Frame codec: turns an in-memory image into an encoded payload and back.
//!
//! The transports never look inside a payload; they only need something that
//! implements [`FrameCodec`].  [`JpegCodec`] is the implementation used by
//! every sender and receiver in this workspace.
//!
//! Decoding never raises: a byte sequence that is not a valid image yields
//! `None`, which callers report as a failed read and then keep polling.

pub mod jpeg;
pub mod placeholder;

pub use jpeg::JpegCodec;
pub use placeholder::{timeout_placeholder, PLACEHOLDER_HEIGHT, PLACEHOLDER_WIDTH};

use thiserror::Error;

/// The decoded image type exchanged with application code.
pub type Image = image::RgbImage;

/// Error type for frame encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The image could not be encoded (e.g. zero-sized).
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// Encodes images to payload bytes and decodes payload bytes to images.
pub trait FrameCodec: Send + Sync {
    /// Encodes one image.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the image cannot be encoded.
    fn encode(&self, image: &Image) -> Result<Vec<u8>, CodecError>;

    /// Decodes one payload, returning `None` if it is not a valid image.
    fn decode(&self, bytes: &[u8]) -> Option<Image>;
}
