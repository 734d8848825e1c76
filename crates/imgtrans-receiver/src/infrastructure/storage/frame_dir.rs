//! DirectorySink: writes each received frame to `<dir>/frame_NNNNNN.jpg`.

use std::path::{Path, PathBuf};

use imgtrans_core::{FrameCodec, Image, JpegCodec};
use tracing::{debug, info};

use crate::application::receive_frames::{FrameSink, SinkError};

/// Stores frames as numbered JPEG files.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    codec: JpegCodec,
}

impl DirectorySink {
    /// Creates the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] if the directory cannot be created.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| SinkError::Io {
            path: dir.clone(),
            source,
        })?;
        info!("writing received frames to {}", dir.display());
        Ok(Self {
            dir,
            codec: JpegCodec::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path frame `index` is written to.
    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.jpg"))
    }
}

impl FrameSink for DirectorySink {
    fn accept(&mut self, index: u64, image: &Image) -> Result<(), SinkError> {
        let bytes = self.codec.encode(image)?;
        let path = self.frame_path(index);
        std::fs::write(&path, bytes).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("stored {}", path.display());
        Ok(())
    }
}
