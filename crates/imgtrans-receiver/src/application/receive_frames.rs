//! ReceiveFramesUseCase: the receiver's polling pump.
//!
//! Each [`step`](ReceiveFramesUseCase::step) performs one `read()` on the
//! receiver, classifies the result, and hands decoded frames to a
//! [`FrameSink`].  Single failed reads are not fatal; the pump keeps polling
//! until told to stop, pausing briefly after a run of failures.  A receiver
//! that reports [`is_closed`](ImageReceiver::is_closed) ends the run.
//!
//! # Architecture
//!
//! The use case depends only on the [`ImageReceiver`] and [`FrameSink`]
//! traits.  The binary plugs in a real socket receiver and a
//! [`DirectorySink`](crate::infrastructure::storage::DirectorySink); tests
//! plug in mocks.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use imgtrans_core::{CodecError, Image, ImageReceiver};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Steps between periodic statistics log lines.
const STATS_LOG_EVERY: u64 = 300;

/// Consecutive failed reads before the pump starts pausing between reads.
const FAILURE_BACKOFF_AFTER: u32 = 3;

/// Pause between reads while failures persist.
const FAILURE_BACKOFF: Duration = Duration::from_millis(50);

/// Error type for frame sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Encode(#[from] CodecError),
}

/// Destination for decoded frames.
pub trait FrameSink: Send {
    /// Consumes frame number `index` (counting from zero).
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the frame could not be stored.
    fn accept(&mut self, index: u64, image: &Image) -> Result<(), SinkError>;
}

/// Sink that drops every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl FrameSink for DiscardSink {
    fn accept(&mut self, _index: u64, _image: &Image) -> Result<(), SinkError> {
        Ok(())
    }
}

/// What one step of the pump observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Frame,
    /// A frame arrived intact but did not decode.
    Undecodable,
    /// The read timed out; the receiver supplied a placeholder.
    TimedOut,
    Failed,
    /// The receiver can no longer produce frames.
    Disconnected,
}

/// Running counters for one receiving session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveStats {
    pub frames_received: u64,
    pub undecodable: u64,
    pub timeouts: u64,
    pub failures: u64,
    pub sink_failures: u64,
}

/// Pumps frames from a receiver into a sink.
pub struct ReceiveFramesUseCase {
    receiver: Box<dyn ImageReceiver>,
    sink: Box<dyn FrameSink>,
    stats: ReceiveStats,
    steps: u64,
    consecutive_failures: u32,
}

impl ReceiveFramesUseCase {
    pub fn new(receiver: Box<dyn ImageReceiver>, sink: Box<dyn FrameSink>) -> Self {
        Self {
            receiver,
            sink,
            stats: ReceiveStats::default(),
            steps: 0,
            consecutive_failures: 0,
        }
    }

    pub fn stats(&self) -> ReceiveStats {
        self.stats
    }

    /// Reads once and records the outcome.
    pub fn step(&mut self) -> ReadOutcome {
        self.steps += 1;

        let outcome = self.read_once();
        if outcome == ReadOutcome::Failed {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        } else {
            self.consecutive_failures = 0;
        }
        outcome
    }

    fn read_once(&mut self) -> ReadOutcome {
        match self.receiver.read() {
            (true, Some(image)) => {
                let index = self.stats.frames_received;
                self.stats.frames_received += 1;
                if let Err(e) = self.sink.accept(index, &image) {
                    self.stats.sink_failures += 1;
                    warn!("frame {index} not stored: {e}");
                }
                ReadOutcome::Frame
            }
            (true, None) => {
                self.stats.undecodable += 1;
                ReadOutcome::Undecodable
            }
            (false, Some(_placeholder)) => {
                self.stats.timeouts += 1;
                ReadOutcome::TimedOut
            }
            (false, None) => {
                self.stats.failures += 1;
                if self.receiver.is_closed() {
                    ReadOutcome::Disconnected
                } else {
                    ReadOutcome::Failed
                }
            }
        }
    }

    /// Steps until `running` is cleared, `max_frames` frames have arrived, or
    /// the receiver closes.  The receiver is always released on return.
    pub fn run(&mut self, running: &AtomicBool, max_frames: Option<u64>) -> ReceiveStats {
        info!("receiving frames");

        loop {
            if !running.load(Ordering::Relaxed) {
                debug!("stop requested");
                break;
            }
            if max_frames.is_some_and(|max| self.stats.frames_received >= max) {
                info!("frame limit reached");
                break;
            }

            match self.step() {
                ReadOutcome::Disconnected => {
                    warn!("receiver closed; stopping");
                    break;
                }
                ReadOutcome::Failed if self.consecutive_failures >= FAILURE_BACKOFF_AFTER => {
                    std::thread::sleep(FAILURE_BACKOFF);
                }
                _ => {}
            }

            if self.steps % STATS_LOG_EVERY == 0 {
                info!(stats = ?self.stats, "receive statistics");
            }
        }

        self.receiver.release();
        info!(stats = ?self.stats, "receiving stopped");
        self.stats
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
