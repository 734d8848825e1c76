//! StreamFramesUseCase: the sender's polling pump.
//!
//! One [`step`](StreamFramesUseCase::step) does at most one of each:
//!
//! 1. Find a peer if there is none (TCP accept or UDP discovery).
//! 2. Pull one frame from the source.
//! 3. Send it.
//!
//! A lost TCP peer is not an error here: the step reports
//! [`StepOutcome::Reconnecting`] and the next step goes back to accepting.
//!
//! # Architecture
//!
//! The use case depends only on the [`ImageSender`] and [`ImageReceiver`]
//! traits, so tests drive it with mocks and the binary drives it with a real
//! socket and a [`TestPatternSource`](crate::infrastructure::source::TestPatternSource).

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use imgtrans_core::{ImageReceiver, ImageSender, SessionError, Transport};
use tracing::{debug, info};

/// A connected UDP sender listens for new receivers once every this many steps.
pub const DISCOVERY_POLL_EVERY: u64 = 30;

/// Steps between periodic statistics log lines.
const STATS_LOG_EVERY: u64 = 300;

/// What one step of the pump did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Sent,
    /// Encoding or framing failed; the frame was skipped.
    Dropped,
    /// The source produced no frame.
    SourceEmpty,
    WaitingForPeer,
    /// The TCP peer went away; the next step accepts a new one.
    Reconnecting,
}

/// Running counters for one streaming session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub source_failures: u64,
    pub reconnects: u64,
    pub peers_discovered: u64,
}

/// Pumps frames from a source into a sender.
pub struct StreamFramesUseCase {
    sender: Box<dyn ImageSender>,
    source: Box<dyn ImageReceiver>,
    transport: Transport,
    stats: StreamStats,
    steps: u64,
}

impl StreamFramesUseCase {
    pub fn new(
        sender: Box<dyn ImageSender>,
        source: Box<dyn ImageReceiver>,
        transport: Transport,
    ) -> Self {
        Self {
            sender,
            source,
            transport,
            stats: StreamStats::default(),
            steps: 0,
        }
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Runs one iteration of the pump.
    ///
    /// # Errors
    ///
    /// Returns any [`SessionError`] other than `ReconnectRequired`.
    pub fn step(&mut self) -> Result<StepOutcome, SessionError> {
        self.steps += 1;

        if !self.sender.has_peer() {
            self.poll_for_peer()?;
            if !self.sender.has_peer() {
                return Ok(StepOutcome::WaitingForPeer);
            }
        } else if self.transport == Transport::Udp && self.steps % DISCOVERY_POLL_EVERY == 0 {
            self.poll_for_peer()?;
        }

        let (ok, image) = self.source.read();
        let Some(image) = image.filter(|_| ok) else {
            self.stats.source_failures += 1;
            return Ok(StepOutcome::SourceEmpty);
        };

        match self.sender.send(&image) {
            Ok(true) => {
                self.stats.frames_sent += 1;
                Ok(StepOutcome::Sent)
            }
            Ok(false) => {
                self.stats.frames_dropped += 1;
                Ok(StepOutcome::Dropped)
            }
            Err(e) if e.is_reconnect_required() => {
                self.stats.reconnects += 1;
                info!("receiver lost; waiting for it to reconnect");
                Ok(StepOutcome::Reconnecting)
            }
            Err(e) => Err(e),
        }
    }

    /// Steps until `running` is cleared, `max_frames` have been sent, or a
    /// step fails.  The sender and source are always released on return.
    ///
    /// # Errors
    ///
    /// Returns the first unrecoverable [`SessionError`].
    pub fn run(
        &mut self,
        running: &AtomicBool,
        frame_interval: Duration,
        max_frames: Option<u64>,
    ) -> Result<StreamStats, SessionError> {
        info!("streaming frames over {}", self.transport);

        let result = loop {
            if !running.load(Ordering::Relaxed) {
                debug!("stop requested");
                break Ok(());
            }
            if max_frames.is_some_and(|max| self.stats.frames_sent >= max) {
                info!("frame limit reached");
                break Ok(());
            }

            match self.step() {
                Ok(StepOutcome::Sent | StepOutcome::Dropped | StepOutcome::SourceEmpty) => {
                    if !frame_interval.is_zero() {
                        thread::sleep(frame_interval);
                    }
                }
                Ok(StepOutcome::WaitingForPeer | StepOutcome::Reconnecting) => {}
                Err(e) => break Err(e),
            }

            if self.steps % STATS_LOG_EVERY == 0 {
                info!(stats = ?self.stats, "streaming statistics");
            }
        };

        self.sender.close();
        self.source.release();
        info!(stats = ?self.stats, "streaming stopped");
        result.map(|()| self.stats)
    }

    fn poll_for_peer(&mut self) -> Result<(), SessionError> {
        if self.sender.connecting()? {
            self.stats.peers_discovered += 1;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
