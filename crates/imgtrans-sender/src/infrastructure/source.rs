//! Synthetic frame source.
//!
//! `TestPatternSource` stands in for a camera: every `read()` yields a new
//! frame of a diagonal colour gradient that scrolls one step per frame, so a
//! viewer can tell frames apart and spot dropped ones.

use imgtrans_core::{Image, ImageReceiver};

pub const DEFAULT_PATTERN_WIDTH: u32 = 640;
pub const DEFAULT_PATTERN_HEIGHT: u32 = 480;

/// Pixels the gradient advances per frame.
const SCROLL_STEP: u32 = 4;

/// Generates a moving gradient.  Never fails and never runs dry.
#[derive(Debug, Clone)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame: u64,
    released: bool,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            frame: 0,
            released: false,
        }
    }

    /// Frames produced so far.
    pub fn frames_produced(&self) -> u64 {
        self.frame
    }

    fn render(&self) -> Image {
        let offset = self.frame.wrapping_mul(u64::from(SCROLL_STEP));
        let (w, h) = (u64::from(self.width), u64::from(self.height));
        Image::from_fn(self.width, self.height, |x, y| {
            let (x, y) = (u64::from(x), u64::from(y));
            let r = ((x + offset) % w * 255 / w) as u8;
            let g = ((y + offset) % h * 255 / h) as u8;
            let b = ((x + y + offset) % 256) as u8;
            image::Rgb([r, g, b])
        })
    }
}

impl Default for TestPatternSource {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_WIDTH, DEFAULT_PATTERN_HEIGHT)
    }
}

impl ImageReceiver for TestPatternSource {
    fn read(&mut self) -> (bool, Option<Image>) {
        if self.released {
            return (false, None);
        }
        let image = self.render();
        self.frame += 1;
        (true, Some(image))
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn is_closed(&self) -> bool {
        self.released
    }
}
