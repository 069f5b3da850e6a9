//! Status badge overlay.
//!
//! Stamps a small square into the top-left corner of every frame. Its
//! colour flips once per second, so a viewer can tell at a glance that the
//! stream is live rather than frozen.

use std::time::{Duration, Instant};

use pane_core::{Frame, Overlay, Pixel};

/// Badge edge length in pixels.
pub const BADGE_SIZE: u32 = 12;

/// Distance from the top-left corner.
pub const BADGE_MARGIN: u32 = 6;

const LIVE_ON: Pixel = Pixel::from_bgra(0x30, 0xD0, 0x30, 0xFF);
const LIVE_OFF: Pixel = Pixel::from_bgra(0x10, 0x50, 0x10, 0xFF);

/// Blinking "live" indicator.
#[derive(Debug, Clone)]
pub struct StatusBadge {
    started: Instant,
}

impl StatusBadge {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Badge colour `elapsed` after the session started.
    pub fn colour_at(elapsed: Duration) -> Pixel {
        if elapsed.as_secs() % 2 == 0 {
            LIVE_ON
        } else {
            LIVE_OFF
        }
    }

    /// Paint the badge in `colour`, clipped to the frame.
    pub fn stamp(frame: &mut Frame, colour: Pixel) {
        let x_end = (BADGE_MARGIN + BADGE_SIZE).min(frame.width());
        let y_end = (BADGE_MARGIN + BADGE_SIZE).min(frame.height());
        for y in BADGE_MARGIN..y_end {
            for x in BADGE_MARGIN..x_end {
                frame.set_pixel(x, y, colour);
            }
        }
    }
}

impl Default for StatusBadge {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for StatusBadge {
    fn annotate(&self, mut frame: Frame) -> Frame {
        Self::stamp(&mut frame, Self::colour_at(self.started.elapsed()));
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_alternates_each_second() {
        assert_eq!(StatusBadge::colour_at(Duration::from_millis(300)), LIVE_ON);
        assert_eq!(StatusBadge::colour_at(Duration::from_millis(1300)), LIVE_OFF);
        assert_eq!(StatusBadge::colour_at(Duration::from_millis(2300)), LIVE_ON);
    }

    #[test]
    fn stamp_covers_only_the_badge() {
        let mut frame = Frame::new(32, 32);
        StatusBadge::stamp(&mut frame, LIVE_ON);
        assert_eq!(frame.pixel(BADGE_MARGIN, BADGE_MARGIN), LIVE_ON);
        assert_eq!(frame.pixel(BADGE_MARGIN + BADGE_SIZE - 1, BADGE_MARGIN), LIVE_ON);
        assert_eq!(frame.pixel(BADGE_MARGIN + BADGE_SIZE, BADGE_MARGIN), Pixel(0));
        assert_eq!(frame.pixel(0, 0), Pixel(0));
    }

    #[test]
    fn tiny_frames_are_left_intact() {
        let frame = StatusBadge::new().annotate(Frame::new(4, 4));
        assert_eq!(frame, Frame::new(4, 4));
    }
}
