//! Rolling-window rate counter for diagnostics.
//!
//! Sessions record every message they send; the counter derives frames and
//! bytes per wall-clock second over the most recent window. Nothing here is
//! part of the wire protocol.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling-window message/byte rate counter.
#[derive(Debug)]
pub struct RateCounter {
    /// Samples: `(when, bytes)`.
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    /// Running total of bytes in the window.
    window_bytes: u64,
}

impl RateCounter {
    /// Counter with a one-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(256),
            window,
            window_bytes: 0,
        }
    }

    /// Record one message of `bytes` sent now.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.window_bytes += bytes;
        self.evict(when);
    }

    /// Messages per second over the window, measured up to `now`.
    pub fn frames_per_sec_at(&self, now: Instant) -> f64 {
        let secs = self.span(now).as_secs_f64();
        self.samples.len() as f64 / secs
    }

    /// Messages per second over the window.
    pub fn frames_per_sec(&self) -> f64 {
        self.frames_per_sec_at(Instant::now())
    }

    /// Bytes per second over the window, measured up to `now`.
    pub fn bytes_per_sec_at(&self, now: Instant) -> u64 {
        let secs = self.span(now).as_secs_f64();
        (self.window_bytes as f64 / secs) as u64
    }

    pub fn bytes_per_sec(&self) -> u64 {
        self.bytes_per_sec_at(Instant::now())
    }

    /// Number of samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    // ── Internal ─────────────────────────────────────────────────

    /// The measured span, never shorter than the window so a burst right
    /// after start-up is not extrapolated.
    fn span(&self, now: Instant) -> Duration {
        match self.samples.front() {
            Some((first, _)) => now.saturating_duration_since(*first).max(self.window),
            None => self.window,
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.saturating_duration_since(ts) > self.window {
                self.samples.pop_front();
                self.window_bytes = self.window_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::new()
    }
}

// ── SessionStats ─────────────────────────────────────────────────

/// Snapshot of one server session, published for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Messages sent per second over the last window.
    pub fps: f64,
    /// Compressed bytes sent per second over the last window.
    pub bytes_per_sec: u64,
    /// Messages sent since the session started (including the full frame).
    pub total_frames: u64,
    /// Compressed bytes sent since the session started.
    pub total_bytes: u64,
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_counter_reports_zero() {
        let c = RateCounter::new();
        assert_eq!(c.frames_per_sec(), 0.0);
        assert_eq!(c.bytes_per_sec(), 0);
    }

    #[test]
    fn thirty_frames_in_one_second() {
        let mut c = RateCounter::with_window(Duration::from_secs(1));
        let t0 = Instant::now();
        for i in 0..30 {
            c.record_at(t0 + Duration::from_millis(i * 33), 1000);
        }
        let fps = c.frames_per_sec_at(t0 + Duration::from_secs(1));
        assert!((fps - 30.0).abs() < 0.5, "fps = {fps}");
        assert_eq!(c.bytes_per_sec_at(t0 + Duration::from_secs(1)), 30_000);
    }

    #[test]
    fn evicts_old_samples() {
        let mut c = RateCounter::with_window(Duration::from_millis(500));
        let t0 = Instant::now();
        c.record_at(t0, 1000);
        c.record_at(t0 + Duration::from_secs(1), 500);
        assert_eq!(c.sample_count(), 1);
    }
}
