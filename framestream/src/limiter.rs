use std::time::{Duration, Instant};

/// Drops frames so that accepted frames are at least `1 / fps` seconds apart.
///
/// The interval is rounded up to the next nanosecond, so any one second
/// window never holds more than `fps` accepted frames.
#[derive(Debug, Clone)]
pub struct FrameRateLimiter {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl FrameRateLimiter {
    /// `fps == 0` disables limiting.
    pub fn new(fps: u32) -> Self {
        Self {
            interval: (fps > 0).then(|| Duration::from_nanos(1_000_000_000u64.div_ceil(fps as u64))),
            last: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Returns whether a frame arriving at `now` should be emitted, and if so
    /// records it as the last emitted frame.
    pub fn check(&mut self, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return true;
        };

        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }

        self.last = Some(now);
        true
    }

    /// Forgets the last emitted frame, the next frame is always accepted.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
