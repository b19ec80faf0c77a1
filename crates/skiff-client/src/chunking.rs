//! Throughput-adaptive chunk sizing.
//!
//! A closed-loop controller drives the transfer time of each chunk
//! toward a target fraction of one second (the capacity). Chunks that
//! took longer than the tolerance band shrink the next length; faster
//! chunks grow it. Small chunks waste round trips, large chunks raise
//! latency and retry cost; the band keeps the session between the two.

use std::time::Duration;

/// Tolerance margin around the capacity target, in percent.
const CAPACITY_MARGIN_PCT: f64 = 10.0;

/// Closed-loop chunk length controller.
#[derive(Debug, Clone)]
pub struct ChunkSizer {
    adaptive: bool,
    capacity: f64,
    max_chunk_size: usize,
}

impl ChunkSizer {
    /// Build a sizer.
    ///
    /// `capacity` is the target fraction of one second a chunk transfer
    /// should occupy, in `(0, 1)`. `max_chunk_size` caps adaptively
    /// computed lengths; `0` means unbounded. When `adaptive` is false
    /// the sizer always returns the current length unchanged.
    #[must_use]
    pub fn new(adaptive: bool, capacity: f64, max_chunk_size: usize) -> Self {
        Self {
            adaptive,
            capacity,
            max_chunk_size,
        }
    }

    /// Compute the next chunk length from the just-completed transfer.
    ///
    /// `current` is the length in use, `bytes` the count acknowledged
    /// for the completed chunk and `duration` its send-to-ack time.
    #[must_use]
    pub fn next(&self, current: usize, bytes: usize, duration: Duration) -> usize {
        let seconds = duration.as_secs_f64();
        if !self.adaptive || seconds <= 0.0 {
            // The ceiling only bounds adaptive growth; a fixed length
            // stays as configured.
            return current.max(1);
        }

        let upper = self.capacity * (1.0 + CAPACITY_MARGIN_PCT / 100.0);
        let lower = self.capacity * (1.0 - CAPACITY_MARGIN_PCT / 100.0);

        let length = if seconds >= upper {
            // Too slow: shrink proportionally to the overshoot.
            (bytes as f64 * (upper - seconds)).round().abs() as usize
        } else if seconds < lower {
            // Too fast: grow by the headroom ratio.
            (bytes as f64 * (lower / seconds)).round() as usize
        } else {
            current
        };

        self.clamp(length)
    }

    fn clamp(&self, length: usize) -> usize {
        let length = if self.max_chunk_size > 0 {
            length.min(self.max_chunk_size)
        } else {
            length
        };
        // A zero-length chunk would stall the session.
        length.max(1)
    }
}
