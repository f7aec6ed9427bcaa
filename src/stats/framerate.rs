//! Frame rate sampling
//!
//! Keeps the arrival times of the last few frames. The rate is computed over
//! exactly the retained samples and reads as zero until the window is full or
//! once the stream has gone quiet for more than a second.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::protocol::constants::FPS_SAMPLES;

/// Anything slower than one frame per second reads as zero
const MAX_FRAME_GAP: Duration = Duration::from_secs(1);

/// Bounded window of frame arrival times
#[derive(Debug, Clone)]
pub struct FrameRate {
    samples: VecDeque<Instant>,
    capacity: usize,
}

impl FrameRate {
    /// Create a sampler with the default window
    pub fn new() -> Self {
        Self::with_capacity(FPS_SAMPLES)
    }

    /// Create a sampler keeping `capacity` timestamps (at least 2)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a frame arrival, evicting the oldest sample beyond capacity
    pub fn record(&mut self, at: Instant) {
        self.samples.push_back(at);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Number of retained samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if no frame was recorded yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Arrival time of the most recent frame
    pub fn newest(&self) -> Option<Instant> {
        self.samples.back().copied()
    }

    /// Frames per second as of `now`
    pub fn fps_at(&self, now: Instant) -> f64 {
        if self.samples.len() < self.capacity {
            return 0.0;
        }

        let (Some(&oldest), Some(&newest)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };

        if now.saturating_duration_since(newest) > MAX_FRAME_GAP {
            return 0.0;
        }

        let span = newest.duration_since(oldest).as_secs_f64();
        if span <= 0.0 {
            return 0.0;
        }

        (self.samples.len() - 1) as f64 / span
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new()
    }
}
