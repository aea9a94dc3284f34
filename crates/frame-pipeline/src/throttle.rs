//! Detection throttle
//!
//! Inference dominates the per-frame cost, so the model only runs on every
//! `interval`-th frame and the frames in between reuse the last result.

/// Counter-based gate deciding which frames are sent to the model
#[derive(Debug, Clone)]
pub struct DetectionThrottle {
    interval: u32,
    index: u64,
}

impl DetectionThrottle {
    /// Create a throttle; an interval of 0 is treated as 1
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            index: 0,
        }
    }

    /// Decide for the current frame, then advance to the next one
    pub fn should_detect(&mut self) -> bool {
        let detect = self.index % u64::from(self.interval) == 0;
        self.index += 1;
        detect
    }

    /// Restart counting so the next frame is detected
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Index of the next frame
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }
}

impl Default for DetectionThrottle {
    fn default() -> Self {
        Self::new(3)
    }
}
