//! Stacked slow-motion.
//!
//! Every request multiplies the running scale by its own factor and divides
//! it back out when its own duration is over. Overlapping requests compose,
//! they never replace each other. Durations are measured in unscaled time.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::timers::DelayQueue;

/// A `(scale, duration)` slow-motion request as authored in effect configs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlowMotion {
    pub scale: f32,
    pub duration: f32,
}

impl SlowMotion {
    pub fn new(scale: f32, duration: f32) -> Self {
        Self { scale, duration }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum TimeScaleError {
    #[error("time scale can be set to a positive number only, got {0}")]
    NonPositive(f32),
}

#[derive(Debug, Clone)]
pub struct TimeScaleController {
    baseline: f32,
    scale: f32,
    reversals: DelayQueue<f32>,
}

impl Default for TimeScaleController {
    fn default() -> Self {
        Self::with_baseline(1.0)
    }
}

impl TimeScaleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(baseline: f32) -> Self {
        let baseline = if baseline.is_finite() && baseline > 0.0 {
            baseline
        } else {
            1.0
        };
        Self {
            baseline,
            scale: baseline,
            reversals: DelayQueue::new(),
        }
    }

    /// Multiply the current scale by `scale` for `duration` seconds.
    ///
    /// Scales above 1 are clamped to 1 so a request can only ever slow time
    /// down. Returns the effective scale right after the request.
    pub fn request(&mut self, scale: f32, duration: f32) -> Result<f32, TimeScaleError> {
        if !scale.is_finite() || scale <= 0.0 {
            warn!("rejected slow-motion request: time scale must be positive, got {scale}");
            return Err(TimeScaleError::NonPositive(scale));
        }
        let factor = scale.min(1.0);
        self.scale *= factor;
        self.reversals.schedule(duration, factor);
        Ok(self.scale)
    }

    pub fn request_slow_motion(&mut self, slow_motion: SlowMotion) -> Result<f32, TimeScaleError> {
        self.request(slow_motion.scale, slow_motion.duration)
    }

    /// Advance by `real_dt` unscaled seconds, reverting every request whose
    /// duration is over. Returns the effective scale.
    pub fn tick(&mut self, real_dt: f32) -> f32 {
        for factor in self.reversals.advance(real_dt) {
            self.scale /= factor;
        }
        // nothing left to divide out: drop any accumulated rounding error
        if self.reversals.is_empty() {
            self.scale = self.baseline;
        }
        self.scale
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    /// Number of requests still in effect.
    pub fn active(&self) -> usize {
        self.reversals.len()
    }

    pub fn is_slowed(&self) -> bool {
        !self.reversals.is_empty()
    }

    /// Cancel every pending request and return to the baseline.
    pub fn reset(&mut self) {
        self.reversals.clear();
        self.scale = self.baseline;
    }
}
