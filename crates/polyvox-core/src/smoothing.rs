//! Linear parameter smoothing.
//!
//! [`LinearSmoother`] ramps toward its target at a constant rate over a
//! fixed number of samples and lands on the target exactly, so callers can
//! use `value() == target()` as a settled test.
//!
//! ```rust
//! use polyvox_core::LinearSmoother;
//!
//! let mut smoother = LinearSmoother::new(0.0);
//! smoother.reset(48000.0, 0.006); // 6 ms ramp = 288 samples
//! smoother.set_target(1.0);
//! for _ in 0..288 {
//!     smoother.advance();
//! }
//! assert_eq!(smoother.value(), 1.0);
//! assert!(smoother.is_settled());
//! ```

use libm::roundf;

/// Linear ramp toward a target (constant rate of change).
///
/// A new target restarts the ramp from the current value with
/// `steps = round(ramp_seconds * sample_rate)` increments. The final
/// increment snaps to the target.
#[derive(Debug, Clone)]
pub struct LinearSmoother {
    current: f32,
    target: f32,
    increment: f32,
    samples_remaining: u32,
    ramp_samples: u32,
}

impl LinearSmoother {
    /// Create a smoother resting at `initial` with no ramp configured.
    ///
    /// Until [`reset`](Self::reset) is called, targets are applied instantly.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            increment: 0.0,
            samples_remaining: 0,
            ramp_samples: 0,
        }
    }

    /// Configure the ramp length and snap to the current target.
    ///
    /// # Arguments
    /// * `sample_rate` - Rate at which [`advance`](Self::advance) is called
    /// * `ramp_seconds` - Ramp duration in seconds
    pub fn reset(&mut self, sample_rate: f32, ramp_seconds: f32) {
        let samples = roundf((ramp_seconds * sample_rate).max(0.0));
        self.ramp_samples = if samples.is_finite() { samples as u32 } else { 0 };
        self.snap_to_target();
    }

    /// Ramp length in samples.
    #[inline]
    pub fn ramp_samples(&self) -> u32 {
        self.ramp_samples
    }

    /// Set a new target. An unchanged target leaves the ramp alone.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_samples == 0 {
            self.current = target;
            self.increment = 0.0;
            self.samples_remaining = 0;
        } else {
            self.increment = (target - self.current) / self.ramp_samples as f32;
            self.samples_remaining = self.ramp_samples;
        }
    }

    /// Set value and target immediately.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.increment = 0.0;
        self.samples_remaining = 0;
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.samples_remaining > 0 {
            self.samples_remaining -= 1;
            if self.samples_remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.increment;
            }
        }
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Current target.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the value sits exactly on the target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.samples_remaining == 0 && self.current == self.target
    }

    /// Jump to the target.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
        self.increment = 0.0;
        self.samples_remaining = 0;
    }
}

impl Default for LinearSmoother {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_without_ramp() {
        let mut s = LinearSmoother::new(0.0);
        s.set_target(0.5);
        assert_eq!(s.advance(), 0.5);
        assert!(s.is_settled());
    }

    #[test]
    fn test_reaches_target_in_exact_steps() {
        let mut s = LinearSmoother::new(0.0);
        s.reset(1000.0, 0.01); // 10 samples
        assert_eq!(s.ramp_samples(), 10);
        s.set_target(1.0);
        for i in 0..9 {
            let v = s.advance();
            assert!(v < 1.0, "step {i} already at target");
            assert!(!s.is_settled());
        }
        assert_eq!(s.advance(), 1.0);
        assert!(s.is_settled());
    }

    #[test]
    fn test_monotonic_ramp() {
        let mut s = LinearSmoother::new(2.0);
        s.reset(48000.0, 0.006);
        s.set_target(-1.0);
        let mut prev = s.value();
        while !s.is_settled() {
            let v = s.advance();
            assert!(v <= prev, "ramp went up: {prev} -> {v}");
            prev = v;
        }
        assert_eq!(prev, -1.0);
    }

    #[test]
    fn test_retarget_restarts_ramp() {
        let mut s = LinearSmoother::new(0.0);
        s.reset(100.0, 0.1); // 10 samples
        s.set_target(1.0);
        for _ in 0..5 {
            s.advance();
        }
        s.set_target(0.0);
        let mut count = 0;
        while !s.is_settled() {
            s.advance();
            count += 1;
        }
        assert_eq!(count, 10);
        assert_eq!(s.value(), 0.0);
    }
}
