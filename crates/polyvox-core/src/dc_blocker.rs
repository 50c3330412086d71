//! DC blocking filter.
//!
//! First-order highpass, H(z) = (1 - z^-1) / (1 - R z^-1), with
//! f_c = (1 - R) / (2π) · f_s.

use core::f32::consts::PI;

/// First-order DC blocker, 5 Hz by default.
///
/// # Example
///
/// ```rust
/// use polyvox_core::DcBlocker;
///
/// let mut blocker = DcBlocker::new(48000.0);
/// let mut y = 0.0;
/// for _ in 0..48000 {
///     y = blocker.process(0.5);
/// }
/// assert!(y.abs() < 0.01);
/// ```
#[derive(Debug, Clone)]
pub struct DcBlocker {
    coeff: f32,
    cutoff_hz: f32,
    x_prev: f32,
    y_prev: f32,
}

impl DcBlocker {
    /// Default cutoff in Hz.
    pub const DEFAULT_CUTOFF_HZ: f32 = 5.0;

    /// Create at the default cutoff.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_cutoff(sample_rate, Self::DEFAULT_CUTOFF_HZ)
    }

    /// Create at a given cutoff.
    pub fn with_cutoff(sample_rate: f32, cutoff_hz: f32) -> Self {
        Self {
            coeff: coeff_for(cutoff_hz, sample_rate),
            cutoff_hz,
            x_prev: 0.0,
            y_prev: 0.0,
        }
    }

    /// Process one sample: y[n] = x[n] - x[n-1] + R·y[n-1].
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = input - self.x_prev + self.coeff * self.y_prev;
        self.x_prev = input;
        self.y_prev = crate::flush_denormal(output);
        output
    }

    /// Clear state.
    pub fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }

    /// Recompute R for a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.coeff = coeff_for(self.cutoff_hz, sample_rate);
    }

    /// Current R coefficient.
    pub fn coeff(&self) -> f32 {
        self.coeff
    }
}

fn coeff_for(cutoff_hz: f32, sample_rate: f32) -> f32 {
    (1.0 - 2.0 * PI * cutoff_hz / sample_rate.max(1.0)).clamp(0.9, 0.99999)
}
