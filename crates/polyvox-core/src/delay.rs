//! Fractional delay line with 4-point Hermite interpolation.
//!
//! Used by modulated effects (chorus) where the read position moves every
//! sample. The buffer is allocated once at construction and never resized.

use alloc::vec;
use alloc::vec::Vec;

/// Circular delay line read with Hermite interpolation.
///
/// # Example
///
/// ```rust
/// use polyvox_core::HermiteDelay;
///
/// let mut delay = HermiteDelay::new(64);
/// delay.set_delay(10.0);
/// for _ in 0..10 {
///     delay.tick(0.0);
/// }
/// delay.tick(1.0);
/// ```
#[derive(Debug, Clone)]
pub struct HermiteDelay {
    buffer: Vec<f32>,
    write_pos: usize,
    delay: f32,
}

impl HermiteDelay {
    /// Create a delay line holding `capacity` samples (at least 4).
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(4)],
            write_pos: 0,
            delay: 0.0,
        }
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Set the delay in samples, clamped to 1 .. capacity - 3.
    #[inline]
    pub fn set_delay(&mut self, delay_samples: f32) {
        let max = (self.buffer.len() - 3) as f32;
        self.delay = if delay_samples.is_nan() { 1.0 } else { delay_samples.clamp(1.0, max) };
    }

    /// Current delay in samples.
    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// Write `input` and return the sample `delay` samples in the past.
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        self.buffer[self.write_pos] = input;
        let len = self.buffer.len();
        let whole = self.delay as usize;
        let frac = self.delay - whole as f32;
        let at = |offset: usize| self.buffer[(self.write_pos + len * 2 - offset) % len];

        // x1 is the sample at the integer delay, x2 one further back.
        let xm1 = at(whole.saturating_sub(1));
        let x0 = at(whole);
        let x1 = at(whole + 1);
        let x2 = at(whole + 2);
        self.write_pos = (self.write_pos + 1) % len;
        hermite(frac, xm1, x0, x1, x2)
    }

    /// Zero the buffer.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// 4-point, 3rd-order Hermite interpolation between `x0` and `x1`.
#[inline]
pub fn hermite(frac: f32, xm1: f32, x0: f32, x1: f32, x2: f32) -> f32 {
    let c = (x1 - xm1) * 0.5;
    let v = x0 - x1;
    let w = c + v;
    let a = w + v + (x2 - x0) * 0.5;
    let b = w + a;
    (((a * frac) - b) * frac + c) * frac + x0
}
