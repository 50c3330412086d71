//! Bit and sample-rate reducer.

use libm::{floorf, powf, roundf};

/// Lo-fi crusher: sample-and-hold decimation, bit depth quantisation,
/// rounding to a grid and an integer XOR "operation" for extra grit.
///
/// All controls take 0..1 values so they can be driven straight from
/// normalised parameters.
#[derive(Debug, Clone)]
pub struct Crusher {
    levels: f32,
    ratio: f32,
    round: f32,
    op_mask: i32,
    held: f32,
    hold_phase: f32,
}

impl Default for Crusher {
    fn default() -> Self {
        Self::new()
    }
}

impl Crusher {
    /// Full quality, no decimation.
    pub fn new() -> Self {
        Self { levels: 32768.0, ratio: 1.0, round: 0.0, op_mask: 0, held: 0.0, hold_phase: 1.0 }
    }

    /// Bit depth: 0 gives 1 bit, 1 gives 16 bits.
    #[inline]
    pub fn set_quality(&mut self, quality: f32) {
        let quality = if quality.is_nan() { 1.0 } else { quality.clamp(0.0, 1.0) };
        self.levels = powf(2.0, quality * 15.0);
    }

    /// Fraction of samples kept, clamped to 0.01..1.
    #[inline]
    pub fn set_sampling_ratio(&mut self, ratio: f32) {
        self.ratio = if ratio.is_nan() { 1.0 } else { ratio.clamp(0.01, 1.0) };
    }

    /// Rounding grid size; 0 disables.
    #[inline]
    pub fn set_round(&mut self, round: f32) {
        self.round = if round.is_nan() { 0.0 } else { round.clamp(0.0, 1.0) };
    }

    /// Selects one of 8 XOR masks applied to the quantised integer.
    #[inline]
    pub fn set_operation(&mut self, operation: f32) {
        let op = if operation.is_nan() { 0.0 } else { operation.clamp(0.0, 1.0) };
        self.op_mask = ((op * 7.0) as i32).clamp(0, 7);
    }

    /// Process one sample.
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        self.hold_phase += self.ratio;
        if self.hold_phase >= 1.0 {
            self.hold_phase -= floorf(self.hold_phase);
            self.held = input;
        }
        let mut x = self.held;
        if self.round > 0.0 {
            x = roundf(x / self.round) * self.round;
        }
        let clipped = x.clamp(-1.0, 1.0);
        let quantised = (clipped * self.levels) as i32 ^ self.op_mask;
        quantised as f32 / self.levels
    }

    /// Clear held sample.
    pub fn reset(&mut self) {
        self.held = 0.0;
        self.hold_phase = 1.0;
    }
}
