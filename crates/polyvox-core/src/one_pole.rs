//! One-pole lowpass used as a tone control.

use core::f32::consts::PI;
use libm::expf;

/// One-pole lowpass: y = y + (1 - a)(x - y), with a = e^(-2π f / fs).
#[derive(Debug, Clone)]
pub struct OnePole {
    a: f32,
    state: f32,
    cutoff_hz: f32,
    sample_rate: f32,
}

impl OnePole {
    /// Create with a cutoff in Hz.
    pub fn new(sample_rate: f32, cutoff_hz: f32) -> Self {
        let mut filter = Self { a: 0.0, state: 0.0, cutoff_hz, sample_rate: sample_rate.max(1.0) };
        filter.set_cutoff(cutoff_hz);
        filter
    }

    /// Set cutoff in Hz, clamped to 1 Hz .. Nyquist.
    #[inline]
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        let cutoff = if cutoff_hz.is_nan() { 1.0 } else { cutoff_hz.clamp(1.0, self.sample_rate * 0.5) };
        self.cutoff_hz = cutoff;
        self.a = expf(-2.0 * PI * cutoff / self.sample_rate);
    }

    /// Cutoff in Hz.
    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    /// Change sample rate, keeping cutoff.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        self.set_cutoff(self.cutoff_hz);
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state += (1.0 - self.a) * (input - self.state);
        self.state = crate::flush_denormal(self.state);
        self.state
    }

    /// Clear state.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_response_converges() {
        let mut lp = OnePole::new(48000.0, 1000.0);
        let mut y = 0.0;
        for _ in 0..4800 {
            y = lp.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3, "step response {y}");
    }

    #[test]
    fn test_attenuates_above_cutoff() {
        let mut lp = OnePole::new(48000.0, 200.0);
        let mut peak = 0.0_f32;
        for i in 0..48000 {
            let x = libm::sinf(2.0 * PI * 8000.0 * i as f32 / 48000.0);
            let y = lp.process(x);
            if i > 4800 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 0.05, "8 kHz leaked through at {peak}");
    }
}
