//! Feed-forward compressor with a soft knee.

use crate::fast_math::{fast_db_to_linear, fast_linear_to_db};
use libm::expf;

/// Static gain curve: threshold, ratio and a quadratic soft knee.
#[derive(Debug, Clone)]
struct GainComputer {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
}

impl GainComputer {
    /// Gain change in dB (≤ 0) for a detector level in dB.
    #[inline]
    fn gain_db(&self, input_db: f32) -> f32 {
        let overshoot = input_db - self.threshold_db;
        let half_knee = self.knee_db * 0.5;
        let slope = 1.0 - 1.0 / self.ratio;
        if overshoot <= -half_knee {
            0.0
        } else if overshoot > half_knee {
            -(overshoot * slope)
        } else {
            let knee_factor = (overshoot + half_knee) / self.knee_db;
            -(knee_factor * knee_factor * overshoot * slope)
        }
    }
}

/// Peak compressor with attack/release ballistics and makeup gain.
///
/// # Example
///
/// ```rust
/// use polyvox_core::Compressor;
///
/// let mut comp = Compressor::new(96000.0);
/// comp.set_params(-12.0, 4.0, 3.0, 0.0, 5.0, 50.0);
/// let y = comp.process(0.9);
/// assert!(y.abs() <= 0.9);
/// ```
#[derive(Debug, Clone)]
pub struct Compressor {
    gain_computer: GainComputer,
    makeup: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope_db: f32,
    sample_rate: f32,
}

impl Compressor {
    /// Create with a gentle default setting.
    pub fn new(sample_rate: f32) -> Self {
        let mut comp = Self {
            gain_computer: GainComputer { threshold_db: -18.0, ratio: 4.0, knee_db: 3.0 },
            makeup: 1.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope_db: -96.0,
            sample_rate: sample_rate.max(1.0),
        };
        comp.set_params(-18.0, 4.0, 3.0, 0.0, 10.0, 100.0);
        comp
    }

    /// Set every parameter at once.
    ///
    /// # Arguments
    /// * `threshold_db` - Level above which gain is reduced
    /// * `ratio` - Compression ratio, clamped to ≥ 1
    /// * `knee_db` - Soft knee width
    /// * `makeup_db` - Output gain
    /// * `attack_ms` / `release_ms` - Detector ballistics
    pub fn set_params(
        &mut self,
        threshold_db: f32,
        ratio: f32,
        knee_db: f32,
        makeup_db: f32,
        attack_ms: f32,
        release_ms: f32,
    ) {
        self.gain_computer.threshold_db = threshold_db;
        self.gain_computer.ratio = ratio.max(1.0);
        self.gain_computer.knee_db = knee_db.max(0.0);
        self.makeup = fast_db_to_linear(makeup_db);
        self.attack_coeff = time_coeff(attack_ms, self.sample_rate);
        self.release_coeff = time_coeff(release_ms, self.sample_rate);
    }

    /// Change sample rate. Ballistics are re-derived on the next
    /// [`Compressor::set_params`].
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Compress one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let level_db = fast_linear_to_db(input.abs());
        let coeff = if level_db > self.envelope_db { self.attack_coeff } else { self.release_coeff };
        self.envelope_db = level_db + coeff * (self.envelope_db - level_db);
        let gain = fast_db_to_linear(self.gain_computer.gain_db(self.envelope_db));
        input * gain * self.makeup
    }

    /// Clear the detector.
    pub fn reset(&mut self) {
        self.envelope_db = -96.0;
    }
}

#[inline]
fn time_coeff(ms: f32, sample_rate: f32) -> f32 {
    let samples = ms.max(0.01) * 0.001 * sample_rate;
    expf(-1.0 / samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_untouched() {
        let mut comp = Compressor::new(48000.0);
        comp.set_params(-6.0, 8.0, 0.0, 0.0, 1.0, 10.0);
        let mut y = 0.0;
        for _ in 0..4800 {
            y = comp.process(0.1);
        }
        assert!((y - 0.1).abs() < 0.005, "quiet signal changed to {y}");
    }

    #[test]
    fn test_loud_signal_reduced() {
        let mut comp = Compressor::new(48000.0);
        comp.set_params(-24.0, 10.0, 3.0, 0.0, 1.0, 100.0);
        let mut y = 1.0;
        for _ in 0..4800 {
            y = comp.process(1.0);
        }
        assert!(y < 0.2, "1.0 compressed only to {y}");
    }

    #[test]
    fn test_knee_is_continuous() {
        let gc = GainComputer { threshold_db: -20.0, ratio: 4.0, knee_db: 6.0 };
        let below = gc.gain_db(-23.0 - 1e-3);
        let at_lower = gc.gain_db(-23.0);
        let above = gc.gain_db(-17.0 + 1e-3);
        let at_upper = gc.gain_db(-17.0);
        assert!((below - at_lower).abs() < 1e-3);
        assert!((above - at_upper).abs() < 1e-2);
    }
}
