//! Polyphase-free oversampling for per-voice nonlinear processing.
//!
//! Unlike a wrapper that owns the processor, [`Oversampler`] exposes the
//! two halves separately: [`Oversampler::upsample`] returns `FACTOR`
//! sub-samples that the caller processes in place, then
//! [`Oversampler::downsample`] filters and decimates them back. This lets a
//! chain of effects share one up/down pair per voice.
//!
//! Supported factors: 1 (passthrough), 2 and 4.

/// FIR taps for the anti-aliasing lowpass.
const FILTER_TAPS: usize = 16;

/// Up/down sampler pair for one voice.
#[derive(Debug, Clone)]
pub struct Oversampler<const FACTOR: usize> {
    prev_sample: f32,
    down_state: [f32; FILTER_TAPS],
}

impl<const FACTOR: usize> Default for Oversampler<FACTOR> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const FACTOR: usize> Oversampler<FACTOR> {
    /// Create with cleared state.
    pub fn new() -> Self {
        const {
            assert!(FACTOR == 1 || FACTOR == 2 || FACTOR == 4, "FACTOR must be 1, 2 or 4");
        }
        Self { prev_sample: 0.0, down_state: [0.0; FILTER_TAPS] }
    }

    /// Oversampling factor.
    pub const fn factor(&self) -> usize {
        FACTOR
    }

    /// Linear-interpolate `FACTOR` sub-samples from the previous input to
    /// `input`.
    #[inline]
    pub fn upsample(&mut self, input: f32) -> [f32; FACTOR] {
        let mut out = [0.0; FACTOR];
        let step = 1.0 / FACTOR as f32;
        for (i, slot) in out.iter_mut().enumerate() {
            let t = (i as f32 + 1.0) * step;
            *slot = self.prev_sample + t * (input - self.prev_sample);
        }
        self.prev_sample = input;
        out
    }

    /// Lowpass and keep one sample in `FACTOR`.
    #[inline]
    pub fn downsample(&mut self, samples: &[f32; FACTOR]) -> f32 {
        let coeffs: &[f32; FILTER_TAPS] = match FACTOR {
            2 => &COEFFS_2X,
            4 => &COEFFS_4X,
            _ => return samples[FACTOR - 1],
        };
        for &s in samples {
            self.down_state.copy_within(0..FILTER_TAPS - 1, 1);
            self.down_state[0] = s;
        }
        self.down_state.iter().zip(coeffs).map(|(x, c)| x * c).sum()
    }

    /// Group delay in base-rate samples.
    pub fn latency_samples(&self) -> usize {
        if FACTOR == 1 { 0 } else { FILTER_TAPS / 2 / FACTOR }
    }

    /// Clear state.
    pub fn reset(&mut self) {
        self.prev_sample = 0.0;
        self.down_state = [0.0; FILTER_TAPS];
    }
}

/// Half-band lowpass, cutoff at half the base rate's Nyquist.
#[allow(clippy::excessive_precision)]
#[rustfmt::skip]
static COEFFS_2X: [f32; FILTER_TAPS] = [
    -0.00152541,  0.00000000,  0.01309369,  0.00000000,
    -0.05738920,  0.00000000,  0.29581875,  0.50000434,
     0.29581875,  0.00000000, -0.05738920,  0.00000000,
     0.01309369,  0.00000000, -0.00152541,  0.00000000,
];

/// Kaiser-windowed sinc, cutoff at 0.2 of the oversampled Nyquist.
#[allow(clippy::excessive_precision)]
#[rustfmt::skip]
static COEFFS_4X: [f32; FILTER_TAPS] = [
    0.0018645282, 0.0068257641, 0.0172712655, 0.0342604001,
    0.0571166576, 0.0830896230, 0.1078345458, 0.1260221675,
    0.1332946246, 0.1260221675, 0.1078345458, 0.0830896230,
    0.0571166576, 0.0342604001, 0.0172712655, 0.0068257641,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_passes_at_unity() {
        let mut os = Oversampler::<2>::new();
        let mut out = 0.0;
        for _ in 0..64 {
            let up = os.upsample(0.5);
            out = os.downsample(&up);
        }
        assert!((out - 0.5).abs() < 0.01, "DC through 2x: {out}");

        let mut os = Oversampler::<4>::new();
        for _ in 0..64 {
            let up = os.upsample(0.5);
            out = os.downsample(&up);
        }
        assert!((out - 0.5).abs() < 0.02, "DC through 4x: {out}");
    }

    #[test]
    fn test_upsample_interpolates() {
        let mut os = Oversampler::<4>::new();
        let up = os.upsample(1.0);
        assert_eq!(up, [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_factor_one_is_identity() {
        let mut os = Oversampler::<1>::new();
        for x in [0.1, -0.4, 0.9] {
            let up = os.upsample(x);
            assert_eq!(os.downsample(&up), x);
        }
        assert_eq!(os.latency_samples(), 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut os = Oversampler::<2>::new();
        for _ in 0..16 {
            let up = os.upsample(1.0);
            os.downsample(&up);
        }
        os.reset();
        let up = os.upsample(0.0);
        assert_eq!(os.downsample(&up), 0.0);
    }
}
