//! Four-pole ladder filters.
//!
//! - [`LadderFilter`] - zero-delay-feedback (ZDF) transistor ladder after
//!   Zavalishin, "The Art of VA Filter Design", ch. 5: four TPT one-pole
//!   stages in series with a global feedback loop solved implicitly.
//! - [`DiodeLadder`] - diode-style ladder with a saturating input on every
//!   stage and softer resonance. Each stage input is bounded by `tanh`, so
//!   the output stays finite for any input and any coefficient state.

use core::f32::consts::PI;
use libm::tanf;

use crate::flush_denormal;
use crate::math::fast_tanh;

/// Map a filter Q (≥ 0.1) onto ladder feedback in 0..3.99.
///
/// Q = 0.5 gives no feedback; Q → ∞ approaches self-oscillation.
#[inline]
pub fn q_to_feedback(q: f32) -> f32 {
    if q.is_nan() || q <= 0.5 {
        return 0.0;
    }
    (4.0 * (1.0 - 0.5 / q)).clamp(0.0, 3.99)
}

/// One TPT one-pole lowpass stage. Returns the output and updates `state`.
#[inline]
fn one_pole(state: &mut f32, input: f32, big_g: f32) -> f32 {
    let v = (input - *state) * big_g;
    let y = v + *state;
    *state = flush_denormal(y + v);
    y
}

fn integrator_gain(cutoff: f32, sample_rate: f32) -> f32 {
    let cutoff = if cutoff.is_nan() { 1000.0 } else { cutoff.clamp(10.0, sample_rate * 0.45) };
    tanf(PI * cutoff / sample_rate)
}

/// ZDF 4-pole (24 dB/oct) transistor ladder lowpass.
///
/// # Example
///
/// ```rust
/// use polyvox_core::LadderFilter;
///
/// let mut ladder = LadderFilter::new(48000.0);
/// ladder.set_cutoff_and_q(800.0, 4.0);
/// let y = ladder.process(0.3);
/// assert!(y.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct LadderFilter {
    s: [f32; 4],
    g: f32,
    big_g: f32,
    k: f32,
    sample_rate: f32,
    cutoff: f32,
}

impl LadderFilter {
    /// Create a ladder at 1 kHz with no resonance.
    pub fn new(sample_rate: f32) -> Self {
        let mut ladder = Self {
            s: [0.0; 4],
            g: 0.0,
            big_g: 0.0,
            k: 0.0,
            sample_rate,
            cutoff: 1000.0,
        };
        ladder.update();
        ladder
    }

    /// Set cutoff (Hz) and Q.
    pub fn set_cutoff_and_q(&mut self, cutoff: f32, q: f32) {
        self.cutoff = cutoff;
        self.k = q_to_feedback(q);
        self.update();
    }

    /// Change sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update();
    }

    /// Clear stage state.
    pub fn reset(&mut self) {
        self.s = [0.0; 4];
    }

    fn update(&mut self) {
        self.g = integrator_gain(self.cutoff, self.sample_rate);
        self.big_g = self.g / (1.0 + self.g);
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let g = self.big_g;
        let beta = 1.0 - g;
        // Contribution of the stored states to the last stage's output
        let sigma = g * g * g * beta * self.s[0]
            + g * g * beta * self.s[1]
            + g * beta * self.s[2]
            + beta * self.s[3];
        let g4 = g * g * g * g;
        let y4 = (g4 * input + sigma) / (1.0 + self.k * g4);
        let u = fast_tanh(input - self.k * y4);

        let y1 = one_pole(&mut self.s[0], u, g);
        let y2 = one_pole(&mut self.s[1], y1, g);
        let y3 = one_pole(&mut self.s[2], y2, g);
        let out = one_pole(&mut self.s[3], y3, g);
        // Passband loss from feedback
        out * (1.0 + self.k * 0.5)
    }
}

/// Diode-style 4-pole lowpass with per-stage saturation.
///
/// # Example
///
/// ```rust
/// use polyvox_core::DiodeLadder;
///
/// let mut diode = DiodeLadder::new(48000.0);
/// diode.set_cutoff_and_q(300.0, 8.0);
/// for _ in 0..1000 {
///     assert!(diode.process(10.0).is_finite());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DiodeLadder {
    s: [f32; 4],
    last: f32,
    big_g: f32,
    k: f32,
    sample_rate: f32,
    cutoff: f32,
}

impl DiodeLadder {
    /// Create a diode ladder at 1 kHz with no resonance.
    pub fn new(sample_rate: f32) -> Self {
        let mut diode = Self {
            s: [0.0; 4],
            last: 0.0,
            big_g: 0.0,
            k: 0.0,
            sample_rate,
            cutoff: 1000.0,
        };
        diode.update();
        diode
    }

    /// Set cutoff (Hz) and Q. Resonance is gentler than [`LadderFilter`].
    pub fn set_cutoff_and_q(&mut self, cutoff: f32, q: f32) {
        self.cutoff = cutoff;
        self.k = q_to_feedback(q) * 0.8;
        self.update();
    }

    /// Change sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update();
    }

    /// Clear stage state.
    pub fn reset(&mut self) {
        self.s = [0.0; 4];
        self.last = 0.0;
    }

    fn update(&mut self) {
        let g = integrator_gain(self.cutoff, self.sample_rate);
        self.big_g = g / (1.0 + g);
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let g = self.big_g;
        let u = fast_tanh(input - self.k * self.last);
        let y1 = one_pole(&mut self.s[0], u, g);
        let y2 = one_pole(&mut self.s[1], fast_tanh(y1), g);
        let y3 = one_pole(&mut self.s[2], fast_tanh(y2), g);
        let y4 = one_pole(&mut self.s[3], fast_tanh(y3), g);
        self.last = y4;
        y4 * (1.0 + self.k * 0.5)
    }
}
