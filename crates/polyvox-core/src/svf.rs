//! State variable filters.
//!
//! Both filters implement the Topology-Preserving Transform (TPT) SVF after
//! Zavalishin, "The Art of VA Filter Design" (2012). The trapezoidal
//! integrators keep the analog prototype's response and stay stable while
//! the cutoff is swept per sample.
//!
//! - [`StateVariableFilter`] - lowpass, highpass and bandpass outputs
//! - [`VzFilter`] - bell, shelves and band-reject, built by mixing the SVF
//!   outputs with gain-dependent coefficients (A. Simper, "Linear Trapezoidal
//!   Integrated SVF", 2013)

use core::f32::consts::PI;
use libm::{powf, sqrtf, tanf};

use crate::fast_math::fast_tan;
use crate::flush_denormal;

/// Prewarped integrator gain `tan(π·fc/fs)`.
///
/// Uses [`fast_tan`] below 10 kHz and `tanf` above, where the Padé
/// approximant loses accuracy.
#[inline]
fn prewarp(cutoff: f32, sample_rate: f32) -> f32 {
    let arg = PI * cutoff / sample_rate;
    if cutoff < 10_000.0 { fast_tan(arg) } else { tanf(arg) }
}

/// Output tap of [`StateVariableFilter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SvfMode {
    /// Passes frequencies below the cutoff.
    #[default]
    Lowpass,
    /// Passes frequencies above the cutoff.
    Highpass,
    /// Passes frequencies near the cutoff.
    Bandpass,
}

/// All simultaneous outputs of one SVF step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SvfOutputs {
    /// Lowpass output.
    pub lowpass: f32,
    /// Highpass output.
    pub highpass: f32,
    /// Bandpass output.
    pub bandpass: f32,
}

/// 2-pole (12 dB/oct) TPT state variable filter.
///
/// ## Parameters
///
/// - `cutoff`: 10 Hz to sr×0.49 (default 1000 Hz)
/// - `q`: 0.1 to 40 (default 0.707, Butterworth)
///
/// # Example
///
/// ```rust
/// use polyvox_core::{StateVariableFilter, SvfMode};
///
/// let mut svf = StateVariableFilter::new(48000.0);
/// svf.set_cutoff_and_q(800.0, 2.0);
/// svf.set_mode(SvfMode::Highpass);
/// let y = svf.process(0.5);
/// assert!(y.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct StateVariableFilter {
    ic1eq: f32,
    ic2eq: f32,
    g: f32,
    k: f32,
    sample_rate: f32,
    cutoff: f32,
    q: f32,
    mode: SvfMode,
}

impl Default for StateVariableFilter {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl StateVariableFilter {
    /// Create a filter at 1 kHz, Q 0.707, lowpass.
    pub fn new(sample_rate: f32) -> Self {
        let mut svf = Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            g: 0.0,
            k: 0.0,
            sample_rate,
            cutoff: 1000.0,
            q: 0.707,
            mode: SvfMode::Lowpass,
        };
        svf.update_coefficients();
        svf
    }

    /// Set cutoff in Hz (clamped to 10 Hz .. sr×0.49).
    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.cutoff = clamp_cutoff(cutoff, self.sample_rate);
        self.update_coefficients();
    }

    /// Set Q (clamped to 0.1 .. 40).
    pub fn set_q(&mut self, q: f32) {
        self.q = clamp_q(q);
        self.update_coefficients();
    }

    /// Set cutoff and Q with a single coefficient update.
    pub fn set_cutoff_and_q(&mut self, cutoff: f32, q: f32) {
        self.cutoff = clamp_cutoff(cutoff, self.sample_rate);
        self.q = clamp_q(q);
        self.update_coefficients();
    }

    /// Current cutoff in Hz.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Select the output tap.
    pub fn set_mode(&mut self, mode: SvfMode) {
        self.mode = mode;
    }

    /// Selected output tap.
    pub fn mode(&self) -> SvfMode {
        self.mode
    }

    /// Change sample rate, keeping cutoff and Q.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.cutoff = clamp_cutoff(self.cutoff, sample_rate);
        self.update_coefficients();
    }

    /// Clear integrator state.
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    fn update_coefficients(&mut self) {
        self.g = prewarp(self.cutoff, self.sample_rate);
        self.k = 1.0 / self.q;
    }

    /// Process one sample, returning every output.
    #[inline]
    pub fn process_all(&mut self, input: f32) -> SvfOutputs {
        let v3 = input - self.ic2eq;
        let v1 = (self.g * v3 + self.ic1eq) / (1.0 + self.g * (self.g + self.k));
        let v2 = self.ic2eq + self.g * v1;

        self.ic1eq = flush_denormal(2.0 * v1 - self.ic1eq);
        self.ic2eq = flush_denormal(2.0 * v2 - self.ic2eq);

        SvfOutputs {
            lowpass: v2,
            highpass: input - self.k * v1 - v2,
            bandpass: v1,
        }
    }

    /// Process one sample through the selected tap.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.process_all(input);
        match self.mode {
            SvfMode::Lowpass => out.lowpass,
            SvfMode::Highpass => out.highpass,
            SvfMode::Bandpass => out.bandpass,
        }
    }
}

#[inline]
fn clamp_cutoff(cutoff: f32, sample_rate: f32) -> f32 {
    if cutoff.is_nan() {
        return 10.0;
    }
    cutoff.clamp(10.0, sample_rate * 0.49)
}

#[inline]
fn clamp_q(q: f32) -> f32 {
    if q.is_nan() {
        return 0.707;
    }
    q.clamp(0.1, 40.0)
}

/// Response shape of a [`VzFilter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VzMode {
    /// Peaking bell around the center frequency.
    #[default]
    Bell,
    /// Boost or cut below the corner.
    Lowshelf,
    /// Boost or cut above the corner.
    Highshelf,
    /// Notch at the center frequency.
    BandReject,
}

/// Gain-aware multimode SVF (bell, shelves, band-reject).
///
/// The output is `m0·x + m1·bandpass + m2·lowpass`, with the mix
/// coefficients derived from the linear gain. At DC a low shelf therefore
/// has exactly the requested gain, and so does a high shelf near Nyquist.
///
/// # Example
///
/// ```rust
/// use polyvox_core::{VzFilter, VzMode};
///
/// let mut shelf = VzFilter::new(48000.0, VzMode::Lowshelf);
/// shelf.set_frequency_q_gain(200.0, 0.707, 2.0);
/// let mut y = 0.0;
/// for _ in 0..48000 {
///     y = shelf.process(1.0);
/// }
/// assert!((y - 2.0).abs() < 0.01);
/// ```
#[derive(Debug, Clone)]
pub struct VzFilter {
    ic1eq: f32,
    ic2eq: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    m0: f32,
    m1: f32,
    m2: f32,
    sample_rate: f32,
    frequency: f32,
    q: f32,
    gain: f32,
    mode: VzMode,
}

impl VzFilter {
    /// Create a filter at 1 kHz, Q 0.707, unity gain.
    pub fn new(sample_rate: f32, mode: VzMode) -> Self {
        let mut filter = Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            m0: 1.0,
            m1: 0.0,
            m2: 0.0,
            sample_rate,
            frequency: 1000.0,
            q: 0.707,
            gain: 1.0,
            mode,
        };
        filter.update_coefficients();
        filter
    }

    /// Change the response shape.
    pub fn set_mode(&mut self, mode: VzMode) {
        if self.mode != mode {
            self.mode = mode;
            self.update_coefficients();
        }
    }

    /// Current response shape.
    pub fn mode(&self) -> VzMode {
        self.mode
    }

    /// Change sample rate, keeping frequency, Q and gain.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.frequency = clamp_cutoff(self.frequency, sample_rate);
        self.update_coefficients();
    }

    /// Set the linear gain (clamped to 1e-4 .. 1e4).
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = clamp_gain(gain);
        self.update_coefficients();
    }

    /// Set frequency, Q and linear gain with one coefficient update.
    pub fn set_frequency_q_gain(&mut self, frequency: f32, q: f32, gain: f32) {
        self.frequency = clamp_cutoff(frequency, self.sample_rate);
        self.q = clamp_q(q);
        self.gain = clamp_gain(gain);
        self.update_coefficients();
    }

    /// Set frequency, bandwidth in octaves and linear gain.
    pub fn set_frequency_bandwidth_gain(&mut self, frequency: f32, octaves: f32, gain: f32) {
        self.set_frequency_q_gain(frequency, bandwidth_to_q(octaves), gain);
    }

    /// Clear integrator state.
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    fn update_coefficients(&mut self) {
        let a = sqrtf(self.gain);
        let base = prewarp(self.frequency, self.sample_rate);
        let (g, k, m0, m1, m2) = match self.mode {
            VzMode::Bell => {
                let k = 1.0 / (self.q * a);
                (base, k, 1.0, k * (a * a - 1.0), 0.0)
            }
            VzMode::Lowshelf => {
                let k = 1.0 / self.q;
                (base / sqrtf(a), k, 1.0, k * (a - 1.0), a * a - 1.0)
            }
            VzMode::Highshelf => {
                let k = 1.0 / self.q;
                (base * sqrtf(a), k, a * a, k * (1.0 - a) * a, 1.0 - a * a)
            }
            VzMode::BandReject => {
                let k = 1.0 / self.q;
                (base, k, 1.0, -k, 0.0)
            }
        };
        self.a1 = 1.0 / (1.0 + g * (g + k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
        self.m0 = m0;
        self.m1 = m1;
        self.m2 = m2;
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let v3 = input - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;
        self.ic1eq = flush_denormal(2.0 * v1 - self.ic1eq);
        self.ic2eq = flush_denormal(2.0 * v2 - self.ic2eq);
        self.m0 * input + self.m1 * v1 + self.m2 * v2
    }
}

#[inline]
fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        return 1.0;
    }
    gain.clamp(1e-4, 1e4)
}

/// Convert a bandwidth in octaves to Q: `√(2^bw) / (2^bw − 1)`.
#[inline]
pub fn bandwidth_to_q(octaves: f32) -> f32 {
    let octaves = if octaves.is_nan() { 1.0 } else { octaves.clamp(0.01, 12.0) };
    let two_bw = powf(2.0, octaves);
    sqrtf(two_bw) / (two_bw - 1.0)
}
