//! Band-limited audio-rate oscillators.
//!
//! Every generator is driven per sample with its frequency (and, where it
//! applies, a 0..1 shape), so callers can modulate both at audio rate:
//!
//! | Generator | Shape meaning | Anti-aliasing |
//! |-----------|---------------|---------------|
//! | [`SawOsc`] | unused | 4th-order PolyBLEP |
//! | [`PulseOsc`] | pulse width | PolyBLEP on both edges |
//! | [`TriangleOsc`] | peak position | leaky integration of a BLEP pulse |
//! | [`SineOsc`] | unused | none needed |
//! | [`SawPulseOsc`] | saw → pulse morph | as above |
//! | [`SineTriOsc`] | sine → triangle morph | as above |
//! | [`WavetableOsc`] | table index morph | linear interpolation |
//!
//! All generators output roughly ±1 and accept a sync input from another
//! oscillator's raw output (see [`SyncMode`]).

use alloc::vec::Vec;
use core::f32::consts::PI;
use libm::{floorf, sinf};

use crate::math::lerp;

/// Euclidean remainder for f32, compatible with no_std.
#[inline]
fn wrap_unit(a: f32) -> f32 {
    let r = a - floorf(a);
    if r >= 1.0 { 0.0 } else { r }
}

/// How a slave oscillator follows its sync master.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Reset phase on every master cycle.
    #[default]
    Hard,
    /// Reverse direction on every master cycle.
    Soft,
}

/// Phase accumulator shared by every generator.
///
/// A master cycle is detected as a rising zero crossing of the master's raw
/// output.
#[derive(Debug, Clone)]
pub struct Phasor {
    phase: f32,
    inc: f32,
    direction: f32,
    last_master: f32,
    sample_rate: f32,
}

impl Phasor {
    /// Create a phasor at phase 0.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            inc: 0.0,
            direction: 1.0,
            last_master: 0.0,
            sample_rate: sample_rate.max(1.0),
        }
    }

    /// Set frequency in Hz. Negative and NaN frequencies stall the phasor.
    #[inline]
    pub fn set_frequency(&mut self, freq: f32) {
        let freq = if freq.is_nan() { 0.0 } else { freq.max(0.0) };
        self.inc = (freq / self.sample_rate).min(0.5);
    }

    /// Phase increment per sample.
    #[inline]
    pub fn increment(&self) -> f32 {
        self.inc
    }

    /// Current phase in \[0, 1).
    #[inline]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Jump to a phase (wrapped into \[0, 1)).
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = if phase.is_finite() { wrap_unit(phase) } else { 0.0 };
    }

    /// +1.0 when running forward, -1.0 after an odd number of soft syncs.
    #[inline]
    pub fn direction(&self) -> f32 {
        self.direction
    }

    /// Change sample rate, keeping frequency.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let freq = self.inc * self.sample_rate;
        self.sample_rate = sample_rate.max(1.0);
        self.set_frequency(freq);
    }

    /// Feed the master's raw output. Returns true when a master cycle began.
    #[inline]
    pub fn sync(&mut self, master: f32, mode: SyncMode) -> bool {
        let triggered = self.last_master <= 0.0 && master > 0.0;
        self.last_master = master;
        if triggered {
            match mode {
                SyncMode::Hard => {
                    self.phase = 0.0;
                    self.direction = 1.0;
                }
                SyncMode::Soft => self.direction = -self.direction,
            }
        }
        triggered
    }

    /// Advance one sample.
    #[inline]
    pub fn advance(&mut self) {
        self.phase = wrap_unit(self.phase + self.inc * self.direction);
    }

    /// Reset phase and direction.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.direction = 1.0;
        self.last_master = 0.0;
    }
}

/// 4th-order PolyBLEP correction near a discontinuity at phase 0/1.
///
/// C²-continuous degree-4 residual spanning 2 samples each side
/// (Välimäki et al., "Antialiasing Oscillators", 2010).
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    const A4: f32 = -43.0 / 48.0;
    const A3: f32 = 7.0 / 6.0;
    const A2: f32 = 0.5;
    const A0: f32 = -1.0;
    const C: f32 = -11.0 / 48.0;

    if dt <= 0.0 {
        return 0.0;
    }
    let dt2 = 2.0 * dt;
    if t < dt2 {
        let n = t / dt;
        if n < 1.0 {
            let n2 = n * n;
            A4 * n2 * n2 + A3 * n2 * n + A2 * n2 + A0
        } else {
            let u = 2.0 - n;
            let u2 = u * u;
            C * u2 * u2
        }
    } else if t > 1.0 - dt2 {
        let n = (1.0 - t) / dt;
        if n < 1.0 {
            let n2 = n * n;
            -(A4 * n2 * n2 + A3 * n2 * n + A2 * n2 + A0)
        } else {
            let u = 2.0 - n;
            let u2 = u * u;
            -(C * u2 * u2)
        }
    } else {
        0.0
    }
}

/// Band-limited pulse at `phase` with the given width.
#[inline]
fn blep_pulse(phase: f32, width: f32, dt: f32) -> f32 {
    let naive = if phase < width { 1.0 } else { -1.0 };
    naive + poly_blep(phase, dt) - poly_blep(wrap_unit(phase - width + 1.0), dt)
}

/// Band-limited sawtooth.
///
/// # Example
///
/// ```rust
/// use polyvox_core::SawOsc;
///
/// let mut saw = SawOsc::new(48000.0);
/// let y = saw.tick(220.0);
/// assert!(y.abs() <= 1.1);
/// ```
#[derive(Debug, Clone)]
pub struct SawOsc {
    phasor: Phasor,
}

impl SawOsc {
    /// Create a saw at phase 0.
    pub fn new(sample_rate: f32) -> Self {
        Self { phasor: Phasor::new(sample_rate) }
    }

    /// Generate one sample at `freq` Hz.
    #[inline]
    pub fn tick(&mut self, freq: f32) -> f32 {
        self.phasor.set_frequency(freq);
        let phase = self.phasor.phase();
        let dt = self.phasor.increment();
        let out = 2.0 * phase - 1.0 - self.phasor.direction() * poly_blep(phase, dt);
        self.phasor.advance();
        out
    }

    /// Follow a sync master.
    #[inline]
    pub fn sync(&mut self, master: f32, mode: SyncMode) {
        self.phasor.sync(master, mode);
    }

    /// Access the phase accumulator.
    pub fn phasor_mut(&mut self) -> &mut Phasor {
        &mut self.phasor
    }

    /// Change sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.phasor.set_sample_rate(sample_rate);
    }
}

/// Band-limited variable-width pulse.
#[derive(Debug, Clone)]
pub struct PulseOsc {
    phasor: Phasor,
}

impl PulseOsc {
    /// Create a pulse at phase 0.
    pub fn new(sample_rate: f32) -> Self {
        Self { phasor: Phasor::new(sample_rate) }
    }

    /// Generate one sample at `freq` Hz with `width` in 0..1 (clamped to
    /// 0.01..0.99).
    #[inline]
    pub fn tick(&mut self, freq: f32, width: f32) -> f32 {
        self.phasor.set_frequency(freq);
        let width = clamp_width(width);
        let out = blep_pulse(self.phasor.phase(), width, self.phasor.increment());
        self.phasor.advance();
        out
    }

    /// Follow a sync master.
    #[inline]
    pub fn sync(&mut self, master: f32, mode: SyncMode) {
        self.phasor.sync(master, mode);
    }

    /// Change sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.phasor.set_sample_rate(sample_rate);
    }
}

#[inline]
fn clamp_width(width: f32) -> f32 {
    if width.is_nan() { 0.5 } else { width.clamp(0.01, 0.99) }
}

/// Triangle with variable peak position, built by leaky integration of a
/// band-limited asymmetric pulse.
#[derive(Debug, Clone)]
pub struct TriangleOsc {
    phasor: Phasor,
    integrator: f32,
}

impl TriangleOsc {
    /// Create a triangle starting at its trough.
    pub fn new(sample_rate: f32) -> Self {
        Self { phasor: Phasor::new(sample_rate), integrator: -1.0 }
    }

    /// Generate one sample at `freq` Hz; `width` is the peak position.
    #[inline]
    pub fn tick(&mut self, freq: f32, width: f32) -> f32 {
        self.phasor.set_frequency(freq);
        let width = clamp_width(width);
        let phase = self.phasor.phase();
        let dt = self.phasor.increment();
        // Rising slope 2/w, falling slope -2/(1-w); unit-height BLEP pulse
        // rescaled so one cycle integrates to zero.
        let up = 2.0 / width;
        let down = 2.0 / (1.0 - width);
        let pulse = blep_pulse(phase, width, dt);
        let slope = 0.5 * (up - down) + 0.5 * (up + down) * pulse;
        let leak = 1.0 - dt.min(0.1) * 0.05;
        self.integrator = (leak * self.integrator + slope * dt * self.phasor.direction()).clamp(-1.5, 1.5);
        self.phasor.advance();
        self.integrator
    }

    /// Follow a sync master.
    #[inline]
    pub fn sync(&mut self, master: f32, mode: SyncMode) {
        if self.phasor.sync(master, mode) && mode == SyncMode::Hard {
            self.integrator = -1.0;
        }
    }

    /// Change sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.phasor.set_sample_rate(sample_rate);
    }
}

/// Sine oscillator.
#[derive(Debug, Clone)]
pub struct SineOsc {
    phasor: Phasor,
}

impl SineOsc {
    /// Create a sine at phase 0.
    pub fn new(sample_rate: f32) -> Self {
        Self { phasor: Phasor::new(sample_rate) }
    }

    /// Generate one sample at `freq` Hz.
    #[inline]
    pub fn tick(&mut self, freq: f32) -> f32 {
        self.phasor.set_frequency(freq);
        let out = sinf(self.phasor.phase() * 2.0 * PI);
        self.phasor.advance();
        out
    }

    /// Follow a sync master.
    #[inline]
    pub fn sync(&mut self, master: f32, mode: SyncMode) {
        self.phasor.sync(master, mode);
    }

    /// Change sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.phasor.set_sample_rate(sample_rate);
    }
}

/// Saw and square pair crossfaded by shape: 0 is pure saw, 1 pure square.
#[derive(Debug, Clone)]
pub struct SawPulseOsc {
    saw: SawOsc,
    pulse: PulseOsc,
}

impl SawPulseOsc {
    /// Create the pair at phase 0.
    pub fn new(sample_rate: f32) -> Self {
        Self { saw: SawOsc::new(sample_rate), pulse: PulseOsc::new(sample_rate) }
    }

    /// Generate one sample at `freq` Hz with morph `shape` in 0..1.
    #[inline]
    pub fn tick(&mut self, freq: f32, shape: f32) -> f32 {
        let shape = clamp_unit(shape);
        let saw = self.saw.tick(freq);
        let pulse = self.pulse.tick(freq, 0.5);
        saw * (1.0 - shape) + pulse * shape
    }

    /// Follow a sync master.
    #[inline]
    pub fn sync(&mut self, master: f32, mode: SyncMode) {
        self.saw.sync(master, mode);
        self.pulse.sync(master, mode);
    }

    /// Change sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.saw.set_sample_rate(sample_rate);
        self.pulse.set_sample_rate(sample_rate);
    }
}

/// Sine and triangle pair crossfaded by shape: 0 is pure sine, 1 pure
/// triangle.
#[derive(Debug, Clone)]
pub struct SineTriOsc {
    sine: SineOsc,
    tri: TriangleOsc,
}

impl SineTriOsc {
    /// Create the pair at phase 0.
    pub fn new(sample_rate: f32) -> Self {
        Self { sine: SineOsc::new(sample_rate), tri: TriangleOsc::new(sample_rate) }
    }

    /// Generate one sample at `freq` Hz with morph `shape` in 0..1.
    #[inline]
    pub fn tick(&mut self, freq: f32, shape: f32) -> f32 {
        let shape = clamp_unit(shape);
        let sine = self.sine.tick(freq);
        let tri = self.tri.tick(freq, 0.5);
        sine * (1.0 - shape) + tri * shape
    }

    /// Follow a sync master.
    #[inline]
    pub fn sync(&mut self, master: f32, mode: SyncMode) {
        self.sine.sync(master, mode);
        self.tri.sync(master, mode);
    }

    /// Change sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sine.set_sample_rate(sample_rate);
        self.tri.set_sample_rate(sample_rate);
    }
}

#[inline]
fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// A set of single-cycle tables for [`WavetableOsc`].
///
/// Empty tables are dropped at construction.
#[derive(Debug, Clone, Default)]
pub struct WaveTableSet {
    tables: Vec<Vec<f32>>,
}

impl WaveTableSet {
    /// Build from single-cycle tables.
    pub fn new(tables: Vec<Vec<f32>>) -> Self {
        let tables: Vec<Vec<f32>> = tables.into_iter().filter(|t| !t.is_empty()).collect();
        #[cfg(feature = "tracing")]
        tracing::debug!(tables = tables.len(), "wavetable set built");
        Self { tables }
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True when there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[inline]
    fn read(&self, table: usize, phase: f32) -> f32 {
        let data = &self.tables[table];
        let position = phase * data.len() as f32;
        let index = (position as usize).min(data.len() - 1);
        let next = (index + 1) % data.len();
        lerp(data[index], data[next], position - index as f32)
    }
}

/// Wavetable oscillator morphing across a [`WaveTableSet`].
#[derive(Debug, Clone)]
pub struct WavetableOsc {
    phasor: Phasor,
}

impl WavetableOsc {
    /// Create at phase 0.
    pub fn new(sample_rate: f32) -> Self {
        Self { phasor: Phasor::new(sample_rate) }
    }

    /// Generate one sample. `morph` 0..1 sweeps from the first to the last
    /// table. An empty set yields silence.
    #[inline]
    pub fn tick(&mut self, tables: &WaveTableSet, freq: f32, morph: f32) -> f32 {
        self.phasor.set_frequency(freq);
        let phase = self.phasor.phase();
        self.phasor.advance();
        if tables.is_empty() {
            return 0.0;
        }
        let position = clamp_unit(morph) * (tables.len() - 1) as f32;
        let index = (position as usize).min(tables.len() - 1);
        let frac = position - index as f32;
        let a = tables.read(index, phase);
        if index + 1 < tables.len() && frac > 0.0 {
            lerp(a, tables.read(index + 1, phase), frac)
        } else {
            a
        }
    }

    /// Follow a sync master.
    #[inline]
    pub fn sync(&mut self, master: f32, mode: SyncMode) {
        self.phasor.sync(master, mode);
    }

    /// Change sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.phasor.set_sample_rate(sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising_crossings(mut next: impl FnMut() -> f32, samples: usize) -> i32 {
        let mut prev = 0.0;
        let mut count = 0;
        for _ in 0..samples {
            let s = next();
            if prev <= 0.0 && s > 0.0 {
                count += 1;
            }
            prev = s;
        }
        count
    }

    #[test]
    fn test_sine_frequency_440hz() {
        let mut osc = SineOsc::new(48000.0);
        let crossings = rising_crossings(|| osc.tick(440.0), 48000);
        assert!((crossings - 440).abs() <= 2, "Expected ~440 zero crossings, got {crossings}");
    }

    #[test]
    fn test_saw_frequency_and_range() {
        let mut osc = SawOsc::new(48000.0);
        let mut peak = 0.0_f32;
        let crossings = rising_crossings(
            || {
                let s = osc.tick(1000.0);
                peak = peak.max(s.abs());
                s
            },
            48000,
        );
        assert!((crossings - 1000).abs() <= 2, "Expected ~1000 crossings, got {crossings}");
        assert!(peak <= 1.1, "saw peak {peak}");
    }

    #[test]
    fn test_pulse_width_sets_duty() {
        let mut osc = PulseOsc::new(48000.0);
        let mut high = 0;
        for _ in 0..48000 {
            if osc.tick(100.0, 0.25) > 0.0 {
                high += 1;
            }
        }
        let duty = high as f32 / 48000.0;
        assert!((duty - 0.25).abs() < 0.02, "duty {duty}");
    }

    #[test]
    fn test_triangle_bounded_and_periodic() {
        let mut osc = TriangleOsc::new(48000.0);
        let mut max = f32::MIN;
        let mut min = f32::MAX;
        for i in 0..48000 {
            let s = osc.tick(220.0, 0.5);
            if i > 4800 {
                max = max.max(s);
                min = min.min(s);
            }
        }
        assert!(max > 0.8 && max <= 1.5, "tri max {max}");
        assert!(min < -0.8 && min >= -1.5, "tri min {min}");
    }

    #[test]
    fn test_saw_pulse_extremes_match_components() {
        let mut pair = SawPulseOsc::new(48000.0);
        let mut saw = SawOsc::new(48000.0);
        for _ in 0..1000 {
            assert_eq!(pair.tick(330.0, 0.0), saw.tick(330.0));
        }
        let mut pair = SawPulseOsc::new(48000.0);
        let mut pulse = PulseOsc::new(48000.0);
        for _ in 0..1000 {
            assert_eq!(pair.tick(330.0, 1.0), pulse.tick(330.0, 0.5));
        }
    }

    #[test]
    fn test_hard_sync_resets_phase() {
        let mut osc = SawOsc::new(48000.0);
        for _ in 0..37 {
            osc.tick(1000.0);
        }
        osc.sync(-0.5, SyncMode::Hard);
        osc.sync(0.5, SyncMode::Hard);
        assert_eq!(osc.phasor_mut().phase(), 0.0);
    }

    #[test]
    fn test_soft_sync_reverses_direction() {
        let mut p = Phasor::new(48000.0);
        p.set_frequency(1000.0);
        p.sync(-1.0, SyncMode::Soft);
        assert!(p.sync(1.0, SyncMode::Soft));
        assert_eq!(p.direction(), -1.0);
        assert!(!p.sync(1.0, SyncMode::Soft), "no trigger without crossing");
    }

    #[test]
    fn test_wavetable_morph_and_empty() {
        let set = WaveTableSet::new(vec![vec![1.0; 64], vec![-1.0; 64], vec![]]);
        assert_eq!(set.len(), 2);
        let mut osc = WavetableOsc::new(48000.0);
        assert!((osc.tick(&set, 100.0, 0.0) - 1.0).abs() < 1e-6);
        assert!((osc.tick(&set, 100.0, 1.0) + 1.0).abs() < 1e-6);
        assert!(osc.tick(&set, 100.0, 0.5).abs() < 1e-6);
        assert_eq!(osc.tick(&WaveTableSet::default(), 100.0, 0.5), 0.0);
    }

    #[test]
    fn test_nan_frequency_stalls() {
        let mut osc = SawOsc::new(48000.0);
        for _ in 0..10 {
            assert!(osc.tick(f32::NAN).is_finite());
        }
    }
}
