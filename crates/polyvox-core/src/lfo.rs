//! Low frequency oscillator for modulation sources.
//!
//! Naive (non band-limited) shapes are fine at sub-audio rates. The two
//! paired shapes morph between their components with a 0..1 shape value.

use core::f32::consts::PI;
use libm::{floorf, sinf};

/// LFO waveform set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoShape {
    /// Sine morphing into triangle.
    #[default]
    SineTri,
    /// Saw morphing into square.
    SawPulse,
    /// Pure sine.
    Sine,
    /// Pure triangle.
    Triangle,
    /// Rising saw.
    Saw,
    /// Pulse, shape sets the width.
    Pulse,
}

impl LfoShape {
    /// Resolve a raw selector value. Unknown values give [`LfoShape::SineTri`].
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => Self::SawPulse,
            2 => Self::Sine,
            3 => Self::Triangle,
            4 => Self::Saw,
            5 => Self::Pulse,
            _ => Self::SineTri,
        }
    }
}

/// Bipolar low frequency oscillator.
///
/// # Example
///
/// ```rust
/// use polyvox_core::{Lfo, LfoShape};
///
/// let mut lfo = Lfo::new(48000.0, 2.0);
/// lfo.set_waveform(LfoShape::Triangle);
/// let value = lfo.tick();
/// assert!((-1.0..=1.0).contains(&value));
/// ```
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f32,
    phase_inc: f32,
    sample_rate: f32,
    waveform: LfoShape,
    shape: f32,
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new(48000.0, 1.0)
    }
}

impl Lfo {
    /// Create an LFO at phase 0.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        let mut lfo = Self {
            phase: 0.0,
            phase_inc: 0.0,
            sample_rate: sample_rate.max(1.0),
            waveform: LfoShape::default(),
            shape: 0.0,
        };
        lfo.set_frequency(freq_hz);
        lfo
    }

    /// Set rate in Hz. Negative and NaN rates stop the LFO.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        let freq = if freq_hz.is_nan() { 0.0 } else { freq_hz.max(0.0) };
        self.phase_inc = freq / self.sample_rate;
    }

    /// Current rate in Hz.
    pub fn frequency(&self) -> f32 {
        self.phase_inc * self.sample_rate
    }

    /// Select the waveform.
    pub fn set_waveform(&mut self, waveform: LfoShape) {
        self.waveform = waveform;
    }

    /// Current waveform.
    pub fn waveform(&self) -> LfoShape {
        self.waveform
    }

    /// Set morph / pulse width in 0..1.
    pub fn set_shape(&mut self, shape: f32) {
        self.shape = if shape.is_nan() { 0.0 } else { shape.clamp(0.0, 1.0) };
    }

    /// Jump to a phase in 0..1 (0.25 = 90°).
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = if phase.is_finite() { phase - floorf(phase) } else { 0.0 };
    }

    /// Current phase in 0..1.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Reset phase to 0.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Next value in -1..1.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        let p = self.phase;
        let s = self.shape;
        let output = match self.waveform {
            LfoShape::SineTri => sine(p) * (1.0 - s) + triangle(p) * s,
            LfoShape::SawPulse => saw(p) * (1.0 - s) + pulse(p, 0.5) * s,
            LfoShape::Sine => sine(p),
            LfoShape::Triangle => triangle(p),
            LfoShape::Saw => saw(p),
            LfoShape::Pulse => pulse(p, s.clamp(0.01, 0.99)),
        };

        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= floorf(self.phase);
        }
        output
    }

    /// Change sample rate, keeping the rate in Hz.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let freq = self.frequency();
        self.sample_rate = sample_rate.max(1.0);
        self.set_frequency(freq);
    }
}

#[inline]
fn sine(p: f32) -> f32 {
    sinf(p * 2.0 * PI)
}

// Quarter-phase offset so sine and triangle line up for morphing.
#[inline]
fn triangle(p: f32) -> f32 {
    let q = p + 0.25;
    let q = q - floorf(q);
    if q < 0.5 { 4.0 * q - 1.0 } else { 3.0 - 4.0 * q }
}

#[inline]
fn saw(p: f32) -> f32 {
    2.0 * p - 1.0
}

#[inline]
fn pulse(p: f32, width: f32) -> f32 {
    if p < width { 1.0 } else { -1.0 }
}
