//! Mathematical utility functions for DSP.
//!
//! All functions are allocation-free and suitable for `no_std`.
//!
//! # Level Conversions
//!
//! - [`db_to_linear`] / [`linear_to_db`] - Convert between dB and linear gain
//!
//! # Pitch Conversions
//!
//! - [`mtof`] / [`ftom`] - MIDI note number to frequency and back
//!
//! # Waveshaping
//!
//! | Function | Character | Use Case |
//! |----------|-----------|----------|
//! | [`cubic_soft_clip`] | Smooth, saturates at ±2/3 | Soft clipper |
//! | [`abs_saturate`] | Asymmetric with bias | Saturator |
//! | [`shaper`] | Polynomial, drive-dependent | Shaper |
//! | [`foldback`] | Folding, synthy | Wavefolder |

use libm::{expf, floorf, logf, tanhf};

/// Reference frequency of MIDI note 0 in Hz.
pub const MTOF_REFERENCE_HZ: f32 = 8.175_798_915_64;

/// Exponent scale of the note-to-frequency curve: `ln(2) / 12`.
pub const MTOF_EXPONENT: f32 = 0.057_762_265_0;

/// Lowest note accepted by [`mtof`]; anything at or below maps to 0 Hz.
pub const MTOF_MIN_NOTE: f32 = -1500.0;

/// Highest note accepted by [`mtof`]; anything above saturates here.
pub const MTOF_MAX_NOTE: f32 = 1499.0;

/// Convert decibels to linear gain.
///
/// # Arguments
/// * `db` - Value in decibels
///
/// # Returns
/// Linear gain value (e.g., 0 dB → 1.0, -6 dB → 0.5, +6 dB → 2.0)
///
/// # Example
/// ```rust
/// use polyvox_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
///
/// # Arguments
/// * `linear` - Linear gain value (clamped to 1e-10 from below)
///
/// # Example
/// ```rust
/// use polyvox_core::linear_to_db;
///
/// assert!((linear_to_db(1.0) - 0.0).abs() < 0.001);
/// assert!((linear_to_db(0.5) - (-6.02)).abs() < 0.01);
/// ```
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Convert a (fractional) MIDI note number to frequency in Hz.
///
/// `freq = 8.17579891564 · e^(0.0577622650 · note)`. Notes at or below
/// -1500 return 0 Hz; notes above 1499 saturate at `mtof(1499)`.
///
/// # Example
/// ```rust
/// use polyvox_core::mtof;
///
/// assert!((mtof(69.0) - 440.0).abs() < 0.01);
/// assert_eq!(mtof(-2000.0), 0.0);
/// ```
#[inline]
pub fn mtof(note: f32) -> f32 {
    if note <= MTOF_MIN_NOTE {
        0.0
    } else {
        MTOF_REFERENCE_HZ * expf(MTOF_EXPONENT * note.min(MTOF_MAX_NOTE))
    }
}

/// Convert frequency in Hz to a (fractional) MIDI note number.
///
/// Inverse of [`mtof`]. Non-positive frequencies return -1500.
///
/// # Example
/// ```rust
/// use polyvox_core::ftom;
///
/// assert!((ftom(440.0) - 69.0).abs() < 0.001);
/// ```
#[inline]
pub fn ftom(freq: f32) -> f32 {
    if freq > 0.0 {
        17.312_340_504_6 * logf(0.122_312_205_85 * freq)
    } else {
        MTOF_MIN_NOTE
    }
}

/// Cubic soft clipper: `x - x³/3` inside ±1, saturating to ±2/3 outside.
#[inline]
pub fn cubic_soft_clip(x: f32) -> f32 {
    if x <= -1.0 {
        -0.666_666
    } else if x >= 1.0 {
        0.666_666_6
    } else {
        x - x * x * x * 0.333_333_3
    }
}

/// Absolute-value saturator with DC bias.
///
/// `(x + bias·gain) / (1 + |x + bias|)`.
#[inline]
pub fn abs_saturate(x: f32, bias: f32, gain: f32) -> f32 {
    (x + bias * gain) / (1.0 + (x + bias).abs())
}

/// Polynomial waveshaper with drive.
///
/// Input is prescaled by 2, clipped to ±√8, shaped by a cubic with a
/// quartic window and scaled back. `drive` in 0..1 sets the output level
/// curve.
#[inline]
pub fn shaper(input: f32, drive: f32) -> f32 {
    const SQRT8: f32 = 2.828_427_1;
    const WSCALE: f32 = 1.306_122_4;
    let fx = input * 2.0;
    let xc = fx.clamp(-SQRT8, SQRT8);
    let xc2 = xc * xc;
    let c = 0.5 * fx * (3.0 - xc2);
    let xc4 = xc2 * xc2;
    let w = (1.0 - xc2 * 0.25 + xc4 * 0.015_625) * WSCALE;
    w * (c + 0.05 * xc2) * (drive + 0.75) * 0.5
}

/// Hyperbolic tangent, used for soft saturation.
#[inline]
pub fn fast_tanh(x: f32) -> f32 {
    tanhf(x)
}

/// Foldback distortion.
///
/// When |x| exceeds threshold, the signal folds back instead of clipping.
/// Folds repeatedly for high drive, so the output always lies within
/// `[-threshold, threshold]`.
#[inline]
pub fn foldback(x: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 || !x.is_finite() {
        return 0.0;
    }
    // Triangle-wave mapping of the unbounded input
    let period = 4.0 * threshold;
    let y = x + threshold;
    let shifted = y - period * floorf(y / period);
    if shifted < 2.0 * threshold {
        shifted - threshold
    } else {
        3.0 * threshold - shifted
    }
}

/// Linear interpolation between two values.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert milliseconds to samples.
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * sample_rate / 1000.0
}

/// Flush subnormal (denormalized) floats to zero.
///
/// Replaces values below 1e-20 with zero, leaving margin before the
/// IEEE 754 subnormal range begins. Use in feedback paths.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Crossfade between dry and wet signals: `dry + (wet - dry) * mix`.
#[inline]
pub fn wet_dry_mix(dry: f32, wet: f32, mix: f32) -> f32 {
    dry + (wet - dry) * mix
}
