//! Fast approximations for hot per-voice paths.
//!
//! Each function trades full IEEE 754 precision for speed and documents its
//! maximum error. They target coefficient computation and control signals
//! (filter gains, modulated pitch) where perceptual accuracy matters more
//! than mathematical accuracy.
//!
//! | Function | Replaces | Max error |
//! |----------|----------|-----------|
//! | [`fast_log2`] | `libm::log2f` | < 0.2% |
//! | [`fast_exp2`] | `libm::exp2f` | < 0.2% |
//! | [`fast_db_to_linear`] | [`db_to_linear`](crate::db_to_linear) | < 0.05 dB |
//! | [`fast_mtof`] | [`mtof`](crate::mtof) | < 0.2% (< 4 cents) |
//! | [`fast_sin_turns`] | `libm::sinf` | < 0.001 |
//! | [`fast_tan`] | `libm::tanf` | < 0.1% (f < sr/4) |

use libm::floorf;

use crate::math::{MTOF_EXPONENT, MTOF_MAX_NOTE, MTOF_MIN_NOTE, MTOF_REFERENCE_HZ};

/// Fast base-2 logarithm via IEEE 754 float decomposition.
///
/// Extracts the exponent from the bit pattern and applies a 2nd-order
/// minimax polynomial to the mantissa. Input must be > 0.
///
/// # Examples
///
/// ```
/// use polyvox_core::fast_math::fast_log2;
///
/// assert!((fast_log2(2.0) - 1.0).abs() < 0.01);
/// assert!((fast_log2(0.5) + 1.0).abs() < 0.01);
/// ```
#[inline]
pub fn fast_log2(x: f32) -> f32 {
    let bits = x.to_bits();
    let exponent = ((bits >> 23) & 0xFF) as i32 - 127;
    let m = f32::from_bits((bits & 0x007F_FFFF) | 0x3F80_0000);
    exponent as f32 + (m * (m * -0.344_845_6 + 2.024_094) - 1.674_094)
}

/// Fast base-2 exponential.
///
/// `2^x = 2^⌊x⌋ · 2^frac(x)`: the integer part is exact bit manipulation,
/// the fractional part a 3rd-order minimax polynomial. Input is clamped to
/// \[-126, 126\].
///
/// # Examples
///
/// ```
/// use polyvox_core::fast_math::fast_exp2;
///
/// assert!((fast_exp2(1.0) - 2.0).abs() < 0.01);
/// assert!((fast_exp2(-1.0) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn fast_exp2(x: f32) -> f32 {
    let x = x.clamp(-126.0, 126.0);
    let i = floorf(x) as i32;
    let f = x - i as f32;
    let p = 1.0 + f * (core::f32::consts::LN_2 + f * (0.240_226 + f * 0.055_504_1));
    f32::from_bits(((i + 127) as u32) << 23) * p
}

/// Fast dB-to-linear gain conversion: `2^(dB · log₂(10)/20)`.
///
/// # Examples
///
/// ```
/// use polyvox_core::fast_math::fast_db_to_linear;
///
/// assert!((fast_db_to_linear(-20.0) - 0.1).abs() < 0.01);
/// ```
#[inline]
pub fn fast_db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LOG2_10 / 20.0;
    fast_exp2(db * FACTOR)
}

/// Fast linear-to-dB conversion. Input is clamped to 1e-10 from below.
#[inline]
pub fn fast_linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LOG2_10;
    fast_log2(linear.max(1e-10)) * FACTOR
}

/// Fast note-to-frequency conversion with the same clamps as
/// [`mtof`](crate::mtof).
///
/// # Examples
///
/// ```
/// use polyvox_core::fast_math::fast_mtof;
///
/// assert!((fast_mtof(69.0) - 440.0).abs() < 1.0);
/// assert_eq!(fast_mtof(-1600.0), 0.0);
/// ```
#[inline]
pub fn fast_mtof(note: f32) -> f32 {
    const LOG2_E: f32 = core::f32::consts::LOG2_E;
    if note <= MTOF_MIN_NOTE {
        return 0.0;
    }
    let note = note.min(MTOF_MAX_NOTE);
    MTOF_REFERENCE_HZ * fast_exp2(MTOF_EXPONENT * LOG2_E * note)
}

/// Fast sine from phase in turns (full cycles), wrapped to \[0, 1).
///
/// Corrected parabolic approximation (Bhaskara I variant), max error < 0.001.
#[inline]
pub fn fast_sin_turns(turns: f32) -> f32 {
    let p = turns - floorf(turns);
    let (half_p, sign) = if p < 0.5 {
        (p * 2.0, 1.0_f32)
    } else {
        ((p - 0.5) * 2.0, -1.0_f32)
    };
    let y = 4.0 * half_p * (1.0 - half_p);
    sign * (0.225 * y * (y - 1.0) + y)
}

/// Fast tangent via the Padé \[2/1\] approximant `x(15 − x²)/(15 − 6x²)`.
///
/// Valid for x ∈ \[0, π/3\]; callers above ~10 kHz should use `libm::tanf`.
#[inline]
pub fn fast_tan(x: f32) -> f32 {
    let x2 = x * x;
    x * (15.0 - x2) / (15.0 - 6.0 * x2)
}
