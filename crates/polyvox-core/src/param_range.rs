//! Normalizable parameter ranges.
//!
//! A [`ParamRange`] maps between a host-facing 0..1 value and the
//! parameter's real-world value, either linearly or through a power curve
//! (the classic "skew factor").

use libm::powf;

/// Scaling curve between normalized and real values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ParamScale {
    /// Equal resolution across the range.
    #[default]
    Linear,
    /// `real = min + normalized^exponent · (max - min)`.
    ///
    /// exponent > 1.0 gives more resolution at the low end.
    Power(f32),
}

/// A parameter's real-world range and curve.
///
/// # Example
///
/// ```rust
/// use polyvox_core::{ParamRange, ParamScale};
///
/// let range = ParamRange::new(0.0, 100.0, ParamScale::Power(2.0));
/// assert!((range.denormalize(0.5) - 25.0).abs() < 1e-4);
/// assert!((range.normalize(25.0) - 0.5).abs() < 1e-4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    /// Lowest real value.
    pub min: f32,
    /// Highest real value.
    pub max: f32,
    /// Curve between normalized and real values.
    pub scale: ParamScale,
}

impl ParamRange {
    /// Create a range.
    pub const fn new(min: f32, max: f32, scale: ParamScale) -> Self {
        Self { min, max, scale }
    }

    /// Linear range shorthand.
    pub const fn linear(min: f32, max: f32) -> Self {
        Self::new(min, max, ParamScale::Linear)
    }

    /// Clamp a real value into the range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    /// Real value → 0..1. Values outside the range are clamped first.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span == 0.0 {
            return 0.0;
        }
        let linear = (self.clamp(value) - self.min) / span;
        match self.scale {
            ParamScale::Linear => linear,
            ParamScale::Power(exponent) => powf(linear, 1.0 / exponent),
        }
    }

    /// 0..1 → real value. The input is clamped to 0..1.
    #[inline]
    pub fn denormalize(&self, normalized: f32) -> f32 {
        let normalized = if normalized.is_nan() { 0.0 } else { normalized.clamp(0.0, 1.0) };
        let curved = match self.scale {
            ParamScale::Linear => normalized,
            ParamScale::Power(exponent) => powf(normalized, exponent),
        };
        self.min + curved * (self.max - self.min)
    }

    /// Exponent that converts a normalized modulation value into this
    /// range's curve (1.0 for linear ranges).
    #[inline]
    pub fn hook_exponent(&self) -> f32 {
        match self.scale {
            ParamScale::Linear => 1.0,
            ParamScale::Power(exponent) => exponent,
        }
    }
}
