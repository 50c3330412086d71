//! Note-to-frequency conversion with optional microtonal scales.

use libm::floorf;

use crate::config::TuningConfig;

/// How notes map to frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TuningMode {
    /// Standard 12-tone equal temperament.
    #[default]
    EqualTemperament,
    /// 12-degree scale of cent offsets anchored at a reference note.
    Scale,
}

/// Note-to-frequency lookup.
///
/// The mode is resolved when the scale changes, not per call.
///
/// # Example
///
/// ```rust
/// use polyvox_synth::Tuning;
///
/// let mut tuning = Tuning::new();
/// assert!((tuning.frequency_for_note(69.0) - 440.0).abs() < 0.01);
///
/// let mut cents = [0.0; 12];
/// cents[9] = -50.0;
/// tuning.set_scale(60, cents);
/// let a = tuning.frequency_for_note(69.0);
/// assert!((a - 427.47).abs() < 0.1, "a quarter tone flat: {a}");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    mode: TuningMode,
    reference_note: i32,
    cents: [f32; 12],
}

impl Default for Tuning {
    fn default() -> Self {
        Self::new()
    }
}

impl Tuning {
    /// Equal temperament.
    pub fn new() -> Self {
        Self { mode: TuningMode::EqualTemperament, reference_note: 60, cents: [0.0; 12] }
    }

    /// Build from configuration.
    pub fn from_config(config: &TuningConfig) -> Self {
        let mut tuning = Self::new();
        if let Some(cents) = config.cents.as_deref()
            && let Ok(table) = <[f32; 12]>::try_from(cents)
        {
            tuning.set_scale(config.reference_note, table);
        }
        tuning
    }

    /// Switch to a scale. Degree 0 sits on `reference_note`.
    pub fn set_scale(&mut self, reference_note: u8, cents: [f32; 12]) {
        self.reference_note = i32::from(reference_note);
        self.cents = cents;
        self.mode = if cents.iter().all(|c| *c == 0.0) {
            TuningMode::EqualTemperament
        } else {
            TuningMode::Scale
        };
        tracing::debug!(mode = ?self.mode, reference_note, "tuning changed");
    }

    /// Back to equal temperament.
    pub fn set_equal_temperament(&mut self) {
        self.mode = TuningMode::EqualTemperament;
        self.cents = [0.0; 12];
    }

    /// Active mode.
    pub fn mode(&self) -> TuningMode {
        self.mode
    }

    /// Exact note → Hz (`8.17579891564 · e^(0.057762265 · note)`).
    #[inline]
    pub fn mtof(note: f32) -> f32 {
        polyvox_core::mtof(note)
    }

    /// Hz → note. Non-positive frequencies give -1500.
    #[inline]
    pub fn ftom(freq: f32) -> f32 {
        polyvox_core::ftom(freq)
    }

    /// Polynomial approximation of [`mtof`](Self::mtof) for hot paths.
    #[inline]
    pub fn fast_mtof(note: f32) -> f32 {
        polyvox_core::fast_mtof(note)
    }

    #[inline]
    fn offset(&self, note: i32) -> f32 {
        self.cents[(note - self.reference_note).rem_euclid(12) as usize]
    }

    /// Frequency of a (fractional) note under the active tuning.
    ///
    /// Scale offsets are interpolated between neighbouring degrees.
    #[inline]
    pub fn frequency_for_note(&self, note: f32) -> f32 {
        match self.mode {
            TuningMode::EqualTemperament => Self::mtof(note),
            TuningMode::Scale => {
                if !note.is_finite() {
                    return Self::mtof(note);
                }
                let base = floorf(note);
                let frac = note - base;
                let degree = base as i32;
                let lo = self.offset(degree);
                let hi = self.offset(degree + 1);
                Self::mtof(note + (lo + (hi - lo) * frac) * 0.01)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pitch() {
        assert!((Tuning::mtof(0.0) - 8.175_798_9).abs() < 1e-4);
        assert_eq!(Tuning::mtof(-2000.0), 0.0);
        assert_eq!(Tuning::mtof(-1500.0), 0.0);
        assert_eq!(Tuning::mtof(2000.0), Tuning::mtof(1499.0));
    }

    #[test]
    fn test_ftom_inverts() {
        for note in [12.0, 45.5, 69.0, 100.0] {
            let back = Tuning::ftom(Tuning::mtof(note));
            assert!((back - note).abs() < 1e-3, "{note} -> {back}");
        }
        assert_eq!(Tuning::ftom(0.0), -1500.0);
    }

    #[test]
    fn test_fast_mtof_close() {
        for note in [24.0, 60.0, 96.0] {
            let exact = Tuning::mtof(note);
            let fast = Tuning::fast_mtof(note);
            assert!((fast - exact).abs() / exact < 0.01, "{note}: {fast} vs {exact}");
        }
    }

    #[test]
    fn test_scale_applies_per_degree() {
        let mut tuning = Tuning::new();
        let mut cents = [0.0; 12];
        cents[2] = 100.0;
        tuning.set_scale(62, cents);
        assert_eq!(tuning.mode(), TuningMode::Scale);
        let f = tuning.frequency_for_note(64.0);
        assert!((f - Tuning::mtof(65.0)).abs() < 0.01, "degree 2 of D is E, raised to F: {f}");
        assert!((tuning.frequency_for_note(62.0) - Tuning::mtof(62.0)).abs() < 1e-3);
        assert!((tuning.frequency_for_note(50.0) - Tuning::mtof(50.0)).abs() < 1e-3);
    }

    #[test]
    fn test_zero_scale_is_equal_temperament() {
        let mut tuning = Tuning::new();
        tuning.set_scale(60, [0.0; 12]);
        assert_eq!(tuning.mode(), TuningMode::EqualTemperament);
    }

    #[test]
    fn test_from_config() {
        let config = TuningConfig { reference_note: 60, cents: Some(vec![10.0; 12]) };
        let tuning = Tuning::from_config(&config);
        let f = tuning.frequency_for_note(60.5);
        assert!((f - Tuning::mtof(60.6)).abs() < 0.01, "f = {f}");
    }
}
