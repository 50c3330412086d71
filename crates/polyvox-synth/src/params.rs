//! Host-automatable parameter storage.
//!
//! [`ParameterStore`] stands in for the plugin host: it owns one
//! [`AtomicParam`] per declared parameter name together with its
//! [`ParamRange`]. The control thread writes, the audio thread reads.
//!
//! The set of parameters is fixed at construction from a
//! [`ParameterLayout`], so lookups never allocate and handles stay valid for
//! the life of the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use polyvox_core::{ParamRange, SkewTable};

use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineError};
use crate::{effect, envelope, filter, lfo, macros, noise, oscillator, output};

/// A thread-safe f32 stored as `AtomicU32` bits.
///
/// Single writer (control thread), single reader (audio thread). Relaxed
/// ordering: a reader may see a value up to one block late, never a torn one.
#[derive(Debug)]
pub struct AtomicParam {
    value: AtomicU32,
}

impl AtomicParam {
    /// Create with an initial value.
    pub fn new(value: f32) -> Self {
        Self { value: AtomicU32::new(value.to_bits()) }
    }

    /// Store a value (control thread).
    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Load the value (audio thread).
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Relaxed))
    }
}

/// Start, end and center of a [`SkewTable`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewSpec {
    /// Real value at 0.
    pub start: f32,
    /// Real value at 1.
    pub end: f32,
    /// Real value at 0.5.
    pub center: f32,
}

/// Declaration of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Unique parameter name, e.g. `"Filter1 Cutoff"`.
    pub name: String,
    /// Real-world range and normalisation curve.
    pub range: ParamRange,
    /// Initial real value.
    pub default: f32,
    /// Warp applied to modulation hooks, if any.
    pub skew: Option<SkewSpec>,
}

/// Ordered list of every parameter the engine declares.
#[derive(Debug, Clone, Default)]
pub struct ParameterLayout {
    specs: Vec<ParamSpec>,
}

impl ParameterLayout {
    /// Empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter.
    pub fn push(&mut self, name: impl Into<String>, range: ParamRange, default: f32) {
        self.specs.push(ParamSpec { name: name.into(), range, default, skew: None });
    }

    /// Declare a parameter whose hooks are warped through a skew table.
    pub fn push_skewed(
        &mut self,
        name: impl Into<String>,
        range: ParamRange,
        default: f32,
        skew: SkewSpec,
    ) {
        self.specs.push(ParamSpec { name: name.into(), range, default, skew: Some(skew) });
    }

    /// Declared parameters in order.
    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Every parameter the modules of `config` read.
    pub fn for_config(config: &EngineConfig) -> Self {
        let mut layout = Self::new();
        for i in 1..=config.oscillators {
            oscillator::declare_params(&mut layout, &format!("Osc{i}"), i == 1);
        }
        for i in 1..=config.lfos {
            lfo::declare_params(&mut layout, &format!("LFO{i}"));
        }
        noise::declare_params(&mut layout, noise::NAME);
        filter::declare_params(&mut layout, "Filter1");
        filter::declare_params(&mut layout, "Filter2");
        for i in 1..=config.envelopes {
            envelope::declare_params(&mut layout, &format!("Envelope{i}"));
        }
        for i in 1..=config.effects {
            effect::declare_params(&mut layout, &format!("Effect{i}"));
        }
        output::declare_params(&mut layout);
        macros::declare_params(&mut layout, config.macros);
        layout
    }
}

/// Shared view of one parameter.
#[derive(Debug, Clone)]
pub struct ParamHandle {
    /// Raw automation value in real units.
    pub raw: Arc<AtomicParam>,
    /// Real-world range.
    pub range: ParamRange,
    /// Initial real value.
    pub default: f32,
    /// Hook warp table, for skewed parameters.
    pub skew: Option<Arc<SkewTable>>,
}

impl ParamHandle {
    /// Current raw value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.raw.get()
    }
}

/// Name → parameter map, fixed after construction.
///
/// # Example
///
/// ```rust
/// use polyvox_synth::{ParameterLayout, ParameterStore};
/// use polyvox_core::ParamRange;
///
/// let mut layout = ParameterLayout::new();
/// layout.push("Filter1 Cutoff", ParamRange::linear(0.0, 127.0), 127.0);
/// let store = ParameterStore::from_layout(&layout).unwrap();
///
/// store.set_normalized("Filter1 Cutoff", 0.5).unwrap();
/// assert_eq!(store.raw("Filter1 Cutoff").unwrap(), 63.5);
/// ```
#[derive(Debug, Clone)]
pub struct ParameterStore {
    params: HashMap<String, ParamHandle>,
    order: Vec<String>,
}

impl ParameterStore {
    /// Build from a layout. Duplicate names are rejected.
    pub fn from_layout(layout: &ParameterLayout) -> Result<Self, ConfigError> {
        let mut params = HashMap::with_capacity(layout.len());
        let mut order = Vec::with_capacity(layout.len());
        for spec in layout.specs() {
            if params.contains_key(&spec.name) {
                return Err(ConfigError::invalid(format!("duplicate parameter: {}", spec.name)));
            }
            let handle = ParamHandle {
                raw: Arc::new(AtomicParam::new(spec.range.clamp(spec.default))),
                range: spec.range,
                default: spec.range.clamp(spec.default),
                skew: spec.skew.map(|s| Arc::new(SkewTable::new(s.start, s.end, s.center))),
            };
            params.insert(spec.name.clone(), handle);
            order.push(spec.name.clone());
        }
        Ok(Self { params, order })
    }

    /// Handle for `name`.
    pub fn get(&self, name: &str) -> Result<&ParamHandle, EngineError> {
        self.params.get(name).ok_or_else(|| EngineError::UnknownParameter(name.to_string()))
    }

    /// True if `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Raw value of `name`.
    pub fn raw(&self, name: &str) -> Result<f32, EngineError> {
        Ok(self.get(name)?.get())
    }

    /// Set a real value, clamped to the range.
    pub fn set(&self, name: &str, value: f32) -> Result<(), EngineError> {
        let handle = self.get(name)?;
        handle.raw.set(handle.range.clamp(value));
        Ok(())
    }

    /// Set from a 0..1 host value.
    pub fn set_normalized(&self, name: &str, normalized: f32) -> Result<(), EngineError> {
        let handle = self.get(name)?;
        handle.raw.set(handle.range.denormalize(normalized));
        Ok(())
    }

    /// Return every parameter to its default.
    pub fn reset_to_defaults(&self) {
        for handle in self.params.values() {
            handle.raw.set(handle.default);
        }
    }

    /// Declared names in layout order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Sorted unique hook exponents over all ranges, with 1.0 first.
    ///
    /// Mapping sources publish one skew variant per entry.
    pub fn hook_exponents(&self) -> Vec<f32> {
        let mut others: Vec<f32> = self
            .params
            .values()
            .map(|h| h.range.hook_exponent())
            .filter(|e| *e != 1.0 && e.is_finite() && *e > 0.0)
            .collect();
        others.sort_by(f32::total_cmp);
        others.dedup();
        let mut exponents = Vec::with_capacity(others.len() + 1);
        exponents.push(1.0);
        exponents.extend(others);
        exponents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyvox_core::ParamScale;

    fn small_layout() -> ParameterLayout {
        let mut layout = ParameterLayout::new();
        layout.push("A", ParamRange::linear(-1.0, 1.0), 0.0);
        layout.push("B", ParamRange::new(0.0, 30.0, ParamScale::Power(2.0)), 1.0);
        layout.push("C", ParamRange::new(20.0, 20000.0, ParamScale::Power(3.0)), 20000.0);
        layout.push("D", ParamRange::new(0.0, 1.0, ParamScale::Power(2.0)), 5.0);
        layout
    }

    #[test]
    fn test_atomic_param_bits() {
        let p = AtomicParam::new(0.25);
        assert_eq!(p.get(), 0.25);
        p.set(-3.5);
        assert_eq!(p.get(), -3.5);
    }

    #[test]
    fn test_defaults_are_clamped() {
        let store = ParameterStore::from_layout(&small_layout()).unwrap();
        assert_eq!(store.raw("D").unwrap(), 1.0);
    }

    #[test]
    fn test_set_clamps_and_unknown_errors() {
        let store = ParameterStore::from_layout(&small_layout()).unwrap();
        store.set("A", 4.0).unwrap();
        assert_eq!(store.raw("A").unwrap(), 1.0);
        assert!(matches!(store.set("Z", 0.0), Err(EngineError::UnknownParameter(_))));
    }

    #[test]
    fn test_set_normalized_follows_curve() {
        let store = ParameterStore::from_layout(&small_layout()).unwrap();
        store.set_normalized("B", 0.5).unwrap();
        let b = store.raw("B").unwrap();
        assert!((b - 7.5).abs() < 1e-4, "B = {b}");
    }

    #[test]
    fn test_reset_to_defaults() {
        let store = ParameterStore::from_layout(&small_layout()).unwrap();
        store.set("A", 0.7).unwrap();
        store.reset_to_defaults();
        assert_eq!(store.raw("A").unwrap(), 0.0);
    }

    #[test]
    fn test_hook_exponents_sorted_unique() {
        let store = ParameterStore::from_layout(&small_layout()).unwrap();
        assert_eq!(store.hook_exponents(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut layout = small_layout();
        layout.push("A", ParamRange::linear(0.0, 1.0), 0.0);
        assert!(ParameterStore::from_layout(&layout).is_err());
    }

    #[test]
    fn test_names_keep_layout_order() {
        let store = ParameterStore::from_layout(&small_layout()).unwrap();
        let names: Vec<&str> = store.names().collect();
        assert_eq!(names, ["A", "B", "C", "D"]);
    }

    #[test]
    fn test_for_config_declares_every_module() {
        let layout = ParameterLayout::for_config(&EngineConfig::default());
        let store = ParameterStore::from_layout(&layout).unwrap();
        for name in [
            "Osc1",
            "Osc1 Pitch",
            "Osc3 ShapeSet",
            "LFO4 Rate",
            "Noise FilterSend",
            "Filter2 Type",
            "Envelope1 Attack",
            "Envelope1 Velocity",
            "Effect2 FXType",
            "Output Amp",
            "Master",
            "Output Tone",
            "M8",
        ] {
            assert!(store.contains(name), "missing {name}");
        }
        assert!(!store.contains("Osc4 Pitch"));
    }
}
