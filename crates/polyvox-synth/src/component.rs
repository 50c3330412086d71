//! Parameter bookkeeping shared by every DSP module.
//!
//! An [`AudioComponent`] owns the `[param][voice]` grid of
//! [`SmoothedParameter`]s for one module and registers three mapping
//! targets per parameter. It does no DSP itself. Concrete modules hold one
//! and implement [`Module`].

use std::sync::Arc;

use crate::error::EngineError;
use crate::hook::{HookTable, NUM_HOOKS};
use crate::mapping::{MappingTargetModel, ModulationRegistry, SourceOutput};
use crate::params::{AtomicParam, ParameterStore};
use crate::smoothed::SmoothedParameter;

/// Voice slots allocated for every per-voice structure.
pub const MAX_VOICES: usize = 12;

/// Default smoothing ramp.
pub const DEFAULT_RAMP_SECONDS: f32 = 0.006;

/// `"<component> <suffix>"` raw value from the store.
pub fn raw_param(
    store: &ParameterStore,
    component: &str,
    suffix: &str,
) -> Result<Arc<AtomicParam>, EngineError> {
    Ok(Arc::clone(&store.get(&format!("{component} {suffix}"))?.raw))
}

/// Parameter grid and mapping targets of one module.
#[derive(Debug, Clone)]
pub struct AudioComponent {
    name: String,
    param_names: Vec<String>,
    params: Vec<Vec<SmoothedParameter>>,
    values: Vec<[f32; MAX_VOICES]>,
    moved: Vec<[bool; MAX_VOICES]>,
    stale: Vec<[bool; MAX_VOICES]>,
    toggle: Option<Arc<AtomicParam>>,
    enabled: bool,
    ramp_seconds: f32,
    sample_rate: f32,
    inv_block_size: f32,
}

impl AudioComponent {
    /// Build the grid for `param_names` and register 3 targets per
    /// parameter.
    ///
    /// Each parameter `"<name> <param>"` must exist in `store`. A toggleable
    /// component reads its on/off switch from the parameter `name`.
    pub fn new(
        name: &str,
        param_names: &[&str],
        toggleable: bool,
        store: &ParameterStore,
        registry: &mut ModulationRegistry,
    ) -> Result<Self, EngineError> {
        let mut params = Vec::with_capacity(param_names.len());
        let mut values = Vec::with_capacity(param_names.len());
        for param in param_names {
            let full = format!("{name} {param}");
            let handle = store.get(&full)?;
            let hooks: Vec<Arc<HookTable>> =
                (0..MAX_VOICES).map(|_| Arc::new(HookTable::new())).collect();
            let voices: Vec<SmoothedParameter> = hooks
                .iter()
                .map(|h| SmoothedParameter::new(handle, Arc::clone(h), registry.bank().clone()))
                .collect();
            for slot in 0..NUM_HOOKS {
                registry.register_target(MappingTargetModel::new(
                    name,
                    &full,
                    slot,
                    hooks.clone(),
                    handle,
                ))?;
            }
            values.push([handle.get(); MAX_VOICES]);
            params.push(voices);
        }

        let toggle = if toggleable { Some(Arc::clone(&store.get(name)?.raw)) } else { None };
        tracing::debug!(component = %name, params = param_names.len(), toggleable, "component registered");

        Ok(Self {
            name: name.to_string(),
            param_names: param_names.iter().map(ToString::to_string).collect(),
            moved: vec![[true; MAX_VOICES]; param_names.len()],
            stale: vec![[true; MAX_VOICES]; param_names.len()],
            params,
            values,
            toggle,
            enabled: true,
            ramp_seconds: DEFAULT_RAMP_SECONDS,
            sample_rate: 48000.0,
            inv_block_size: 1.0,
        })
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short parameter names in grid order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Number of parameters.
    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    /// Smoothing ramp used by the next `prepare_to_play`.
    pub fn set_ramp_seconds(&mut self, seconds: f32) {
        self.ramp_seconds = seconds.max(0.0);
    }

    /// Smoothing ramp in seconds.
    pub fn ramp_seconds(&self) -> f32 {
        self.ramp_seconds
    }

    /// Re-derive every smoother for a new sample rate and block size.
    pub fn prepare_to_play(&mut self, sample_rate: f32, block_size: usize) {
        self.sample_rate = sample_rate;
        self.inv_block_size = 1.0 / block_size.max(1) as f32;
        for (i, voices) in self.params.iter_mut().enumerate() {
            for (v, param) in voices.iter_mut().enumerate() {
                param.prepare_to_play(sample_rate, self.ramp_seconds);
                self.values[i][v] = param.value();
                self.moved[i][v] = true;
                self.stale[i][v] = true;
            }
        }
    }

    /// Sample rate from the last `prepare_to_play`.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// `1 / block_size`.
    pub fn inv_block_size(&self) -> f32 {
        self.inv_block_size
    }

    /// Tick every scheduled parameter for voices below `num_voices`.
    ///
    /// The first call after `prepare_to_play` reports every cell as moved so
    /// modules load their coefficients once.
    #[inline]
    pub fn smooth(&mut self, num_voices: usize) {
        let num_voices = num_voices.min(MAX_VOICES);
        for (i, voices) in self.params.iter_mut().enumerate() {
            for (v, param) in voices.iter_mut().take(num_voices).enumerate() {
                let stale = std::mem::take(&mut self.stale[i][v]);
                if param.needs_tick() {
                    let value = param.tick();
                    self.moved[i][v] = stale || value != self.values[i][v];
                    self.values[i][v] = value;
                } else {
                    self.moved[i][v] = stale;
                }
            }
        }
    }

    /// Current value of `param` for `voice`.
    #[inline]
    pub fn read(&self, param: usize, voice: usize) -> f32 {
        self.values[param][voice]
    }

    /// True if `param` changed on the last [`smooth`](Self::smooth).
    #[inline]
    pub fn moved(&self, param: usize, voice: usize) -> bool {
        self.moved[param][voice]
    }

    /// Direct access to one grid cell.
    pub fn param(&self, param: usize, voice: usize) -> &SmoothedParameter {
        &self.params[param][voice]
    }

    /// Name of a target slot.
    pub fn target_name(&self, param: usize, slot: usize) -> String {
        format!("{} {} T{}", self.name, self.param_names[param], slot + 1)
    }

    /// Refresh the toggle. Components without one are always enabled.
    pub fn update_enabled(&mut self) -> bool {
        self.enabled = self.toggle.as_ref().is_none_or(|t| t.get() > 0.5);
        self.enabled
    }

    /// Toggle state from the last [`update_enabled`](Self::update_enabled).
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True if the component has an on/off switch.
    pub fn is_toggleable(&self) -> bool {
        self.toggle.is_some()
    }
}

/// Capability interface of every DSP module.
///
/// `tick` signatures differ per module (their buffer contracts differ) and
/// are not part of the trait.
pub trait Module: Send {
    /// Parameter grid.
    fn component(&self) -> &AudioComponent;

    /// Mutable parameter grid.
    fn component_mut(&mut self) -> &mut AudioComponent;

    /// Modulation output, for modules that act as a source.
    fn source(&self) -> Option<&SourceOutput> {
        None
    }

    /// Re-derive sample-rate dependent state.
    fn prepare_to_play(&mut self, sample_rate: f32, block_size: usize);

    /// Block-rate setup: read selectors and choose the tick variant.
    fn frame(&mut self);

    /// Module name.
    fn name(&self) -> &str {
        self.component().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterLayout;
    use polyvox_core::ParamRange;

    fn setup() -> (ParameterStore, ModulationRegistry) {
        let mut layout = ParameterLayout::new();
        layout.push("Thing", ParamRange::linear(0.0, 1.0), 0.0);
        layout.push("Thing Gain", ParamRange::linear(0.0, 2.0), 1.0);
        layout.push("Thing Tone", ParamRange::linear(0.0, 10.0), 5.0);
        let store = ParameterStore::from_layout(&layout).unwrap();
        let registry = ModulationRegistry::new(512, store.hook_exponents());
        (store, registry)
    }

    #[test]
    fn test_registers_three_targets_per_param() {
        let (store, mut registry) = setup();
        let c = AudioComponent::new("Thing", &["Gain", "Tone"], true, &store, &mut registry).unwrap();
        assert_eq!(registry.targets().count(), 6);
        assert!(registry.target("Thing Tone T3").is_some());
        assert_eq!(c.target_name(1, 2), "Thing Tone T3");
    }

    #[test]
    fn test_unknown_parameter() {
        let (store, mut registry) = setup();
        let err = AudioComponent::new("Thing", &["Color"], false, &store, &mut registry).unwrap_err();
        assert!(matches!(err, EngineError::UnknownParameter(ref n) if n == "Thing Color"), "{err}");
    }

    #[test]
    fn test_toggle() {
        let (store, mut registry) = setup();
        let mut c = AudioComponent::new("Thing", &["Gain"], true, &store, &mut registry).unwrap();
        assert!(!c.update_enabled());
        store.set("Thing", 1.0).unwrap();
        assert!(c.update_enabled());
    }

    #[test]
    fn test_smooth_tracks_raw_and_moved() {
        let (store, mut registry) = setup();
        let mut c = AudioComponent::new("Thing", &["Gain"], false, &store, &mut registry).unwrap();
        c.prepare_to_play(1000.0, 64);
        assert_eq!(c.inv_block_size(), 1.0 / 64.0);
        c.smooth(2);
        assert!(c.moved(0, 0), "first smooth after prepare reports every cell");
        c.smooth(2);
        assert!(!c.moved(0, 0));
        store.set("Thing Gain", 2.0).unwrap();
        c.smooth(2);
        assert!(c.moved(0, 1));
        for _ in 0..10 {
            c.smooth(2);
        }
        assert_eq!(c.read(0, 1), 2.0);
        assert_eq!(c.read(0, 5), 1.0, "voices past the active count are not ticked");
    }
}
