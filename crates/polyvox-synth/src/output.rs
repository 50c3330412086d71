//! Stereo output stage.
//!
//! Per-voice `Amp` and `Pan` place each voice in the stereo field, then the
//! global `Master` gain and `Output Tone` low-pass shape the mix. The two
//! globals are ordinary mappable parameters with a single hook table, so a
//! global source such as a macro can drive them.

use std::sync::Arc;

use polyvox_core::{OnePole, ParamRange, ParamScale};

use crate::component::{AudioComponent, MAX_VOICES, Module};
use crate::error::EngineError;
use crate::hook::{HookTable, NUM_HOOKS};
use crate::mapping::{MappingTargetModel, ModulationRegistry};
use crate::params::{ParameterLayout, ParameterStore};
use crate::smoothed::SmoothedParameter;
use crate::voice::VoiceAllocator;

/// Component name.
pub const NAME: &str = "Output";

/// Smoothed per-voice parameters, in grid order.
pub const PARAMS: [&str; 2] = ["Amp", "Pan"];

/// Global gain parameter.
pub const MASTER: &str = "Master";

/// Global tone parameter.
pub const TONE: &str = "Output Tone";

const AMP: usize = 0;
const PAN: usize = 1;

/// Declare the output parameters.
pub fn declare_params(layout: &mut ParameterLayout) {
    layout.push("Output Amp", ParamRange::linear(0.0, 2.0), 1.0);
    layout.push("Output Pan", ParamRange::linear(-1.0, 1.0), 0.0);
    layout.push(MASTER, ParamRange::linear(0.0, 2.0), 1.0);
    layout.push(TONE, ParamRange::new(20.0, 20000.0, ParamScale::Power(3.0)), 20000.0);
}

/// Balanced pan law: unity at centre, the far side fades out.
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}

fn global_param(
    name: &str,
    store: &ParameterStore,
    registry: &mut ModulationRegistry,
) -> Result<SmoothedParameter, EngineError> {
    let handle = store.get(name)?;
    let hooks = Arc::new(HookTable::new());
    for slot in 0..NUM_HOOKS {
        registry.register_target(MappingTargetModel::new(
            NAME,
            name,
            slot,
            vec![Arc::clone(&hooks)],
            handle,
        ))?;
    }
    Ok(SmoothedParameter::new(handle, hooks, registry.bank().clone()))
}

/// Voice mixdown to stereo.
#[derive(Debug)]
pub struct Output {
    component: AudioComponent,
    master: SmoothedParameter,
    tone: SmoothedParameter,
    tone_filters: [OnePole; 2],
}

impl Output {
    /// Build the output stage and register its targets.
    pub fn new(store: &ParameterStore, registry: &mut ModulationRegistry) -> Result<Self, EngineError> {
        let component = AudioComponent::new(NAME, &PARAMS, false, store, registry)?;
        let master = global_param(MASTER, store, registry)?;
        let tone = global_param(TONE, store, registry)?;
        let cutoff = tone.value();
        Ok(Self {
            component,
            master,
            tone,
            tone_filters: [OnePole::new(48000.0, cutoff), OnePole::new(48000.0, cutoff)],
        })
    }

    /// Current master gain.
    pub fn master(&self) -> f32 {
        self.master.value()
    }

    /// Current tone cutoff in Hz.
    pub fn tone(&self) -> f32 {
        self.tone_filters[0].cutoff()
    }

    /// Mix one sample per sounding voice down to a stereo pair.
    pub fn tick<V: VoiceAllocator>(&mut self, voices: &V, samples: &[f32; MAX_VOICES]) -> (f32, f32) {
        let n = voices.num_active().min(MAX_VOICES);
        self.component.smooth(n);

        let (mut left, mut right) = (0.0, 0.0);
        for (v, &sample) in samples.iter().enumerate().take(n) {
            if !voices.is_sounding(v) {
                continue;
            }
            let amp = self.component.read(AMP, v).max(0.0);
            let (gl, gr) = pan_gains(self.component.read(PAN, v));
            left += sample * amp * gl;
            right += sample * amp * gr;
        }

        if self.master.needs_tick() {
            self.master.tick();
        }
        if self.tone.needs_tick() {
            let cutoff = self.tone.tick();
            for filter in &mut self.tone_filters {
                filter.set_cutoff(cutoff);
            }
        }
        let master = self.master.value().max(0.0);
        (
            self.tone_filters[0].process(left) * master,
            self.tone_filters[1].process(right) * master,
        )
    }
}

impl Module for Output {
    fn component(&self) -> &AudioComponent {
        &self.component
    }

    fn component_mut(&mut self) -> &mut AudioComponent {
        &mut self.component
    }

    fn prepare_to_play(&mut self, sample_rate: f32, block_size: usize) {
        self.component.prepare_to_play(sample_rate, block_size);
        let ramp = self.component.ramp_seconds();
        self.master.prepare_to_play(sample_rate, ramp);
        self.tone.prepare_to_play(sample_rate, ramp);
        for filter in &mut self.tone_filters {
            filter.set_sample_rate(sample_rate);
            filter.set_cutoff(self.tone.value());
            filter.reset();
        }
    }

    fn frame(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoicePool;

    fn setup() -> (ParameterStore, ModulationRegistry, Output) {
        let mut layout = ParameterLayout::new();
        declare_params(&mut layout);
        let store = ParameterStore::from_layout(&layout).unwrap();
        let mut registry = ModulationRegistry::new(512, store.hook_exponents());
        let mut output = Output::new(&store, &mut registry).unwrap();
        output.prepare_to_play(48000.0, 64);
        (store, registry, output)
    }

    fn settle(output: &mut Output, pool: &VoicePool, samples: &[f32; MAX_VOICES]) -> (f32, f32) {
        let mut out = (0.0, 0.0);
        for _ in 0..4800 {
            out = output.tick(pool, samples);
        }
        out
    }

    #[test]
    fn test_pan_law() {
        assert_eq!(pan_gains(0.0), (1.0, 1.0));
        assert_eq!(pan_gains(-1.0), (1.0, 0.0));
        assert_eq!(pan_gains(1.0), (0.0, 1.0));
        assert_eq!(pan_gains(0.5), (0.5, 1.0));
    }

    #[test]
    fn test_registers_global_targets() {
        let (_store, registry, _output) = setup();
        assert!(registry.target("Master T1").is_some());
        assert!(registry.target("Output Tone T3").is_some());
        assert!(registry.target("Output Pan T2").is_some());
    }

    #[test]
    fn test_idle_voices_are_silent() {
        let (_store, _registry, mut output) = setup();
        let pool = VoicePool::new(4);
        let (l, r) = settle(&mut output, &pool, &[1.0; MAX_VOICES]);
        assert_eq!((l, r), (0.0, 0.0));
    }

    #[test]
    fn test_centre_is_unity() {
        let (_store, _registry, mut output) = setup();
        let mut pool = VoicePool::new(4);
        pool.note_on(60.0, 1.0);
        let (l, r) = settle(&mut output, &pool, &[0.5; MAX_VOICES]);
        assert!((l - 0.5).abs() < 1e-3, "left = {l}");
        assert!((r - 0.5).abs() < 1e-3, "right = {r}");
    }

    #[test]
    fn test_pan_and_master() {
        let (store, _registry, mut output) = setup();
        store.set("Output Pan", 1.0).unwrap();
        store.set(MASTER, 0.5).unwrap();
        let mut pool = VoicePool::new(4);
        pool.note_on(60.0, 1.0);
        let (l, r) = settle(&mut output, &pool, &[1.0; MAX_VOICES]);
        assert!(l.abs() < 1e-3, "left = {l}");
        assert!((r - 0.5).abs() < 1e-3, "right = {r}");
        assert!((output.master() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_tone_follows_parameter() {
        let (store, _registry, mut output) = setup();
        store.set(TONE, 500.0).unwrap();
        let pool = VoicePool::new(1);
        settle(&mut output, &pool, &[0.0; MAX_VOICES]);
        assert!((output.tone() - 500.0).abs() < 0.5, "tone = {}", output.tone());
    }
}
