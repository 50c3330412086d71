//! Low frequency oscillator module (`LFO1..`).
//!
//! Pure modulation source: it produces no audio and only runs while at least
//! one mapping reads it.

use std::sync::Arc;

use polyvox_core::{Lfo, LfoShape, ParamRange, ParamScale};

use crate::component::{AudioComponent, MAX_VOICES, Module, raw_param};
use crate::error::EngineError;
use crate::mapping::{ModulationRegistry, SourceOutput, SourceSpec};
use crate::params::{AtomicParam, ParameterLayout, ParameterStore};
use crate::voice::VoiceAllocator;

/// Smoothed per-voice parameters, in grid order.
pub const PARAMS: [&str; 3] = ["Rate", "Shape", "Phase"];

const RATE: usize = 0;
const SHAPE: usize = 1;
const PHASE: usize = 2;

/// Declare the parameters of LFO `name`.
pub fn declare_params(layout: &mut ParameterLayout, name: &str) {
    layout.push(format!("{name} Rate"), ParamRange::new(0.0, 30.0, ParamScale::Power(2.0)), 1.0);
    layout.push(format!("{name} Shape"), ParamRange::linear(0.0, 1.0), 0.0);
    layout.push(format!("{name} Phase"), ParamRange::linear(0.0, 1.0), 0.0);
    layout.push(format!("{name} ShapeSet"), ParamRange::linear(0.0, 5.0), 0.0);
    layout.push(format!("{name} Sync"), ParamRange::linear(0.0, 1.0), 0.0);
}

/// Per-voice modulation LFO.
#[derive(Debug)]
pub struct LowFreqOscillator {
    component: AudioComponent,
    source: SourceOutput,
    voices: Vec<Lfo>,
    shape_set: Arc<AtomicParam>,
    sync: Arc<AtomicParam>,
    waveform: LfoShape,
    enabled: bool,
}

impl LowFreqOscillator {
    /// Build LFO `name` and register it as a source.
    pub fn new(
        name: &str,
        store: &ParameterStore,
        registry: &mut ModulationRegistry,
    ) -> Result<Self, EngineError> {
        let component = AudioComponent::new(name, &PARAMS, false, store, registry)?;
        let source = registry.register_source(SourceSpec {
            name: name.to_string(),
            per_voice: true,
            bipolar: true,
            audio_rate: false,
            colour: 0x7fff00,
        })?;
        let rate = store.raw(&format!("{name} Rate"))?;
        Ok(Self {
            component,
            source,
            voices: (0..MAX_VOICES).map(|_| Lfo::new(48000.0, rate)).collect(),
            shape_set: raw_param(store, name, "ShapeSet")?,
            sync: raw_param(store, name, "Sync")?,
            waveform: LfoShape::default(),
            enabled: false,
        })
    }

    /// Waveform selected by the last `frame()`.
    pub fn waveform(&self) -> LfoShape {
        self.waveform
    }

    /// True if the last `frame()` found a mapping reading this LFO.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Restart `voice` at its `Phase` when `Sync` is on.
    pub fn note_on(&mut self, voice: usize) {
        if self.sync.get() <= 0.5 || voice >= MAX_VOICES {
            return;
        }
        let phase = self.component.param(PHASE, voice).raw();
        self.voices[voice].set_phase(phase);
    }

    /// Advance every active voice and publish the result.
    pub fn tick<V: VoiceAllocator>(&mut self, voices: &V) {
        if !self.enabled {
            return;
        }
        let n = voices.num_active().min(MAX_VOICES);
        self.component.smooth(n);
        for v in 0..n {
            let lfo = &mut self.voices[v];
            if self.component.moved(RATE, v) {
                lfo.set_frequency(self.component.read(RATE, v).max(0.0));
            }
            if self.component.moved(SHAPE, v) {
                lfo.set_shape(self.component.read(SHAPE, v).clamp(0.0, 1.0));
            }
            self.source.write(v, lfo.tick());
        }
    }
}

impl Module for LowFreqOscillator {
    fn component(&self) -> &AudioComponent {
        &self.component
    }

    fn component_mut(&mut self) -> &mut AudioComponent {
        &mut self.component
    }

    fn source(&self) -> Option<&SourceOutput> {
        Some(&self.source)
    }

    fn prepare_to_play(&mut self, sample_rate: f32, block_size: usize) {
        self.component.prepare_to_play(sample_rate, block_size);
        for lfo in &mut self.voices {
            lfo.set_sample_rate(sample_rate);
        }
    }

    fn frame(&mut self) {
        self.enabled = self.source.is_used();
        let waveform = LfoShape::from_index(self.shape_set.get() as i32);
        if waveform != self.waveform {
            self.waveform = waveform;
            for lfo in &mut self.voices {
                lfo.set_waveform(waveform);
            }
        }
    }
}
