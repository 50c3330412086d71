//! Block sequencer.
//!
//! [`Engine`] owns every module and the per-voice buffers they hand to each
//! other. One block runs `frame()` on every module, then per sample:
//!
//! 1. envelopes (the amplitude envelope frees finished voices)
//! 2. LFOs
//! 3. oscillators and noise into the two filter paths
//! 4. `Filter1` on path 0, `Filter2` on path 1, summed and scaled by the
//!    amplitude envelope
//! 5. the oversampled effect chain, when any effect is not bypassed
//! 6. stereo mixdown
//!
//! # Example
//!
//! ```rust
//! use polyvox_synth::{Engine, EngineConfig};
//!
//! let (mut engine, _registry) = Engine::with_registry(EngineConfig::default()).unwrap();
//! engine.prepare_to_play(48000.0, 64);
//! engine.note_on(69.0, 1.0);
//!
//! let mut left = [0.0; 64];
//! let mut right = [0.0; 64];
//! engine.process_block(&mut left, &mut right);
//! assert!(left.iter().all(|s| s.is_finite()));
//! ```

use std::sync::Arc;

use polyvox_core::{Oversampler, WaveTableSet};

use crate::component::{MAX_VOICES, Module};
use crate::config::EngineConfig;
use crate::effect::{Effect, OVERSAMPLE};
use crate::envelope::{self, Envelope};
use crate::error::{EngineError, MappingError};
use crate::filter::Filter;
use crate::hook::SourceBank;
use crate::lfo::LowFreqOscillator;
use crate::macros::Macros;
use crate::mapping::ModulationRegistry;
use crate::noise::{self, NoiseGenerator};
use crate::oscillator::Oscillator;
use crate::output::Output;
use crate::params::{ParameterLayout, ParameterStore};
use crate::tuning::Tuning;
use crate::voice::{VoiceAllocator, VoicePool};

/// Source bank cells needed by `config` when every source publishes
/// `variants` skew variants.
pub fn bank_capacity(config: &EngineConfig, variants: usize) -> usize {
    let per_voice = config.oscillators + config.lfos + config.envelopes + 1;
    SourceBank::RESERVED + (per_voice * MAX_VOICES + config.macros) * variants.max(1)
}

/// The polyphonic voice engine.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    store: ParameterStore,
    voices: VoicePool,
    tuning: Tuning,

    envelopes: Vec<Envelope>,
    lfos: Vec<LowFreqOscillator>,
    oscillators: Vec<Oscillator>,
    noise: NoiseGenerator,
    filters: [Filter; 2],
    effects: Vec<Effect>,
    output: Output,
    macros: Macros,

    oversamplers: [Oversampler<OVERSAMPLE>; MAX_VOICES],
    paths: [[f32; MAX_VOICES]; 2],
    mix: [f32; MAX_VOICES],
    effects_active: bool,
    sample_rate: f32,
    block_size: usize,
}

impl Engine {
    /// Build every module of `config` against an existing store and
    /// registry.
    pub fn new(
        config: EngineConfig,
        store: &ParameterStore,
        registry: &mut ModulationRegistry,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let falling = Arc::new(envelope::decay_table());

        let envelopes = (1..=config.envelopes)
            .map(|i| Envelope::new(&format!("Envelope{i}"), Arc::clone(&falling), store, registry))
            .collect::<Result<Vec<_>, _>>()?;
        let lfos = (1..=config.lfos)
            .map(|i| LowFreqOscillator::new(&format!("LFO{i}"), store, registry))
            .collect::<Result<Vec<_>, _>>()?;
        let oscillators = (1..=config.oscillators)
            .map(|i| Oscillator::new(&format!("Osc{i}"), store, registry))
            .collect::<Result<Vec<_>, _>>()?;
        let noise = NoiseGenerator::new(noise::NAME, store, registry)?;
        let filters = [
            Filter::new("Filter1", store, registry)?,
            Filter::new("Filter2", store, registry)?,
        ];
        let effects = (1..=config.effects)
            .map(|i| Effect::new(&format!("Effect{i}"), store, registry))
            .collect::<Result<Vec<_>, _>>()?;
        let output = Output::new(store, registry)?;
        let macros = Macros::new(config.macros, store, registry)?;

        let mut engine = Self {
            voices: VoicePool::new(config.voices),
            tuning: Tuning::from_config(&config.tuning),
            store: store.clone(),
            envelopes,
            lfos,
            oscillators,
            noise,
            filters,
            effects,
            output,
            macros,
            oversamplers: std::array::from_fn(|_| Oversampler::new()),
            paths: [[0.0; MAX_VOICES]; 2],
            mix: [0.0; MAX_VOICES],
            effects_active: false,
            sample_rate: config.sample_rate,
            block_size: config.block_size,
            config,
        };
        let ramp = engine.config.smoothing_ms * 0.001;
        for module in engine.modules_mut() {
            module.component_mut().set_ramp_seconds(ramp);
        }
        engine.prepare_to_play(engine.sample_rate, engine.block_size);

        tracing::info!(
            voices = engine.config.voices,
            oscillators = engine.oscillators.len(),
            lfos = engine.lfos.len(),
            envelopes = engine.envelopes.len(),
            effects = engine.effects.len(),
            "engine created"
        );
        Ok(engine)
    }

    /// Build the store, the registry and the engine for `config`.
    pub fn with_registry(config: EngineConfig) -> Result<(Self, ModulationRegistry), EngineError> {
        config.validate()?;
        let layout = ParameterLayout::for_config(&config);
        let store = ParameterStore::from_layout(&layout)?;
        let exponents = store.hook_exponents();
        let capacity = bank_capacity(&config, exponents.len());
        let mut registry = ModulationRegistry::new(capacity, exponents);
        let engine = Self::new(config, &store, &mut registry)?;
        Ok((engine, registry))
    }

    fn modules_mut(&mut self) -> impl Iterator<Item = &mut dyn Module> + '_ {
        fn dynamic<M: Module>(m: &mut M) -> &mut dyn Module {
            m
        }
        self.envelopes
            .iter_mut()
            .map(dynamic)
            .chain(self.lfos.iter_mut().map(dynamic))
            .chain(self.oscillators.iter_mut().map(dynamic))
            .chain(std::iter::once(dynamic(&mut self.noise)))
            .chain(self.filters.iter_mut().map(dynamic))
            .chain(self.effects.iter_mut().map(dynamic))
            .chain(std::iter::once(dynamic(&mut self.output)))
    }

    fn modules(&self) -> impl Iterator<Item = &dyn Module> + '_ {
        fn dynamic<M: Module>(m: &M) -> &dyn Module {
            m
        }
        self.envelopes
            .iter()
            .map(dynamic)
            .chain(self.lfos.iter().map(dynamic))
            .chain(self.oscillators.iter().map(dynamic))
            .chain(std::iter::once(dynamic(&self.noise)))
            .chain(self.filters.iter().map(dynamic))
            .chain(self.effects.iter().map(dynamic))
            .chain(std::iter::once(dynamic(&self.output)))
    }

    /// Configuration the engine was built from.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parameter store the modules read.
    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    /// Voice state.
    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    /// Current sample rate.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Oscillator `index` (0-based).
    pub fn oscillator(&self, index: usize) -> Option<&Oscillator> {
        self.oscillators.get(index)
    }

    /// LFO `index` (0-based).
    pub fn lfo(&self, index: usize) -> Option<&LowFreqOscillator> {
        self.lfos.get(index)
    }

    /// Envelope `index` (0-based). Index 0 is the amplitude envelope.
    pub fn envelope(&self, index: usize) -> Option<&Envelope> {
        self.envelopes.get(index)
    }

    /// `Filter1` (index 0) or `Filter2` (index 1).
    pub fn filter(&self, index: usize) -> Option<&Filter> {
        self.filters.get(index)
    }

    /// Effect `index` (0-based).
    pub fn effect(&self, index: usize) -> Option<&Effect> {
        self.effects.get(index)
    }

    /// Noise module.
    pub fn noise(&self) -> &NoiseGenerator {
        &self.noise
    }

    /// Replace the tuning table.
    pub fn set_tuning(&mut self, tuning: Tuning) {
        self.tuning = tuning;
    }

    /// Install the tables read by the `User` oscillator shape.
    pub fn set_wave_tables(&mut self, tables: Arc<WaveTableSet>) {
        for osc in &mut self.oscillators {
            osc.set_wave_tables(Arc::clone(&tables));
        }
    }

    /// Re-derive every sample-rate dependent value.
    pub fn prepare_to_play(&mut self, sample_rate: f32, block_size: usize) {
        let sample_rate = sample_rate.max(1.0);
        let block_size = block_size.max(1);
        self.sample_rate = sample_rate;
        self.block_size = block_size;
        for module in self.modules_mut() {
            module.prepare_to_play(sample_rate, block_size);
        }
        for os in &mut self.oversamplers {
            os.reset();
        }
        tracing::info!(sample_rate, block_size, "prepare to play");
    }

    /// Change the active voice count. Voices dropped by a shrink go
    /// silent at once and their envelopes return to idle.
    pub fn set_num_voices(&mut self, num_voices: usize) {
        self.voices.set_num_voices(num_voices);
        let active = self.voices.num_active();
        for env in &mut self.envelopes {
            for voice in active..MAX_VOICES {
                env.reset_voice(voice);
            }
        }
        tracing::debug!(voices = active, "voice count changed");
    }

    /// Start a note. Returns the voice it plays on.
    pub fn note_on(&mut self, note: f32, velocity: f32) -> usize {
        let voice = self.voices.note_on(note, velocity);
        let velocity = self.voices.velocity(voice);
        for env in &mut self.envelopes {
            env.note_on(voice, velocity);
        }
        for lfo in &mut self.lfos {
            lfo.note_on(voice);
        }
        voice
    }

    /// Release the oldest voice holding `note`.
    pub fn note_off(&mut self, note: f32) -> Option<usize> {
        let voice = self.voices.note_off(note)?;
        for env in &mut self.envelopes {
            env.note_off(voice);
        }
        Some(voice)
    }

    /// Silence every voice at once, skipping the release stage.
    pub fn all_notes_off(&mut self) {
        self.voices.all_notes_off();
        for env in &mut self.envelopes {
            env.reset();
        }
    }

    /// Render one block. The shorter of the two buffers sets the length.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for module in self.modules_mut() {
            module.frame();
        }
        self.macros.frame();
        self.effects_active = self.effects.iter().any(Effect::is_active);

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (a, b) = self.render_sample();
            *l = a;
            *r = b;
        }
    }

    fn render_sample(&mut self) -> (f32, f32) {
        for env in &mut self.envelopes {
            env.tick(&mut self.voices);
        }
        for lfo in &mut self.lfos {
            lfo.tick(&self.voices);
        }

        self.paths = [[0.0; MAX_VOICES]; 2];
        let count = self.oscillators.len();
        for i in 0..count {
            let sync_in = *self.oscillators[(i + count - 1) % count].sync_out();
            self.oscillators[i].tick(&self.voices, &self.tuning, &sync_in, &mut self.paths);
        }
        self.noise.tick(&self.voices, &mut self.paths);

        let [path0, path1] = &mut self.paths;
        self.filters[0].tick(&self.voices, path0);
        self.filters[1].tick(&self.voices, path1);

        let n = self.voices.num_active().min(MAX_VOICES);
        let amp = &self.envelopes[0];
        for v in 0..n {
            self.mix[v] = (self.paths[0][v] + self.paths[1][v]) * amp.level(v);
        }

        if self.effects_active {
            for effect in &mut self.effects {
                effect.smooth(n);
            }
            for v in 0..n {
                if !self.voices.is_sounding(v) {
                    continue;
                }
                let mut sub = self.oversamplers[v].upsample(self.mix[v]);
                for s in &mut sub {
                    for effect in &mut self.effects {
                        *s = effect.process(v, *s);
                    }
                }
                self.mix[v] = self.oversamplers[v].downsample(&sub);
            }
        }

        self.output.tick(&self.voices, &self.mix)
    }

    /// Deregister every source and target this engine registered.
    pub fn detach(&self, registry: &mut ModulationRegistry) -> Result<(), MappingError> {
        for module in self.modules() {
            if module.source().is_some() {
                registry.deregister_source(module.name())?;
            }
            registry.deregister_component(module.name())?;
        }
        for name in self.macros.names() {
            registry.deregister_source(name)?;
        }
        tracing::debug!("engine detached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> (Engine, ModulationRegistry) {
        let (mut engine, registry) = Engine::with_registry(EngineConfig::default()).unwrap();
        engine.prepare_to_play(48000.0, 64);
        (engine, registry)
    }

    fn render(engine: &mut Engine, blocks: usize) -> f32 {
        let mut left = [0.0; 64];
        let mut right = [0.0; 64];
        let mut peak = 0.0_f32;
        for _ in 0..blocks {
            engine.process_block(&mut left, &mut right);
            for s in left.iter().chain(right.iter()) {
                assert!(s.is_finite());
                peak = peak.max(s.abs());
            }
        }
        peak
    }

    #[test]
    fn test_engine_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Engine>();
    }

    #[test]
    fn test_bank_capacity_fits_registration() {
        let config = EngineConfig::default();
        let layout = ParameterLayout::for_config(&config);
        let store = ParameterStore::from_layout(&layout).unwrap();
        let exponents = store.hook_exponents();
        let capacity = bank_capacity(&config, exponents.len());
        let mut registry = ModulationRegistry::new(capacity, exponents);
        assert!(Engine::new(config, &store, &mut registry).is_ok());
    }

    #[test]
    fn test_silent_without_notes() {
        let (mut engine, _registry) = engine();
        assert_eq!(render(&mut engine, 20), 0.0);
    }

    #[test]
    fn test_note_sounds_and_releases() {
        let (mut engine, _registry) = engine();
        engine.store().set("Envelope1 Release", 10.0).unwrap();
        let voice = engine.note_on(60.0, 1.0);
        let peak = render(&mut engine, 20);
        assert!(peak > 0.1, "peak = {peak}");

        engine.note_off(60.0);
        render(&mut engine, 200);
        assert!(!engine.voices().is_sounding(voice), "voice freed after release");
        assert_eq!(render(&mut engine, 4), 0.0);
    }

    #[test]
    fn test_effect_chain_runs() {
        let (mut engine, _registry) = engine();
        engine.store().set("Effect1 FXType", 2.0).unwrap();
        engine.note_on(48.0, 1.0);
        let peak = render(&mut engine, 40);
        assert!(engine.effect(0).unwrap().is_active());
        assert!(peak > 0.05 && peak < 2.0, "peak = {peak}");
    }

    #[test]
    fn test_detach_clears_registry() {
        let (engine, mut registry) = engine();
        assert!(registry.targets().count() > 0);
        engine.detach(&mut registry).unwrap();
        assert_eq!(registry.targets().count(), 0);
        assert_eq!(registry.sources().count(), 0);
    }

    #[test]
    fn test_set_num_voices_clamps() {
        let (mut engine, _registry) = engine();
        engine.set_num_voices(100);
        assert_eq!(engine.voices().num_active(), MAX_VOICES);
        engine.set_num_voices(0);
        assert_eq!(engine.voices().num_active(), 1);
    }

    #[test]
    fn test_all_notes_off_is_immediate() {
        let (mut engine, _registry) = engine();
        let voice = engine.note_on(60.0, 1.0);
        render(&mut engine, 10);
        engine.all_notes_off();
        assert!(!engine.voices().is_sounding(voice));
        assert_eq!(engine.envelope(0).unwrap().level(voice), 0.0);
        assert_eq!(render(&mut engine, 2), 0.0);
    }

    #[test]
    fn test_shrinking_voices_idles_dropped_envelopes() {
        let (mut engine, _registry) = engine();
        engine.store().set("Envelope1 Release", 2000.0).unwrap();
        engine.set_num_voices(2);
        let first = engine.note_on(60.0, 1.0);
        let second = engine.note_on(64.0, 1.0);
        assert_eq!((first, second), (0, 1));
        render(&mut engine, 10);
        engine.note_off(64.0);
        render(&mut engine, 2);
        assert_eq!(engine.envelope(0).unwrap().state(1), envelope::EnvelopeState::Release);

        engine.set_num_voices(1);
        for index in 0..EngineConfig::default().envelopes {
            let env = engine.envelope(index).unwrap();
            assert_eq!(env.state(1), envelope::EnvelopeState::Idle, "envelope {index}");
            assert_eq!(env.level(1), 0.0, "envelope {index}");
        }
        assert!(engine.envelope(0).unwrap().level(0) > 0.0, "kept voice still sounds");

        engine.set_num_voices(2);
        render(&mut engine, 2);
        assert!(!engine.voices().is_sounding(1));
        assert_eq!(engine.envelope(0).unwrap().state(1), envelope::EnvelopeState::Idle);
    }
}
