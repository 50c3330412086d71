//! Coloured noise module.
//!
//! White noise through a tilt pair of shelves and a movable bell. Like the
//! oscillators it feeds both filter paths and doubles as an audio-rate
//! source.

use std::sync::Arc;

use polyvox_core::{ParamRange, VzFilter, VzMode, WhiteNoise, fast_db_to_linear, fast_mtof};

use crate::component::{AudioComponent, MAX_VOICES, Module};
use crate::error::EngineError;
use crate::hook::HookTable;
use crate::mapping::{ModulationRegistry, SourceOutput, SourceSpec};
use crate::params::{ParameterLayout, ParameterStore};
use crate::smoothed::SmoothedParameter;
use crate::voice::VoiceAllocator;

/// Component and source name.
pub const NAME: &str = "Noise";

/// Smoothed per-voice parameters, in grid order.
pub const PARAMS: [&str; 4] = ["Tilt", "Gain", "Freq", "Amp"];

const TILT: usize = 0;
const GAIN: usize = 1;
const FREQ: usize = 2;
const AMP: usize = 3;

const LOW_SHELF_HZ: f32 = 80.0;
const HIGH_SHELF_HZ: f32 = 12000.0;
const BELL_Q: f32 = 1.9;

/// Declare the noise parameters.
pub fn declare_params(layout: &mut ParameterLayout, name: &str) {
    layout.push(name, ParamRange::linear(0.0, 1.0), 0.0);
    layout.push(format!("{name} Tilt"), ParamRange::linear(0.0, 1.0), 0.5);
    layout.push(format!("{name} Gain"), ParamRange::linear(0.0, 1.0), 0.5);
    layout.push(format!("{name} Freq"), ParamRange::linear(0.0, 1.0), 0.5);
    layout.push(format!("{name} Amp"), ParamRange::linear(0.0, 1.0), 1.0);
    layout.push(format!("{name} FilterSend"), ParamRange::linear(0.0, 1.0), 0.5);
}

/// Shelf gain in dB for a 0..1 tilt: ±15 dB, high shelf rising with tilt.
#[inline]
fn tilt_db(tilt: f32) -> f32 {
    tilt * 30.0 - 15.0
}

#[derive(Debug, Clone)]
struct NoiseVoice {
    noise: WhiteNoise,
    low_shelf: VzFilter,
    high_shelf: VzFilter,
    bell: VzFilter,
}

impl NoiseVoice {
    fn new(sample_rate: f32, seed: u32) -> Self {
        let mut low_shelf = VzFilter::new(sample_rate, VzMode::Lowshelf);
        low_shelf.set_frequency_q_gain(LOW_SHELF_HZ, 0.707, 1.0);
        let mut high_shelf = VzFilter::new(sample_rate, VzMode::Highshelf);
        high_shelf.set_frequency_q_gain(HIGH_SHELF_HZ, 0.707, 1.0);
        let mut bell = VzFilter::new(sample_rate, VzMode::Bell);
        bell.set_frequency_q_gain(1000.0, BELL_Q, 1.0);
        Self { noise: WhiteNoise::new(seed), low_shelf, high_shelf, bell }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.low_shelf.set_sample_rate(sample_rate);
        self.high_shelf.set_sample_rate(sample_rate);
        self.bell.set_sample_rate(sample_rate);
    }
}

/// Per-voice filtered white noise.
#[derive(Debug)]
pub struct NoiseGenerator {
    component: AudioComponent,
    source: SourceOutput,
    voices: Vec<NoiseVoice>,
    filter_send: SmoothedParameter,
    active: bool,
}

impl NoiseGenerator {
    /// Build the noise module and register it as a source.
    pub fn new(
        name: &str,
        store: &ParameterStore,
        registry: &mut ModulationRegistry,
    ) -> Result<Self, EngineError> {
        let component = AudioComponent::new(name, &PARAMS, true, store, registry)?;
        let source = registry.register_source(SourceSpec {
            name: name.to_string(),
            per_voice: true,
            bipolar: true,
            audio_rate: true,
            colour: 0xff8c00,
        })?;
        let filter_send = SmoothedParameter::new(
            store.get(&format!("{name} FilterSend"))?,
            Arc::new(HookTable::new()),
            registry.bank().clone(),
        );
        Ok(Self {
            component,
            source,
            voices: (0..MAX_VOICES)
                .map(|v| NoiseVoice::new(48000.0, 0x2545_f491 ^ (v as u32 + 1).wrapping_mul(0x9e37_79b9)))
                .collect(),
            filter_send,
            active: false,
        })
    }

    /// True if the last `frame()` decided the noise runs.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Generate one sample per active voice into the two filter paths.
    pub fn tick<V: VoiceAllocator>(&mut self, voices: &V, paths: &mut [[f32; MAX_VOICES]; 2]) {
        if !self.active {
            return;
        }
        let n = voices.num_active().min(MAX_VOICES);
        self.component.smooth(n);
        let send = self.filter_send.tick_no_hooks();
        let audible = self.component.is_enabled();

        for v in 0..n {
            let c = &self.component;
            let voice = &mut self.voices[v];
            if c.moved(TILT, v) {
                let db = tilt_db(c.read(TILT, v));
                voice.low_shelf.set_gain(fast_db_to_linear(-db));
                voice.high_shelf.set_gain(fast_db_to_linear(db));
            }
            if c.moved(FREQ, v) || c.moved(GAIN, v) {
                let freq = fast_mtof(c.read(FREQ, v) * 77.0 + 42.0);
                let gain = fast_db_to_linear(c.read(GAIN, v) * 34.0 - 17.0);
                voice.bell.set_frequency_q_gain(freq, BELL_Q, gain);
            }
            let amp = c.read(AMP, v).max(0.0);

            let mut sample = voice.noise.tick();
            sample = voice.low_shelf.process(sample);
            sample = voice.high_shelf.process(sample);
            sample = voice.bell.process(sample) * amp;

            self.source.write(v, sample);
            if audible {
                paths[0][v] += sample * send;
                paths[1][v] += sample * (1.0 - send);
            }
        }
    }
}

impl Module for NoiseGenerator {
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
        let ramp = self.component.ramp_seconds();
        self.filter_send.prepare_to_play(sample_rate, ramp);
        for voice in &mut self.voices {
            voice.set_sample_rate(sample_rate);
        }
    }

    fn frame(&mut self) {
        let toggled = self.component.update_enabled();
        self.active = toggled || self.source.is_used();
    }
}
