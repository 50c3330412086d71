//! ADSR envelope module (`Envelope1..`).
//!
//! Envelopes are unipolar per-voice sources. `Envelope1` doubles as the
//! amplitude envelope: it always runs, scales every voice's output and
//! frees the voice when its release finishes. The others only run while a
//! mapping reads them.

use std::sync::Arc;

use polyvox_core::{ExpTable, ParamRange, ms_to_samples};

use crate::component::{AudioComponent, MAX_VOICES, Module, raw_param};
use crate::error::EngineError;
use crate::mapping::{ModulationRegistry, SourceOutput, SourceSpec};
use crate::params::{AtomicParam, ParameterLayout, ParameterStore, SkewSpec};
use crate::voice::VoiceAllocator;

/// Smoothed per-voice parameters, in grid order.
pub const PARAMS: [&str; 5] = ["Attack", "Decay", "Sustain", "Release", "Leak"];

/// Name of the envelope that gates voice amplitude.
pub const AMP_ENVELOPE: &str = "Envelope1";

const ATTACK: usize = 0;
const DECAY: usize = 1;
const SUSTAIN: usize = 2;
const RELEASE: usize = 3;
const LEAK: usize = 4;

/// Fade-out before a retriggered voice restarts its attack.
const RETRIGGER_RAMP_MS: f32 = 8.0;

const TIME_SKEW: SkewSpec = SkewSpec { start: 0.0, end: 20000.0, center: 1000.0 };

/// Declare the parameters of envelope `name`.
pub fn declare_params(layout: &mut ParameterLayout, name: &str) {
    let time = ParamRange::linear(0.0, 20000.0);
    layout.push_skewed(format!("{name} Attack"), time, 5.0, TIME_SKEW);
    layout.push_skewed(format!("{name} Decay"), time, 100.0, TIME_SKEW);
    layout.push(format!("{name} Sustain"), ParamRange::linear(0.0, 1.0), 1.0);
    layout.push_skewed(format!("{name} Release"), time, 200.0, TIME_SKEW);
    layout.push(format!("{name} Leak"), ParamRange::linear(0.0, 1.0), 0.0);
    layout.push(format!("{name} Velocity"), ParamRange::linear(0.0, 1.0), 1.0);
}

/// Falling segment shape shared by every envelope: `0.001^x − 0.0008`.
pub fn decay_table() -> ExpTable {
    ExpTable::new(0.001, 0.0, 1.0, -0.0008)
}

/// Per-sample leak factor for a 0..1 `Leak` amount.
#[inline]
pub fn leak_factor(leak: f32) -> f32 {
    0.99995 + 0.00005 * (1.0 - leak.max(0.0))
}

/// ADSR envelope stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Inactive, output is zero.
    #[default]
    Idle,
    /// Fading out before a retriggered attack.
    Ramp,
    /// Linear rise to the peak.
    Attack,
    /// Exponential fall toward sustain.
    Decay,
    /// Holding at sustain (subject to leak).
    Sustain,
    /// Exponential fall to zero.
    Release,
}

/// One voice's ADSR state.
///
/// # Example
///
/// ```rust
/// use polyvox_synth::envelope::{AdsrEnvelope, EnvelopeState, decay_table};
///
/// let table = decay_table();
/// let mut env = AdsrEnvelope::new(1000.0);
/// env.set_attack_ms(8.0);
/// env.set_sustain(0.5);
/// env.gate_on(1.0);
/// for _ in 0..8 {
///     env.advance(&table);
/// }
/// assert_eq!(env.state(), EnvelopeState::Decay);
/// ```
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    state: EnvelopeState,
    value: f32,
    phase: f32,
    sample_rate: f32,

    attack_inc: f32,
    decay_inc: f32,
    release_inc: f32,
    ramp_inc: f32,
    sustain: f32,
    leak: f32,

    peak: f32,
    leak_gain: f32,
    segment_start: f32,
}

impl Default for AdsrEnvelope {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

/// Phase increment for a segment of `ms` milliseconds (at least one sample).
#[inline]
fn increment(ms: f32, sample_rate: f32) -> f32 {
    1.0 / ms_to_samples(ms.max(0.0), sample_rate).max(1.0)
}

impl AdsrEnvelope {
    /// Idle envelope with 5 ms attack, 100 ms decay, full sustain and
    /// 200 ms release.
    pub fn new(sample_rate: f32) -> Self {
        let mut env = Self {
            state: EnvelopeState::Idle,
            value: 0.0,
            phase: 0.0,
            sample_rate,
            attack_inc: 0.0,
            decay_inc: 0.0,
            release_inc: 0.0,
            ramp_inc: 0.0,
            sustain: 1.0,
            leak: 1.0,
            peak: 1.0,
            leak_gain: 1.0,
            segment_start: 0.0,
        };
        env.set_attack_ms(5.0);
        env.set_decay_ms(100.0);
        env.set_release_ms(200.0);
        env.ramp_inc = increment(RETRIGGER_RAMP_MS, sample_rate);
        env
    }

    /// Change sample rate. Segment times are kept.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let ratio = self.sample_rate / sample_rate.max(1.0);
        self.sample_rate = sample_rate.max(1.0);
        self.attack_inc = (self.attack_inc * ratio).min(1.0);
        self.decay_inc = (self.decay_inc * ratio).min(1.0);
        self.release_inc = (self.release_inc * ratio).min(1.0);
        self.ramp_inc = increment(RETRIGGER_RAMP_MS, self.sample_rate);
    }

    /// Attack time; negative values count as 0.
    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_inc = increment(ms, self.sample_rate);
    }

    /// Decay time; negative values count as 0.
    pub fn set_decay_ms(&mut self, ms: f32) {
        self.decay_inc = increment(ms, self.sample_rate);
    }

    /// Release time; negative values count as 0.
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_inc = increment(ms, self.sample_rate);
    }

    /// Sustain level, clamped ≥ 0.
    pub fn set_sustain(&mut self, level: f32) {
        self.sustain = level.max(0.0);
    }

    /// Per-sample multiplier applied during decay and sustain.
    pub fn set_leak_factor(&mut self, factor: f32) {
        self.leak = factor;
    }

    /// Start the envelope with `velocity` as its peak.
    ///
    /// A sounding envelope first fades to zero over 8 ms.
    pub fn gate_on(&mut self, velocity: f32) {
        self.peak = velocity;
        self.leak_gain = 1.0;
        if self.state == EnvelopeState::Idle || self.value <= 0.0 {
            self.value = 0.0;
            self.phase = 0.0;
            self.state = EnvelopeState::Attack;
        } else {
            self.segment_start = self.value;
            self.phase = 0.0;
            self.state = EnvelopeState::Ramp;
        }
    }

    /// Move to the release stage.
    pub fn gate_off(&mut self) {
        if self.state != EnvelopeState::Idle {
            self.segment_start = self.value;
            self.phase = 0.0;
            self.state = EnvelopeState::Release;
        }
    }

    /// Force idle.
    pub fn reset(&mut self) {
        self.state = EnvelopeState::Idle;
        self.value = 0.0;
        self.phase = 0.0;
    }

    /// Current stage.
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Last output.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// True unless idle.
    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }

    /// Advance one sample and return the new level.
    #[inline]
    pub fn advance(&mut self, falling: &ExpTable) -> f32 {
        let last = falling.last_index();
        match self.state {
            EnvelopeState::Idle => {
                self.value = 0.0;
            }
            EnvelopeState::Ramp => {
                self.phase += self.ramp_inc;
                if self.phase >= 1.0 {
                    self.phase = 0.0;
                    self.value = 0.0;
                    self.state = EnvelopeState::Attack;
                } else {
                    self.value = self.segment_start * (1.0 - self.phase);
                }
            }
            EnvelopeState::Attack => {
                self.phase += self.attack_inc;
                if self.phase >= 1.0 {
                    self.phase = 0.0;
                    self.value = self.peak;
                    self.state = EnvelopeState::Decay;
                } else {
                    self.value = self.peak * self.phase;
                }
            }
            EnvelopeState::Decay => {
                self.leak_gain *= self.leak;
                self.phase += self.decay_inc;
                if self.phase >= 1.0 {
                    self.phase = 0.0;
                    self.value = self.sustain * self.leak_gain;
                    self.state = EnvelopeState::Sustain;
                } else {
                    let shape = falling.sample(self.phase * last);
                    self.value = (self.sustain + (self.peak - self.sustain) * shape) * self.leak_gain;
                }
            }
            EnvelopeState::Sustain => {
                self.leak_gain *= self.leak;
                self.value = self.sustain * self.leak_gain;
            }
            EnvelopeState::Release => {
                self.phase += self.release_inc;
                if self.phase >= 1.0 {
                    self.reset();
                } else {
                    self.value = self.segment_start * falling.sample(self.phase * last);
                }
            }
        }
        self.value
    }
}

/// Per-voice envelope source.
#[derive(Debug)]
pub struct Envelope {
    component: AudioComponent,
    source: SourceOutput,
    voices: Vec<AdsrEnvelope>,
    falling: Arc<ExpTable>,
    velocity: Arc<AtomicParam>,
    is_amp: bool,
    enabled: bool,
}

impl Envelope {
    /// Build envelope `name` and register it as a source. `falling` is the
    /// decay/release shape, usually shared by every envelope.
    pub fn new(
        name: &str,
        falling: Arc<ExpTable>,
        store: &ParameterStore,
        registry: &mut ModulationRegistry,
    ) -> Result<Self, EngineError> {
        let component = AudioComponent::new(name, &PARAMS, false, store, registry)?;
        let source = registry.register_source(SourceSpec {
            name: name.to_string(),
            per_voice: true,
            bipolar: false,
            audio_rate: false,
            colour: 0x00bfff,
        })?;
        Ok(Self {
            component,
            source,
            voices: (0..MAX_VOICES).map(|_| AdsrEnvelope::new(48000.0)).collect(),
            falling,
            velocity: raw_param(store, name, "Velocity")?,
            is_amp: name == AMP_ENVELOPE,
            enabled: false,
        })
    }

    /// True for the amplitude envelope.
    pub fn is_amp(&self) -> bool {
        self.is_amp
    }

    /// True if the last `frame()` decided this envelope runs.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current level of `voice`.
    #[inline]
    pub fn level(&self, voice: usize) -> f32 {
        self.voices.get(voice).map_or(0.0, AdsrEnvelope::value)
    }

    /// Stage of `voice`.
    pub fn state(&self, voice: usize) -> EnvelopeState {
        self.voices.get(voice).map_or(EnvelopeState::Idle, AdsrEnvelope::state)
    }

    /// Trigger `voice`. With `Velocity` off the peak is 1.
    pub fn note_on(&mut self, voice: usize, velocity: f32) {
        let velocity = if self.velocity.get() == 0.0 { 1.0 } else { velocity };
        if let Some(env) = self.voices.get_mut(voice) {
            env.gate_on(velocity);
        }
    }

    /// Release `voice`.
    pub fn note_off(&mut self, voice: usize) {
        if let Some(env) = self.voices.get_mut(voice) {
            env.gate_off();
        }
    }

    /// Drop every voice to idle at zero without a release.
    pub fn reset(&mut self) {
        for env in &mut self.voices {
            env.reset();
        }
    }

    /// Drop `voice` to idle at zero without a release.
    pub fn reset_voice(&mut self, voice: usize) {
        if let Some(env) = self.voices.get_mut(voice) {
            env.reset();
        }
    }

    /// Advance every active voice.
    ///
    /// The amplitude envelope deactivates released voices whose envelope
    /// has gone idle.
    pub fn tick<V: VoiceAllocator>(&mut self, voices: &mut V) {
        if !self.enabled {
            return;
        }
        let n = voices.num_active().min(MAX_VOICES);
        self.component.smooth(n);
        for v in 0..n {
            let c = &self.component;
            let env = &mut self.voices[v];
            if c.moved(ATTACK, v) {
                env.set_attack_ms(c.read(ATTACK, v));
            }
            if c.moved(DECAY, v) {
                env.set_decay_ms(c.read(DECAY, v));
            }
            if c.moved(SUSTAIN, v) {
                env.set_sustain(c.read(SUSTAIN, v));
            }
            if c.moved(RELEASE, v) {
                env.set_release_ms(c.read(RELEASE, v));
            }
            if c.moved(LEAK, v) {
                env.set_leak_factor(leak_factor(c.read(LEAK, v)));
            }

            let value = env.advance(&self.falling);
            self.source.write(v, value);

            if self.is_amp && !env.is_active() && voices.is_sounding(v) && voices.is_released(v) {
                voices.deactivate(v);
            }
        }
    }
}

impl Module for Envelope {
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
        for env in &mut self.voices {
            env.set_sample_rate(sample_rate);
        }
    }

    fn frame(&mut self) {
        self.enabled = self.is_amp || self.source.is_used();
    }
}
