//! Per-voice insert effect (`Effect1..`).
//!
//! Effects run inside the engine's per-voice oversampler. Parameters are
//! smoothed once per base-rate sample by [`Effect::smooth`]; each
//! oversampled sub-sample then goes through [`Effect::process`].

use std::sync::Arc;

use libm::tanhf;
use polyvox_core::{
    Compressor, Crusher, DcBlocker, HermiteDelay, ParamRange, VzFilter, VzMode, abs_saturate,
    cubic_soft_clip, db_to_linear, fast_db_to_linear, fast_mtof, fast_sin_turns, foldback, shaper,
    wet_dry_mix,
};

use crate::component::{AudioComponent, MAX_VOICES, Module, raw_param};
use crate::error::EngineError;
use crate::mapping::ModulationRegistry;
use crate::params::{AtomicParam, ParameterLayout, ParameterStore};

/// Oversampling factor effects run at.
pub const OVERSAMPLE: usize = 2;

/// Smoothed per-voice parameters, in grid order.
pub const PARAMS: [&str; 7] = ["Param1", "Param2", "Param3", "Param4", "Param5", "Mix", "PostGain"];

const MIX: usize = 5;
const POST_GAIN: usize = 6;

const CHORUS_CAPACITY: usize = 10_000;

/// Declare the parameters of effect `name`.
pub fn declare_params(layout: &mut ParameterLayout, name: &str) {
    for param in &PARAMS[..5] {
        layout.push(format!("{name} {param}"), ParamRange::linear(0.0, 1.0), 0.5);
    }
    layout.push(format!("{name} Mix"), ParamRange::linear(0.0, 1.0), 1.0);
    layout.push(format!("{name} PostGain"), ParamRange::linear(0.0, 2.0), 1.0);
    layout.push(format!("{name} FXType"), ParamRange::linear(0.0, 9.0), 0.0);
}

/// Algorithm selected by `FXType`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FxType {
    /// Bypass.
    #[default]
    None,
    /// Cubic soft clipper with bias.
    Softclip,
    /// Double tanh saturation.
    Tanh,
    /// Asymmetric absolute-value saturator.
    AbSaturator,
    /// Polynomial waveshaper.
    Shaper,
    /// Feed-forward compressor.
    Compressor,
    /// Two-tap modulated delay.
    Chorus,
    /// Bit and rate reduction.
    Bitcrush,
    /// Shelving tilt plus a bell.
    TiltFilter,
    /// Foldback wavefolder.
    Wavefolder,
}

impl FxType {
    /// Resolve a raw selector value. Unknown values fall back to
    /// [`FxType::None`].
    pub fn from_raw(raw: f32) -> Self {
        match raw as i32 {
            1 => Self::Softclip,
            2 => Self::Tanh,
            3 => Self::AbSaturator,
            4 => Self::Shaper,
            5 => Self::Compressor,
            6 => Self::Chorus,
            7 => Self::Bitcrush,
            8 => Self::TiltFilter,
            9 => Self::Wavefolder,
            _ => Self::None,
        }
    }
}

/// Per-voice processing state and resolved settings.
#[derive(Debug, Clone)]
struct FxVoice {
    params: [f32; 5],
    mix: f32,
    post_gain: f32,
    /// `db(Param1 · 24)`
    drive: f32,
    /// `db(Param1 · 12)`
    fold_drive: f32,

    dc1: DcBlocker,
    dc2: DcBlocker,
    low_shelf: VzFilter,
    high_shelf: VzFilter,
    bell: VzFilter,
    compressor: Compressor,
    crusher: Crusher,
    delay1: HermiteDelay,
    delay2: HermiteDelay,
    mod_phase: [f32; 2],
    mod_inc: [f32; 2],
    inv_rate: f32,
}

impl FxVoice {
    fn new(rate: f32) -> Self {
        let mut low_shelf = VzFilter::new(rate, VzMode::Lowshelf);
        low_shelf.set_frequency_q_gain(80.0, 0.707, 1.0);
        let mut high_shelf = VzFilter::new(rate, VzMode::Highshelf);
        high_shelf.set_frequency_q_gain(12000.0, 0.707, 1.0);
        Self {
            params: [0.5; 5],
            mix: 1.0,
            post_gain: 1.0,
            drive: 1.0,
            fold_drive: 1.0,
            dc1: DcBlocker::new(rate),
            dc2: DcBlocker::new(rate),
            low_shelf,
            high_shelf,
            bell: VzFilter::new(rate, VzMode::Bell),
            compressor: Compressor::new(rate),
            crusher: Crusher::new(),
            delay1: HermiteDelay::new(CHORUS_CAPACITY),
            delay2: HermiteDelay::new(CHORUS_CAPACITY),
            mod_phase: [0.0; 2],
            mod_inc: [0.2 / rate, 0.222_222_22 / rate],
            inv_rate: 1.0 / rate,
        }
    }

    fn set_sample_rate(&mut self, rate: f32) {
        self.dc1.set_sample_rate(rate);
        self.dc2.set_sample_rate(rate);
        self.low_shelf.set_sample_rate(rate);
        self.high_shelf.set_sample_rate(rate);
        self.bell.set_sample_rate(rate);
        self.compressor.set_sample_rate(rate);
        self.inv_rate = 1.0 / rate;
    }

    /// Push the settings the selected algorithm caches in its coefficients.
    fn configure(&mut self, fx: FxType) {
        let [p1, p2, p3, p4, p5] = self.params;
        match fx {
            FxType::Compressor => self.compressor.set_params(
                p1 * -24.0,
                p2 * 11.0 + 1.0,
                3.0,
                p3 * 15.0,
                p4 * 1000.0 + 1.0,
                p5 * 1000.0 + 1.0,
            ),
            FxType::Bitcrush => {
                self.crusher.set_quality(p2);
                self.crusher.set_sampling_ratio(p3 / OVERSAMPLE as f32 + 0.01);
                self.crusher.set_round(p4);
                self.crusher.set_operation(p5);
            }
            FxType::TiltFilter => {
                let tilt_db = p1 * 30.0 - 15.0;
                self.low_shelf.set_gain(fast_db_to_linear(-tilt_db));
                self.high_shelf.set_gain(fast_db_to_linear(tilt_db));
                self.bell.set_frequency_bandwidth_gain(
                    fast_mtof(p2 * 77.0 + 42.0),
                    (p3 + 1.0) * 6.0,
                    fast_db_to_linear(p4 * 34.0 - 17.0),
                );
            }
            FxType::Chorus => {
                self.mod_inc = [(p3 * 0.4 + 0.01) * self.inv_rate, (p4 * 0.444_444_4 + 0.01) * self.inv_rate];
            }
            _ => {}
        }
    }
}

type FxTick = fn(&mut FxVoice, f32) -> f32;

fn tick_none(_: &mut FxVoice, x: f32) -> f32 {
    x
}

fn tick_softclip(f: &mut FxVoice, x: f32) -> f32 {
    let y = cubic_soft_clip(x * f.drive + f.params[1]);
    f.dc1.process(y)
}

fn tick_tanh(f: &mut FxVoice, x: f32) -> f32 {
    let y = tanhf(x * f.drive + f.params[1] * f.drive);
    tanhf(f.dc1.process(y))
}

fn tick_ab_saturator(f: &mut FxVoice, x: f32) -> f32 {
    let y = abs_saturate(x * f.drive, f.params[1], f.drive);
    let y = f.dc2.process(f.dc1.process(y));
    tanhf(y)
}

fn tick_shaper(f: &mut FxVoice, x: f32) -> f32 {
    let y = shaper(x * f.drive + f.params[1] * f.drive, f.params[2]);
    f.dc1.process(y)
}

fn tick_compressor(f: &mut FxVoice, x: f32) -> f32 {
    f.compressor.process(x)
}

fn tick_chorus(f: &mut FxVoice, x: f32) -> f32 {
    let base = f.params[0] * 7000.0 + 10.0;
    let depth = f.params[1] * 0.1;
    let m1 = fast_sin_turns(f.mod_phase[0]);
    let m2 = fast_sin_turns(f.mod_phase[1]);
    for (phase, inc) in f.mod_phase.iter_mut().zip(f.mod_inc) {
        *phase += inc;
        if *phase >= 1.0 {
            *phase -= 1.0;
        }
    }
    f.delay1.set_delay(base * 0.707 * (1.0 + depth * m1));
    f.delay2.set_delay(base * 0.5 * (1.0 - depth * m2));
    (f.delay1.tick(x) - x) + (f.delay2.tick(x) - x)
}

fn tick_bitcrush(f: &mut FxVoice, x: f32) -> f32 {
    f.crusher.tick(x * f.drive)
}

fn tick_tilt(f: &mut FxVoice, x: f32) -> f32 {
    let y = f.low_shelf.process(x);
    let y = f.high_shelf.process(y);
    f.bell.process(y)
}

fn tick_wavefolder(f: &mut FxVoice, x: f32) -> f32 {
    let y = foldback(x * f.fold_drive + f.params[1] * f.fold_drive, 1.0);
    f.dc1.process(y)
}

/// Per-sub-sample processor for each [`FxType`], indexed by discriminant.
const FX_TICKS: [FxTick; 10] = [
    tick_none,
    tick_softclip,
    tick_tanh,
    tick_ab_saturator,
    tick_shaper,
    tick_compressor,
    tick_chorus,
    tick_bitcrush,
    tick_tilt,
    tick_wavefolder,
];

/// Per-voice insert effect.
#[derive(Debug)]
pub struct Effect {
    component: AudioComponent,
    voices: Vec<FxVoice>,
    fx_type_raw: Arc<AtomicParam>,
    fx_type: FxType,
    tick_fn: FxTick,
    reconfigure: bool,
}

impl Effect {
    /// Build effect `name`.
    pub fn new(
        name: &str,
        store: &ParameterStore,
        registry: &mut ModulationRegistry,
    ) -> Result<Self, EngineError> {
        let component = AudioComponent::new(name, &PARAMS, false, store, registry)?;
        let rate = 48000.0 * OVERSAMPLE as f32;
        Ok(Self {
            component,
            voices: (0..MAX_VOICES).map(|_| FxVoice::new(rate)).collect(),
            fx_type_raw: raw_param(store, name, "FXType")?,
            fx_type: FxType::None,
            tick_fn: FX_TICKS[FxType::None as usize],
            reconfigure: true,
        })
    }

    /// Algorithm selected by the last `frame()`.
    pub fn fx_type(&self) -> FxType {
        self.fx_type
    }

    /// True unless bypassed.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.fx_type != FxType::None
    }

    /// Advance parameters one base-rate sample and resolve settings.
    pub fn smooth(&mut self, num_voices: usize) {
        if !self.is_active() {
            return;
        }
        let n = num_voices.min(MAX_VOICES);
        self.component.smooth(n);
        let reconfigure = std::mem::take(&mut self.reconfigure);
        for v in 0..n {
            let c = &self.component;
            let voice = &mut self.voices[v];
            voice.mix = c.read(MIX, v).clamp(0.0, 1.0);
            voice.post_gain = c.read(POST_GAIN, v).max(0.0);
            let moved = (0..5).any(|p| c.moved(p, v));
            if moved || reconfigure {
                for (p, slot) in voice.params.iter_mut().enumerate() {
                    *slot = c.read(p, v);
                }
                voice.drive = db_to_linear(voice.params[0] * 24.0);
                voice.fold_drive = db_to_linear(voice.params[0] * 12.0);
                voice.configure(self.fx_type);
            }
        }
    }

    /// Process one oversampled sub-sample of `voice`.
    #[inline]
    pub fn process(&mut self, voice: usize, x: f32) -> f32 {
        if !self.is_active() {
            return x;
        }
        let state = &mut self.voices[voice];
        let wet = (self.tick_fn)(state, x);
        wet_dry_mix(x, wet * state.post_gain, state.mix)
    }
}

impl Module for Effect {
    fn component(&self) -> &AudioComponent {
        &self.component
    }

    fn component_mut(&mut self) -> &mut AudioComponent {
        &mut self.component
    }

    fn prepare_to_play(&mut self, sample_rate: f32, block_size: usize) {
        self.component.prepare_to_play(sample_rate, block_size);
        let rate = sample_rate * OVERSAMPLE as f32;
        for voice in &mut self.voices {
            voice.set_sample_rate(rate);
        }
        self.reconfigure = true;
    }

    fn frame(&mut self) {
        let fx_type = FxType::from_raw(self.fx_type_raw.get());
        if fx_type != self.fx_type {
            tracing::debug!(effect = %self.component.name(), ?fx_type, "effect type changed");
            self.fx_type = fx_type;
            self.tick_fn = FX_TICKS[fx_type as usize];
            self.reconfigure = true;
        }
    }
}
