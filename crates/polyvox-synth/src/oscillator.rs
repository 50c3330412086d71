//! Audio-rate oscillator module (`Osc1..Osc3`).
//!
//! Each voice owns one instance of every generator. `frame()` resolves the
//! `ShapeSet` selector to an entry of [`OSC_TICKS`] once per block; `tick()`
//! calls it for every sounding voice. Switching shapes keeps the generators'
//! phase, so a switch costs at most one discontinuity.
//!
//! The oscillator is also a bipolar, audio-rate modulation source: hooks it
//! drives bypass parameter smoothing.

use std::sync::Arc;

use libm::roundf;
use polyvox_core::{
    ParamRange, PulseOsc, SawOsc, SawPulseOsc, SineOsc, SineTriOsc, SyncMode, TriangleOsc,
    WaveTableSet, WavetableOsc,
};

use crate::component::{AudioComponent, MAX_VOICES, Module, raw_param};
use crate::error::EngineError;
use crate::hook::HookTable;
use crate::mapping::{ModulationRegistry, SourceOutput, SourceSpec};
use crate::params::{AtomicParam, ParameterLayout, ParameterStore};
use crate::smoothed::SmoothedParameter;
use crate::tuning::Tuning;
use crate::voice::VoiceAllocator;

/// Smoothed per-voice parameters, in grid order.
pub const PARAMS: [&str; 6] = ["Pitch", "Harm", "Fine", "Freq", "Shape", "Amp"];

const PITCH: usize = 0;
const HARM: usize = 1;
const FINE: usize = 2;
const FREQ: usize = 3;
const SHAPE: usize = 4;
const AMP: usize = 5;

/// Declare the parameters of oscillator `name`.
pub fn declare_params(layout: &mut ParameterLayout, name: &str, enabled: bool) {
    layout.push(name, ParamRange::linear(0.0, 1.0), if enabled { 1.0 } else { 0.0 });
    layout.push(format!("{name} Pitch"), ParamRange::linear(-24.0, 24.0), 0.0);
    layout.push(format!("{name} Harm"), ParamRange::linear(-16.0, 16.0), 0.0);
    layout.push(format!("{name} Fine"), ParamRange::linear(-100.0, 100.0), 0.0);
    layout.push(format!("{name} Freq"), ParamRange::linear(-2000.0, 2000.0), 0.0);
    layout.push(format!("{name} Shape"), ParamRange::linear(0.0, 1.0), 0.0);
    layout.push(format!("{name} Amp"), ParamRange::linear(0.0, 2.0), 1.0);
    layout.push(format!("{name} ShapeSet"), ParamRange::linear(0.0, 6.0), 0.0);
    layout.push(format!("{name} isHarmonic"), ParamRange::linear(0.0, 1.0), 0.0);
    layout.push(format!("{name} isStepped"), ParamRange::linear(0.0, 1.0), 1.0);
    layout.push(format!("{name} isSync"), ParamRange::linear(0.0, 1.0), 0.0);
    layout.push(format!("{name} syncType"), ParamRange::linear(0.0, 1.0), 0.0);
    layout.push(format!("{name} FilterSend"), ParamRange::linear(0.0, 1.0), 0.5);
}

/// Waveform family selected by `ShapeSet`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OscShape {
    /// Saw morphing to square.
    #[default]
    SawPulse,
    /// Sine morphing to triangle.
    SineTri,
    /// Plain saw; shape unused.
    Saw,
    /// Pulse; shape is the width.
    Pulse,
    /// Plain sine; shape unused.
    Sine,
    /// Triangle; shape is the peak position.
    Triangle,
    /// User wavetable; shape morphs across tables.
    User,
}

impl OscShape {
    /// Resolve a raw selector value. Unknown values fall back to
    /// [`OscShape::SawPulse`].
    pub fn from_raw(raw: f32) -> Self {
        match raw as i32 {
            1 => Self::SineTri,
            2 => Self::Saw,
            3 => Self::Pulse,
            4 => Self::Sine,
            5 => Self::Triangle,
            6 => Self::User,
            _ => Self::SawPulse,
        }
    }
}

/// Generators for one voice.
#[derive(Debug, Clone)]
struct OscVoice {
    saw_pulse: SawPulseOsc,
    sine_tri: SineTriOsc,
    saw: SawOsc,
    pulse: PulseOsc,
    sine: SineOsc,
    tri: TriangleOsc,
    table: WavetableOsc,
}

impl OscVoice {
    fn new(sample_rate: f32) -> Self {
        Self {
            saw_pulse: SawPulseOsc::new(sample_rate),
            sine_tri: SineTriOsc::new(sample_rate),
            saw: SawOsc::new(sample_rate),
            pulse: PulseOsc::new(sample_rate),
            sine: SineOsc::new(sample_rate),
            tri: TriangleOsc::new(sample_rate),
            table: WavetableOsc::new(sample_rate),
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.saw_pulse.set_sample_rate(sample_rate);
        self.sine_tri.set_sample_rate(sample_rate);
        self.saw.set_sample_rate(sample_rate);
        self.pulse.set_sample_rate(sample_rate);
        self.sine.set_sample_rate(sample_rate);
        self.tri.set_sample_rate(sample_rate);
        self.table.set_sample_rate(sample_rate);
    }

    #[inline]
    fn sync(&mut self, shape: OscShape, master: f32, mode: SyncMode) {
        match shape {
            OscShape::SawPulse => self.saw_pulse.sync(master, mode),
            OscShape::SineTri => self.sine_tri.sync(master, mode),
            OscShape::Saw => self.saw.sync(master, mode),
            OscShape::Pulse => self.pulse.sync(master, mode),
            OscShape::Sine => self.sine.sync(master, mode),
            OscShape::Triangle => self.tri.sync(master, mode),
            OscShape::User => self.table.sync(master, mode),
        }
    }
}

type OscTick = fn(&mut OscVoice, f32, f32, &WaveTableSet) -> f32;

fn tick_saw_pulse(v: &mut OscVoice, freq: f32, shape: f32, _: &WaveTableSet) -> f32 {
    v.saw_pulse.tick(freq, shape)
}

fn tick_sine_tri(v: &mut OscVoice, freq: f32, shape: f32, _: &WaveTableSet) -> f32 {
    v.sine_tri.tick(freq, shape)
}

fn tick_saw(v: &mut OscVoice, freq: f32, _: f32, _: &WaveTableSet) -> f32 {
    v.saw.tick(freq)
}

fn tick_pulse(v: &mut OscVoice, freq: f32, shape: f32, _: &WaveTableSet) -> f32 {
    v.pulse.tick(freq, shape)
}

fn tick_sine(v: &mut OscVoice, freq: f32, _: f32, _: &WaveTableSet) -> f32 {
    v.sine.tick(freq)
}

fn tick_triangle(v: &mut OscVoice, freq: f32, shape: f32, _: &WaveTableSet) -> f32 {
    v.tri.tick(freq, shape)
}

fn tick_user(v: &mut OscVoice, freq: f32, shape: f32, tables: &WaveTableSet) -> f32 {
    v.table.tick(tables, freq, shape)
}

/// Per-sample generator for each [`OscShape`], indexed by discriminant.
const OSC_TICKS: [OscTick; 7] = [
    tick_saw_pulse,
    tick_sine_tri,
    tick_saw,
    tick_pulse,
    tick_sine,
    tick_triangle,
    tick_user,
];

/// Combine the note with the harmonic/pitch offset.
///
/// Returns `(note, remaining_offset)`. In harmonic mode the offset scales
/// the frequency (`×(h+1)` for h ≥ 0, `÷|h−1|` below) and is consumed.
#[inline]
pub fn resolve_note(note: f32, harm_pitch: f32, harmonic: bool, stepped: bool) -> (f32, f32) {
    let harm_pitch = if stepped { roundf(harm_pitch) } else { harm_pitch };
    if !harmonic {
        return (note, harm_pitch);
    }
    let base = Tuning::mtof(note);
    let freq = if harm_pitch >= 0.0 {
        base * (harm_pitch + 1.0)
    } else {
        base / (harm_pitch - 1.0).abs()
    };
    (Tuning::ftom(freq), 0.0)
}

/// Audio-rate oscillator with 6 smoothed parameters per voice.
#[derive(Debug)]
pub struct Oscillator {
    component: AudioComponent,
    source: SourceOutput,
    voices: Vec<OscVoice>,
    tables: Arc<WaveTableSet>,
    shape_set: Arc<AtomicParam>,
    is_harmonic: Arc<AtomicParam>,
    is_stepped: Arc<AtomicParam>,
    is_sync: Arc<AtomicParam>,
    sync_type: Arc<AtomicParam>,
    filter_send: SmoothedParameter,
    shape: OscShape,
    tick_fn: OscTick,
    harmonic: bool,
    stepped: bool,
    sync: Option<SyncMode>,
    active: bool,
    sync_out: [f32; MAX_VOICES],
}

impl Oscillator {
    /// Build oscillator `name` and register it as a source.
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
            voices: (0..MAX_VOICES).map(|_| OscVoice::new(48000.0)).collect(),
            tables: Arc::new(WaveTableSet::default()),
            shape_set: raw_param(store, name, "ShapeSet")?,
            is_harmonic: raw_param(store, name, "isHarmonic")?,
            is_stepped: raw_param(store, name, "isStepped")?,
            is_sync: raw_param(store, name, "isSync")?,
            sync_type: raw_param(store, name, "syncType")?,
            filter_send,
            shape: OscShape::default(),
            tick_fn: OSC_TICKS[OscShape::default() as usize],
            harmonic: false,
            stepped: true,
            sync: None,
            active: false,
            sync_out: [0.0; MAX_VOICES],
        })
    }

    /// Install the tables read by [`OscShape::User`].
    pub fn set_wave_tables(&mut self, tables: Arc<WaveTableSet>) {
        self.tables = tables;
    }

    /// Shape selected by the last `frame()`.
    pub fn shape(&self) -> OscShape {
        self.shape
    }

    /// True if the last `frame()` decided this oscillator runs.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Raw per-voice output of the last tick, used as a sync master.
    pub fn sync_out(&self) -> &[f32; MAX_VOICES] {
        &self.sync_out
    }

    /// Generate one sample for every sounding voice.
    ///
    /// `sync_in` is the sync master's output. The result is added to the two
    /// filter paths, split by `FilterSend`.
    pub fn tick<V: VoiceAllocator>(
        &mut self,
        voices: &V,
        tuning: &Tuning,
        sync_in: &[f32; MAX_VOICES],
        paths: &mut [[f32; MAX_VOICES]; 2],
    ) {
        if !self.active {
            return;
        }
        let n = voices.num_active().min(MAX_VOICES);
        self.component.smooth(n);
        let send = self.filter_send.tick_no_hooks();
        let audible = self.component.is_enabled();

        for v in 0..n {
            if !voices.is_sounding(v) {
                self.sync_out[v] = 0.0;
                continue;
            }
            let c = &self.component;
            let harm_pitch = c.read(HARM, v) + c.read(PITCH, v);
            let (note, offset) =
                resolve_note(voices.note(v), harm_pitch, self.harmonic, self.stepped);
            let note = (note + offset + c.read(FINE, v) * 0.01).clamp(0.0, 127.0);
            let freq = tuning.frequency_for_note(note) + c.read(FREQ, v);
            let shape = c.read(SHAPE, v).clamp(0.0, 1.0);
            let amp = c.read(AMP, v).max(0.0);

            let state = &mut self.voices[v];
            if let Some(mode) = self.sync {
                state.sync(self.shape, sync_in[v], mode);
            }
            let sample = (self.tick_fn)(state, freq, shape, &self.tables) * amp;

            self.source.write(v, sample);
            self.sync_out[v] = sample;
            if audible {
                paths[0][v] += sample * send;
                paths[1][v] += sample * (1.0 - send);
            }
        }
    }
}

impl Module for Oscillator {
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
        self.shape = OscShape::from_raw(self.shape_set.get());
        self.tick_fn = OSC_TICKS[self.shape as usize];
        self.harmonic = self.is_harmonic.get() > 0.5;
        self.stepped = self.is_stepped.get() > 0.5;
        self.sync = if self.is_sync.get() > 0.5 {
            Some(if self.sync_type.get() < 0.5 { SyncMode::Hard } else { SyncMode::Soft })
        } else {
            None
        };
        if !self.active {
            self.sync_out = [0.0; MAX_VOICES];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoicePool;

    fn setup() -> (ParameterStore, ModulationRegistry, Oscillator) {
        let mut layout = ParameterLayout::new();
        declare_params(&mut layout, "Osc1", true);
        let store = ParameterStore::from_layout(&layout).unwrap();
        let mut registry = ModulationRegistry::new(1024, store.hook_exponents());
        let mut osc = Oscillator::new("Osc1", &store, &mut registry).unwrap();
        osc.prepare_to_play(48000.0, 64);
        (store, registry, osc)
    }

    #[test]
    fn test_shape_from_raw_falls_back() {
        assert_eq!(OscShape::from_raw(4.0), OscShape::Sine);
        assert_eq!(OscShape::from_raw(6.9), OscShape::User);
        assert_eq!(OscShape::from_raw(17.0), OscShape::SawPulse);
        assert_eq!(OscShape::from_raw(-1.0), OscShape::SawPulse);
        assert_eq!(OscShape::from_raw(f32::NAN), OscShape::SawPulse);
    }

    #[test]
    fn test_harmonic_multiplies_frequency() {
        let base = Tuning::mtof(57.0);
        for h in [0.0_f32, 1.0, 2.0, 5.0] {
            let (note, rest) = resolve_note(57.0, h, true, true);
            let f = Tuning::mtof(note);
            assert_eq!(rest, 0.0);
            assert!((f / base - (h + 1.0)).abs() < 1e-3, "h = {h}: ratio {}", f / base);
        }
        for h in [-1.0_f32, -3.0] {
            let (note, _) = resolve_note(57.0, h, true, true);
            let f = Tuning::mtof(note);
            assert!((base / f - (h - 1.0).abs()).abs() < 1e-3, "h = {h}: ratio {}", base / f);
        }
    }

    #[test]
    fn test_stepped_rounds_offset() {
        assert_eq!(resolve_note(60.0, 2.4, false, true), (60.0, 2.0));
        assert_eq!(resolve_note(60.0, 2.4, false, false), (60.0, 2.4));
    }

    #[test]
    fn test_sine_peak_and_paths() {
        let (store, _registry, mut osc) = setup();
        store.set("Osc1 ShapeSet", 4.0).unwrap();
        let mut pool = VoicePool::new(1);
        pool.note_on(69.0, 1.0);
        let tuning = Tuning::new();
        let sync = [0.0; MAX_VOICES];
        let mut peak = 0.0_f32;
        for _ in 0..4800 {
            osc.frame();
            let mut paths = [[0.0; MAX_VOICES]; 2];
            osc.tick(&pool, &tuning, &sync, &mut paths);
            let sum = paths[0][0] + paths[1][0];
            assert!((sum - osc.sync_out()[0]).abs() < 1e-6);
            peak = peak.max(sum.abs());
        }
        assert!((peak - 1.0).abs() < 0.01, "peak = {peak}");
    }

    #[test]
    fn test_disabled_and_unused_is_silent() {
        let (store, _registry, mut osc) = setup();
        store.set("Osc1", 0.0).unwrap();
        let mut pool = VoicePool::new(1);
        pool.note_on(60.0, 1.0);
        osc.frame();
        assert!(!osc.is_active());
        let mut paths = [[0.0; MAX_VOICES]; 2];
        osc.tick(&pool, &Tuning::new(), &[0.0; MAX_VOICES], &mut paths);
        assert_eq!(paths[0][0], 0.0);
    }

    #[test]
    fn test_used_as_source_runs_without_output() {
        let (store, mut registry, mut osc) = setup();
        store.set("Osc1", 0.0).unwrap();
        registry.set_mapping("Osc1 Shape T1", "Osc1", 0.5, false).unwrap();
        let mut pool = VoicePool::new(1);
        pool.note_on(60.0, 1.0);
        osc.frame();
        assert!(osc.is_active());
        let mut paths = [[0.0; MAX_VOICES]; 2];
        let mut any = false;
        for _ in 0..64 {
            osc.tick(&pool, &Tuning::new(), &[0.0; MAX_VOICES], &mut paths);
            any |= osc.sync_out()[0] != 0.0;
        }
        assert!(any, "source output must be computed");
        assert_eq!(paths[0][0], 0.0, "untoggled oscillator stays out of the mix");
    }
}
