//! Per-voice multimode filter (`Filter1`, `Filter2`).
//!
//! Filter 1 processes path 0, filter 2 path 1. Cutoff is in note units and
//! can follow the voice's note.

use std::sync::Arc;

use polyvox_core::{
    DiodeLadder, LadderFilter, ParamRange, StateVariableFilter, SvfMode, VzFilter, VzMode,
    db_to_linear,
};

use crate::component::{AudioComponent, MAX_VOICES, Module, raw_param};
use crate::error::EngineError;
use crate::mapping::ModulationRegistry;
use crate::params::{AtomicParam, ParameterLayout, ParameterStore};
use crate::tuning::Tuning;
use crate::voice::VoiceAllocator;

/// Smoothed per-voice parameters, in grid order.
pub const PARAMS: [&str; 4] = ["Cutoff", "Resonance", "KeyFollow", "Gain"];

const CUTOFF: usize = 0;
const RESONANCE: usize = 1;
const KEY_FOLLOW: usize = 2;
const GAIN: usize = 3;

/// Declare the parameters of filter `name`.
pub fn declare_params(layout: &mut ParameterLayout, name: &str) {
    layout.push(name, ParamRange::linear(0.0, 1.0), 1.0);
    layout.push(format!("{name} Cutoff"), ParamRange::linear(0.0, 127.0), 127.0);
    layout.push(format!("{name} Resonance"), ParamRange::linear(0.1, 10.0), 0.707);
    layout.push(format!("{name} KeyFollow"), ParamRange::linear(0.0, 1.0), 0.0);
    layout.push(format!("{name} Gain"), ParamRange::linear(-25.0, 25.0), 0.0);
    layout.push(format!("{name} Type"), ParamRange::linear(0.0, 8.0), 0.0);
}

/// Filter response selected by `Type`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterType {
    /// 12 dB/oct SVF lowpass.
    #[default]
    Lowpass,
    /// SVF highpass.
    Highpass,
    /// SVF bandpass.
    Bandpass,
    /// Diode ladder lowpass.
    DiodeLowpass,
    /// Bell; resonance is the bandwidth in octaves.
    VzPeak,
    /// Low shelf.
    VzLowshelf,
    /// High shelf.
    VzHighshelf,
    /// Notch.
    VzBandreject,
    /// Transistor ladder lowpass.
    LadderLowpass,
}

impl FilterType {
    /// Resolve a raw selector value. Unknown values fall back to
    /// [`FilterType::Lowpass`].
    pub fn from_raw(raw: f32) -> Self {
        match raw as i32 {
            1 => Self::Highpass,
            2 => Self::Bandpass,
            3 => Self::DiodeLowpass,
            4 => Self::VzPeak,
            5 => Self::VzLowshelf,
            6 => Self::VzHighshelf,
            7 => Self::VzBandreject,
            8 => Self::LadderLowpass,
            _ => Self::Lowpass,
        }
    }
}

/// One voice's filters. Every type keeps its own state, so switching type
/// resumes the new type where it left off.
#[derive(Debug, Clone)]
struct FilterVoice {
    lowpass: StateVariableFilter,
    highpass: StateVariableFilter,
    bandpass: StateVariableFilter,
    diode: DiodeLadder,
    peak: VzFilter,
    lowshelf: VzFilter,
    highshelf: VzFilter,
    bandreject: VzFilter,
    ladder: LadderFilter,
    /// Last (cutoff, q, gain dB) pushed into the active type's coefficients.
    settings: [f32; 3],
    post_gain: f32,
}

fn svf(sample_rate: f32, mode: SvfMode) -> StateVariableFilter {
    let mut f = StateVariableFilter::new(sample_rate);
    f.set_mode(mode);
    f
}

impl FilterVoice {
    fn new(sample_rate: f32) -> Self {
        Self {
            lowpass: svf(sample_rate, SvfMode::Lowpass),
            highpass: svf(sample_rate, SvfMode::Highpass),
            bandpass: svf(sample_rate, SvfMode::Bandpass),
            diode: DiodeLadder::new(sample_rate),
            peak: VzFilter::new(sample_rate, VzMode::Bell),
            lowshelf: VzFilter::new(sample_rate, VzMode::Lowshelf),
            highshelf: VzFilter::new(sample_rate, VzMode::Highshelf),
            bandreject: VzFilter::new(sample_rate, VzMode::BandReject),
            ladder: LadderFilter::new(sample_rate),
            settings: [f32::NAN; 3],
            post_gain: 1.0,
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for f in [&mut self.lowpass, &mut self.highpass, &mut self.bandpass] {
            f.set_sample_rate(sample_rate);
        }
        for f in [&mut self.peak, &mut self.lowshelf, &mut self.highshelf, &mut self.bandreject] {
            f.set_sample_rate(sample_rate);
        }
        self.diode.set_sample_rate(sample_rate);
        self.ladder.set_sample_rate(sample_rate);
        self.settings = [f32::NAN; 3];
    }

    /// Force the next tick to load coefficients into the active type.
    fn invalidate(&mut self) {
        self.settings = [f32::NAN; 3];
    }

    /// Record new settings. Returns false if nothing changed.
    #[inline]
    fn update(&mut self, cutoff: f32, q: f32, gain_db: f32) -> bool {
        let next = [cutoff, q, gain_db];
        if next == self.settings {
            return false;
        }
        if gain_db != self.settings[2] {
            self.post_gain = db_to_linear(gain_db);
        }
        self.settings = next;
        true
    }
}

type FilterTick = fn(&mut FilterVoice, f32, f32, f32, f32) -> f32;

macro_rules! svf_tick {
    ($name:ident, $field:ident) => {
        fn $name(f: &mut FilterVoice, x: f32, cutoff: f32, q: f32, gain_db: f32) -> f32 {
            if f.update(cutoff, q, gain_db) {
                f.$field.set_cutoff_and_q(cutoff, q);
            }
            f.$field.process(x) * f.post_gain
        }
    };
}

svf_tick!(tick_lowpass, lowpass);
svf_tick!(tick_highpass, highpass);
svf_tick!(tick_bandpass, bandpass);
svf_tick!(tick_diode, diode);
svf_tick!(tick_ladder, ladder);

fn tick_vz_peak(f: &mut FilterVoice, x: f32, cutoff: f32, q: f32, gain_db: f32) -> f32 {
    if f.update(cutoff, q, gain_db) {
        f.peak.set_frequency_bandwidth_gain(cutoff, q, f.post_gain);
    }
    f.peak.process(x)
}

fn tick_vz_lowshelf(f: &mut FilterVoice, x: f32, cutoff: f32, q: f32, gain_db: f32) -> f32 {
    if f.update(cutoff, q, gain_db) {
        f.lowshelf.set_frequency_q_gain(cutoff, q, f.post_gain);
    }
    f.lowshelf.process(x)
}

fn tick_vz_highshelf(f: &mut FilterVoice, x: f32, cutoff: f32, q: f32, gain_db: f32) -> f32 {
    if f.update(cutoff, q, gain_db) {
        f.highshelf.set_frequency_q_gain(cutoff, q, f.post_gain);
    }
    f.highshelf.process(x)
}

fn tick_vz_bandreject(f: &mut FilterVoice, x: f32, cutoff: f32, q: f32, gain_db: f32) -> f32 {
    if f.update(cutoff, q, gain_db) {
        f.bandreject.set_frequency_q_gain(cutoff, q, 1.0);
    }
    f.bandreject.process(x) * f.post_gain
}

/// Per-sample processor for each [`FilterType`], indexed by discriminant.
const FILTER_TICKS: [FilterTick; 9] = [
    tick_lowpass,
    tick_highpass,
    tick_bandpass,
    tick_diode,
    tick_vz_peak,
    tick_vz_lowshelf,
    tick_vz_highshelf,
    tick_vz_bandreject,
    tick_ladder,
];

/// Cutoff in Hz for a note-unit cutoff and key follow amount.
#[inline]
pub fn cutoff_hz(cutoff: f32, note: f32, key_follow: f32) -> f32 {
    let follow = if note.is_nan() { 0.0 } else { note };
    Tuning::mtof(cutoff + follow * key_follow.clamp(0.0, 1.0)).abs()
}

/// Multimode per-voice filter.
#[derive(Debug)]
pub struct Filter {
    component: AudioComponent,
    voices: Vec<FilterVoice>,
    filter_type_raw: Arc<AtomicParam>,
    filter_type: FilterType,
    tick_fn: FilterTick,
}

impl Filter {
    /// Build filter `name`.
    pub fn new(
        name: &str,
        store: &ParameterStore,
        registry: &mut ModulationRegistry,
    ) -> Result<Self, EngineError> {
        let component = AudioComponent::new(name, &PARAMS, true, store, registry)?;
        Ok(Self {
            component,
            voices: (0..MAX_VOICES).map(|_| FilterVoice::new(48000.0)).collect(),
            filter_type_raw: raw_param(store, name, "Type")?,
            filter_type: FilterType::default(),
            tick_fn: FILTER_TICKS[FilterType::default() as usize],
        })
    }

    /// Type selected by the last `frame()`.
    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Filter one sample per active voice in place. A disabled filter
    /// leaves the samples untouched.
    pub fn tick<V: VoiceAllocator>(&mut self, voices: &V, samples: &mut [f32; MAX_VOICES]) {
        if !self.component.is_enabled() {
            return;
        }
        let n = voices.num_active().min(MAX_VOICES);
        self.component.smooth(n);
        for (v, sample) in samples.iter_mut().enumerate().take(n) {
            let c = &self.component;
            let cutoff = cutoff_hz(c.read(CUTOFF, v), voices.note(v), c.read(KEY_FOLLOW, v));
            let q = c.read(RESONANCE, v).max(0.1);
            let gain = c.read(GAIN, v);
            *sample = (self.tick_fn)(&mut self.voices[v], *sample, cutoff, q, gain);
        }
    }
}

impl Module for Filter {
    fn component(&self) -> &AudioComponent {
        &self.component
    }

    fn component_mut(&mut self) -> &mut AudioComponent {
        &mut self.component
    }

    fn prepare_to_play(&mut self, sample_rate: f32, block_size: usize) {
        self.component.prepare_to_play(sample_rate, block_size);
        for voice in &mut self.voices {
            voice.set_sample_rate(sample_rate);
        }
    }

    fn frame(&mut self) {
        self.component.update_enabled();
        let filter_type = FilterType::from_raw(self.filter_type_raw.get());
        if filter_type != self.filter_type {
            tracing::debug!(filter = %self.component.name(), ?filter_type, "filter type changed");
            self.filter_type = filter_type;
            for voice in &mut self.voices {
                voice.invalidate();
            }
        }
        self.tick_fn = FILTER_TICKS[filter_type as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoicePool;

    fn setup() -> (ParameterStore, ModulationRegistry, Filter) {
        let mut layout = ParameterLayout::new();
        declare_params(&mut layout, "Filter1");
        let store = ParameterStore::from_layout(&layout).unwrap();
        let mut registry = ModulationRegistry::new(512, store.hook_exponents());
        let mut filter = Filter::new("Filter1", &store, &mut registry).unwrap();
        filter.prepare_to_play(48000.0, 64);
        (store, registry, filter)
    }

    fn run(filter: &mut Filter, pool: &VoicePool, input: impl Fn(usize) -> f32, n: usize) -> f32 {
        let mut peak = 0.0_f32;
        for i in 0..n {
            let mut buf = [input(i); MAX_VOICES];
            filter.tick(pool, &mut buf);
            assert!(buf[0].is_finite(), "sample {i} = {}", buf[0]);
            if i > n / 2 {
                peak = peak.max(buf[0].abs());
            }
        }
        peak
    }

    #[test]
    fn test_type_from_raw() {
        assert_eq!(FilterType::from_raw(8.0), FilterType::LadderLowpass);
        assert_eq!(FilterType::from_raw(4.5), FilterType::VzPeak);
        assert_eq!(FilterType::from_raw(99.0), FilterType::Lowpass);
        assert_eq!(FILTER_TICKS.len(), FilterType::LadderLowpass as usize + 1);
    }

    #[test]
    fn test_cutoff_keyfollow() {
        assert!((cutoff_hz(69.0, 60.0, 0.0) - 440.0).abs() < 0.01);
        assert!((cutoff_hz(9.0, 60.0, 1.0) - 440.0).abs() < 0.01);
        assert!((cutoff_hz(69.0, f32::NAN, 1.0) - 440.0).abs() < 0.01, "NaN note counts as 0");
    }

    #[test]
    fn test_disabled_passes_through() {
        let (store, _registry, mut filter) = setup();
        store.set("Filter1", 0.0).unwrap();
        store.set("Filter1 Cutoff", 20.0).unwrap();
        filter.frame();
        let pool = VoicePool::new(1);
        let mut buf = [0.75; MAX_VOICES];
        filter.tick(&pool, &mut buf);
        assert_eq!(buf[0], 0.75);
    }

    #[test]
    fn test_lowpass_attenuates_highs() {
        let (store, _registry, mut filter) = setup();
        store.set("Filter1 Cutoff", 40.0).unwrap();
        filter.frame();
        let pool = VoicePool::new(1);
        let nyquist = |i: usize| if i % 2 == 0 { 1.0 } else { -1.0 };
        let peak = run(&mut filter, &pool, nyquist, 4800);
        assert!(peak < 0.05, "peak = {peak}");
    }

    #[test]
    fn test_gain_is_decibels() {
        let (store, _registry, mut filter) = setup();
        store.set("Filter1 Gain", -20.0).unwrap();
        filter.frame();
        let pool = VoicePool::new(1);
        let peak = run(&mut filter, &pool, |_| 1.0, 4800);
        assert!((peak - 0.1).abs() < 0.01, "DC through a wide-open lowpass at -20 dB: {peak}");
    }

    #[test]
    fn test_every_type_stays_finite() {
        let (store, _registry, mut filter) = setup();
        store.set("Filter1 Cutoff", 80.0).unwrap();
        store.set("Filter1 Resonance", 4.0).unwrap();
        store.set("Filter1 Gain", 12.0).unwrap();
        let pool = VoicePool::new(1);
        for t in 0..9 {
            store.set("Filter1 Type", t as f32).unwrap();
            filter.frame();
            assert_eq!(filter.filter_type() as usize, t);
            let saw = |i: usize| (i % 100) as f32 / 50.0 - 1.0;
            let peak = run(&mut filter, &pool, saw, 2400);
            assert!(peak < 100.0, "type {t}: peak {peak}");
        }
    }

    fn first_sample(filter: &mut Filter, pool: &VoicePool, x: f32) -> f32 {
        let mut buf = [x; MAX_VOICES];
        filter.tick(pool, &mut buf);
        buf[0]
    }

    #[test]
    fn test_type_switch_keeps_state() {
        let (store, _registry, mut filter) = setup();
        store.set("Filter1 Cutoff", 60.0).unwrap();
        filter.frame();
        let pool = VoicePool::new(1);
        run(&mut filter, &pool, |_| 1.0, 48000);

        store.set("Filter1 Type", 1.0).unwrap();
        filter.frame();
        run(&mut filter, &pool, |_| 1.0, 48000);

        store.set("Filter1 Type", 0.0).unwrap();
        filter.frame();
        let lp = first_sample(&mut filter, &pool, 1.0);
        assert!((lp - 1.0).abs() < 0.01, "settled lowpass resumes at DC level: {lp}");

        store.set("Filter1 Type", 1.0).unwrap();
        filter.frame();
        let hp = first_sample(&mut filter, &pool, 1.0);
        assert!(hp.abs() < 0.01, "settled highpass resumes blocking DC: {hp}");
    }

    #[test]
    fn test_every_type_switch_stays_finite() {
        let (store, _registry, mut filter) = setup();
        store.set("Filter1 Cutoff", 90.0).unwrap();
        store.set("Filter1 Resonance", 6.0).unwrap();
        store.set("Filter1 Gain", 18.0).unwrap();
        let pool = VoicePool::new(1);
        let saw = |i: usize| (i % 64) as f32 / 32.0 - 1.0;
        for from in 0..9 {
            for to in 0..9 {
                store.set("Filter1 Type", from as f32).unwrap();
                filter.frame();
                run(&mut filter, &pool, saw, 256);
                store.set("Filter1 Type", to as f32).unwrap();
                filter.frame();
                let peak = run(&mut filter, &pool, saw, 256);
                assert!(peak < 100.0, "{from} -> {to}: peak {peak}");
            }
        }
    }
}
