//! Polyvox Core - DSP primitives for the polyvox voice engine
//!
//! Every type here is a leaf algorithm: a pure function of its own state and
//! per-sample inputs (frequency, resonance/shape, gain) producing one sample.
//! Nothing in this crate knows about parameters, voices or modulation
//! routing; that lives in `polyvox-synth`.
//!
//! # Generators
//!
//! - [`SawOsc`], [`PulseOsc`], [`TriangleOsc`], [`SineOsc`] - band-limited
//!   audio-rate oscillators with hard/soft sync ([`SyncMode`])
//! - [`SawPulseOsc`], [`SineTriOsc`] - paired generators morphed by shape
//! - [`WavetableOsc`] over a [`WaveTableSet`]
//! - [`Lfo`] - modulation oscillator ([`LfoShape`])
//! - [`WhiteNoise`]
//!
//! # Filters
//!
//! - [`StateVariableFilter`] - TPT SVF, lowpass/highpass/bandpass
//! - [`VzFilter`] - bell, shelves and band-reject on the same topology
//! - [`LadderFilter`] / [`DiodeLadder`] - 4-pole nonlinear ladders
//! - [`OnePole`], [`DcBlocker`]
//!
//! # Effects building blocks
//!
//! - Waveshapers: [`cubic_soft_clip`], [`abs_saturate`], [`shaper`],
//!   [`foldback`], [`fast_tanh`]
//! - [`Compressor`], [`Crusher`], [`HermiteDelay`]
//! - [`Oversampler`] - split up/down sampler for per-voice chains
//!
//! # Control-rate helpers
//!
//! - [`LinearSmoother`] - counted linear ramp that lands exactly on target
//! - [`ParamRange`] - linear or power-skewed normalisation
//! - [`SkewTable`], [`ExpTable`] - 2048-entry lookup tables
//!
//! # no_std Support
//!
//! Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! polyvox-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use polyvox_core::{StateVariableFilter, SawPulseOsc, SvfMode};
//!
//! let mut osc = SawPulseOsc::new(48000.0);
//! let mut filter = StateVariableFilter::new(48000.0);
//! filter.set_mode(SvfMode::Lowpass);
//! filter.set_cutoff_and_q(1200.0, 0.707);
//!
//! let mut block = [0.0_f32; 64];
//! for s in block.iter_mut() {
//!     *s = filter.process(osc.tick(110.0, 0.3));
//! }
//! assert!(block.iter().all(|s| s.is_finite()));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod crusher;
pub mod dc_blocker;
pub mod delay;
pub mod dynamics;
pub mod fast_math;
pub mod ladder;
pub mod lfo;
pub mod math;
pub mod noise;
pub mod one_pole;
pub mod oscillator;
pub mod oversample;
pub mod param_range;
pub mod smoothing;
pub mod svf;
pub mod tables;

pub use crusher::Crusher;
pub use dc_blocker::DcBlocker;
pub use delay::{HermiteDelay, hermite};
pub use dynamics::Compressor;
pub use fast_math::{
    fast_db_to_linear, fast_exp2, fast_linear_to_db, fast_log2, fast_mtof, fast_sin_turns, fast_tan,
};
pub use ladder::{DiodeLadder, LadderFilter, q_to_feedback};
pub use lfo::{Lfo, LfoShape};
pub use math::{
    MTOF_EXPONENT, MTOF_MAX_NOTE, MTOF_MIN_NOTE, MTOF_REFERENCE_HZ, abs_saturate, cubic_soft_clip,
    db_to_linear, fast_tanh, flush_denormal, foldback, ftom, lerp, linear_to_db, ms_to_samples, mtof,
    shaper, wet_dry_mix,
};
pub use noise::WhiteNoise;
pub use one_pole::OnePole;
pub use oscillator::{
    Phasor, PulseOsc, SawOsc, SawPulseOsc, SineOsc, SineTriOsc, SyncMode, TriangleOsc, WaveTableSet,
    WavetableOsc,
};
pub use oversample::Oversampler;
pub use param_range::{ParamRange, ParamScale};
pub use smoothing::LinearSmoother;
pub use svf::{StateVariableFilter, SvfMode, SvfOutputs, VzFilter, VzMode, bandwidth_to_q};
pub use tables::{ExpTable, SkewTable, TABLE_SIZE};
