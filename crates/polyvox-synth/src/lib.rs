//! Polyvox Synth - polyphonic voice engine with per-voice modulation
//!
//! This crate turns the DSP primitives of `polyvox-core` into a voice
//! engine: host parameters are smoothed per voice, any module output can
//! modulate any parameter, and a block sequencer runs the modules in a fixed
//! order.
//!
//! # Core Components
//!
//! ## Parameters
//!
//! - [`ParameterStore`] - named, atomically updated host parameters
//! - [`SmoothedParameter`] - one (parameter, voice) value: raw value plus up
//!   to three modulation hooks, ramped toward the target
//!
//! ## Modulation
//!
//! - [`ModulationRegistry`] - sources, targets and the bindings between them
//! - [`MappingSourceModel`] / [`MappingTargetModel`] - the two ends of a
//!   mapping
//! - [`ParameterHook`] - the lock-free tap a target reads
//!
//! ```rust
//! use polyvox_synth::{Engine, EngineConfig};
//!
//! let (mut engine, mut registry) = Engine::with_registry(EngineConfig::default()).unwrap();
//! registry.set_mapping("Filter1 Cutoff T1", "Envelope2", -60.0, true).unwrap();
//! assert_eq!(registry.mapping_count("Envelope2").unwrap(), 1);
//! # let mut l = [0.0; 16];
//! # let mut r = [0.0; 16];
//! # engine.process_block(&mut l, &mut r);
//! ```
//!
//! ## Modules
//!
//! Every module holds an [`AudioComponent`] (its parameter grid) and
//! implements [`Module`]:
//!
//! - [`Oscillator`], [`LowFreqOscillator`], [`NoiseGenerator`] - generators,
//!   also usable as modulation sources
//! - [`Filter`] - nine filter types on two parallel paths
//! - [`Envelope`] - exponential ADSR; `Envelope1` drives amplitude
//! - [`Effect`] - oversampled per-voice insert effects
//! - [`Output`] - pan, master gain and tone
//!
//! ## Engine
//!
//! - [`Engine`] - owns the modules and renders stereo blocks
//! - [`EngineConfig`] - module counts, smoothing and tuning, from TOML
//! - [`VoicePool`] / [`VoiceAllocator`] - voice allocation
//! - [`Tuning`] - equal temperament or a 12-degree cents scale

pub mod component;
pub mod config;
pub mod effect;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod hook;
pub mod lfo;
pub mod macros;
pub mod mapping;
pub mod noise;
pub mod oscillator;
pub mod output;
pub mod params;
pub mod smoothed;
pub mod tuning;
pub mod voice;

pub use component::{AudioComponent, DEFAULT_RAMP_SECONDS, MAX_VOICES, Module};
pub use config::{EngineConfig, TuningConfig};
pub use effect::{Effect, FxType};
pub use engine::Engine;
pub use envelope::{AdsrEnvelope, Envelope, EnvelopeState};
pub use error::{ConfigError, EngineError, MappingError};
pub use filter::{Filter, FilterType};
pub use hook::{CellId, HookTable, ParameterHook, SourceBank};
pub use lfo::LowFreqOscillator;
pub use macros::Macros;
pub use mapping::{
    MappingChange, MappingSourceModel, MappingTargetModel, ModulationRegistry, SourceOutput,
    SourceSpec,
};
pub use noise::NoiseGenerator;
pub use oscillator::{OscShape, Oscillator};
pub use output::Output;
pub use params::{AtomicParam, ParamHandle, ParamSpec, ParameterLayout, ParameterStore, SkewSpec};
pub use smoothed::SmoothedParameter;
pub use tuning::{Tuning, TuningMode};
pub use voice::{VoiceAllocator, VoicePool};
