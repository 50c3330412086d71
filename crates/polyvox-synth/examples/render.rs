//! Render demo: a short chord through the voice engine with modulation.
//!
//! Run with: cargo run -p polyvox-synth --example render [config.toml]
//!
//! Set `RUST_LOG=debug` to see mapping and selector changes.

use polyvox_synth::{Engine, EngineConfig};
use tracing_subscriber::EnvFilter;

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK: usize = 256;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let (mut engine, mut registry) = Engine::with_registry(config)?;
    engine.prepare_to_play(SAMPLE_RATE, BLOCK);

    let store = engine.store().clone();
    store.set("Osc1 ShapeSet", 2.0)?;
    store.set("Filter1 Cutoff", 70.0)?;
    store.set("Filter1 Resonance", 3.0)?;
    store.set("Envelope2 Decay", 300.0)?;
    store.set("Envelope2 Sustain", 0.2)?;
    store.set("Effect1 FXType", 6.0)?;
    registry.set_mapping("Filter1 Cutoff T1", "Envelope2", 30.0, true)?;
    registry.set_mapping("Osc1 Pitch T1", "LFO1", 0.2, false)?;

    println!("=== Rendering a C minor chord (1 s held, 1 s release) ===\n");
    println!("Block | Peak     | RMS");
    println!("------+----------+---------");

    let chord = [60.0, 63.0, 67.0];
    for note in chord {
        engine.note_on(note, 0.8);
    }

    let blocks = (2.0 * SAMPLE_RATE) as usize / BLOCK;
    let mut left = [0.0; BLOCK];
    let mut right = [0.0; BLOCK];
    let (mut total_peak, mut total_sq) = (0.0_f32, 0.0_f64);
    for b in 0..blocks {
        if b == blocks / 2 {
            for note in chord {
                engine.note_off(note);
            }
            println!("--- notes off ---");
        }
        engine.process_block(&mut left, &mut right);

        let peak = left.iter().chain(&right).fold(0.0_f32, |m, s| m.max(s.abs()));
        let sq: f64 = left.iter().chain(&right).map(|&s| f64::from(s * s)).sum();
        total_peak = total_peak.max(peak);
        total_sq += sq;
        if b % 20 == 0 {
            let rms = (sq / (2 * BLOCK) as f64).sqrt();
            println!("{b:>5} | {peak:>8.4} | {rms:>8.4}");
        }
    }

    let rms = (total_sq / (2 * BLOCK * blocks) as f64).sqrt();
    println!("\nOverall peak {total_peak:.4}, RMS {rms:.4}");
    println!("Envelope2 drives {} target(s)", registry.mapping_count("Envelope2")?);
    Ok(())
}
