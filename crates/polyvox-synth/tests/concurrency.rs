//! Control-thread mapping changes racing the audio thread.
//!
//! Hooks are rebound without locks. A block may read a half-updated hook
//! (old source with a new range, or the reverse) but every cell it can see
//! is valid memory, so the only effect is one block of stale modulation.
//! These tests hammer that contract: output must stay finite, and once the
//! control thread stops, the final routing must be what it last wrote.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use polyvox_synth::{Engine, EngineConfig, Module};

const BLOCK: usize = 64;

#[test]
fn rebinding_while_rendering_stays_finite() {
    let (mut engine, mut registry) = Engine::with_registry(EngineConfig::default()).unwrap();
    engine.prepare_to_play(48000.0, BLOCK);
    let store = engine.store().clone();
    store.set("Osc1 ShapeSet", 4.0).unwrap();
    for note in [48.0, 55.0, 60.0, 64.0] {
        engine.note_on(note, 1.0);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let blocks = Arc::new(AtomicUsize::new(0));

    let audio = {
        let stop = Arc::clone(&stop);
        let blocks = Arc::clone(&blocks);
        thread::spawn(move || {
            let mut left = [0.0; BLOCK];
            let mut right = [0.0; BLOCK];
            while !stop.load(Ordering::Relaxed) {
                engine.process_block(&mut left, &mut right);
                for s in left.iter().chain(right.iter()) {
                    assert!(s.is_finite(), "non-finite sample {s}");
                }
                blocks.fetch_add(1, Ordering::Relaxed);
            }
            engine
        })
    };

    let sources = ["LFO1", "LFO2", "Envelope2", "Noise", "Osc2", "M1"];
    let targets = ["Filter1 Cutoff T1", "Osc1 Pitch T2", "Output Pan T1", "Master T3"];
    for round in 0..2000 {
        let target = targets[round % targets.len()];
        let source = sources[round % sources.len()];
        match round % 4 {
            0 => registry.set_mapping(target, source, 6.0, false).unwrap(),
            1 => registry.set_mapping_range(target, -3.0, false).unwrap(),
            2 => registry.set_mapping_scalar(target, "M2", false).unwrap(),
            _ => registry.remove_mapping(target, false).unwrap(),
        }
        store.set("Filter1 Type", (round % 9) as f32).unwrap();
        if round % 100 == 0 {
            thread::yield_now();
        }
    }
    while blocks.load(Ordering::Relaxed) < 50 {
        thread::yield_now();
    }
    stop.store(true, Ordering::Relaxed);
    let engine = audio.join().unwrap();

    for source in sources {
        let bound = registry.targets().filter(|t| t.current_source() == Some(source)).count();
        assert_eq!(
            registry.mapping_count(source).unwrap() as usize,
            bound,
            "{source}: count must equal live bindings"
        );
    }
    assert!(engine.filter(0).unwrap().component().is_enabled());
}

#[test]
fn raw_writes_converge_after_the_race() {
    let (mut engine, _registry) = Engine::with_registry(EngineConfig::default()).unwrap();
    engine.prepare_to_play(48000.0, BLOCK);
    let store = engine.store().clone();
    engine.note_on(60.0, 1.0);

    let writer = {
        let store = store.clone();
        thread::spawn(move || {
            for i in 0..10_000 {
                store.set("Filter1 Cutoff", (i % 128) as f32).unwrap();
            }
            store.set("Filter1 Cutoff", 42.0).unwrap();
        })
    };

    let mut left = [0.0; BLOCK];
    let mut right = [0.0; BLOCK];
    for _ in 0..200 {
        engine.process_block(&mut left, &mut right);
    }
    writer.join().unwrap();
    for _ in 0..20 {
        engine.process_block(&mut left, &mut right);
    }

    let cutoff = engine.filter(0).unwrap().component().read(0, 0);
    assert_eq!(cutoff, 42.0, "the last write wins once the ramp lands");
}
