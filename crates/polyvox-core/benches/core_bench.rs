//! Criterion benchmarks for polyvox-core DSP primitives
//!
//! Run with: cargo bench -p polyvox-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use polyvox_core::{
    Compressor, DiodeLadder, HermiteDelay, LadderFilter, Lfo, LfoShape, Oversampler, SawPulseOsc,
    SineTriOsc, StateVariableFilter, VzFilter, VzMode, cubic_soft_clip,
};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect()
}

fn bench_oscillators(c: &mut Criterion) {
    let mut group = c.benchmark_group("Oscillator");

    for &block_size in BLOCK_SIZES {
        group.bench_with_input(BenchmarkId::new("saw_pulse", block_size), &block_size, |b, &n| {
            let mut osc = SawPulseOsc::new(SAMPLE_RATE);
            b.iter(|| {
                for _ in 0..n {
                    black_box(osc.tick(black_box(220.0), black_box(0.4)));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("sine_tri", block_size), &block_size, |b, &n| {
            let mut osc = SineTriOsc::new(SAMPLE_RATE);
            b.iter(|| {
                for _ in 0..n {
                    black_box(osc.tick(black_box(220.0), black_box(0.4)));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("lfo", block_size), &block_size, |b, &n| {
            let mut lfo = Lfo::new(SAMPLE_RATE, 3.0);
            lfo.set_waveform(LfoShape::SineTri);
            lfo.set_shape(0.5);
            b.iter(|| {
                for _ in 0..n {
                    black_box(lfo.tick());
                }
            });
        });
    }

    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("Filter");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        // Per-sample coefficient updates, as under cutoff modulation
        group.bench_with_input(BenchmarkId::new("svf_modulated", block_size), &block_size, |b, _| {
            let mut svf = StateVariableFilter::new(SAMPLE_RATE);
            b.iter(|| {
                for (i, &x) in input.iter().enumerate() {
                    svf.set_cutoff_and_q(500.0 + i as f32, 2.0);
                    black_box(svf.process(black_box(x)));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("vz_bell", block_size), &block_size, |b, _| {
            let mut vz = VzFilter::new(SAMPLE_RATE, VzMode::Bell);
            vz.set_frequency_q_gain(1000.0, 1.9, 2.0);
            b.iter(|| {
                for &x in &input {
                    black_box(vz.process(black_box(x)));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("ladder", block_size), &block_size, |b, _| {
            let mut ladder = LadderFilter::new(SAMPLE_RATE);
            ladder.set_cutoff_and_q(1200.0, 3.0);
            b.iter(|| {
                for &x in &input {
                    black_box(ladder.process(black_box(x)));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("diode", block_size), &block_size, |b, _| {
            let mut diode = DiodeLadder::new(SAMPLE_RATE);
            diode.set_cutoff_and_q(1200.0, 3.0);
            b.iter(|| {
                for &x in &input {
                    black_box(diode.process(black_box(x)));
                }
            });
        });
    }

    group.finish();
}

fn bench_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("Effect");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(BenchmarkId::new("softclip_2x", block_size), &block_size, |b, _| {
            let mut os = Oversampler::<2>::new();
            b.iter(|| {
                for &x in &input {
                    let mut up = os.upsample(black_box(x));
                    for s in &mut up {
                        *s = cubic_soft_clip(*s * 4.0);
                    }
                    black_box(os.downsample(&up));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("compressor", block_size), &block_size, |b, _| {
            let mut comp = Compressor::new(SAMPLE_RATE);
            b.iter(|| {
                for &x in &input {
                    black_box(comp.process(black_box(x)));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("hermite_delay", block_size), &block_size, |b, _| {
            let mut delay = HermiteDelay::new(8192);
            b.iter(|| {
                for (i, &x) in input.iter().enumerate() {
                    delay.set_delay(300.0 + (i % 7) as f32 * 0.3);
                    black_box(delay.tick(black_box(x)));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_oscillators, bench_filters, bench_effects);
criterion_main!(benches);
