//! Benchmarks for the block render path.
//!
//! Run with: cargo bench
//!
//! One block is 64 frames, a 1.33ms deadline at 48kHz. The interesting
//! numbers are how render cost scales with sounding voices and how little an
//! idle patch costs.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use saavy_sampler::{
    patch::{slots::ProcessorConfig, KeyRange, ZoneConfig},
    sample::{Sample, SampleStore},
    Engine, EngineConfig, StereoBlock, MAX_VOICES, NUM_PARTS,
};

const VOICE_COUNTS: &[usize] = &[1, 8, 32, MAX_VOICES];

fn loaded_engine(with_filter: bool) -> Engine {
    let store = Arc::new(SampleStore::new());
    let data = (0..48_000)
        .map(|i| (i as f32 * 0.0577).sin() * 0.5)
        .collect();
    let sample = store.register(Sample::mono("sine", 48_000.0, data));
    let mut engine = Engine::new(EngineConfig::default(), store).unwrap();

    // A zone in every part so the idle walk has something to skip
    for part in 0..NUM_PARTS {
        let group = engine.add_group(part, "bench").unwrap();
        let mut zone = ZoneConfig::new(Some(sample), KeyRange::full(), 60);
        zone.looping = true;
        if with_filter {
            zone.processors[0] = ProcessorConfig::lowpass(2_000.0, 0.4);
            zone.processors[1] = ProcessorConfig::drive(2.0);
        }
        engine.add_zone(group, zone).unwrap();
    }
    engine
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let mut out = StereoBlock::silent();

    let mut idle = loaded_engine(false);
    group.bench_function("idle_patch", |b| {
        b.iter(|| idle.process_audio(black_box(&mut out)))
    });

    for &voices in VOICE_COUNTS {
        for (label, filtered) in [("plain", false), ("filtered", true)] {
            let mut engine = loaded_engine(filtered);
            for v in 0..voices {
                // Spread across parts and keys
                let channel = (v % NUM_PARTS) as u8;
                engine.note_on(channel, 36 + (v % 48) as i32, v as i32, 0.8, 0.0);
            }

            group.bench_with_input(BenchmarkId::new(label, voices), &voices, |b, _| {
                b.iter(|| engine.process_audio(black_box(&mut out)))
            });
        }
    }
    group.finish();
}

fn bench_note_churn(c: &mut Criterion) {
    let mut engine = loaded_engine(false);
    let mut out = StereoBlock::silent();
    let mut key = 0;

    // Once the pool fills up every note-on steals
    c.bench_function("note_on_with_stealing", |b| {
        b.iter(|| {
            key = (key + 1) % 128;
            engine.note_on(0, black_box(key), key, 1.0, 0.0);
            engine.process_audio(&mut out);
        })
    });
}

criterion_group!(benches, bench_render, bench_note_churn);
criterion_main!(benches);
