use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use spirida_core::{NullSink, PulseSpec, ReclamationField, ReclamationPolicy};

const TAGS: [&str; 6] = ["🌿", "💧", "✨", "🍄", "🌙", "🪐"];
const AFFECTS: [&str; 6] = ["calm", "grief", "joy", "curious", "peaceful", "grateful"];

fn populated_field(n: usize, policy: ReclamationPolicy) -> ReclamationField {
    let mut field = ReclamationField::new(
        "bench",
        policy,
        0.0,
        Arc::new(NullSink),
        SmallRng::seed_from_u64(42),
    );
    for i in 0..n {
        let spec = PulseSpec::new(TAGS[i % TAGS.len()], AFFECTS[i % AFFECTS.len()])
            .decay_rate(0.01 + (i % 7) as f64 * 0.05);
        field.emit(spec, i as f64).expect("valid spec");
    }
    field
}

fn bench_emit(c: &mut Criterion) {
    c.bench_function("emit_into_200", |b| {
        b.iter_batched(
            || populated_field(200, ReclamationPolicy::Natural),
            |mut field| {
                field
                    .emit(black_box(PulseSpec::new("🌿", "calm")), 200.0)
                    .expect("valid spec")
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_reclaim_resonant(c: &mut Criterion) {
    c.bench_function("reclaim_resonant_200", |b| {
        b.iter_batched(
            || populated_field(200, ReclamationPolicy::Resonant),
            |mut field| field.reclaim(black_box(400.0), 0.01),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_find_resonances(c: &mut Criterion) {
    c.bench_function("find_resonances_100", |b| {
        b.iter_batched(
            || populated_field(100, ReclamationPolicy::Natural),
            |mut field| field.find_resonances(black_box(150.0), 0.6).len(),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_emit, bench_reclaim_resonant, bench_find_resonances);
criterion_main!(benches);
