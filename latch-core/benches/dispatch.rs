//! Edge dispatch throughput.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use latch_core::{create_emitter, Condition};

fn condition_edges(c: &mut Criterion) {
    let condition = Condition::new();
    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..8 {
        let fired = fired.clone();
        condition.on_activated(move || {
            fired.fetch_add(1, Ordering::Relaxed);
        });
    }

    c.bench_function("condition_toggle_8_listeners", |b| {
        b.iter(|| {
            condition.activate();
            condition.deactivate();
        })
    });
    black_box(fired.load(Ordering::Relaxed));
}

fn emitter_edges(c: &mut Criterion) {
    let conditions: Vec<Condition> = (0..4).map(|_| Condition::new()).collect();
    for condition in &conditions[1..] {
        condition.activate();
    }
    let emitter = create_emitter(conditions.clone());
    emitter.on_active(|| {});
    emitter.on_inactive(|| {});

    c.bench_function("emitter_toggle_4_conditions", |b| {
        b.iter(|| {
            conditions[0].activate();
            conditions[0].deactivate();
        })
    });
    emitter.cleanup();
}

criterion_group!(benches, condition_edges, emitter_edges);
criterion_main!(benches);
