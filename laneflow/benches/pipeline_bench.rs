//! Benchmarks for message processing against the in-memory backend.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use laneflow::handler::InboundMessage;
use laneflow::pipeline::fingerprint;
use laneflow::testing::{ScriptedBackend, TestHarness};

fn fingerprint_benchmark(c: &mut Criterion) {
    c.bench_function("fingerprint", |b| {
        b.iter(|| fingerprint(black_box("initial:10:0:10:0:10:0")))
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let harness = TestHarness::new(ScriptedBackend::new());
    let payload = vec![0u8; 64];

    // A new entity per iteration; state for a reused one grows without bound.
    let mut next_entity = 0_u64;
    c.bench_function("process_three_lanes", |b| {
        b.iter(|| {
            next_entity += 1;
            let entity_id = format!("bench-{next_entity}");
            runtime
                .block_on(harness.processor.process(&entity_id, &payload, Utc::now()))
                .expect("process")
        })
    });

    let mut next_message = 0_u64;
    c.bench_function("handler_on_message", |b| {
        b.iter_batched(
            || {
                next_message += 1;
                InboundMessage::new(format!("handler-{next_message}"), payload.clone())
            },
            |message| runtime.block_on(harness.handler.on_message(&message)),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, fingerprint_benchmark, pipeline_benchmark);
criterion_main!(benches);
