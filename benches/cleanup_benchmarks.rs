//! Benchmarks for registration and release paths

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use heapstack::config::DispatchMode;
use heapstack::coordinator::CleanupCoordinator;
use heapstack::memory_management::{CleanupAction, TrackedResource};
use heapstack::notice::SilentSink;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

fn coordinator(dispatch: DispatchMode) -> CleanupCoordinator {
    CleanupCoordinator::builder()
        .name(format!("bench-{}", dispatch))
        .dispatch(dispatch)
        .sink(Arc::new(SilentSink))
        .build()
        .expect("bench coordinator")
}

fn registration_benchmarks(c: &mut Criterion) {
    let inline = coordinator(DispatchMode::Inline);
    let mut group = c.benchmark_group("registration");

    group.bench_function("register_and_explicit_release", |b| {
        b.iter(|| {
            let cleanable = inline.register(CleanupAction::new("noop", || {}));
            black_box(cleanable.clean());
        });
    });

    group.bench_function("tracked_resource_scope_exit", |b| {
        b.iter(|| {
            let resource = TrackedResource::new(&inline, black_box(23));
            black_box(resource.value());
        });
    });

    group.finish();
}

fn batch_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_drop");
    group.sample_size(20);

    for dispatch in [DispatchMode::Inline, DispatchMode::Background] {
        let coordinator = coordinator(dispatch);
        group.bench_function(format!("10k_{}", dispatch), |b| {
            b.iter_batched(
                || {
                    (0..10_000)
                        .map(|value| TrackedResource::new(&coordinator, value))
                        .collect::<Vec<_>>()
                },
                |resources| {
                    drop(resources);
                    coordinator.request_reclamation();
                    black_box(coordinator.await_quiescence(Duration::from_secs(10)))
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, registration_benchmarks, batch_benchmarks);
criterion_main!(benches);
