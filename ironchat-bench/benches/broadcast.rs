//! Registry and fan-out benchmarks.

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ironchat_bench::workload::{drain_queues, populated_registry};
use std::hint::black_box;

fn benchmark_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_snapshot");

    for peers in [2usize, 16, 128] {
        let (registry, _queues) = populated_registry(peers);
        group.bench_with_input(BenchmarkId::from_parameter(peers), &registry, |b, registry| {
            b.iter(|| registry.snapshot_excluding(black_box("user-0")))
        });
    }

    group.finish();
}

fn benchmark_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    let frame = Bytes::from_static(b"user-0: the quick brown fox jumps over the lazy dog\n");

    for peers in [2usize, 16, 128] {
        let (registry, mut queues) = populated_registry(peers);
        group.throughput(Throughput::Elements(peers as u64 - 1));
        group.bench_function(BenchmarkId::from_parameter(peers), |b| {
            b.iter(|| {
                for (_, peer) in registry.snapshot_excluding("user-0") {
                    let _ = peer.deliver(frame.clone());
                }
                drain_queues(&mut queues)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_snapshot, benchmark_fan_out);
criterion_main!(benches);
