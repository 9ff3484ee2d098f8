//! # Block Ingestion Benchmarks
//!
//! | Path | Measured |
//! |------|----------|
//! | Linear acceptance | blocks/s through the single-worker queue |
//! | Reorg | unwind depth vs. latency of the single unwind batch |
//! | Catch-up | one range request per missing block |

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qc_02_block_ingestion::test_utils::{build_chain, TestHarness};
use std::time::Duration;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("tokio runtime")
}

fn bench_linear_acceptance(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("qc-02-linear-acceptance");
    group.measurement_time(Duration::from_secs(10));

    for len in [10usize, 100, 500] {
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("process_block", len), &len, |b, &len| {
            b.to_async(&rt).iter(|| async move {
                let h = TestHarness::new().await;
                let service = h.start().await;
                for block in build_chain(&h.genesis, len, 0) {
                    service.process_block(block).await.expect("accepted");
                }
                service.stop().await;
            })
        });
    }

    group.finish();
}

fn bench_reorg_depth(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("qc-02-reorg");

    for depth in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::new("unwind", depth), &depth, |b, &depth| {
            b.to_async(&rt).iter(|| async move {
                let h = TestHarness::new().await;
                let service = h.start().await;
                let main = build_chain(&h.genesis, depth + 1, 0);
                for block in &main {
                    service.process_block(block.clone()).await.expect("accepted");
                }

                let fork = build_chain(&main[0], 1, 1);
                h.headers
                    .set_chain(&h.with_genesis(&[main[0].clone(), fork[0].clone()]));
                service
                    .process_block(fork[0].clone())
                    .await
                    .expect("reorg");
                service.stop().await;
            })
        });
    }

    group.finish();
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("qc-02-catch-up");
    group.sample_size(20);

    let len = 200usize;
    group.throughput(Throughput::Elements(len as u64));
    group.bench_function("on_headers_200", |b| {
        b.to_async(&rt).iter(|| async move {
            let h = TestHarness::new().await;
            let service = h.start().await;
            let chain = build_chain(&h.genesis, len, 0);
            h.headers.set_chain(&h.with_genesis(&chain));
            h.peers.add_blocks(&chain);
            service.on_headers().await.expect("synced");
            service.stop().await;
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_linear_acceptance,
    bench_reorg_depth,
    bench_catch_up
);
criterion_main!(benches);
