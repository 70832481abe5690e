//! End-to-end copy throughput through the engine
//!
//! Measures single files of several sizes plus a many-small-files tree, with
//! and without compression.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ferrocopy_config::Config;
use ferrocopy_engine::{CopyEngine, CopyRequest};
use ferrocopy_tests::{write_file, TestDataPattern, TreeBuilder, Workspace};

fn bench_single_file(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = CopyEngine::with_runtime(Config::default(), rt.handle().clone()).unwrap();
    let workspace = Workspace::new().unwrap();
    let mut group = c.benchmark_group("single_file");
    group.sample_size(20);

    for size in [64 * 1024, 1024 * 1024, 16 * 1024 * 1024] {
        let source = write_file(
            &workspace.root().join(format!("in_{}", size)),
            size,
            TestDataPattern::Random,
        )
        .unwrap();
        let destination = workspace.root().join(format!("out_{}", size));
        group.throughput(Throughput::Bytes(size as u64));

        for compress in [false, true] {
            let name = if compress { "compressed" } else { "plain" };
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.to_async(&rt).iter(|| async {
                    let request = CopyRequest::new(&source, &destination).compress(compress);
                    black_box(engine.execute(request).await.unwrap())
                });
            });
        }
    }
    group.finish();
}

fn bench_small_files(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = CopyEngine::with_runtime(Config::default(), rt.handle().clone()).unwrap();
    let workspace = Workspace::new().unwrap();

    let mut tree = TreeBuilder::new();
    for i in 0..500 {
        tree = tree.file(format!("d{}/f{}.txt", i % 10, i), 4096, TestDataPattern::Text);
    }
    tree.build(&workspace.source()).unwrap();

    let mut group = c.benchmark_group("tree");
    group.sample_size(10);
    group.throughput(Throughput::Elements(500));
    group.bench_function("500_files_4kb", |b| {
        b.to_async(&rt).iter(|| async {
            let request = CopyRequest::new(workspace.source(), workspace.destination());
            black_box(engine.execute(request).await.unwrap())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_single_file, bench_small_files);
criterion_main!(benches);
