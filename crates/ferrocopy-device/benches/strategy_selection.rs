//! Benchmarks for strategy selection and cached profiling

use criterion::{criterion_group, criterion_main, Criterion};
use ferrocopy_device::{BufferStrategy, DeviceProfiler, TransferHints};
use ferrocopy_types::{DeviceInfo, DeviceType};
use std::hint::black_box;
use std::path::PathBuf;
use tempfile::TempDir;

fn bench_choose(c: &mut Criterion) {
    let strategy = BufferStrategy::default();
    let pairs: Vec<(DeviceInfo, DeviceInfo)> = DeviceType::ALL
        .iter()
        .flat_map(|&src| {
            DeviceType::ALL.iter().map(move |&dst| {
                (
                    DeviceInfo::new(src, "bench", PathBuf::from("/")),
                    DeviceInfo::new(dst, "bench", PathBuf::from("/")),
                )
            })
        })
        .collect();

    c.bench_function("strategy_choose_all_pairs", |b| {
        b.iter(|| {
            for (src, dst) in &pairs {
                black_box(strategy.choose(src, dst, TransferHints::default()).unwrap());
            }
        });
    });
}

fn bench_cached_profile(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let profiler = DeviceProfiler::new();
    rt.block_on(profiler.profile(temp_dir.path())).unwrap();

    c.bench_function("profile_cache_hit", |b| {
        b.iter(|| black_box(rt.block_on(profiler.profile(temp_dir.path())).unwrap()));
    });
}

criterion_group!(benches, bench_choose, bench_cached_profile);
criterion_main!(benches);
