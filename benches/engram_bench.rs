use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engram::{AgentMemory, EngramConfig, RememberOptions, SearchOptions};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_store(name: &str) -> std::path::PathBuf {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!("engram_bench_{name}_{now}"))
}

fn body(i: usize) -> String {
    format!(
        "episode number {i} records a routine interaction with the bridge contract \
         and notes the gas fees paid along with the resulting balance change"
    )
}

fn seeded_memory(base: &std::path::Path, n: usize) -> AgentMemory {
    let mut memory = AgentMemory::with_local_storage(EngramConfig::new(base, "bench-agent"));
    for i in 0..n {
        memory.remember(&body(i), RememberOptions::new()).unwrap();
    }
    memory
}

pub fn bench_remember(c: &mut Criterion) {
    let mut group = c.benchmark_group("remember");
    for &n in &[100usize, 1_000] {
        group.bench_function(format!("{n}eps"), |b| {
            b.iter_batched(
                || {
                    let base = temp_store(&format!("remember_{n}"));
                    (seeded_memory(&base, n), base)
                },
                |(mut memory, base)| {
                    memory.remember(&body(n), RememberOptions::new()).unwrap();
                    let _ = std::fs::remove_dir_all(&base);
                },
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

pub fn bench_recall(c: &mut Criterion) {
    let mut group = c.benchmark_group("recall");
    for &n in &[100usize, 1_000, 5_000] {
        let base = temp_store(&format!("recall_{n}"));
        let mut memory = seeded_memory(&base, n);
        for &limit in &[5usize, 20] {
            let name = format!("{n}eps_limit{limit}");
            group.bench_function(name, |b| {
                b.iter(|| {
                    let opts = SearchOptions { limit, ..SearchOptions::default() };
                    let _ = memory.recall("gas fees bridge contract", &opts).unwrap();
                })
            });
        }
        let _ = std::fs::remove_dir_all(&base);
    }
    group.finish();
}

pub fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    for &n in &[100usize, 1_000, 5_000] {
        let base = temp_store(&format!("snapshot_{n}"));
        let mut memory = seeded_memory(&base, n);
        group.bench_function(format!("{n}eps"), |b| {
            b.iter(|| {
                let _ = memory.snapshot().unwrap();
            })
        });
        let _ = std::fs::remove_dir_all(&base);
    }
    group.finish();
}

pub fn bench_reopen(c: &mut Criterion) {
    let mut group = c.benchmark_group("reopen");
    for &n in &[100usize, 1_000, 5_000] {
        let base = temp_store(&format!("reopen_{n}"));
        {
            let mut memory = seeded_memory(&base, n);
            memory.stats().unwrap();
        }
        group.bench_function(format!("{n}eps"), |b| {
            b.iter(|| {
                let mut memory =
                    AgentMemory::with_local_storage(EngramConfig::new(&base, "bench-agent"));
                let _ = memory.stats().unwrap();
            })
        });
        let _ = std::fs::remove_dir_all(&base);
    }
    group.finish();
}

criterion_group!(benches, bench_remember, bench_recall, bench_snapshot, bench_reopen);
criterion_main!(benches);
