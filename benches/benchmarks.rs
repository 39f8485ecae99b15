//! Performance benchmarks for symdex
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::PathBuf;
use symdex::{DiskIndex, Index, IndexConfig, MatchRule, MemoryIndex};
use tempfile::TempDir;

fn bench_config() -> IndexConfig {
    IndexConfig {
        sync_on_merge: false,
        ..IndexConfig::default()
    }
}

/// Delta holding `docs` documents with a mix of rare and shared words
fn sample_delta(docs: usize) -> MemoryIndex {
    let mut memory = MemoryIndex::new(usize::MAX);
    for i in 0..docs {
        let name = format!("src/module_{}/file_{:06}.rs", i % 37, i);
        memory.add_index_entry("decl", &format!("function_{}", i), &name);
        memory.add_index_entry("decl", &format!("Struct{}", i % 500), &name);
        memory.add_index_entry("ref", "println", &name);
        memory.add_index_entry("ref", &format!("helper_{}", i % 50), &name);
    }
    memory
}

/// On-disk index of `docs` documents
fn create_benchmark_index(docs: usize) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("bench.index");
    let empty = DiskIndex::create(&path, bench_config()).expect("Failed to create index");
    empty
        .merge_with(&sample_delta(docs))
        .expect("Failed to merge sample documents");
    (temp_dir, path)
}

fn bench_symbol_extraction(c: &mut Criterion) {
    let code = r#"
        fn getUserById(userId: i32) -> Option<User> {
            let user_name = "test_user";
            let HTTPResponseCode = 200;
            some_function_call(arg1, arg2);
        }
    "#;
    let large = code.repeat(500);

    let mut group = c.benchmark_group("symbol_extraction");
    group.bench_function("small", |b| {
        b.iter(|| symdex::utils::extract_symbols(black_box(code)))
    });
    group.bench_function("large_120kb", |b| {
        b.iter(|| symdex::utils::extract_symbols(black_box(&large)))
    });
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.sample_size(10);

    for docs in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("fresh", docs), &docs, |b, &docs| {
            let delta = sample_delta(docs);
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let path = temp_dir.path().join("fresh.index");
            b.iter(|| {
                let empty = DiskIndex::create(&path, bench_config()).expect("create");
                empty.merge_with(black_box(&delta)).expect("merge")
            })
        });
    }

    // Small delta against a large index, the common incremental case
    let (_temp_dir, path) = create_benchmark_index(10_000);
    group.bench_function("incremental_10", |b| {
        let mut delta = MemoryIndex::new(usize::MAX);
        for i in 0..10 {
            let doc = i * 7;
            let name = format!("src/module_{}/file_{:06}.rs", doc % 37, doc);
            delta.remove(&name);
            delta.add_index_entry("decl", "renamed_function", &name);
        }
        b.iter(|| {
            let disk = DiskIndex::open(&path, bench_config()).expect("open");
            disk.merge_with(black_box(&delta)).expect("merge")
        })
    });

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let (_temp_dir, path) = create_benchmark_index(10_000);
    let index = Index::open(&path, bench_config()).expect("Failed to open index");

    let mut group = c.benchmark_group("query");

    group.bench_function("exact", |b| {
        b.iter(|| {
            index.query(
                &["decl"],
                Some(black_box("function_4242")),
                MatchRule::exact(),
            )
        })
    });

    group.bench_function("large_postings", |b| {
        b.iter(|| {
            let results = index
                .query(&["ref"], Some(black_box("println")), MatchRule::exact())
                .expect("query");
            results[0].document_names()
        })
    });

    group.bench_function("prefix", |b| {
        b.iter(|| index.query(&["decl"], Some(black_box("Struct4")), MatchRule::prefix()))
    });

    group.bench_function("camel_case", |b| {
        b.iter(|| {
            index.query(
                &["decl", "ref"],
                Some(black_box("fu")),
                MatchRule::camel_case(),
            )
        })
    });

    // One session across many lookups keeps the tables cached
    group.bench_function("session_100_lookups", |b| {
        b.iter(|| {
            let _session = index.start_query();
            for i in 0..100 {
                let key = format!("function_{}", i * 97);
                let _ = index.query(&["decl"], Some(&key), MatchRule::exact());
            }
        })
    });

    group.finish();
}

fn bench_index_open(c: &mut Criterion) {
    let (_temp_dir, path) = create_benchmark_index(10_000);

    c.bench_function("index_open", |b| {
        b.iter(|| DiskIndex::open(black_box(&path), bench_config()))
    });

    c.bench_function("document_lookup", |b| {
        let disk = DiskIndex::open(&path, bench_config()).expect("open");
        b.iter(|| disk.document_number(black_box("src/module_5/file_005000.rs")))
    });
}

criterion_group!(
    benches,
    bench_symbol_extraction,
    bench_merge,
    bench_query,
    bench_index_open,
);

criterion_main!(benches);
