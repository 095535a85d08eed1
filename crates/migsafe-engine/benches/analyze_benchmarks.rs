//! Benchmarks for the analysis pipeline
//!
//! These benchmarks measure splitting, classification and full analysis
//! over synthetic migrations of increasing size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use migsafe_core::{DialectConfig, RowEstimate};
use migsafe_engine::Analyzer;
use migsafe_sql::MigrationFile;

/// Generate a migration with N statements cycling through every rule shape
fn generate_migration(num_statements: usize) -> String {
    let shapes = [
        "DROP TABLE IF EXISTS legacy_{i};",
        "ALTER TABLE table_{i} DROP COLUMN old_col;",
        "ALTER TABLE table_{i} RENAME COLUMN a TO b;",
        "ALTER TABLE table_{i} ADD COLUMN status varchar(20) NOT NULL;",
        "ALTER TABLE table_{i} ADD COLUMN note text NOT NULL DEFAULT '';",
        "CREATE INDEX idx_{i} ON table_{i} (created_at);",
        "CREATE INDEX CONCURRENTLY idx_c_{i} ON table_{i} (updated_at);",
        "ALTER TABLE table_{i} ADD CONSTRAINT fk_{i} FOREIGN KEY (user_id) REFERENCES users (id);",
        "ALTER TABLE table_{i} ALTER COLUMN price TYPE numeric(12, 2);",
        "ALTER TABLE table_{i} ALTER COLUMN email SET NOT NULL;",
        "-- comment; with a terminator\nINSERT INTO audit VALUES ('a;b', $$x;y$$);",
    ];

    (0..num_statements)
        .map(|i| shapes[i % shapes.len()].replace("{i}", &i.to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn row_estimate(num_statements: usize) -> RowEstimate {
    (0..num_statements)
        .step_by(2)
        .map(|i| (format!("table_{}", i), (i as u64 + 1) * 100_000))
        .collect()
}

/// Benchmark tokenizing and splitting
fn bench_splitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("splitting");

    for size in [10, 100, 1000] {
        let sql = generate_migration(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &sql, |b, sql| {
            b.iter(|| {
                let file = MigrationFile::load("bench.sql", black_box(sql.as_str()), DialectConfig::Postgres)
                    .unwrap();
                black_box(file.statements().count())
            });
        });
    }

    group.finish();
}

/// Benchmark classification of an already split file
fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");
    let analyzer = Analyzer::default();

    for size in [10, 100, 1000] {
        let file = MigrationFile::load("bench.sql", generate_migration(size), DialectConfig::Postgres).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &file, |b, file| {
            b.iter(|| black_box(analyzer.operations(file)));
        });
    }

    group.finish();
}

/// Benchmark the full pipeline with and without row estimates
fn bench_analysis_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis_e2e");
    let analyzer = Analyzer::default();

    for size in [10, 100, 1000] {
        let sql = generate_migration(size);
        let rows = row_estimate(size);

        group.bench_with_input(BenchmarkId::new("no_rows", size), &sql, |b, sql| {
            b.iter(|| analyzer.analyze("bench.sql", black_box(sql), &RowEstimate::new()).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("with_rows", size), &sql, |b, sql| {
            b.iter(|| analyzer.analyze("bench.sql", black_box(sql), &rows).unwrap());
        });
    }

    group.finish();
}

/// Benchmark a batch of independent files
fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    let analyzer = Analyzer::default();

    for num_files in [10, 100] {
        let files: Vec<(String, String)> = (0..num_files)
            .map(|i| (format!("{:04}_migration.sql", i), generate_migration(20)))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(num_files), &files, |b, files| {
            b.iter(|| {
                let report = analyzer.analyze_batch(
                    files.iter().map(|(name, sql)| (name.as_str(), sql.as_str())),
                    &RowEstimate::new(),
                );
                black_box(report.summary.total)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_splitting,
    bench_classification,
    bench_analysis_end_to_end,
    bench_batch
);

criterion_main!(benches);
