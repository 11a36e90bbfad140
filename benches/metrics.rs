//! Benchmarks for confusion-matrix metrics and pair generation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ovo_trainer::metrics::{compute_metrics, render_matrix_graph, ConfusionMatrix};
use ovo_trainer::pairs::{generate_pairs, ClassLabel};

fn create_labels(n: usize) -> Vec<ClassLabel> {
    (0..n).map(|i| ClassLabel::new(format!("class_{i:03}"))).collect()
}

fn create_matrix(labels: &[ClassLabel]) -> ConfusionMatrix {
    let mut matrix = ConfusionMatrix::with_labels(labels.iter().cloned());
    for (i, actual) in labels.iter().enumerate() {
        for (j, predicted) in labels.iter().enumerate() {
            let count = if i == j { 50 } else { ((i * 7 + j * 3) % 5) as u64 };
            matrix.add(actual, predicted, count);
        }
    }
    matrix
}

fn benchmark_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("confusion_matrix");

    for size in &[2, 10, 50] {
        let matrix = create_matrix(&create_labels(*size));

        group.bench_function(format!("compute_metrics_{size}_classes"), |b| {
            b.iter(|| compute_metrics(black_box(&matrix)));
        });
        group.bench_function(format!("render_{size}_classes"), |b| {
            b.iter(|| render_matrix_graph(black_box(&matrix)));
        });
    }

    group.finish();
}

fn benchmark_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_generation");

    for size in &[10, 100] {
        let labels = create_labels(*size);

        group.bench_function(format!("generate_{size}_labels"), |b| {
            b.iter(|| generate_pairs(black_box(&labels)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_metrics, benchmark_pairs);
criterion_main!(benches);
