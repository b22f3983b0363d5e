/// Correlation engine benchmarks
///
/// Measures the cost of classifying keys and folding a full category
/// matrix, the two hot paths of a correlation run over a long trace.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use minar::bitvec::BitVec;
use minar::pearson::pearson_matrix;
use minar::schema;

/// Classify a mixed bag of realistic keys
fn bench_classify(c: &mut Criterion) {
    let keys: Vec<Vec<u8>> = (0u32..1024)
        .map(|i| match i % 4 {
            0 => {
                let mut k = b"h".to_vec();
                k.extend_from_slice(&i.to_be_bytes());
                k
            }
            1 => {
                let mut k = b"a".to_vec();
                k.extend_from_slice(&i.to_be_bytes());
                k
            }
            2 => b"LastBlock".to_vec(),
            _ => i.to_be_bytes().to_vec(),
        })
        .collect();

    c.bench_function("classify_1024_keys", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(schema::classify(key));
            }
        });
    });
}

/// Fold a full category matrix over a 10k-event partition
fn bench_matrix(c: &mut Criterion) {
    let n = schema::categories().len();
    let len = 10_000;
    let mut vectors = vec![BitVec::new(); n];
    for (slot, vector) in vectors.iter_mut().enumerate() {
        let mut pos = slot;
        while pos < len {
            vector.set(pos);
            pos += slot + 1;
        }
    }

    let mut group = c.benchmark_group("pearson");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);
    group.bench_function("category_matrix_10k_events", |b| {
        b.iter(|| black_box(pearson_matrix(&vectors, len)));
    });
    group.finish();
}

criterion_group!(benches, bench_classify, bench_matrix);
criterion_main!(benches);
