use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cscflip_matrix::{run, write_matrix_group, CscMatrix, GroupLayout, MemoryStore, TransposeConfig};

/// Random count matrix with roughly `density` of its cells filled.
fn random_csc(rows: usize, cols: usize, density: f64, seed: u64) -> CscMatrix {
    let mut state = seed;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let (mut r, mut c, mut v) = (Vec::new(), Vec::new(), Vec::new());
    for col in 0..cols {
        for row in 0..rows {
            if next() < density {
                r.push(row);
                c.push(col);
                v.push((next() * 20.0).floor() + 1.0);
            }
        }
    }
    CscMatrix::from_triplets(&r, &c, &v, rows, cols).unwrap()
}

fn seeded_store(m: &CscMatrix) -> MemoryStore {
    let store = MemoryStore::new();
    let (rows, cols) = m.shape();
    let cells: Vec<String> = (0..rows).map(|i| format!("cell{i}")).collect();
    let genes: Vec<String> = (0..cols).map(|i| format!("gene{i}")).collect();
    write_matrix_group(&store, &GroupLayout::default(), "normalizedT", m, Some(&cells), Some(&genes))
        .unwrap();
    store
}

fn bench_in_memory_transpose(c: &mut Criterion) {
    let mut group = c.benchmark_group("csc_transpose");

    let m = random_csc(2_000, 1_000, 0.05, 42);
    group.bench_function("2k_x_1k_5pct", |b| b.iter(|| black_box(&m).transpose()));

    group.finish();
}

fn bench_block_transpose(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_transpose");
    group.sample_size(20);

    let m = random_csc(2_000, 1_000, 0.05, 42);
    for parts in [1, 8, 32] {
        let config = TransposeConfig {
            partition_count: parts,
            chunk_len: 1 << 14,
            ..TransposeConfig::default()
        };
        group.bench_function(format!("2k_x_1k_{parts}_parts"), |b| {
            b.iter_with_setup(|| seeded_store(&m), |store| run(&store, black_box(&config)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_in_memory_transpose, bench_block_transpose);
criterion_main!(benches);
