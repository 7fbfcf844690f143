//! End-to-end transpose of a matrix group.
//!
//! [`run`] drives the phases in order against any [`ArrayStore`]:
//!
//! 1. optional normalization of raw counts into the source group
//! 2. validation of the source arrays
//! 3. staging of per-window transposed blocks
//! 4. reassembly of the staged blocks into the output group
//! 5. label swap, shape and row type tag
//! 6. replication of the raw companion, if present
//!
//! The staging area is removed once reassembly completes, and on every
//! error path. A failed run may leave the output group half-written; use
//! [`check_complete`] before trusting an output.

use std::time::{Duration, Instant};

use cscflip_core::{FlipError, Result, Summarizable};
use tracing::{info, warn};

use crate::companion::replicate_companion;
use crate::group::{GroupLayout, MatrixGroup};
use crate::metadata::swap_metadata;
use crate::normalize::{normalize_from_raw, NormalizeConfig};
use crate::reassemble::reassemble;
use crate::stage::{stage_blocks, StagingArea};
use crate::store::ArrayStore;
use crate::validate::validate_source;
use crate::window::BlockPlanner;

pub use crate::validate::check_complete;

/// Configuration for a transpose run.
#[derive(Debug, Clone)]
pub struct TransposeConfig {
    /// Number of windows per dimension; controls peak memory.
    pub partition_count: usize,
    /// Group holding the matrix to transpose.
    pub source: String,
    /// Group receiving the transpose.
    pub output: String,
    /// Raw-count companion of the source.
    pub raw: String,
    /// Where the raw companion is replicated to.
    pub raw_output: String,
    /// Value of every entry of the output row type array.
    pub feature_type: String,
    pub layout: GroupLayout,
    /// Elements per streamed chunk when copying or validating arrays.
    pub chunk_len: u64,
    /// Run [`validate_source`] before transposing.
    pub validate: bool,
    /// Derive a missing source group by log-normalizing the raw companion.
    pub normalize_from_raw: bool,
}

impl Default for TransposeConfig {
    fn default() -> Self {
        Self {
            partition_count: 10,
            source: "normalizedT".into(),
            output: "normalized".into(),
            raw: "countsT".into(),
            raw_output: "counts".into(),
            feature_type: "RNA".into(),
            layout: GroupLayout::default(),
            chunk_len: 1 << 20,
            validate: true,
            normalize_from_raw: false,
        }
    }
}

/// Wall-clock time spent in each phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    pub normalize: Duration,
    pub validate: Duration,
    pub stage: Duration,
    pub reassemble: Duration,
    pub metadata: Duration,
    pub companion: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.normalize + self.validate + self.stage + self.reassemble + self.metadata + self.companion
    }
}

/// Outcome of a transpose run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransposeReport {
    pub source: String,
    pub output: String,
    /// Shape of the output, `[source cols, source rows]`.
    pub shape: (usize, usize),
    /// Entries in the output after duplicates were merged.
    pub nnz: u64,
    /// Entries in the source.
    pub source_nnz: u64,
    pub staged_blocks: usize,
    pub output_windows: usize,
    pub normalized_from_raw: bool,
    pub companion_written: bool,
    pub timings: PhaseTimings,
}

impl Summarizable for TransposeReport {
    fn summary(&self) -> String {
        format!(
            "{} -> {}: {}\u{00d7}{}, {} nonzeros, {} staged blocks, {} windows, companion {}, {:.2?}",
            self.source,
            self.output,
            self.shape.0,
            self.shape.1,
            self.nnz,
            self.staged_blocks,
            self.output_windows,
            if self.companion_written { "copied" } else { "absent" },
            self.timings.total()
        )
    }
}

fn timed<T>(slot: &mut Duration, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let out = f();
    *slot = start.elapsed();
    out
}

/// Transpose `config.source` into `config.output` inside `store`.
pub fn run(store: &dyn ArrayStore, config: &TransposeConfig) -> Result<TransposeReport> {
    if config.partition_count == 0 {
        return Err(FlipError::InvalidInput("partition count must be at least 1".into()));
    }
    let groups = [
        ("source", &config.source),
        ("output", &config.output),
        ("raw", &config.raw),
        ("raw output", &config.raw_output),
    ];
    for (i, (a, a_name)) in groups.iter().enumerate() {
        if let Some((b, _)) = groups[i + 1..].iter().find(|(_, b_name)| b_name == a_name) {
            return Err(FlipError::InvalidInput(format!(
                "{a} and {b} groups must differ (both '{a_name}')"
            )));
        }
    }
    let layout = &config.layout;
    let mut timings = PhaseTimings::default();

    let normalized = config.normalize_from_raw
        && !store.exists(&config.source)
        && store.exists(&config.raw);
    if normalized {
        timed(&mut timings.normalize, || {
            let raw = MatrixGroup::open(store, layout, &config.raw)?;
            info!(raw = %config.raw, source = %config.source, "source missing, normalizing raw counts");
            normalize_from_raw(
                store,
                &raw,
                layout,
                &config.source,
                &NormalizeConfig::default(),
                config.chunk_len,
            )
        })?;
    }

    let source = MatrixGroup::open(store, layout, &config.source)?;
    let (n, m) = source.shape();
    info!(
        source = %config.source,
        rows = n,
        cols = m,
        nnz = source.nnz(),
        partitions = config.partition_count,
        "transposing"
    );

    if config.validate {
        timed(&mut timings.validate, || {
            validate_source(store, &source, config.chunk_len)
        })?;
    }

    for labels in [source.row_labels_path(), source.col_labels_path()] {
        if !store.exists(&labels) {
            return Err(FlipError::MissingInput(format!("label array '{labels}' not found")));
        }
    }

    let rows = BlockPlanner::new(m, config.partition_count)?;
    let cols = BlockPlanner::new(n, config.partition_count)?;

    if store.exists(&config.output) {
        warn!(output = %config.output, "replacing existing output group");
        store.delete(&config.output)?;
    }

    let staging = StagingArea::create(store)?;
    let staged = timed(&mut timings.stage, || {
        stage_blocks(store, &source, &staging, &rows)
    })?;
    info!(blocks = rows.len(), nnz = staged, elapsed = ?timings.stage, "phase 1 complete");

    let out = timed(&mut timings.reassemble, || {
        reassemble(store, &staging, layout, &config.output, &rows, &cols)
    })?;
    staging.release()?;
    info!(
        windows = out.windows,
        rows = out.n_rows,
        cols = out.n_cols,
        nnz = out.nnz,
        elapsed = ?timings.reassemble,
        "phase 2 complete"
    );

    timed(&mut timings.metadata, || {
        swap_metadata(
            store,
            &source,
            layout,
            &config.output,
            &config.feature_type,
            config.chunk_len,
        )
    })?;

    let companion_written = timed(&mut timings.companion, || {
        replicate_companion(store, layout, &config.raw, &config.raw_output, config.chunk_len)
    })?;

    let report = TransposeReport {
        source: config.source.clone(),
        output: config.output.clone(),
        shape: (out.n_rows, out.n_cols),
        nnz: out.nnz,
        source_nnz: source.nnz(),
        staged_blocks: rows.len(),
        output_windows: out.windows,
        normalized_from_raw: normalized,
        companion_written,
        timings,
    };
    info!("{}", report.summary());
    Ok(report)
}

/// Transpose the default groups of the Zarr store at `path`.
#[cfg(feature = "zarr")]
pub fn transpose_store<P: AsRef<std::path::Path>>(
    path: P,
    partition_count: usize,
) -> Result<TransposeReport> {
    let config = TransposeConfig {
        partition_count,
        ..TransposeConfig::default()
    };
    let store = crate::store::ZarrStore::open(path)?.with_chunk_len(config.chunk_len);
    run(&store, &config)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::csc::CscMatrix;
    use crate::group::write_matrix_group;
    use crate::store::MemoryStore;
    use proptest::prelude::*;

    /// Triplets with possible duplicates, stored without canonicalization.
    fn arb_raw_csc() -> impl Strategy<Value = CscMatrix> {
        (1..9usize, 1..9usize).prop_flat_map(|(n_rows, n_cols)| {
            proptest::collection::vec((0..n_rows, 0..n_cols, 1..20i32), 0..30).prop_map(
                move |mut entries| {
                    entries.sort_by_key(|e| e.1);
                    let mut indptr = vec![0i64; n_cols + 1];
                    for e in &entries {
                        indptr[e.1 + 1] += 1;
                    }
                    for c in 0..n_cols {
                        indptr[c + 1] += indptr[c];
                    }
                    let indices = entries.iter().map(|e| e.0 as i64).collect();
                    let data = entries.iter().map(|e| e.2 as f64).collect();
                    CscMatrix::from_parts(n_rows, n_cols, indptr, indices, data).unwrap()
                },
            )
        })
    }

    fn dense_transpose(m: &CscMatrix) -> Vec<Vec<f64>> {
        let (r, c) = m.shape();
        let mut out = vec![vec![0.0; r]; c];
        for (row, col, v) in m.iter() {
            out[col][row] += v;
        }
        out
    }

    proptest! {
        #[test]
        fn matches_dense_reference(m in arb_raw_csc(), parts in 1..10usize) {
            let store = MemoryStore::new();
            let layout = GroupLayout::default();
            let cells: Vec<String> = (0..m.shape().0).map(|i| format!("cell{i}")).collect();
            let genes: Vec<String> = (0..m.shape().1).map(|i| format!("gene{i}")).collect();
            write_matrix_group(&store, &layout, "normalizedT", &m, Some(&cells), Some(&genes)).unwrap();
            let cfg = TransposeConfig { partition_count: parts, chunk_len: 3, ..TransposeConfig::default() };
            let report = run(&store, &cfg).unwrap();

            let out = MatrixGroup::open(&store, &layout, "normalized").unwrap().load(&store).unwrap();
            prop_assert_eq!(out.shape(), (m.shape().1, m.shape().0));
            prop_assert_eq!(out.to_dense(), dense_transpose(&m));
            prop_assert!(report.nnz <= report.source_nnz);
            for c in 0..out.shape().1 {
                let rows: Vec<usize> = out.column(c).map(|(r, _)| r).collect();
                prop_assert!(rows.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
