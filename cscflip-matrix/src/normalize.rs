//! Log-normalization of raw counts into a source group.
//!
//! Used when only raw counts were written: every row (cell) is scaled to
//! `target_sum` total counts and then `log1p`-transformed. Both passes
//! stream the entry arrays in chunks; only the per-row sums are held in
//! memory.

use cscflip_core::{FlipError, Result};
use tracing::info;

use crate::group::{GroupLayout, MatrixGroup};
use crate::store::{copy_array, join, ArrayData, ArrayInit, ArrayStore, DType};

/// Configuration for total-count normalization.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Target sum per row after scaling.
    pub target_sum: f64,
    /// Whether to apply `ln(x + 1)` after scaling.
    pub log_transform: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_sum: 1e4,
            log_transform: true,
        }
    }
}

/// Write the normalized copy of `raw` as group `output`.
///
/// Index, pointer, shape and label arrays are copied unchanged; only `data`
/// is transformed. Rows whose entries sum to zero are left as they are.
pub fn normalize_from_raw(
    store: &dyn ArrayStore,
    raw: &MatrixGroup,
    layout: &GroupLayout,
    output: &str,
    config: &NormalizeConfig,
    chunk_len: u64,
) -> Result<()> {
    if config.target_sum.is_nan() || config.target_sum <= 0.0 {
        return Err(FlipError::InvalidInput(format!(
            "target sum must be positive, got {}",
            config.target_sum
        )));
    }
    let step = chunk_len.max(1);
    let (n_rows, _) = raw.shape();
    let nnz = raw.nnz();

    // Pass 1: row sums.
    let mut row_sums = vec![0.0f64; n_rows];
    let mut offset = 0;
    while offset < nnz {
        let end = (offset + step).min(nnz);
        let (indices, data) = raw.read_entries(store, offset..end)?;
        for (&r, &v) in indices.iter().zip(&data) {
            let sum = row_sums.get_mut(r as usize).ok_or_else(|| {
                FlipError::Malformed(format!(
                    "group '{}': row index {r} out of bounds for {n_rows} rows",
                    raw.name()
                ))
            })?;
            *sum += v;
        }
        offset = end;
    }
    let factors: Vec<Option<f64>> = row_sums
        .iter()
        .map(|&s| (s != 0.0).then(|| config.target_sum / s))
        .collect();

    // Pass 2: transform.
    let data_path = join(output, &layout.data);
    store.create_or_replace(&data_path, ArrayInit::Empty { dtype: DType::Float64, len: nnz })?;
    let mut offset = 0;
    while offset < nnz {
        let end = (offset + step).min(nnz);
        let (indices, mut data) = raw.read_entries(store, offset..end)?;
        for (v, &r) in data.iter_mut().zip(&indices) {
            if let Some(f) = factors[r as usize] {
                *v *= f;
                if config.log_transform {
                    *v = v.ln_1p();
                }
            }
        }
        store.write_at(&data_path, offset, &ArrayData::Float64(data))?;
        offset = end;
    }

    for (from, member) in [
        (raw.indices_path(), &layout.indices),
        (raw.indptr_path(), &layout.indptr),
        (raw.shape_path(), &layout.shape),
        (raw.row_labels_path(), &layout.row_labels),
        (raw.col_labels_path(), &layout.col_labels),
    ] {
        if store.exists(&from) {
            copy_array(store, &from, &join(output, member), step)?;
        }
    }

    let empty_rows = row_sums.iter().filter(|&&s| s == 0.0).count();
    info!(raw = raw.name(), output, nnz, empty_rows, "normalized raw counts");
    Ok(())
}
