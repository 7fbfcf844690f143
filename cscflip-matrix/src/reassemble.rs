//! Phase 2: stream staged blocks into the final CSC arrays.
//!
//! Output columns are processed one window at a time. For a window `[i, i + p)`
//! each staged block contributes the rows it owns; stacking the
//! contributions in key order yields output columns `[i, i + p)` in full,
//! which are appended to the output arrays at a running offset.

use cscflip_core::{FlipError, Result};
use tracing::debug;

use crate::csc::CscMatrix;
use crate::store::{join, ArrayData, ArrayInit, ArrayStore, DType};
use crate::group::GroupLayout;
use crate::stage::StagingArea;
use crate::window::{mask_indptr, BlockPlanner, Window};

/// Shape and size of a reassembled matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reassembled {
    pub n_rows: usize,
    pub n_cols: usize,
    pub nnz: u64,
    /// Number of output column windows processed.
    pub windows: usize,
}

/// Write the final `data`, `indices` and `indptr` arrays of group `output`.
///
/// `rows` is the planner used to stage the blocks (over the output row
/// dimension) and `cols` tiles the output columns. The final shape is
/// `[rows.dim(), cols.dim()]`; persisting it is left to the metadata step.
pub fn reassemble(
    store: &dyn ArrayStore,
    staging: &StagingArea<'_>,
    layout: &GroupLayout,
    output: &str,
    rows: &BlockPlanner,
    cols: &BlockPlanner,
) -> Result<Reassembled> {
    let (n_rows, n_cols) = (rows.dim(), cols.dim());

    let keys = staging.keys()?;
    let expected: Vec<usize> = rows.windows().map(|w| w.start).collect();
    if keys != expected {
        return Err(FlipError::Malformed(format!(
            "staging area holds blocks {keys:?}, expected {expected:?}"
        )));
    }
    let blocks = keys
        .iter()
        .map(|&k| staging.block(k))
        .collect::<Result<Vec<_>>>()?;
    for (key, block) in keys.iter().zip(&blocks) {
        if block.shape() != (n_rows, n_cols) {
            return Err(FlipError::Malformed(format!(
                "staged block {key} has shape {:?}, expected ({n_rows}, {n_cols})",
                block.shape()
            )));
        }
    }
    let total: u64 = blocks.iter().map(|b| b.nnz()).sum();

    let data_path = join(output, &layout.data);
    let indices_path = join(output, &layout.indices);
    let indptr_path = join(output, &layout.indptr);
    store.create_or_replace(&data_path, ArrayInit::Empty { dtype: DType::Float64, len: total })?;
    store.create_or_replace(&indices_path, ArrayInit::Empty { dtype: DType::Int64, len: total })?;
    store.create_or_replace(
        &indptr_path,
        ArrayInit::Empty { dtype: DType::Int64, len: n_cols as u64 + 1 },
    )?;

    let mut ptr = 0u64;
    let mut windows = 0usize;
    for w in cols.windows() {
        let (i, p) = (w.start, w.width);
        let mut parts = Vec::with_capacity(blocks.len());
        for (&j, block) in keys.iter().zip(&blocks) {
            let segment = block.read_indptr(store, i as u64..(i + p) as u64 + 1)?;
            let l = segment[0];
            let r = segment[p];
            let (indices, data) = block.read_entries(store, l as u64..r as u64)?;
            let part = CscMatrix::from_parts_unchecked(
                n_rows,
                p,
                mask_indptr(&segment, Window::new(0, p)),
                indices,
                data,
            );
            parts.push(part.shift_rows(j as i64, rows.width_at(j))?);
        }

        let stacked = CscMatrix::vstack(&parts, p)?;
        if stacked.shape().0 != n_rows {
            return Err(FlipError::Malformed(format!(
                "staged blocks cover {} rows, expected {n_rows}",
                stacked.shape().0
            )));
        }
        let nnz = stacked.nnz() as u64;
        let (local, indices, data) = stacked.into_parts();

        store.write_at(&data_path, ptr, &ArrayData::Float64(data))?;
        store.write_at(&indices_path, ptr, &ArrayData::Int64(indices))?;
        let shifted: Vec<i64> = local[..p].iter().map(|&v| v + ptr as i64).collect();
        store.write_at(&indptr_path, i as u64, &ArrayData::Int64(shifted))?;

        debug!(start = i, width = p, nnz, offset = ptr, "reassembled window");
        ptr += nnz;
        windows += 1;
    }

    if ptr != total {
        return Err(FlipError::Malformed(format!(
            "reassembled {ptr} entries but {total} were staged"
        )));
    }
    store.write_at(&indptr_path, n_cols as u64, &ArrayData::Int64(vec![ptr as i64]))?;

    Ok(Reassembled {
        n_rows,
        n_cols,
        nnz: ptr,
        windows,
    })
}
