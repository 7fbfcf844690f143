//! Streaming structural checks for stored CSC groups.
//!
//! Arrays are read `chunk_len` elements at a time, so validating a group
//! needs memory proportional to the chunk, not to the matrix.

use cscflip_core::{FlipError, Result};
use tracing::debug;

use crate::group::{GroupLayout, MatrixGroup};
use crate::store::{self, ArrayStore};

/// Check a source group against the CSC invariants.
///
/// Verifies that `indptr` starts at 0, never decreases and ends at the
/// entry count, that every row index lies in `[0, rows)`, and that label
/// arrays, when present, match the dimension they label.
pub fn validate_source(store: &dyn ArrayStore, group: &MatrixGroup, chunk_len: u64) -> Result<()> {
    let step = chunk_len.max(1);
    let (n_rows, n_cols) = group.shape();
    let name = group.name();

    let indptr_len = n_cols as u64 + 1;
    let mut prev: Option<i64> = None;
    let mut offset = 0;
    while offset < indptr_len {
        let end = (offset + step).min(indptr_len);
        let chunk = group.read_indptr(store, offset..end)?;
        for (k, &v) in chunk.iter().enumerate() {
            let pos = offset + k as u64;
            match prev {
                None if v != 0 => {
                    return Err(FlipError::Malformed(format!(
                        "group '{name}': indptr must start at 0, found {v}"
                    )))
                }
                Some(p) if v < p => {
                    return Err(FlipError::Malformed(format!(
                        "group '{name}': indptr decreases at position {pos} ({p} > {v})"
                    )))
                }
                _ => {}
            }
            prev = Some(v);
        }
        offset = end;
    }
    if prev != Some(group.nnz() as i64) {
        return Err(FlipError::Malformed(format!(
            "group '{name}': indptr ends at {} but nnz is {}",
            prev.unwrap_or(0),
            group.nnz()
        )));
    }

    let indices_path = group.indices_path();
    let mut offset = 0;
    while offset < group.nnz() {
        let end = (offset + step).min(group.nnz());
        let chunk = store::read_i64(store, &indices_path, offset..end)?;
        if let Some(k) = chunk
            .iter()
            .position(|&r| r < 0 || r as u64 >= n_rows as u64)
        {
            return Err(FlipError::Malformed(format!(
                "group '{name}': row index {} at position {} out of bounds for {n_rows} rows",
                chunk[k],
                offset + k as u64
            )));
        }
        offset = end;
    }

    for (path, expected, what) in [
        (group.row_labels_path(), n_rows, "row"),
        (group.col_labels_path(), n_cols, "column"),
    ] {
        if store.exists(&path) {
            let len = store.len(&path)?;
            if len != expected as u64 {
                return Err(FlipError::Malformed(format!(
                    "'{path}' holds {len} {what} labels, expected {expected}"
                )));
            }
        }
    }

    debug!(group = name, rows = n_rows, cols = n_cols, nnz = group.nnz(), "source validated");
    Ok(())
}

/// Whether the group `name` holds a completely written matrix.
///
/// A run that fails part way leaves the output half-written: some member
/// arrays may be missing (the shape is written last) or the pointer array
/// may not yet account for every stored value. Any of these yields
/// `Ok(false)`; only a missing group is an error.
pub fn check_complete(store: &dyn ArrayStore, layout: &GroupLayout, name: &str) -> Result<bool> {
    if !store.exists(name) {
        return Err(FlipError::MissingInput(format!("group '{name}' not found")));
    }
    let path = |member: &str| store::join(name, member);
    for member in [&layout.indptr, &layout.indices, &layout.data, &layout.shape] {
        if !store.exists(&path(member)) {
            debug!(group = name, member = member.as_str(), "member missing, group incomplete");
            return Ok(false);
        }
    }

    let shape = store::read_all_i64(store, &path(&layout.shape))?;
    let n_cols = match shape[..] {
        [r, c] if r >= 0 && c >= 0 => c as u64,
        _ => return Ok(false),
    };
    let nnz = store.len(&path(&layout.data))?;
    if store.len(&path(&layout.indptr))? != n_cols + 1
        || store.len(&path(&layout.indices))? != nnz
    {
        return Ok(false);
    }
    let last = store::read_i64(store, &path(&layout.indptr), n_cols..n_cols + 1)?;
    Ok(last.first().copied() == Some(nnz as i64))
}
