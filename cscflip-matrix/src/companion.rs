//! Replication of the raw-count companion group.

use cscflip_core::{FlipError, Result};
use tracing::{debug, info};

use crate::group::GroupLayout;
use crate::store::{copy_array, join, ArrayStore};

/// Copy the structural arrays of the raw group `raw` to `output`, unchanged.
///
/// `indptr`, `indices` and `shape` must be present; `data` and both label
/// arrays are copied when they exist. Nothing is recomputed. Returns
/// `Ok(false)` without writing anything when `raw` does not exist.
pub fn replicate_companion(
    store: &dyn ArrayStore,
    layout: &GroupLayout,
    raw: &str,
    output: &str,
    chunk_len: u64,
) -> Result<bool> {
    if !store.exists(raw) {
        debug!(raw, "no raw companion, skipping");
        return Ok(false);
    }

    let required = [&layout.indptr, &layout.indices, &layout.shape];
    for member in required {
        if !store.exists(&join(raw, member)) {
            return Err(FlipError::MissingInput(format!(
                "raw companion '{raw}' has no '{member}' array"
            )));
        }
    }

    let optional = [&layout.data, &layout.row_labels, &layout.col_labels];
    for member in required.into_iter().chain(optional) {
        let from = join(raw, member);
        if store.exists(&from) {
            copy_array(store, &from, &join(output, member), chunk_len)?;
        }
    }

    info!(raw, output, "replicated raw companion");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csc::CscMatrix;
    use crate::group::write_matrix_group;
    use crate::store::MemoryStore;

    #[test]
    fn present_companion_copied_verbatim() {
        let store = MemoryStore::new();
        let layout = GroupLayout::default();
        let m = CscMatrix::from_parts(2, 3, vec![0, 1, 1, 3], vec![1, 0, 1], vec![4.0, 1.0, 7.0])
            .unwrap();
        let cells: Vec<String> = vec!["AAAC-1".into(), "AAAG-1".into()];
        let genes: Vec<String> = vec!["CD3E".into(), "MS4A1".into(), "NKG7".into()];
        write_matrix_group(&store, &layout, "countsT", &m, Some(&cells), Some(&genes)).unwrap();

        assert!(replicate_companion(&store, &layout, "countsT", "counts", 2).unwrap());
        for member in ["indptr", "indices", "data", "shape", "features", "barcodes"] {
            assert_eq!(
                store.read_all(&format!("counts/{member}")).unwrap(),
                store.read_all(&format!("countsT/{member}")).unwrap(),
                "{member}"
            );
        }
        assert!(!store.exists("counts/feature_type"));
    }

    #[test]
    fn absent_companion_skipped() {
        let store = MemoryStore::new();
        let layout = GroupLayout::default();
        assert!(!replicate_companion(&store, &layout, "countsT", "counts", 2).unwrap());
        assert!(!store.exists("counts"));
    }

    #[test]
    fn incomplete_companion_rejected() {
        let store = MemoryStore::new();
        let layout = GroupLayout::default();
        write_matrix_group(&store, &layout, "countsT", &CscMatrix::new(1, 1), None, None).unwrap();
        store.delete("countsT/indices").unwrap();
        assert!(matches!(
            replicate_companion(&store, &layout, "countsT", "counts", 2),
            Err(FlipError::MissingInput(_))
        ));
    }
}
