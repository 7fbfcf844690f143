//! Label swap, final shape and row type tag for the transposed group.

use cscflip_core::{FlipError, Result};
use tracing::debug;

use crate::group::{GroupLayout, MatrixGroup};
use crate::store::{copy_array, join, ArrayData, ArrayInit, ArrayStore, DType};

/// Finish the metadata of `output`, the transpose of `source`.
///
/// Source row labels become output column labels and vice versa, the row
/// type array is filled with `row_type` for every output row, and the shape
/// `[cols, rows]` of the source is recorded last, so a group without a
/// shape array is never mistaken for a finished one. Arrays are copied in
/// `chunk_len`-element pieces.
///
/// Both source label arrays must exist; a missing one is a
/// [`FlipError::MissingInput`].
pub fn swap_metadata(
    store: &dyn ArrayStore,
    source: &MatrixGroup,
    layout: &GroupLayout,
    output: &str,
    row_type: &str,
    chunk_len: u64,
) -> Result<()> {
    let (src_rows, src_cols) = source.shape();
    let (n_rows, n_cols) = (src_cols, src_rows);

    for (from, to) in [
        (source.row_labels_path(), join(output, &layout.col_labels)),
        (source.col_labels_path(), join(output, &layout.row_labels)),
    ] {
        if !store.exists(&from) {
            return Err(FlipError::MissingInput(format!("label array '{from}' not found")));
        }
        copy_array(store, &from, &to, chunk_len)?;
    }

    let type_path = join(output, &layout.row_type);
    let len = n_rows as u64;
    store.create_or_replace(&type_path, ArrayInit::Empty { dtype: DType::String, len })?;
    let step = chunk_len.max(1);
    let mut offset = 0;
    while offset < len {
        let end = (offset + step).min(len);
        let tags = vec![row_type.to_string(); (end - offset) as usize];
        store.write_at(&type_path, offset, &ArrayData::String(tags))?;
        offset = end;
    }

    store.create_or_replace(
        &join(output, &layout.shape),
        ArrayInit::Data(ArrayData::Int64(vec![n_rows as i64, n_cols as i64])),
    )?;

    debug!(output, rows = n_rows, cols = n_cols, row_type, "metadata written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csc::CscMatrix;
    use crate::group::write_matrix_group;
    use crate::store::{read_all_i64, read_all_strings, MemoryStore};

    fn labels(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn labels_swap_and_tag_fills_rows() {
        let store = MemoryStore::new();
        let layout = GroupLayout::default();
        let cells = labels("cell", 3);
        let genes = labels("gene", 4);
        write_matrix_group(&store, &layout, "src", &CscMatrix::new(3, 4), Some(&cells), Some(&genes))
            .unwrap();
        let src = MatrixGroup::open(&store, &layout, "src").unwrap();

        swap_metadata(&store, &src, &layout, "out", "RNA", 3).unwrap();

        assert_eq!(read_all_strings(&store, "out/features").unwrap(), genes);
        assert_eq!(read_all_strings(&store, "out/barcodes").unwrap(), cells);
        assert_eq!(read_all_i64(&store, "out/shape").unwrap(), vec![4, 3]);
        assert_eq!(
            read_all_strings(&store, "out/feature_type").unwrap(),
            vec!["RNA".to_string(); 4]
        );
        // source untouched
        assert_eq!(read_all_strings(&store, "src/features").unwrap(), cells);
    }

    #[test]
    fn missing_labels_rejected() {
        let store = MemoryStore::new();
        let layout = GroupLayout::default();
        let cells = labels("cell", 2);
        write_matrix_group(&store, &layout, "src", &CscMatrix::new(2, 0), Some(&cells), None).unwrap();
        let src = MatrixGroup::open(&store, &layout, "src").unwrap();

        let err = swap_metadata(&store, &src, &layout, "out", "ADT", 8).unwrap_err();
        assert!(matches!(err, FlipError::MissingInput(_)));
        assert!(err.to_string().contains("src/barcodes"), "{err}");
        assert!(!store.exists("out/shape"));
        assert!(!store.exists("out/feature_type"));
    }

    #[test]
    fn empty_matrix_keeps_labels() {
        let store = MemoryStore::new();
        let layout = GroupLayout::default();
        let cells = labels("cell", 2);
        let genes = labels("gene", 0);
        write_matrix_group(&store, &layout, "src", &CscMatrix::new(2, 0), Some(&cells), Some(&genes))
            .unwrap();
        let src = MatrixGroup::open(&store, &layout, "src").unwrap();

        swap_metadata(&store, &src, &layout, "out", "ADT", 8).unwrap();
        assert_eq!(read_all_strings(&store, "out/barcodes").unwrap(), cells);
        assert_eq!(store.len("out/features").unwrap(), 0);
        assert_eq!(read_all_i64(&store, "out/shape").unwrap(), vec![0, 2]);
        assert_eq!(store.len("out/feature_type").unwrap(), 0);
    }
}
