//! Matrix groups: the set of arrays that persist one CSC matrix.
//!
//! A group `g` holds `g/data`, `g/indices`, `g/indptr` and `g/shape`
//! (`[rows, cols]`), optionally `g/features` / `g/barcodes` for row and
//! column labels, and `g/feature_type` for a per-row type tag. The member
//! names are configurable through [`GroupLayout`].

use cscflip_core::{FlipError, Result};

use crate::csc::CscMatrix;
use crate::store::{self, join, ArrayData, ArrayInit, ArrayStore};

/// Member names of a matrix group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLayout {
    pub data: String,
    pub indices: String,
    pub indptr: String,
    pub shape: String,
    /// Row labels.
    pub row_labels: String,
    /// Column labels.
    pub col_labels: String,
    /// Per-row type tag.
    pub row_type: String,
}

impl Default for GroupLayout {
    fn default() -> Self {
        Self {
            data: "data".into(),
            indices: "indices".into(),
            indptr: "indptr".into(),
            shape: "shape".into(),
            row_labels: "features".into(),
            col_labels: "barcodes".into(),
            row_type: "feature_type".into(),
        }
    }
}

/// Handle on a CSC matrix persisted in a store.
///
/// Opening only reads the `shape` array and array lengths; entries are
/// streamed on demand with ranged reads.
#[derive(Debug, Clone)]
pub struct MatrixGroup {
    name: String,
    layout: GroupLayout,
    n_rows: usize,
    n_cols: usize,
    nnz: u64,
}

impl MatrixGroup {
    /// Open the group `name`, checking that its structural arrays exist and
    /// have consistent lengths.
    pub fn open(store: &dyn ArrayStore, layout: &GroupLayout, name: &str) -> Result<Self> {
        if !store.exists(name) {
            return Err(FlipError::MissingInput(format!("group '{name}' not found")));
        }
        for member in [&layout.indptr, &layout.indices, &layout.data, &layout.shape] {
            let path = join(name, member);
            if !store.exists(&path) {
                return Err(FlipError::MissingInput(format!(
                    "group '{name}' has no '{member}' array"
                )));
            }
        }

        let shape_path = join(name, &layout.shape);
        let shape = store::read_all_i64(store, &shape_path)?;
        let (n_rows, n_cols) = match shape[..] {
            [r, c] if r >= 0 && c >= 0 => (r as usize, c as usize),
            _ => {
                return Err(FlipError::Malformed(format!(
                    "'{shape_path}' must hold two non-negative values, found {shape:?}"
                )))
            }
        };

        let indptr_len = store.len(&join(name, &layout.indptr))?;
        if indptr_len != n_cols as u64 + 1 {
            return Err(FlipError::Malformed(format!(
                "group '{name}': indptr length ({indptr_len}) must be cols + 1 ({})",
                n_cols + 1
            )));
        }
        let nnz = store.len(&join(name, &layout.data))?;
        let n_indices = store.len(&join(name, &layout.indices))?;
        if n_indices != nnz {
            return Err(FlipError::Malformed(format!(
                "group '{name}': indices ({n_indices}) and data ({nnz}) must have the same length"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            layout: layout.clone(),
            n_rows,
            n_cols,
            nnz,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(rows, cols)` as recorded in the `shape` array.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> u64 {
        self.nnz
    }

    pub fn data_path(&self) -> String {
        join(&self.name, &self.layout.data)
    }

    pub fn indices_path(&self) -> String {
        join(&self.name, &self.layout.indices)
    }

    pub fn indptr_path(&self) -> String {
        join(&self.name, &self.layout.indptr)
    }

    pub fn shape_path(&self) -> String {
        join(&self.name, &self.layout.shape)
    }

    pub fn row_labels_path(&self) -> String {
        join(&self.name, &self.layout.row_labels)
    }

    pub fn col_labels_path(&self) -> String {
        join(&self.name, &self.layout.col_labels)
    }

    /// Column pointers `indptr[range]`.
    pub fn read_indptr(&self, store: &dyn ArrayStore, range: std::ops::Range<u64>) -> Result<Vec<i64>> {
        store::read_i64(store, &self.indptr_path(), range)
    }

    /// Row indices and values of the entries in `range`.
    pub fn read_entries(
        &self,
        store: &dyn ArrayStore,
        range: std::ops::Range<u64>,
    ) -> Result<(Vec<i64>, Vec<f64>)> {
        let indices = store::read_i64(store, &self.indices_path(), range.clone())?;
        let data = store::read_f64(store, &self.data_path(), range)?;
        Ok((indices, data))
    }

    /// Load the whole matrix, checking its invariants.
    pub fn load(&self, store: &dyn ArrayStore) -> Result<CscMatrix> {
        let indptr = self.read_indptr(store, 0..self.n_cols as u64 + 1)?;
        let (indices, data) = self.read_entries(store, 0..self.nnz)?;
        CscMatrix::from_parts(self.n_rows, self.n_cols, indptr, indices, data)
    }
}

/// Write `matrix` as the group `name`, with optional row/column labels.
pub fn write_matrix_group(
    store: &dyn ArrayStore,
    layout: &GroupLayout,
    name: &str,
    matrix: &CscMatrix,
    row_labels: Option<&[String]>,
    col_labels: Option<&[String]>,
) -> Result<()> {
    let (n_rows, n_cols) = matrix.shape();
    let int = |v: Vec<i64>| ArrayInit::Data(ArrayData::Int64(v));

    store.create_or_replace(&join(name, &layout.indptr), int(matrix.indptr().to_vec()))?;
    store.create_or_replace(&join(name, &layout.indices), int(matrix.indices().to_vec()))?;
    store.create_or_replace(
        &join(name, &layout.data),
        ArrayInit::Data(ArrayData::Float64(matrix.data().to_vec())),
    )?;
    store.create_or_replace(
        &join(name, &layout.shape),
        int(vec![n_rows as i64, n_cols as i64]),
    )?;
    if let Some(labels) = row_labels {
        store.create_or_replace(
            &join(name, &layout.row_labels),
            ArrayInit::Data(ArrayData::String(labels.to_vec())),
        )?;
    }
    if let Some(labels) = col_labels {
        store.create_or_replace(
            &join(name, &layout.col_labels),
            ArrayInit::Data(ArrayData::String(labels.to_vec())),
        )?;
    }
    Ok(())
}
