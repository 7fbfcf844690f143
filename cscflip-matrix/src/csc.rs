//! Compressed-sparse-column (CSC) matrix.
//!
//! [`CscMatrix`] mirrors the on-disk layout of a matrix group: `indptr` holds
//! per-column start offsets, `indices` holds row positions and `data` holds
//! values. Pointers and indices are kept as `i64`, the element type they are
//! persisted with, so blocks move between the store and memory without
//! conversion.
//!
//! Entries within a column are not required to be sorted or unique.
//! [`CscMatrix::transpose`] canonicalizes its output: row indices ascend within
//! every column and duplicate `(row, col)` pairs are summed.

use cscflip_core::{FlipError, Result, Summarizable};

/// A sparse matrix in CSC format with `i64` pointers/indices and `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<i64>,
    indices: Vec<i64>,
    data: Vec<f64>,
}

impl CscMatrix {
    /// Create an empty matrix with the given dimensions.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            indptr: vec![0; n_cols + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Build a matrix from raw CSC arrays, checking the structural invariants.
    ///
    /// Row indices may be unsorted and may repeat within a column.
    pub fn from_parts(
        n_rows: usize,
        n_cols: usize,
        indptr: Vec<i64>,
        indices: Vec<i64>,
        data: Vec<f64>,
    ) -> Result<Self> {
        if indptr.len() != n_cols + 1 {
            return Err(FlipError::Malformed(format!(
                "indptr length ({}) must be n_cols + 1 ({})",
                indptr.len(),
                n_cols + 1
            )));
        }
        if indices.len() != data.len() {
            return Err(FlipError::Malformed(format!(
                "indices ({}) and data ({}) must have the same length",
                indices.len(),
                data.len()
            )));
        }
        if indptr[0] != 0 {
            return Err(FlipError::Malformed(format!(
                "indptr must start at 0, found {}",
                indptr[0]
            )));
        }
        for (col, pair) in indptr.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(FlipError::Malformed(format!(
                    "indptr decreases at column {col} ({} > {})",
                    pair[0], pair[1]
                )));
            }
        }
        let nnz = data.len() as i64;
        if indptr[n_cols] != nnz {
            return Err(FlipError::Malformed(format!(
                "indptr ends at {} but nnz is {nnz}",
                indptr[n_cols]
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&r| r < 0 || r as u64 >= n_rows as u64) {
            return Err(FlipError::Malformed(format!(
                "row index {bad} out of bounds for n_rows={n_rows}"
            )));
        }
        Ok(Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        })
    }

    /// Build a matrix from raw CSC arrays without any checks.
    ///
    /// The caller guarantees the invariants that [`CscMatrix::from_parts`]
    /// would otherwise verify.
    pub fn from_parts_unchecked(
        n_rows: usize,
        n_cols: usize,
        indptr: Vec<i64>,
        indices: Vec<i64>,
        data: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(indptr.len(), n_cols + 1);
        debug_assert_eq!(indices.len(), data.len());
        Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        }
    }

    /// Build a canonical matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate coordinates are summed.
    pub fn from_triplets(
        rows: &[usize],
        cols: &[usize],
        values: &[f64],
        n_rows: usize,
        n_cols: usize,
    ) -> Result<Self> {
        if rows.len() != cols.len() || cols.len() != values.len() {
            return Err(FlipError::InvalidInput(
                "rows, cols, and values must have the same length".into(),
            ));
        }
        for (i, (&r, &c)) in rows.iter().zip(cols).enumerate() {
            if r >= n_rows || c >= n_cols {
                return Err(FlipError::InvalidInput(format!(
                    "triplet {i} index ({r}, {c}) out of bounds for ({n_rows}, {n_cols})"
                )));
            }
        }

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by_key(|&i| (cols[i], rows[i]));

        let mut indptr = vec![0i64; n_cols + 1];
        let mut indices = Vec::with_capacity(values.len());
        let mut data = Vec::with_capacity(values.len());
        for &i in &order {
            indptr[cols[i] + 1] += 1;
            indices.push(rows[i] as i64);
            data.push(values[i]);
        }
        for c in 0..n_cols {
            indptr[c + 1] += indptr[c];
        }

        let mut m = Self::from_parts_unchecked(n_rows, n_cols, indptr, indices, data);
        m.sum_duplicates();
        Ok(m)
    }

    /// (n_rows, n_cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Fraction of entries that are stored: `nnz / (n_rows * n_cols)`.
    pub fn density(&self) -> f64 {
        let total = self.n_rows as f64 * self.n_cols as f64;
        if total == 0.0 {
            return 0.0;
        }
        self.data.len() as f64 / total
    }

    /// Column pointer array (length `n_cols + 1`).
    pub fn indptr(&self) -> &[i64] {
        &self.indptr
    }

    /// Row index of every stored entry.
    pub fn indices(&self) -> &[i64] {
        &self.indices
    }

    /// Value of every stored entry.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Consume the matrix and return `(indptr, indices, data)`.
    pub fn into_parts(self) -> (Vec<i64>, Vec<i64>, Vec<f64>) {
        (self.indptr, self.indices, self.data)
    }

    /// Iterate over the `(row, value)` entries of one column.
    pub fn column(&self, col: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.indptr[col] as usize;
        let end = self.indptr[col + 1] as usize;
        self.indices[start..end]
            .iter()
            .zip(&self.data[start..end])
            .map(|(&r, &v)| (r as usize, v))
    }

    /// Iterate over stored triplets `(row, col, value)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n_cols).flat_map(move |c| self.column(c).map(move |(r, v)| (r, c, v)))
    }

    /// Get the value at `(row, col)`, summing duplicates. Returns 0.0 if absent.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.column(col)
            .filter(|&(r, _)| r == row)
            .map(|(_, v)| v)
            .sum()
    }

    /// Convert to a dense row-major 2D vector.
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        let mut dense = vec![vec![0.0; self.n_cols]; self.n_rows];
        for (r, c, v) in self.iter() {
            dense[r][c] += v;
        }
        dense
    }

    /// Transpose into a canonical `[n_cols, n_rows]` CSC matrix.
    ///
    /// Counting sort over row indices. Columns are visited in ascending
    /// order, so every output column comes out sorted by row; duplicates of a
    /// source column end up adjacent and are then summed.
    pub fn transpose(&self) -> CscMatrix {
        let nnz = self.data.len();
        let mut indptr = vec![0i64; self.n_rows + 1];
        for &r in &self.indices {
            indptr[r as usize + 1] += 1;
        }
        for r in 0..self.n_rows {
            indptr[r + 1] += indptr[r];
        }

        let mut next: Vec<i64> = indptr[..self.n_rows].to_vec();
        let mut indices = vec![0i64; nnz];
        let mut data = vec![0.0f64; nnz];
        for c in 0..self.n_cols {
            let start = self.indptr[c] as usize;
            let end = self.indptr[c + 1] as usize;
            for p in start..end {
                let r = self.indices[p] as usize;
                let dst = next[r] as usize;
                indices[dst] = c as i64;
                data[dst] = self.data[p];
                next[r] += 1;
            }
        }

        let mut t = CscMatrix::from_parts_unchecked(self.n_cols, self.n_rows, indptr, indices, data);
        t.sum_duplicates();
        t
    }

    /// Sum adjacent entries sharing a row index within each column.
    ///
    /// Assumes indices are sorted within columns.
    fn sum_duplicates(&mut self) {
        let mut write = 0usize;
        let mut col_start = 0usize;
        for c in 0..self.n_cols {
            let end = self.indptr[c + 1] as usize;
            let out_start = write;
            for p in col_start..end {
                if write > out_start && self.indices[write - 1] == self.indices[p] {
                    self.data[write - 1] += self.data[p];
                } else {
                    self.indices[write] = self.indices[p];
                    self.data[write] = self.data[p];
                    write += 1;
                }
            }
            col_start = end;
            self.indptr[c + 1] = write as i64;
        }
        self.indices.truncate(write);
        self.data.truncate(write);
    }

    /// Subtract `offset` from every row index and set a new row count.
    ///
    /// Used to move a block whose rows occupy `[offset, offset + n_rows)` of a
    /// taller matrix into local coordinates.
    pub fn shift_rows(mut self, offset: i64, n_rows: usize) -> Result<Self> {
        for r in &mut self.indices {
            *r -= offset;
            if *r < 0 || *r as u64 >= n_rows as u64 {
                return Err(FlipError::Malformed(format!(
                    "row {} does not fit in [{offset}, {})",
                    *r + offset,
                    offset + n_rows as i64
                )));
            }
        }
        self.n_rows = n_rows;
        Ok(self)
    }

    /// Stack matrices vertically; block `k` occupies the rows directly below
    /// block `k - 1`.
    ///
    /// All blocks must have `n_cols` columns. An empty slice yields an empty
    /// `[0, n_cols]` matrix.
    pub fn vstack(blocks: &[CscMatrix], n_cols: usize) -> Result<CscMatrix> {
        if let Some(b) = blocks.iter().find(|b| b.n_cols != n_cols) {
            return Err(FlipError::InvalidInput(format!(
                "cannot vstack a block with {} columns into {n_cols} columns",
                b.n_cols
            )));
        }
        let n_rows: usize = blocks.iter().map(|b| b.n_rows).sum();
        let nnz: usize = blocks.iter().map(|b| b.nnz()).sum();

        let mut indptr = Vec::with_capacity(n_cols + 1);
        let mut indices = Vec::with_capacity(nnz);
        let mut data = Vec::with_capacity(nnz);
        indptr.push(0i64);
        for c in 0..n_cols {
            let mut row_offset = 0i64;
            for b in blocks {
                let start = b.indptr[c] as usize;
                let end = b.indptr[c + 1] as usize;
                indices.extend(b.indices[start..end].iter().map(|&r| r + row_offset));
                data.extend_from_slice(&b.data[start..end]);
                row_offset += b.n_rows as i64;
            }
            indptr.push(indices.len() as i64);
        }

        Ok(CscMatrix::from_parts_unchecked(n_rows, n_cols, indptr, indices, data))
    }
}

impl Summarizable for CscMatrix {
    fn summary(&self) -> String {
        format!(
            "CscMatrix: {}\u{00d7}{}, {} nonzeros ({:.2}% density)",
            self.n_rows,
            self.n_cols,
            self.nnz(),
            self.density() * 100.0
        )
    }
}
