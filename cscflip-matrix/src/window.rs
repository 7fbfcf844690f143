//! Block planning and column-pointer masking.
//!
//! A [`BlockPlanner`] tiles a dimension into contiguous [`Window`]s of a
//! uniform width (the last one truncated). [`mask_indptr`] rewrites a CSC
//! column-pointer array so that only one window's columns carry entries,
//! which lets a window be treated as a full-shape matrix while holding just
//! that window's slice of `data`/`indices`.

use cscflip_core::{FlipError, Result};

/// A contiguous range `[start, start + width)` of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub width: usize,
}

impl Window {
    pub fn new(start: usize, width: usize) -> Self {
        Self { start, width }
    }

    /// One past the last index covered.
    pub fn end(&self) -> usize {
        self.start + self.width
    }
}

/// Uniform partition of a dimension into windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlanner {
    dim: usize,
    block_width: usize,
}

impl BlockPlanner {
    /// Plan `partitions` windows over `dim`.
    ///
    /// The block width is `max(1, dim / partitions)`, so asking for more
    /// partitions than the dimension holds yields width-1 windows.
    pub fn new(dim: usize, partitions: usize) -> Result<Self> {
        if partitions == 0 {
            return Err(FlipError::InvalidInput(
                "partition count must be at least 1".into(),
            ));
        }
        Ok(Self {
            dim,
            block_width: (dim / partitions).max(1),
        })
    }

    /// Size of the planned dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Nominal width of every window but possibly the last.
    pub fn block_width(&self) -> usize {
        self.block_width
    }

    /// Width of the window starting at `start`.
    pub fn width_at(&self, start: usize) -> usize {
        self.block_width.min(self.dim.saturating_sub(start))
    }

    /// Number of windows.
    pub fn len(&self) -> usize {
        self.dim.div_ceil(self.block_width)
    }

    /// Whether the dimension is empty (no windows).
    pub fn is_empty(&self) -> bool {
        self.dim == 0
    }

    /// Iterate over the windows in ascending order.
    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        (0..self.dim)
            .step_by(self.block_width)
            .map(move |start| Window::new(start, self.width_at(start)))
    }
}

/// Mask a column-pointer array down to one window.
///
/// Returns a fresh array `P'` of the same length as `indptr` with
/// `P'[k] = 0` for `k < i`, `P'[k] = P[k] - P[i]` for `i <= k <= i + p`, and
/// `P'[k] = P[i + p] - P[i]` past the window. Paired with
/// `data[P[i]..P[i + p]]`, `P'` describes a matrix of the same shape whose
/// only non-empty columns are the window.
///
/// # Panics
///
/// Panics if the window does not fit in `indptr.len() - 1` columns.
pub fn mask_indptr(indptr: &[i64], window: Window) -> Vec<i64> {
    let (i, end) = (window.start, window.end());
    assert!(
        end < indptr.len(),
        "window [{i}, {end}) exceeds {} columns",
        indptr.len().saturating_sub(1)
    );
    let base = indptr[i];
    let tail = indptr[end] - base;

    let mut masked = Vec::with_capacity(indptr.len());
    masked.resize(i, 0);
    masked.extend(indptr[i..=end].iter().map(|&v| v - base));
    masked.resize(indptr.len(), tail);
    masked
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::csc::CscMatrix;
    use proptest::prelude::*;

    fn arb_csc() -> impl Strategy<Value = CscMatrix> {
        (1..8usize, 1..8usize).prop_flat_map(|(n_rows, n_cols)| {
            proptest::collection::vec((0..n_rows, 0..n_cols, 1..100i32), 0..30).prop_map(
                move |entries| {
                    let rows: Vec<usize> = entries.iter().map(|e| e.0).collect();
                    let cols: Vec<usize> = entries.iter().map(|e| e.1).collect();
                    let vals: Vec<f64> = entries.iter().map(|e| e.2 as f64).collect();
                    CscMatrix::from_triplets(&rows, &cols, &vals, n_rows, n_cols).unwrap()
                },
            )
        })
    }

    proptest! {
        #[test]
        fn windows_tile_dimension(dim in 0..200usize, parts in 1..50usize) {
            let plan = BlockPlanner::new(dim, parts).unwrap();
            let mut next = 0;
            for w in plan.windows() {
                prop_assert!(w.width >= 1);
                prop_assert_eq!(w.start, next);
                next = w.end();
            }
            prop_assert_eq!(next, dim);
            prop_assert_eq!(plan.windows().count(), plan.len());
        }

        #[test]
        fn mask_keeps_only_window(m in arb_csc(), a in 0..8usize, b in 0..8usize) {
            let n_cols = m.shape().1;
            let start = a % n_cols;
            let width = (b % (n_cols - start)) + 1;
            let w = Window::new(start, width);

            let masked = mask_indptr(m.indptr(), w);
            let l = m.indptr()[start] as usize;
            let r = m.indptr()[w.end()] as usize;
            let view = CscMatrix::from_parts(
                m.shape().0,
                n_cols,
                masked,
                m.indices()[l..r].to_vec(),
                m.data()[l..r].to_vec(),
            ).unwrap();

            let full = m.to_dense();
            let got = view.to_dense();
            for (row, (f, g)) in full.iter().zip(&got).enumerate() {
                for c in 0..n_cols {
                    let expected = if c >= start && c < w.end() { f[c] } else { 0.0 };
                    prop_assert_eq!(g[c], expected, "row {} col {}", row, c);
                }
            }
        }
    }
}
