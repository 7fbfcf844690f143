//! Phase 1: transpose the source one column window at a time.
//!
//! Every window of source columns is masked, transposed and canonicalized
//! in isolation, then persisted as a staged block keyed by the window start.
//! Staged blocks live in a [`StagingArea`], a hidden group inside the same
//! store that is removed when the area is released or dropped.

use std::time::{SystemTime, UNIX_EPOCH};

use cscflip_core::{FlipError, Result};
use tracing::{debug, warn};

use crate::csc::CscMatrix;
use crate::group::{write_matrix_group, GroupLayout, MatrixGroup};
use crate::store::{join, ArrayStore};
use crate::window::{mask_indptr, BlockPlanner};

/// Scratch group holding staged blocks for the duration of one run.
///
/// The group is deleted by [`StagingArea::release`], or on drop if the run
/// bails out early. A failed deletion on drop is logged, not raised.
pub struct StagingArea<'a> {
    store: &'a dyn ArrayStore,
    root: String,
    layout: GroupLayout,
    released: bool,
}

impl<'a> StagingArea<'a> {
    /// Claim a fresh staging group in `store`.
    pub fn create(store: &'a dyn ArrayStore) -> Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let root = format!(".staging-{}-{}", std::process::id(), nanos);
        Self::at(store, root)
    }

    /// Use the group `root` as staging area, clearing anything left there.
    pub fn at(store: &'a dyn ArrayStore, root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if store.exists(&root) {
            warn!(staging = %root, "clearing stale staging group");
            store.delete(&root)?;
        }
        Ok(Self {
            store,
            root,
            layout: GroupLayout::default(),
            released: false,
        })
    }

    /// Path of the staging group.
    pub fn root(&self) -> &str {
        &self.root
    }

    fn block_name(&self, key: usize) -> String {
        join(&self.root, &key.to_string())
    }

    /// Persist the block for the window starting at `key`.
    pub fn write_block(&self, key: usize, block: &CscMatrix) -> Result<()> {
        write_matrix_group(self.store, &self.layout, &self.block_name(key), block, None, None)
    }

    /// Open the staged block for `key`.
    pub fn block(&self, key: usize) -> Result<MatrixGroup> {
        MatrixGroup::open(self.store, &self.layout, &self.block_name(key))
    }

    /// Keys of all staged blocks, in ascending numeric order.
    pub fn keys(&self) -> Result<Vec<usize>> {
        let mut keys = self
            .store
            .group_keys(&self.root)?
            .into_iter()
            .map(|k| {
                k.parse::<usize>().map_err(|_| {
                    FlipError::Malformed(format!("unexpected entry '{k}' in '{}'", self.root))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        keys.sort_unstable();
        Ok(keys)
    }

    /// Delete the staging group.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.store.delete(&self.root)
    }
}

impl Drop for StagingArea<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.store.delete(&self.root) {
            warn!(staging = %self.root, error = %e, "failed to remove staging group");
        }
    }
}

/// Stage the transpose of every column window of `source`.
///
/// `plan` tiles the source column dimension. Each staged block has the
/// transposed shape `[cols, rows]` with only the rows of its window
/// populated. Returns the total number of staged entries, which is the
/// source entry count less any duplicates merged on the way.
pub fn stage_blocks(
    store: &dyn ArrayStore,
    source: &MatrixGroup,
    staging: &StagingArea<'_>,
    plan: &BlockPlanner,
) -> Result<u64> {
    let (n_rows, n_cols) = source.shape();
    if plan.dim() != n_cols {
        return Err(FlipError::InvalidInput(format!(
            "plan covers {} columns but the source has {n_cols}",
            plan.dim()
        )));
    }
    let indptr = source.read_indptr(store, 0..n_cols as u64 + 1)?;

    let mut staged = 0u64;
    for w in plan.windows() {
        let l = indptr[w.start];
        let r = indptr[w.end()];
        if l < 0 || r < l {
            return Err(FlipError::Malformed(format!(
                "group '{}': indptr[{}..={}] is not a valid range ({l}..{r})",
                source.name(),
                w.start,
                w.end()
            )));
        }
        let (indices, data) = source.read_entries(store, l as u64..r as u64)?;
        let masked = CscMatrix::from_parts(n_rows, n_cols, mask_indptr(&indptr, w), indices, data)?;
        let block = masked.transpose();

        debug!(start = w.start, width = w.width, nnz = block.nnz(), "staged window");
        staged += block.nnz() as u64;
        staging.write_block(w.start, &block)?;
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn scenario() -> CscMatrix {
        CscMatrix::from_parts(
            3,
            4,
            vec![0, 1, 3, 3, 4],
            vec![0, 1, 2, 2],
            vec![10.0, 20.0, 30.0, 40.0],
        )
        .unwrap()
    }

    fn source(store: &MemoryStore, m: &CscMatrix) -> MatrixGroup {
        let layout = GroupLayout::default();
        write_matrix_group(store, &layout, "src", m, None, None).unwrap();
        MatrixGroup::open(store, &layout, "src").unwrap()
    }

    #[test]
    fn blocks_hold_window_rows() {
        let store = MemoryStore::new();
        let src = source(&store, &scenario());
        let staging = StagingArea::at(&store, "stage").unwrap();
        let plan = BlockPlanner::new(4, 2).unwrap();

        let staged = stage_blocks(&store, &src, &staging, &plan).unwrap();
        assert_eq!(staged, 4);
        assert_eq!(staging.keys().unwrap(), vec![0, 2]);

        let b0 = staging.block(0).unwrap().load(&store).unwrap();
        assert_eq!(b0.shape(), (4, 3));
        assert_eq!(b0.indptr(), &[0, 1, 2, 3]);
        assert_eq!(b0.indices(), &[0, 1, 1]);
        assert_eq!(b0.data(), &[10.0, 20.0, 30.0]);

        let b2 = staging.block(2).unwrap().load(&store).unwrap();
        assert_eq!(b2.indptr(), &[0, 0, 0, 1]);
        assert_eq!(b2.indices(), &[3]);
    }

    #[test]
    fn duplicates_merged_while_staging() {
        let store = MemoryStore::new();
        let m = CscMatrix::from_parts(2, 2, vec![0, 3, 3], vec![1, 0, 1], vec![1.0, 2.0, 3.0])
            .unwrap();
        let src = source(&store, &m);
        let staging = StagingArea::at(&store, "stage").unwrap();
        let plan = BlockPlanner::new(2, 1).unwrap();

        assert_eq!(stage_blocks(&store, &src, &staging, &plan).unwrap(), 2);
        let b = staging.block(0).unwrap().load(&store).unwrap();
        assert_eq!(b.indptr(), &[0, 1, 2]);
        assert_eq!(b.data(), &[2.0, 4.0]);
    }

    #[test]
    fn numeric_key_order() {
        let store = MemoryStore::new();
        let staging = StagingArea::at(&store, "stage").unwrap();
        for key in [10, 2, 0] {
            staging.write_block(key, &CscMatrix::new(1, 1)).unwrap();
        }
        assert_eq!(staging.keys().unwrap(), vec![0, 2, 10]);
    }

    #[test]
    fn release_and_drop_remove_group() {
        let store = MemoryStore::new();
        let staging = StagingArea::create(&store).unwrap();
        let root = staging.root().to_string();
        assert!(root.starts_with(".staging-"));
        staging.write_block(0, &CscMatrix::new(1, 1)).unwrap();
        assert!(store.exists(&root));
        staging.release().unwrap();
        assert!(!store.exists(&root));

        {
            let staging = StagingArea::at(&store, "stage").unwrap();
            staging.write_block(0, &CscMatrix::new(1, 1)).unwrap();
        }
        assert!(!store.exists("stage"));
    }

    #[test]
    fn plan_must_match_columns() {
        let store = MemoryStore::new();
        let src = source(&store, &scenario());
        let staging = StagingArea::at(&store, "stage").unwrap();
        let plan = BlockPlanner::new(3, 1).unwrap();
        assert!(matches!(
            stage_blocks(&store, &src, &staging, &plan),
            Err(FlipError::InvalidInput(_))
        ));
    }
}
