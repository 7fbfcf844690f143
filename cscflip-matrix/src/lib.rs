//! Out-of-core transpose of CSC matrices held in chunked array stores.
//!
//! A matrix too large for memory is transposed in two phases. Source
//! columns are cut into windows, each transposed on its own and staged in
//! the store; the staged blocks are then re-cut along the other dimension
//! and appended window by window to the output arrays. Peak memory is
//! bounded by one window's entries plus the pointer arrays.
//!
//! - **Matrices**: [`CscMatrix`] with canonicalizing [`CscMatrix::transpose`]
//! - **Planning**: [`BlockPlanner`], [`Window`], [`mask_indptr`]
//! - **Storage**: the [`ArrayStore`] trait, [`MemoryStore`], [`ZarrStore`] (feature `zarr`)
//! - **Groups**: [`GroupLayout`] and [`MatrixGroup`] for `data`/`indices`/`indptr`/`shape` sets
//! - **Pipeline**: [`run`] with [`TransposeConfig`], reporting a [`TransposeReport`]
//!
//! # Quick start
//!
//! ```
//! use cscflip_matrix::{run, write_matrix_group, CscMatrix, GroupLayout, MemoryStore, TransposeConfig};
//!
//! let store = MemoryStore::new();
//! let m = CscMatrix::from_parts(3, 4, vec![0, 1, 3, 3, 4], vec![0, 1, 2, 2], vec![10.0, 20.0, 30.0, 40.0])
//!     .unwrap();
//! let cells: Vec<String> = (0..3).map(|i| format!("cell{i}")).collect();
//! let genes: Vec<String> = (0..4).map(|i| format!("gene{i}")).collect();
//! write_matrix_group(&store, &GroupLayout::default(), "normalizedT", &m, Some(&cells), Some(&genes))
//!     .unwrap();
//!
//! let config = TransposeConfig { partition_count: 2, ..TransposeConfig::default() };
//! let report = run(&store, &config).unwrap();
//! assert_eq!(report.shape, (4, 3));
//! assert_eq!(report.nnz, 4);
//! ```

pub mod companion;
pub mod csc;
pub mod group;
pub mod metadata;
pub mod normalize;
pub mod pipeline;
pub mod reassemble;
pub mod stage;
pub mod store;
pub mod validate;
pub mod window;

pub use companion::replicate_companion;
pub use csc::CscMatrix;
pub use group::{write_matrix_group, GroupLayout, MatrixGroup};
pub use metadata::swap_metadata;
pub use normalize::{normalize_from_raw, NormalizeConfig};
pub use pipeline::{run, PhaseTimings, TransposeConfig, TransposeReport};
#[cfg(feature = "zarr")]
pub use pipeline::transpose_store;
pub use reassemble::{reassemble, Reassembled};
pub use stage::{stage_blocks, StagingArea};
pub use store::{ArrayData, ArrayInit, ArrayStore, DType, MemoryStore};
#[cfg(feature = "zarr")]
pub use store::ZarrStore;
pub use validate::{check_complete, validate_source};
pub use window::{mask_indptr, BlockPlanner, Window};
