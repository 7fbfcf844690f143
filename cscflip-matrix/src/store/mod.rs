//! Chunked array store contract.
//!
//! The transpose only ever talks to storage through [`ArrayStore`]: named 1-D
//! arrays addressed by `/`-separated paths (`"normalizedT/indptr"`), grouped
//! implicitly by their parent path. Two backends are provided:
//!
//! - [`MemoryStore`]: in-process map, used by tests and embedding callers
//! - [`ZarrStore`]: Zarr v3 directory store via `zarrs` (feature `zarr`)

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use cscflip_core::{FlipError, Result};

mod memory;
#[cfg(feature = "zarr")]
mod zarr;

pub use memory::MemoryStore;
#[cfg(feature = "zarr")]
pub use zarr::ZarrStore;

/// Element type of a stored array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Float64,
    Int64,
    String,
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            DType::Float64 => "float64",
            DType::Int64 => "int64",
            DType::String => "string",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An owned, typed run of array elements.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Float64(Vec<f64>),
    Int64(Vec<i64>),
    String(Vec<String>),
}

impl ArrayData {
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Float64(_) => DType::Float64,
            ArrayData::Int64(_) => DType::Int64,
            ArrayData::String(_) => DType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Float64(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array of `len` fill values (0, 0.0 or the empty string).
    pub fn filled(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::Float64 => ArrayData::Float64(vec![0.0; len]),
            DType::Int64 => ArrayData::Int64(vec![0; len]),
            DType::String => ArrayData::String(vec![String::new(); len]),
        }
    }

    /// Copy out the elements in `range`.
    pub fn slice(&self, range: Range<usize>) -> Self {
        match self {
            ArrayData::Float64(v) => ArrayData::Float64(v[range].to_vec()),
            ArrayData::Int64(v) => ArrayData::Int64(v[range].to_vec()),
            ArrayData::String(v) => ArrayData::String(v[range].to_vec()),
        }
    }

    /// Overwrite elements starting at `offset` with `src` (same dtype).
    pub(crate) fn splice(&mut self, offset: usize, src: &ArrayData) -> std::result::Result<(), DType> {
        match (self, src) {
            (ArrayData::Float64(dst), ArrayData::Float64(s)) => {
                dst[offset..offset + s.len()].copy_from_slice(s)
            }
            (ArrayData::Int64(dst), ArrayData::Int64(s)) => {
                dst[offset..offset + s.len()].copy_from_slice(s)
            }
            (ArrayData::String(dst), ArrayData::String(s)) => {
                dst[offset..offset + s.len()].clone_from_slice(s)
            }
            (dst, _) => return Err(dst.dtype()),
        }
        Ok(())
    }

    pub fn into_f64(self, name: &str) -> Result<Vec<f64>> {
        match self {
            ArrayData::Float64(v) => Ok(v),
            other => Err(mismatch(name, DType::Float64, other.dtype())),
        }
    }

    pub fn into_i64(self, name: &str) -> Result<Vec<i64>> {
        match self {
            ArrayData::Int64(v) => Ok(v),
            other => Err(mismatch(name, DType::Int64, other.dtype())),
        }
    }

    pub fn into_strings(self, name: &str) -> Result<Vec<String>> {
        match self {
            ArrayData::String(v) => Ok(v),
            other => Err(mismatch(name, DType::String, other.dtype())),
        }
    }
}

/// How to initialise an array in [`ArrayStore::create_or_replace`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayInit {
    /// Store these elements.
    Data(ArrayData),
    /// Allocate `len` fill values, to be populated with [`ArrayStore::write_at`].
    Empty { dtype: DType, len: u64 },
}

impl ArrayInit {
    pub fn dtype(&self) -> DType {
        match self {
            ArrayInit::Data(d) => d.dtype(),
            ArrayInit::Empty { dtype, .. } => *dtype,
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            ArrayInit::Data(d) => d.len() as u64,
            ArrayInit::Empty { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named 1-D array storage with slice-addressed reads and writes.
///
/// Names are `/`-separated paths without a leading slash. A group exists
/// whenever some array lives beneath it.
pub trait ArrayStore {
    /// Create an array, replacing (with a warning) any array or group
    /// already stored under `name`.
    fn create_or_replace(&self, name: &str, init: ArrayInit) -> Result<()>;

    /// Overwrite the elements of an existing array starting at `offset`.
    fn write_at(&self, name: &str, offset: u64, data: &ArrayData) -> Result<()>;

    /// Read the elements in `range`.
    fn read(&self, name: &str, range: Range<u64>) -> Result<ArrayData>;

    /// Number of elements of an array.
    fn len(&self, name: &str) -> Result<u64>;

    /// Element type of an array.
    fn dtype(&self, name: &str) -> Result<DType>;

    /// Whether an array or group is stored under `name`.
    fn exists(&self, name: &str) -> bool;

    /// Names of the direct children of the group at `path`.
    fn group_keys(&self, path: &str) -> Result<BTreeSet<String>>;

    /// Remove an array or a whole group. Removing an absent name is a no-op.
    fn delete(&self, name: &str) -> Result<()>;

    /// Read a whole array.
    fn read_all(&self, name: &str) -> Result<ArrayData> {
        let len = self.len(name)?;
        self.read(name, 0..len)
    }
}

/// Join a group path and a member name.
pub fn join(group: &str, member: &str) -> String {
    if group.is_empty() {
        member.to_string()
    } else {
        format!("{}/{}", group.trim_end_matches('/'), member)
    }
}

fn mismatch(name: &str, expected: DType, found: DType) -> FlipError {
    FlipError::DtypeMismatch {
        name: name.to_string(),
        expected: expected.name(),
        found: found.name(),
    }
}

pub fn read_f64(store: &dyn ArrayStore, name: &str, range: Range<u64>) -> Result<Vec<f64>> {
    store.read(name, range)?.into_f64(name)
}

pub fn read_i64(store: &dyn ArrayStore, name: &str, range: Range<u64>) -> Result<Vec<i64>> {
    store.read(name, range)?.into_i64(name)
}

pub fn read_all_i64(store: &dyn ArrayStore, name: &str) -> Result<Vec<i64>> {
    store.read_all(name)?.into_i64(name)
}

pub fn read_all_strings(store: &dyn ArrayStore, name: &str) -> Result<Vec<String>> {
    store.read_all(name)?.into_strings(name)
}

/// Copy an array to a new name in `chunk_len`-element pieces.
pub fn copy_array(store: &dyn ArrayStore, from: &str, to: &str, chunk_len: u64) -> Result<()> {
    let len = store.len(from)?;
    let dtype = store.dtype(from)?;
    store.create_or_replace(to, ArrayInit::Empty { dtype, len })?;
    let step = chunk_len.max(1);
    let mut offset = 0;
    while offset < len {
        let end = (offset + step).min(len);
        let chunk = store.read(from, offset..end)?;
        store.write_at(to, offset, &chunk)?;
        offset = end;
    }
    Ok(())
}

/// Validate a read range against an array length.
pub(crate) fn check_range(name: &str, range: &Range<u64>, len: u64) -> Result<()> {
    if range.start > range.end || range.end > len {
        return Err(FlipError::InvalidInput(format!(
            "range {}..{} out of bounds for '{name}' of length {len}",
            range.start, range.end
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_paths() {
        assert_eq!(join("g", "data"), "g/data");
        assert_eq!(join("g/", "data"), "g/data");
        assert_eq!(join("", "data"), "data");
    }

    #[test]
    fn typed_conversion() {
        let d = ArrayData::Int64(vec![1, 2]);
        assert_eq!(d.clone().into_i64("x").unwrap(), vec![1, 2]);
        let err = d.into_f64("x").unwrap_err();
        assert!(matches!(err, FlipError::DtypeMismatch { expected: "float64", .. }));
    }

    #[test]
    fn slice_and_splice() {
        let mut d = ArrayData::filled(DType::Float64, 4);
        d.splice(1, &ArrayData::Float64(vec![1.0, 2.0])).unwrap();
        assert_eq!(d, ArrayData::Float64(vec![0.0, 1.0, 2.0, 0.0]));
        assert_eq!(d.slice(1..3), ArrayData::Float64(vec![1.0, 2.0]));
        assert_eq!(
            d.splice(0, &ArrayData::Int64(vec![1])),
            Err(DType::Float64)
        );
    }

    #[test]
    fn copy_in_chunks() {
        let store = MemoryStore::new();
        let labels: Vec<String> = (0..7).map(|i| format!("cell_{i}")).collect();
        store
            .create_or_replace("a/labels", ArrayInit::Data(ArrayData::String(labels.clone())))
            .unwrap();
        copy_array(&store, "a/labels", "b/labels", 3).unwrap();
        assert_eq!(read_all_strings(&store, "b/labels").unwrap(), labels);
    }
}
