//! Zarr v3 directory store.
//!
//! Every array is a 1-D Zarr array chunked along its only axis; groups are
//! Zarr groups created on demand for every ancestor of an array. Reads and
//! writes go through `zarrs` array subsets, so only the chunks overlapping a
//! requested range are touched.
//!
//! Requires the `zarr` feature flag.

use std::collections::BTreeSet;
use std::num::NonZeroU64;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use zarrs::array::chunk_grid::ChunkGrid;
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::GroupBuilder;
use zarrs::storage::{ReadableWritableListableStorage, ReadableWritableListableStorageTraits};

use cscflip_core::{FlipError, Result};

use super::{check_range, ArrayData, ArrayInit, ArrayStore, DType};

/// Default number of elements per chunk.
pub const DEFAULT_CHUNK_LEN: u64 = 1 << 20;

type ZArray = Array<dyn ReadableWritableListableStorageTraits>;

fn store_err(e: impl std::fmt::Display) -> FlipError {
    FlipError::Store(format!("Zarr error: {e}"))
}

/// A Zarr v3 hierarchy rooted at a filesystem directory.
pub struct ZarrStore {
    root: PathBuf,
    store: ReadableWritableListableStorage,
    chunk_len: u64,
}

impl std::fmt::Debug for ZarrStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZarrStore")
            .field("root", &self.root)
            .field("chunk_len", &self.chunk_len)
            .finish()
    }
}

impl ZarrStore {
    /// Open an existing `.zarr` directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FlipError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: not found", path.display()),
            )));
        }
        let store: ReadableWritableListableStorage =
            Arc::new(FilesystemStore::new(path).map_err(store_err)?);
        Ok(Self {
            root: path.to_path_buf(),
            store,
            chunk_len: DEFAULT_CHUNK_LEN,
        })
    }

    /// Create a `.zarr` directory (and root group) if needed, then open it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| {
            FlipError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let zs = Self::open(path)?;
        if !path.join("zarr.json").exists() {
            zs.write_group("/")?;
        }
        Ok(zs)
    }

    /// Use chunks of `chunk_len` elements for arrays created from now on.
    pub fn with_chunk_len(mut self, chunk_len: u64) -> Self {
        self.chunk_len = chunk_len.max(1);
        self
    }

    fn node(name: &str) -> String {
        format!("/{}", name.trim_matches('/'))
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_matches('/'))
    }

    fn write_group(&self, path: &str) -> Result<()> {
        let group = GroupBuilder::new()
            .build(self.store.clone(), path)
            .map_err(store_err)?;
        group.store_metadata().map_err(store_err)?;
        Ok(())
    }

    /// Create group metadata for every missing ancestor of `name`.
    fn ensure_parents(&self, name: &str) -> Result<()> {
        let name = name.trim_matches('/');
        let mut prefix = String::new();
        let parts: Vec<&str> = name.split('/').collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if !self.dir(&prefix).join("zarr.json").exists() {
                self.write_group(&Self::node(&prefix))?;
            }
        }
        Ok(())
    }

    fn open_array(&self, name: &str) -> Result<ZArray> {
        if !self.dir(name).join("zarr.json").exists() {
            return Err(FlipError::MissingInput(format!("no array named '{name}'")));
        }
        Array::open(self.store.clone(), &Self::node(name)).map_err(store_err)
    }

    fn make_chunk_grid(&self, len: u64) -> ChunkGrid {
        let chunk = NonZeroU64::new(len.min(self.chunk_len)).unwrap_or(NonZeroU64::MIN);
        ChunkGrid::from(vec![chunk])
    }

    fn array_len(name: &str, array: &ZArray) -> Result<u64> {
        match array.shape() {
            [len] => Ok(*len),
            other => Err(FlipError::Malformed(format!(
                "array '{name}' has {} dimensions, expected 1",
                other.len()
            ))),
        }
    }

    fn array_dtype(name: &str, array: &ZArray) -> Result<DType> {
        match array.data_type() {
            DataType::Float64 => Ok(DType::Float64),
            DataType::Int64 => Ok(DType::Int64),
            DataType::String => Ok(DType::String),
            other => Err(FlipError::Store(format!(
                "array '{name}' has unsupported data type {other:?}"
            ))),
        }
    }

    fn store_elements(array: &ZArray, offset: u64, data: &ArrayData) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let subset = ArraySubset::new_with_ranges(&[offset..offset + data.len() as u64]);
        match data {
            ArrayData::Float64(v) => array.store_array_subset_elements::<f64>(&subset, v),
            ArrayData::Int64(v) => array.store_array_subset_elements::<i64>(&subset, v),
            ArrayData::String(v) => array.store_array_subset_elements::<String>(&subset, v),
        }
        .map_err(store_err)
    }
}

impl ArrayStore for ZarrStore {
    fn create_or_replace(&self, name: &str, init: ArrayInit) -> Result<()> {
        if self.exists(name) {
            warn!(array = name, "replacing existing array");
            self.delete(name)?;
        }
        self.ensure_parents(name)?;

        let len = init.len();
        let (data_type, fill_value) = match init.dtype() {
            DType::Float64 => (DataType::Float64, FillValue::from(0.0f64)),
            DType::Int64 => (DataType::Int64, FillValue::from(0i64)),
            DType::String => (DataType::String, FillValue::from("")),
        };
        let array = ArrayBuilder::new(vec![len], data_type, self.make_chunk_grid(len), fill_value)
            .build(self.store.clone(), &Self::node(name))
            .map_err(store_err)?;
        array.store_metadata().map_err(store_err)?;

        if let ArrayInit::Data(data) = &init {
            Self::store_elements(&array, 0, data)?;
        }
        debug!(array = name, len, "created array");
        Ok(())
    }

    fn write_at(&self, name: &str, offset: u64, data: &ArrayData) -> Result<()> {
        let array = self.open_array(name)?;
        let stored = Self::array_dtype(name, &array)?;
        if stored != data.dtype() {
            return Err(FlipError::DtypeMismatch {
                name: name.to_string(),
                expected: stored.name(),
                found: data.dtype().name(),
            });
        }
        let end = offset + data.len() as u64;
        check_range(name, &(offset..end), Self::array_len(name, &array)?)?;
        Self::store_elements(&array, offset, data)
    }

    fn read(&self, name: &str, range: Range<u64>) -> Result<ArrayData> {
        let array = self.open_array(name)?;
        let dtype = Self::array_dtype(name, &array)?;
        check_range(name, &range, Self::array_len(name, &array)?)?;
        if range.is_empty() {
            return Ok(ArrayData::filled(dtype, 0));
        }
        let subset = ArraySubset::new_with_ranges(&[range]);
        let data = match dtype {
            DType::Float64 => ArrayData::Float64(
                array
                    .retrieve_array_subset_elements::<f64>(&subset)
                    .map_err(store_err)?,
            ),
            DType::Int64 => ArrayData::Int64(
                array
                    .retrieve_array_subset_elements::<i64>(&subset)
                    .map_err(store_err)?,
            ),
            DType::String => ArrayData::String(
                array
                    .retrieve_array_subset_elements::<String>(&subset)
                    .map_err(store_err)?,
            ),
        };
        Ok(data)
    }

    fn len(&self, name: &str) -> Result<u64> {
        let array = self.open_array(name)?;
        Self::array_len(name, &array)
    }

    fn dtype(&self, name: &str) -> Result<DType> {
        let array = self.open_array(name)?;
        Self::array_dtype(name, &array)
    }

    fn exists(&self, name: &str) -> bool {
        let name = name.trim_matches('/');
        !name.is_empty() && self.dir(name).exists()
    }

    fn group_keys(&self, path: &str) -> Result<BTreeSet<String>> {
        let entries = match std::fs::read_dir(self.dir(path)) {
            Ok(e) => e,
            Err(_) => return Ok(BTreeSet::new()),
        };
        let mut keys = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                keys.insert(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(keys)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let name = name.trim_matches('/');
        if name.is_empty() {
            return Err(FlipError::InvalidInput("refusing to delete the store root".into()));
        }
        let dir = self.dir(name);
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir)?;
        } else if dir.exists() {
            std::fs::remove_file(&dir)?;
        }
        Ok(())
    }
}
