//! In-process [`ArrayStore`] backed by a sorted map.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::RwLock;

use cscflip_core::{FlipError, Result};
use tracing::warn;

use super::{check_range, ArrayData, ArrayInit, ArrayStore, DType};

/// Arrays held in memory, keyed by their full path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    arrays: RwLock<BTreeMap<String, ArrayData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every array in the store, in sorted order.
    pub fn array_names(&self) -> Vec<String> {
        self.read_guard().keys().cloned().collect()
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, ArrayData>> {
        self.arrays.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, ArrayData>> {
        self.arrays.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn missing(name: &str) -> FlipError {
        FlipError::MissingInput(format!("no array named '{name}'"))
    }
}

fn is_under(key: &str, prefix: &str) -> bool {
    key.len() > prefix.len() && key.starts_with(prefix) && key.as_bytes()[prefix.len()] == b'/'
}

fn remove_node(map: &mut BTreeMap<String, ArrayData>, name: &str) -> bool {
    let before = map.len();
    map.retain(|k, _| k != name && !is_under(k, name));
    map.len() != before
}

impl ArrayStore for MemoryStore {
    fn create_or_replace(&self, name: &str, init: ArrayInit) -> Result<()> {
        let name = name.trim_matches('/');
        let mut map = self.write_guard();
        if remove_node(&mut map, name) {
            warn!(array = name, "replacing existing array");
        }
        let data = match init {
            ArrayInit::Data(d) => d,
            ArrayInit::Empty { dtype, len } => ArrayData::filled(dtype, len as usize),
        };
        map.insert(name.to_string(), data);
        Ok(())
    }

    fn write_at(&self, name: &str, offset: u64, data: &ArrayData) -> Result<()> {
        let name = name.trim_matches('/');
        let mut map = self.write_guard();
        let arr = map.get_mut(name).ok_or_else(|| Self::missing(name))?;
        let end = offset + data.len() as u64;
        check_range(name, &(offset..end), arr.len() as u64)?;
        arr.splice(offset as usize, data)
            .map_err(|stored| FlipError::DtypeMismatch {
                name: name.to_string(),
                expected: stored.name(),
                found: data.dtype().name(),
            })
    }

    fn read(&self, name: &str, range: Range<u64>) -> Result<ArrayData> {
        let name = name.trim_matches('/');
        let map = self.read_guard();
        let arr = map.get(name).ok_or_else(|| Self::missing(name))?;
        check_range(name, &range, arr.len() as u64)?;
        Ok(arr.slice(range.start as usize..range.end as usize))
    }

    fn len(&self, name: &str) -> Result<u64> {
        let name = name.trim_matches('/');
        self.read_guard()
            .get(name)
            .map(|a| a.len() as u64)
            .ok_or_else(|| Self::missing(name))
    }

    fn dtype(&self, name: &str) -> Result<DType> {
        let name = name.trim_matches('/');
        self.read_guard()
            .get(name)
            .map(ArrayData::dtype)
            .ok_or_else(|| Self::missing(name))
    }

    fn exists(&self, name: &str) -> bool {
        let name = name.trim_matches('/');
        let map = self.read_guard();
        map.contains_key(name) || map.keys().any(|k| is_under(k, name))
    }

    fn group_keys(&self, path: &str) -> Result<BTreeSet<String>> {
        let path = path.trim_matches('/');
        let map = self.read_guard();
        let keys = map
            .keys()
            .filter_map(|k| {
                let rest = if path.is_empty() {
                    Some(k.as_str())
                } else if is_under(k, path) {
                    Some(&k[path.len() + 1..])
                } else {
                    None
                }?;
                rest.split('/').next().map(str::to_string)
            })
            .collect();
        Ok(keys)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let name = name.trim_matches('/');
        remove_node(&mut self.write_guard(), name);
        Ok(())
    }
}
