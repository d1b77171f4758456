use crossbeam_skiplist::SkipMap;

use crate::ledger::versioned_value::VersionedValue;

/// Committed ledger state implemented using a lock-free SkipMap.
///
/// Keys are kept in byte order, which is the iteration order of prefix scans
/// and the final tie-break of rich query ordering.
pub struct WorldState {
    data: SkipMap<String, VersionedValue>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState {
    /// Creates a new, empty `WorldState`.
    pub fn new() -> Self {
        Self {
            data: SkipMap::new(),
        }
    }

    /// Retrieves the committed value for `key`.
    pub fn get(&self, key: &str) -> Option<VersionedValue> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    /// Returns the committed version of `key`, `0` when absent.
    pub fn version_of(&self, key: &str) -> u64 {
        self.data
            .get(key)
            .map(|entry| entry.value().version())
            .unwrap_or(0)
    }

    /// Inserts or replaces the value of `key`.
    pub fn insert(&self, key: String, value: VersionedValue) {
        self.data.insert(key, value);
    }

    /// Removes `key`. Returns the removed value if one existed.
    pub fn delete(&self, key: &str) -> Option<VersionedValue> {
        self.data.remove(key).map(|entry| entry.value().clone())
    }

    /// Collects every entry whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &str) -> Vec<(String, VersionedValue)> {
        self.data
            .range(prefix.to_string()..)
            .take_while(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Collects every entry, in key order.
    pub fn entries(&self) -> Vec<(String, VersionedValue)> {
        self.data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
