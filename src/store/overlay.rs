use ahash::AHashMap as HashMap;
use std::collections::BTreeMap;

/// Request-scoped cache giving read-your-writes over the ledger.
///
/// The ledger never exposes a transaction's own pending writes to that same
/// transaction. The overlay remembers, for the lifetime of one request, every
/// payload written or first read, and every index entry created or deleted,
/// so that later reads of the request observe them.
///
/// Once populated for a key, an entry is never refreshed from the ledger.
#[derive(Debug, Default)]
pub struct TransactionOverlay {
    /// Resource key to payload bytes.
    assets: HashMap<String, Vec<u8>>,
    /// Composite key to presence, for index entries touched by the request.
    index_entries: BTreeMap<String, bool>,
}

impl TransactionOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves the payload cached for `key`.
    pub fn get(&self, key: &str) -> Option<&Vec<u8>> {
        self.assets.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.assets.contains_key(key)
    }

    /// Caches `payload` for `key`, replacing any previous entry.
    pub fn insert(&mut self, key: String, payload: Vec<u8>) {
        self.assets.insert(key, payload);
    }

    /// Records that the index entry `composite_key` was written.
    pub fn index_created(&mut self, composite_key: String) {
        self.index_entries.insert(composite_key, true);
    }

    /// Records that the index entry `composite_key` was deleted.
    pub fn index_deleted(&mut self, composite_key: String) {
        self.index_entries.insert(composite_key, false);
    }

    /// Presence of an index entry as far as this request knows, `None` when
    /// the request never touched it.
    pub fn index_state(&self, composite_key: &str) -> Option<bool> {
        self.index_entries.get(composite_key).copied()
    }

    /// Index entries created by the request whose key starts with `prefix`,
    /// in key order.
    pub fn created_with_prefix<'o>(&'o self, prefix: &'o str) -> impl Iterator<Item = &'o String> + 'o {
        self.index_entries
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
            .filter(|(_, present)| **present)
            .map(|(key, _)| key)
    }

    /// Number of cached payloads.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
