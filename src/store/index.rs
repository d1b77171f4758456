//! Composite-key secondary indexes.
//!
//! An index entry is a composite key whose attributes are listed in a fixed
//! order per index, e.g. `[planKind, planID, status, taskID]`, with the id of
//! the referenced record last. The order is what makes prefix lookups by plan,
//! or by plan and status, possible without scanning unrelated entries. The
//! value of an entry is a sentinel byte.
//!
//! An entry exists if and only if the referenced record currently carries the
//! matching attribute values. [`LedgerStore::update_index`] replaces an entry
//! by deleting the old one and creating the new one; the ledger only makes
//! the enclosing request atomic, so an error from either step must abort the
//! whole request.

use ahash::AHashSet as HashSet;
use log::debug;

use crate::errors::{Result, ThothError};
use crate::ledger::{LedgerStub, create_composite_key, split_composite_key};
use crate::store::LedgerStore;

/// Value stored under every index entry.
pub const INDEX_SENTINEL: [u8; 1] = [0x00];

impl<S: LedgerStub> LedgerStore<'_, S> {
    /// Creates the entry `attributes` of `index`.
    pub fn create_index(&mut self, index: &str, attributes: &[&str]) -> Result<()> {
        let key = create_composite_key(index, attributes)?;
        self.stub().put_state(&key, INDEX_SENTINEL.to_vec())?;
        debug!("Created index entry {:?}", key);
        self.overlay_mut().index_created(key);
        Ok(())
    }

    /// Deletes the entry `attributes` of `index`.
    pub fn delete_index(&mut self, index: &str, attributes: &[&str]) -> Result<()> {
        let key = create_composite_key(index, attributes)?;
        self.stub().del_state(&key)?;
        debug!("Deleted index entry {:?}", key);
        self.overlay_mut().index_deleted(key);
        Ok(())
    }

    /// Moves a record from the entry `old_attributes` to `new_attributes`.
    ///
    /// # Errors
    ///
    /// Any error leaves the index half-updated inside the pending transaction.
    /// Callers must propagate it and abandon the request.
    pub fn update_index(
        &mut self,
        index: &str,
        old_attributes: &[&str],
        new_attributes: &[&str],
    ) -> Result<()> {
        self.delete_index(index, old_attributes)?;
        self.create_index(index, new_attributes)
    }

    /// Lists the ids referenced by the entries of `index` starting with
    /// `attributes`.
    ///
    /// The id is the last attribute of each entry. Committed entries come in
    /// ledger iteration order, followed by the entries this request created,
    /// in key order. Entries this request deleted are left out.
    pub fn list_keys(&mut self, index: &str, attributes: &[&str]) -> Result<Vec<String>> {
        let prefix = create_composite_key(index, attributes)?;
        let committed = self
            .stub()
            .get_state_by_partial_composite_key(index, attributes)?;

        let overlay = self.overlay();
        let mut keys: Vec<String> = committed
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| overlay.index_state(key) != Some(false))
            .collect();
        let listed: HashSet<&String> = keys.iter().collect();
        let pending: Vec<String> = overlay
            .created_with_prefix(&prefix)
            .filter(|key| !listed.contains(key))
            .cloned()
            .collect();
        keys.extend(pending);

        keys.iter()
            .map(|key| {
                let (_, attributes) = split_composite_key(key)?;
                attributes.last().cloned().ok_or_else(|| {
                    ThothError::Internal(format!("index entry {:?} has no attributes", key))
                })
            })
            .collect()
    }
}
