use std::sync::Arc;

/// Represents a ledger value with an associated version.
///
/// Values held in the committed world state are wrapped in `VersionedValue`
/// to track the version (commit sequence number) at which they were last
/// written. Transactions record these versions when reading so that the
/// ledger can reject a commit whose reads went stale in the meantime.
///
/// Version `0` is never assigned to a stored value: it stands for "the key
/// did not exist" in read sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    /// The stored bytes.
    data: Arc<Vec<u8>>,
    /// The commit sequence number of the transaction that last wrote this value.
    version: u64,
}

impl VersionedValue {
    /// Creates a new `VersionedValue`.
    ///
    /// # Arguments
    ///
    /// * `data` - The stored bytes.
    /// * `version` - The commit sequence number associated with this data.
    ///
    /// # Examples
    ///
    /// ```
    /// use thoth::ledger::versioned_value::VersionedValue;
    ///
    /// let value = VersionedValue::new(b"{}".to_vec(), 1);
    /// assert_eq!(value.version(), 1);
    /// assert_eq!(value.data().as_slice(), b"{}");
    /// ```
    pub fn new(data: Vec<u8>, version: u64) -> Self {
        Self {
            data: Arc::new(data),
            version,
        }
    }

    /// Returns a reference to the stored bytes.
    pub fn data(&self) -> &Arc<Vec<u8>> {
        &self.data
    }

    /// Returns the version of the value.
    pub fn version(&self) -> u64 {
        self.version
    }
}
