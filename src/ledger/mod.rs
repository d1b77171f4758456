//! The Keyed Ledger contract consumed by the store, and an in-memory ledger.
//!
//! The ledger exposes exact-key reads and writes, prefix scans over composite
//! keys and a rich-query facility. Reads made inside a transaction only observe
//! committed state: a transaction never sees its own pending writes.

use chrono::{DateTime, Utc};

use crate::errors::Result;

/// Composite key encoding used for secondary indexes.
pub mod composite;
/// Read-set validation performed when a memory transaction commits.
pub mod conflict;
/// In-process ledger with transactional staging and notifications.
pub mod memory;
/// Selector matching and ordering for rich queries.
pub mod selector;
/// Values stamped with the version of the transaction that wrote them.
pub mod versioned_value;
/// Committed key/value state held in an ordered skip map.
pub mod world_state;

pub use composite::{create_composite_key, split_composite_key};
pub use memory::{LedgerNotification, MemoryLedger, MemoryTransaction};

/// A single row of a rich query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    /// Ledger key of the row.
    pub key: String,
    /// Raw stored value.
    pub value: Vec<u8>,
    /// Opaque bookmark issued by the ledger that resumes right after this row.
    pub resume: String,
}

/// One page of a paginated rich query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPage {
    pub rows: Vec<QueryRow>,
    /// Bookmark resuming after the last row of this page, empty when the page
    /// is empty.
    pub bookmark: String,
}

/// Per-transaction view of the ledger.
///
/// One stub is handed to the code executing a single request. Every method
/// maps to a ledger primitive; none of them is allowed to observe writes made
/// earlier through the same stub.
pub trait LedgerStub {
    /// Reads the committed value of `key`.
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stages a write of `value` under `key`.
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Stages the deletion of `key`.
    fn del_state(&mut self, key: &str) -> Result<()>;

    /// Scans committed composite keys of `object_type` whose leading attributes
    /// equal `attributes`, in ledger key order.
    fn get_state_by_partial_composite_key(
        &mut self,
        object_type: &str,
        attributes: &[&str],
    ) -> Result<Vec<(String, Vec<u8>)>>;

    /// Evaluates a rich query and returns every matching row.
    fn get_query_result(&mut self, query: &str) -> Result<Vec<QueryRow>>;

    /// Evaluates a rich query and returns at most `page_size` rows starting
    /// right after `bookmark` (from the start when empty).
    fn get_query_result_with_pagination(
        &mut self,
        query: &str,
        page_size: u32,
        bookmark: &str,
    ) -> Result<QueryPage>;

    /// Attaches a notification to the transaction. Only the last call of a
    /// transaction is kept by the ledger.
    fn set_event(&mut self, name: &str, payload: Vec<u8>) -> Result<()>;

    /// Identifier of the transaction.
    fn tx_id(&self) -> &str;

    /// Timestamp proposed for the transaction, identical on every replica.
    fn tx_timestamp(&self) -> DateTime<Utc>;
}
