use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::{Result, ThothError};
use crate::ledger::composite::{create_composite_key, is_composite_key};
use crate::ledger::conflict::detect_conflicts;
use crate::ledger::selector::{RichQuery, RowPosition, decode_bookmark, encode_bookmark};
use crate::ledger::versioned_value::VersionedValue;
use crate::ledger::world_state::WorldState;
use crate::ledger::{LedgerStub, QueryPage, QueryRow};

/// A notification published by a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerNotification {
    /// Identifier of the transaction that set the notification.
    pub tx_id: String,
    /// Notification name given to [`LedgerStub::set_event`].
    pub name: String,
    /// Notification payload.
    pub payload: Vec<u8>,
}

struct Shared {
    /// Committed state.
    world_state: WorldState,
    /// Monotonic commit sequence, used as value version.
    commit_counter: AtomicU64,
    /// Monotonic transaction counter for identifiers.
    transaction_counter: AtomicU64,
    /// Serializes read-set validation with the application of writes.
    commit_lock: Mutex<()>,
    /// Subscribers to committed notifications.
    subscribers: Mutex<Vec<Sender<LedgerNotification>>>,
    /// Every notification published so far, in commit order.
    history: Mutex<Vec<LedgerNotification>>,
}

/// An in-process ledger.
///
/// `MemoryLedger` keeps the committed world state and hands out
/// [`MemoryTransaction`]s that behave the way ledger transactions do during
/// execution: reads observe committed state only, writes are buffered until
/// commit, and a commit is rejected when anything the transaction read has
/// changed in the meantime.
///
/// Cloning a `MemoryLedger` yields another handle to the same state.
#[derive(Clone)]
pub struct MemoryLedger {
    shared: Arc<Shared>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Creates a new, empty ledger.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                world_state: WorldState::new(),
                commit_counter: AtomicU64::new(0),
                transaction_counter: AtomicU64::new(0),
                commit_lock: Mutex::new(()),
                subscribers: Mutex::new(Vec::new()),
                history: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Starts a new transaction.
    pub fn begin(&self) -> MemoryTransaction {
        let sequence = self.shared.transaction_counter.fetch_add(1, Ordering::SeqCst);
        MemoryTransaction {
            id: format!("tx-{:08}", sequence),
            timestamp: Utc::now(),
            shared: Arc::clone(&self.shared),
            read_set: HashMap::new(),
            write_set: HashMap::new(),
            event: None,
        }
    }

    /// Reads the committed value of `key` outside of any transaction.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.shared
            .world_state
            .get(key)
            .map(|value| value.data().as_ref().clone())
    }

    /// Number of committed keys, index entries included.
    pub fn len(&self) -> usize {
        self.shared.world_state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.world_state.is_empty()
    }

    /// Subscribes to notifications published by future commits.
    pub fn subscribe(&self) -> Receiver<LedgerNotification> {
        let (sender, receiver) = unbounded();
        self.shared.subscribers.lock().push(sender);
        receiver
    }

    /// Every notification published so far, in commit order.
    pub fn notifications(&self) -> Vec<LedgerNotification> {
        self.shared.history.lock().clone()
    }
}

/// A transaction against a [`MemoryLedger`].
///
/// Dropping a transaction without calling [`MemoryTransaction::commit`]
/// discards its writes and its notification.
pub struct MemoryTransaction {
    id: String,
    timestamp: DateTime<Utc>,
    shared: Arc<Shared>,
    /// Versions of every key read, `0` when the key was absent.
    read_set: HashMap<String, u64>,
    /// Staged writes; `None` marks a deletion.
    write_set: HashMap<String, Option<Vec<u8>>>,
    /// Notification to publish on commit.
    event: Option<(String, Vec<u8>)>,
}

impl MemoryTransaction {
    /// Validates the read set and applies the staged writes atomically.
    ///
    /// Returns the commit version assigned to the written values.
    ///
    /// # Errors
    ///
    /// Returns [`ThothError::Aborted`] if a key read by this transaction was
    /// modified, created or deleted by another transaction since it was read.
    pub fn commit(self) -> Result<u64> {
        let MemoryTransaction {
            id,
            shared,
            read_set,
            write_set,
            event,
            ..
        } = self;

        let version = {
            let _commit_guard = shared.commit_lock.lock();

            let conflicts = detect_conflicts(&read_set, &shared.world_state);
            if !conflicts.is_empty() {
                let mut keys: Vec<&String> = conflicts.keys().collect();
                keys.sort();
                debug!("Transaction {} aborted on stale reads: {:?}", id, conflicts);
                return Err(ThothError::Aborted(format!(
                    "transaction {} read stale keys {:?}",
                    id, keys
                )));
            }

            let version = shared.commit_counter.fetch_add(1, Ordering::SeqCst) + 1;
            for (key, change) in write_set {
                match change {
                    Some(data) => shared
                        .world_state
                        .insert(key, VersionedValue::new(data, version)),
                    None => {
                        shared.world_state.delete(&key);
                    }
                }
            }
            version
        };

        if let Some((name, payload)) = event {
            let notification = LedgerNotification {
                tx_id: id.clone(),
                name,
                payload,
            };
            shared.history.lock().push(notification.clone());
            shared
                .subscribers
                .lock()
                .retain(|subscriber| subscriber.send(notification.clone()).is_ok());
        }

        debug!("Transaction {} committed at version {}", id, version);
        Ok(version)
    }

    /// Number of staged writes, deletions included.
    pub fn pending_writes(&self) -> usize {
        self.write_set.len()
    }

    fn record_read(&mut self, key: &str, version: u64) {
        self.read_set.entry(key.to_string()).or_insert(version);
    }

    fn evaluate(&mut self, query: &str) -> Result<(RichQuery, Vec<(RowPosition, QueryRow)>)> {
        let rich_query = RichQuery::parse(query)?;

        let mut rows = Vec::new();
        for (key, value) in self.shared.world_state.entries() {
            if is_composite_key(&key) {
                continue;
            }
            let Ok(document) = serde_json::from_slice::<Value>(value.data()) else {
                continue;
            };
            if !rich_query.matches(&document) {
                continue;
            }
            let position = rich_query.position(&key, &document);
            let resume = encode_bookmark(&position)?;
            rows.push((
                position,
                QueryRow {
                    key,
                    value: value.data().as_ref().clone(),
                    resume,
                },
            ));
        }
        rows.sort_by(|(a, _), (b, _)| rich_query.compare(a, b));
        Ok((rich_query, rows))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ThothError::BadRequest("ledger key must not be empty".to_string()));
    }
    Ok(())
}

impl LedgerStub for MemoryTransaction {
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let value = self.shared.world_state.get(key);
        self.record_read(key, value.as_ref().map(|v| v.version()).unwrap_or(0));
        Ok(value.map(|v| v.data().as_ref().clone()))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        self.write_set.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn del_state(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.write_set.insert(key.to_string(), None);
        Ok(())
    }

    fn get_state_by_partial_composite_key(
        &mut self,
        object_type: &str,
        attributes: &[&str],
    ) -> Result<Vec<(String, Vec<u8>)>> {
        let prefix = create_composite_key(object_type, attributes)?;
        Ok(self
            .shared
            .world_state
            .scan_prefix(&prefix)
            .into_iter()
            .map(|(key, value)| (key, value.data().as_ref().clone()))
            .collect())
    }

    fn get_query_result(&mut self, query: &str) -> Result<Vec<QueryRow>> {
        let (_, rows) = self.evaluate(query)?;
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    fn get_query_result_with_pagination(
        &mut self,
        query: &str,
        page_size: u32,
        bookmark: &str,
    ) -> Result<QueryPage> {
        if page_size == 0 {
            return Err(ThothError::BadRequest("page size must be positive".to_string()));
        }
        let start = if bookmark.is_empty() {
            None
        } else {
            Some(decode_bookmark(bookmark)?)
        };

        let (rich_query, rows) = self.evaluate(query)?;
        let rows: Vec<QueryRow> = rows
            .into_iter()
            .filter(|(position, _)| {
                start
                    .as_ref()
                    .is_none_or(|start| rich_query.compare(position, start).is_gt())
            })
            .take(page_size as usize)
            .map(|(_, row)| row)
            .collect();

        let bookmark = rows.last().map(|row| row.resume.clone()).unwrap_or_default();
        Ok(QueryPage { rows, bookmark })
    }

    fn set_event(&mut self, name: &str, payload: Vec<u8>) -> Result<()> {
        if name.is_empty() {
            return Err(ThothError::BadRequest("event name must not be empty".to_string()));
        }
        if self.event.is_some() {
            warn!("Transaction {} replaces its pending notification", self.id);
        }
        self.event = Some((name.to_string(), payload));
        Ok(())
    }

    fn tx_id(&self) -> &str {
        &self.id
    }

    fn tx_timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
