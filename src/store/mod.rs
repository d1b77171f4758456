//! Ledger-backed store: the layer that makes reads and writes against the
//! keyed ledger safe, queryable and idempotent within one request.
//!
//! [`LedgerStore`] borrows the ledger stub of the request and combines
//! - the transaction overlay (read-your-writes, stable reads),
//! - the index manager (composite-key secondary indexes, see [`index`]),
//! - the query translator (rich queries and pagination, see [`query`]).

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::asset::AssetKind;
use crate::config::QueryConfig;
use crate::errors::{Result, ThothError};
use crate::ledger::LedgerStub;

/// Stored envelope wrapping each payload with its kind.
pub mod envelope;
/// Composite-key secondary indexes.
pub mod index;
/// Request-scoped read-your-writes cache.
pub mod overlay;
/// Rich queries and pagination.
pub mod query;

pub use envelope::StoredEnvelope;
pub use overlay::TransactionOverlay;
pub use query::{AssetQuery, Pagination, QueryResult, SortDirection};

/// What the store knows about the request it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Name of the method being executed; reported by errors.
    method: String,
    /// Consistency flag: `Some(true)` for read-only calls. Unset until the
    /// dispatcher classifies the call.
    read_only: Option<bool>,
}

impl RequestContext {
    /// A context whose consistency flag is not set yet.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            read_only: None,
        }
    }

    /// A context whose consistency flag is already set.
    pub fn classified(method: impl Into<String>, read_only: bool) -> Self {
        Self {
            method: method.into(),
            read_only: Some(read_only),
        }
    }

    /// Sets the consistency flag.
    ///
    /// # Errors
    ///
    /// The flag is set once per request: setting it again is
    /// [`ThothError::Internal`].
    pub fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        if let Some(current) = self.read_only {
            return Err(ThothError::Internal(format!(
                "consistency flag of {} is already set (read_only={})",
                self.method, current
            )));
        }
        self.read_only = Some(read_only);
        Ok(())
    }

    pub fn read_only(&self) -> Option<bool> {
        self.read_only
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

/// Store serving a single request.
///
/// Writes go through to the ledger stub and to the overlay before returning,
/// so a following read of the same request observes them although the ledger
/// would not. Reads check the overlay first and populate it on a miss, so a
/// value, once read, stays stable for the rest of the request.
pub struct LedgerStore<'a, S: LedgerStub> {
    stub: &'a mut S,
    overlay: TransactionOverlay,
    context: RequestContext,
    query_config: QueryConfig,
}

impl<'a, S: LedgerStub> LedgerStore<'a, S> {
    pub fn new(stub: &'a mut S, context: RequestContext) -> Self {
        Self::with_query_config(stub, context, QueryConfig::default())
    }

    pub fn with_query_config(
        stub: &'a mut S,
        context: RequestContext,
        query_config: QueryConfig,
    ) -> Self {
        Self {
            stub,
            overlay: TransactionOverlay::new(),
            context,
            query_config,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.context
    }

    pub fn overlay(&self) -> &TransactionOverlay {
        &self.overlay
    }

    pub(crate) fn overlay_mut(&mut self) -> &mut TransactionOverlay {
        &mut self.overlay
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.query_config
    }

    /// The ledger stub of the request.
    pub fn stub(&mut self) -> &mut S {
        &mut *self.stub
    }

    /// Writes the JSON `payload` of asset `id` of `kind`.
    ///
    /// This is a blind write: it neither checks nor cares whether the asset
    /// exists. Use [`LedgerStore::create`] or [`LedgerStore::update`] to
    /// enforce either.
    pub fn put_bytes(&mut self, kind: AssetKind, id: &str, payload: Vec<u8>) -> Result<()> {
        let key = kind.resource_key(id);
        let envelope = StoredEnvelope::wrap(kind, payload.clone())?;
        self.stub.put_state(&key, envelope.encode()?)?;
        debug!("Stored {} in the ledger and the overlay", key);
        self.overlay.insert(key, payload);
        Ok(())
    }

    /// Reads the payload of asset `id` of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ThothError::NotFound`] if the asset does not exist, or if the
    /// stored value is an asset of another kind.
    pub fn get_bytes(&mut self, kind: AssetKind, id: &str) -> Result<Vec<u8>> {
        let key = kind.resource_key(id);
        if let Some(payload) = self.overlay.get(&key) {
            debug!("Overlay hit for {}", key);
            return Ok(payload.clone());
        }

        let stored = match self.stub.get_state(&key)? {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(ThothError::NotFound(format!("{} {} not found", kind, id))),
        };
        let envelope = StoredEnvelope::decode(&stored)?;
        if !envelope.is_kind(kind) {
            return Err(ThothError::NotFound(format!(
                "{} {} not found: key holds a {}",
                kind, id, envelope.doc_type
            )));
        }

        debug!("Overlay miss for {}, cached ledger value", key);
        let payload = envelope.payload();
        self.overlay.insert(key, payload.clone());
        Ok(payload)
    }

    /// Returns `true` when asset `id` of `kind` exists for this request.
    pub fn exists(&mut self, kind: AssetKind, id: &str) -> Result<bool> {
        let key = kind.resource_key(id);
        if self.overlay.contains(&key) {
            return Ok(true);
        }
        Ok(self
            .stub
            .get_state(&key)?
            .is_some_and(|bytes| !bytes.is_empty()))
    }

    /// Creates asset `id` of `kind` from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ThothError::Conflict`] if the asset already exists; the stored
    /// value is left untouched.
    pub fn create_bytes(&mut self, kind: AssetKind, id: &str, payload: Vec<u8>) -> Result<()> {
        if self.exists(kind, id)? {
            return Err(ThothError::Conflict(format!(
                "{} {} already exists",
                kind, id
            )));
        }
        self.put_bytes(kind, id, payload)
    }

    /// Creates asset `id` of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ThothError::Conflict`] if the asset already exists.
    pub fn create<T: Serialize>(&mut self, kind: AssetKind, id: &str, asset: &T) -> Result<()> {
        self.create_bytes(kind, id, serde_json::to_vec(asset)?)
    }

    /// Replaces asset `id` of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ThothError::NotFound`] if the asset does not exist.
    pub fn update<T: Serialize>(&mut self, kind: AssetKind, id: &str, asset: &T) -> Result<()> {
        if !self.exists(kind, id)? {
            return Err(ThothError::NotFound(format!("{} {} not found", kind, id)));
        }
        self.put_bytes(kind, id, serde_json::to_vec(asset)?)
    }

    /// Reads and deserializes asset `id` of `kind`.
    pub fn get<T: DeserializeOwned>(&mut self, kind: AssetKind, id: &str) -> Result<T> {
        let payload = self.get_bytes(kind, id)?;
        Ok(serde_json::from_slice(&payload)?)
    }
}
