//! Domain events and their aggregation into one ledger notification per
//! request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::asset::AssetKind;
use crate::errors::Result;

/// Event queue and dispatch.
pub mod queue;

pub use queue::{DispatchOutcome, EventQueue, EventSink};

/// What happened to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    AssetCreated,
    AssetUpdated,
    AssetDisabled,
}

/// A state change raised by asset-layer code during a request.
///
/// Events are never mutated once built; they are queued in emission order and
/// consumed exactly once when the request commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub asset_key: String,
    pub asset_kind: AssetKind,
    pub event_kind: EventKind,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    /// Snapshot of the asset after the change, when the emitter provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Value>,
}

impl DomainEvent {
    pub fn new(
        id: Uuid,
        asset_kind: AssetKind,
        asset_key: impl Into<String>,
        event_kind: EventKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            asset_key: asset_key.into(),
            asset_kind,
            event_kind,
            metadata: BTreeMap::new(),
            timestamp,
            asset: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_asset(mut self, asset: Value) -> Self {
        self.asset = Some(asset);
        self
    }

    /// Decodes the payload of a notification emitted by
    /// [`EventQueue::dispatch`].
    pub fn decode_batch(payload: &[u8]) -> Result<Vec<DomainEvent>> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Derives the id of the `sequence`-th event of transaction `tx_id`.
///
/// Every endorsing replica executes the same request with the same
/// transaction id, so derived ids are identical across replicas where random
/// ones would not be.
pub fn event_id(tx_id: &str, sequence: usize) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}/{}", tx_id, sequence).as_bytes(),
    )
}
