use log::debug;
use serde_json::Value;

use crate::asset::AssetKind;
use crate::config::ThothConfig;
use crate::errors::Result;
use crate::events::{DispatchOutcome, DomainEvent, EventKind, EventQueue, event_id};
use crate::ledger::LedgerStub;
use crate::store::{LedgerStore, RequestContext};

/// Everything one request reads, writes and announces.
///
/// A unit of work is acquired when the request starts and must be either
/// committed, which emits the queued events as one ledger notification, or
/// abandoned, which discards them. Both consume the unit of work, so the
/// events of a request are dispatched at most once.
pub struct UnitOfWork<'a, S: LedgerStub> {
    store: LedgerStore<'a, S>,
    events: EventQueue,
    /// Number of events built so far, queued or not.
    sequence: usize,
    notification_name: String,
}

impl<'a, S: LedgerStub> UnitOfWork<'a, S> {
    /// Starts a unit of work with the default configuration.
    pub fn new(stub: &'a mut S, context: RequestContext) -> Self {
        Self::with_config(stub, context, &ThothConfig::default())
    }

    pub fn with_config(stub: &'a mut S, context: RequestContext, config: &ThothConfig) -> Self {
        Self {
            store: LedgerStore::with_query_config(stub, context, config.query),
            events: EventQueue::new(),
            sequence: 0,
            notification_name: config.events.notification_name.clone(),
        }
    }

    pub fn store(&self) -> &LedgerStore<'a, S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LedgerStore<'a, S> {
        &mut self.store
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Queues an event built by the caller.
    pub fn enqueue(&mut self, event: DomainEvent) {
        self.events.enqueue(event);
    }

    /// Builds an `event_kind` event about asset `id` of `kind`, ready to be
    /// completed and passed to [`UnitOfWork::enqueue`].
    ///
    /// The event id is derived from the ledger transaction id and the number
    /// of events built before it in this unit of work, and the timestamp is the
    /// transaction timestamp, so replicas executing the same request build
    /// identical events.
    pub fn new_event(&mut self, kind: AssetKind, id: &str, event_kind: EventKind) -> DomainEvent {
        let sequence = self.sequence;
        self.sequence += 1;
        let stub = self.store.stub();
        DomainEvent::new(
            event_id(stub.tx_id(), sequence),
            kind,
            kind.resource_key(id),
            event_kind,
            stub.tx_timestamp(),
        )
    }

    /// Queues an `event_kind` event about asset `id` of `kind`, carrying the
    /// `asset` snapshot when given.
    pub fn emit(&mut self, kind: AssetKind, id: &str, event_kind: EventKind, asset: Option<Value>) {
        let event = self.new_event(kind, id, event_kind);
        let event = match asset {
            Some(asset) => event.with_asset(asset),
            None => event,
        };
        self.events.enqueue(event);
    }

    /// Dispatches the queued events and ends the unit of work.
    pub fn commit(self) -> Result<DispatchOutcome> {
        let UnitOfWork {
            mut store,
            events,
            notification_name,
            ..
        } = self;
        events.dispatch(&notification_name, store.stub())
    }

    /// Ends the unit of work without dispatching its events.
    ///
    /// Ledger writes already staged on the stub are not undone here: the
    /// caller must also drop the ledger transaction for them to be discarded.
    pub fn abandon(self) {
        debug!(
            "Abandoned unit of work of {} with {} queued events",
            self.store.context().method(),
            self.events.len()
        );
    }
}
