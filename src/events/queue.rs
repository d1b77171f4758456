use log::debug;
use serde_json::Value;

use crate::errors::Result;
use crate::events::DomainEvent;
use crate::ledger::LedgerStub;

/// Destination of the notification emitted by [`EventQueue::dispatch`].
pub trait EventSink {
    /// Emits one notification. Called at most once per request.
    fn emit(&mut self, name: &str, payload: Vec<u8>) -> Result<()>;
}

impl<S: LedgerStub + ?Sized> EventSink for S {
    fn emit(&mut self, name: &str, payload: Vec<u8>) -> Result<()> {
        self.set_event(name, payload)
    }
}

/// Result of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The queue was empty; nothing was emitted.
    Empty,
    /// One notification carrying this many events was emitted.
    Emitted(usize),
}

/// Ordered, request-scoped queue of domain events.
///
/// The ledger attaches at most one notification to a transaction, so the
/// events raised while processing a request are collected here and leave as
/// a single batch when the request commits.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<DomainEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event`. Events are neither deduplicated nor reordered.
    pub fn enqueue(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainEvent> {
        self.events.iter()
    }

    /// Serializes every queued event and emits them as one notification
    /// named `name`, whose payload is the JSON array of the events in
    /// enqueue order.
    ///
    /// Nothing is emitted for an empty queue. If any event fails to serialize,
    /// nothing is emitted either and the error is returned.
    pub fn dispatch<K: EventSink + ?Sized>(self, name: &str, sink: &mut K) -> Result<DispatchOutcome> {
        if self.events.is_empty() {
            debug!("No event to dispatch");
            return Ok(DispatchOutcome::Empty);
        }

        let batch = self
            .events
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<Value>, _>>()?;
        let payload = serde_json::to_vec(&batch)?;

        let count = batch.len();
        sink.emit(name, payload)?;
        debug!("Dispatched {} events as {:?}", count, name);
        Ok(DispatchOutcome::Emitted(count))
    }
}
