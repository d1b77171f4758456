mod common;

use chrono::Utc;
use serde_json::json;
use thoth::config::ThothConfig;
use thoth::errors::{ErrorKind, Result, ThothError};
use thoth::events::{DispatchOutcome, DomainEvent, EventKind, EventQueue, EventSink, event_id};
use thoth::ledger::MemoryLedger;
use thoth::store::RequestContext;
use thoth::{AssetKind, UnitOfWork};

use common::{Task, run_request, store_task};

fn event(key: &str, kind: EventKind) -> DomainEvent {
    DomainEvent::new(
        event_id("tx-test", 0),
        AssetKind::ComputeTask,
        AssetKind::ComputeTask.resource_key(key),
        kind,
        Utc::now(),
    )
    .with_metadata("worker", "org1")
}

#[test]
fn test_dispatch_emits_one_ordered_batch() {
    let ledger = MemoryLedger::new();
    let notifications = ledger.subscribe();

    let first = event("t1", EventKind::AssetCreated);
    let second = event("t1", EventKind::AssetUpdated).with_asset(json!({"status": "DOING"}));

    let mut queue = EventQueue::new();
    queue.enqueue(first.clone());
    queue.enqueue(second.clone());
    assert_eq!(queue.len(), 2);

    let mut transaction = ledger.begin();
    let outcome = queue.dispatch("chaincode-updates", &mut transaction).unwrap();
    assert_eq!(outcome, DispatchOutcome::Emitted(2));
    transaction.commit().unwrap();

    let notification = notifications.try_recv().unwrap();
    assert_eq!(notification.name, "chaincode-updates");
    let decoded = DomainEvent::decode_batch(&notification.payload).unwrap();
    assert_eq!(decoded, vec![first, second]);
    assert!(notifications.try_recv().is_err());
}

#[test]
fn test_empty_queue_emits_nothing() {
    let ledger = MemoryLedger::new();

    let mut transaction = ledger.begin();
    let outcome = EventQueue::new()
        .dispatch("chaincode-updates", &mut transaction)
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Empty);
    transaction.commit().unwrap();

    assert!(ledger.notifications().is_empty());
}

#[test]
fn test_duplicate_events_are_kept() {
    let mut queue = EventQueue::new();
    let duplicate = event("t1", EventKind::AssetCreated);
    queue.enqueue(duplicate.clone());
    queue.enqueue(duplicate.clone());

    let queued: Vec<&DomainEvent> = queue.iter().collect();
    assert_eq!(queued, vec![&duplicate, &duplicate]);
}

#[test]
fn test_committed_request_emits_single_notification() {
    let ledger = MemoryLedger::new();
    run_request(&ledger, "create_tasks", false, |unit| {
        store_task(unit, &Task::new("t1", "p1", "WAITING", 0))?;
        store_task(unit, &Task::new("t2", "p1", "WAITING", 1))?;
        store_task(unit, &Task::new("t3", "p1", "WAITING", 2))?;
        assert_eq!(unit.events().len(), 3);
        Ok(())
    })
    .unwrap();

    let notifications = ledger.notifications();
    assert_eq!(notifications.len(), 1);

    let events = DomainEvent::decode_batch(&notifications[0].payload).unwrap();
    let keys: Vec<&str> = events.iter().map(|e| e.asset_key.as_str()).collect();
    assert_eq!(keys, vec!["computetask:t1", "computetask:t2", "computetask:t3"]);
    assert!(events.iter().all(|e| e.event_kind == EventKind::AssetCreated));
    assert_eq!(
        events[1].asset,
        Some(json!({"key": "t2", "plan": "p1", "status": "WAITING", "rank": 1}))
    );
}

#[test]
fn test_event_ids_follow_transaction_and_position() {
    let ledger = MemoryLedger::new();
    run_request(&ledger, "create_tasks", false, |unit| {
        store_task(unit, &Task::new("t1", "p1", "WAITING", 0))?;
        store_task(unit, &Task::new("t2", "p1", "WAITING", 0))
    })
    .unwrap();

    let notifications = ledger.notifications();
    let notification = &notifications[0];
    let events = DomainEvent::decode_batch(&notification.payload).unwrap();
    assert_eq!(events[0].id, event_id(&notification.tx_id, 0));
    assert_eq!(events[1].id, event_id(&notification.tx_id, 1));
    assert_ne!(events[0].id, events[1].id);
    // Both events carry the transaction timestamp.
    assert_eq!(events[0].timestamp, events[1].timestamp);
}

#[test]
fn test_abandoned_unit_of_work_emits_nothing() {
    let ledger = MemoryLedger::new();

    let mut transaction = ledger.begin();
    let context = RequestContext::classified("create_task", false);
    let mut unit = UnitOfWork::new(&mut transaction, context);
    store_task(&mut unit, &Task::new("t1", "p1", "WAITING", 0)).unwrap();
    unit.abandon();
    transaction.commit().unwrap();

    assert!(ledger.notifications().is_empty());
}

#[test]
fn test_failed_request_emits_nothing() {
    let ledger = MemoryLedger::new();
    seed_one(&ledger);
    let before = ledger.notifications().len();

    // The second create conflicts; the whole request is dropped.
    let err = run_request(&ledger, "create_tasks", false, |unit| {
        store_task(unit, &Task::new("t2", "p1", "WAITING", 0))?;
        store_task(unit, &Task::new("t1", "p1", "WAITING", 0))
    })
    .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(ledger.notifications().len(), before);
}

/// A sink whose every emission fails.
struct UnreachableSink {
    attempts: usize,
}

impl EventSink for UnreachableSink {
    fn emit(&mut self, name: &str, _payload: Vec<u8>) -> Result<()> {
        self.attempts += 1;
        Err(ThothError::Internal(format!("cannot emit {}", name)))
    }
}

#[test]
fn test_sink_failure_fails_dispatch() {
    let mut queue = EventQueue::new();
    queue.enqueue(event("t1", EventKind::AssetCreated));

    let mut sink = UnreachableSink { attempts: 0 };
    let err = queue.dispatch("chaincode-updates", &mut sink).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(sink.attempts, 1);
}

#[test]
fn test_rejected_notification_fails_commit() {
    let ledger = MemoryLedger::new();
    let mut config = ThothConfig::default();
    // The ledger refuses notifications without a name.
    config.events.notification_name = String::new();

    let mut transaction = ledger.begin();
    let context = RequestContext::classified("create_task", false);
    let mut unit = UnitOfWork::with_config(&mut transaction, context, &config);
    store_task(&mut unit, &Task::new("t1", "p1", "WAITING", 0)).unwrap();

    let err = unit.commit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    drop(transaction);
    assert!(ledger.notifications().is_empty());
    assert!(ledger.is_empty());
}

#[test]
fn test_events_built_before_enqueue_get_distinct_ids() {
    let ledger = MemoryLedger::new();
    let mut transaction = ledger.begin();
    let context = RequestContext::classified("create_tasks", false);
    let mut unit = UnitOfWork::new(&mut transaction, context);

    let first = unit.new_event(AssetKind::ComputeTask, "t1", EventKind::AssetCreated);
    let second = unit.new_event(AssetKind::ComputeTask, "t2", EventKind::AssetCreated);
    assert_ne!(first.id, second.id);

    unit.enqueue(second);
    unit.enqueue(first);
    unit.emit(AssetKind::ComputeTask, "t3", EventKind::AssetCreated, None);
    let ids: Vec<_> = unit.events().iter().map(|e| e.id).collect();
    assert_eq!(ids.len(), 3);
    assert_ne!(ids[2], ids[0]);
    assert_ne!(ids[2], ids[1]);
}

fn seed_one(ledger: &MemoryLedger) {
    run_request(ledger, "create_task", false, |unit| {
        store_task(unit, &Task::new("t1", "p1", "WAITING", 0))
    })
    .unwrap();
}
