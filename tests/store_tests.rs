mod common;

use serde_json::{Value, json};
use thoth::errors::{ErrorKind, ThothError};
use thoth::ledger::{LedgerStub, MemoryLedger};
use thoth::store::{LedgerStore, RequestContext, StoredEnvelope};
use thoth::AssetKind;

use common::{Task, run_request};

#[test]
fn test_put_then_get_reads_own_write_before_commit() {
    let ledger = MemoryLedger::new();
    let mut transaction = ledger.begin();
    let mut store = LedgerStore::new(&mut transaction, RequestContext::classified("put", false));

    let payload = br#"{"a":1}"#.to_vec();
    store
        .put_bytes(AssetKind::ComputeTask, "t1", payload.clone())
        .unwrap();

    // The ledger itself does not expose the pending write to its transaction.
    assert_eq!(store.stub().get_state("computetask:t1").unwrap(), None);
    assert_eq!(store.get_bytes(AssetKind::ComputeTask, "t1").unwrap(), payload);
    assert!(store.exists(AssetKind::ComputeTask, "t1").unwrap());
}

#[test]
fn test_payload_bytes_are_preserved_exactly() {
    let ledger = MemoryLedger::new();
    let payload = br#"{ "b" : [1, 2],   "a": "x" }"#.to_vec();

    let written = payload.clone();
    run_request(&ledger, "put", false, move |unit| {
        unit.store_mut()
            .put_bytes(AssetKind::Model, "m1", written)
    })
    .unwrap();

    let read = run_request(&ledger, "get", true, |unit| {
        unit.store_mut().get_bytes(AssetKind::Model, "m1")
    })
    .unwrap();
    assert_eq!(read, payload);

    let stored = ledger.get("model:m1").unwrap();
    let envelope = StoredEnvelope::decode(&stored).unwrap();
    assert_eq!(envelope.doc_type, "model");
}

#[test]
fn test_surrounding_whitespace_is_preserved() {
    let ledger = MemoryLedger::new();
    let payload = b" \t{\"a\":1}\r\n".to_vec();

    let read_in_request = run_request(&ledger, "put", false, |unit| {
        let store = unit.store_mut();
        store.put_bytes(AssetKind::ComputeTask, "t1", payload.clone())?;
        store.get_bytes(AssetKind::ComputeTask, "t1")
    })
    .unwrap();
    assert_eq!(read_in_request, payload);

    let read_later = run_request(&ledger, "get", true, |unit| {
        unit.store_mut().get_bytes(AssetKind::ComputeTask, "t1")
    })
    .unwrap();
    assert_eq!(read_later, payload);

    // The asset itself is still queryable JSON.
    let read: Value = run_request(&ledger, "get", true, |unit| {
        unit.store_mut().get(AssetKind::ComputeTask, "t1")
    })
    .unwrap();
    assert_eq!(read, json!({"a": 1}));
}

#[test]
fn test_whitespace_only_payload_is_bad_request() {
    let ledger = MemoryLedger::new();
    let err = run_request(&ledger, "put", false, |unit| {
        unit.store_mut()
            .put_bytes(AssetKind::ComputeTask, "t1", b" \n ".to_vec())
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[test]
fn test_get_missing_asset_is_not_found() {
    let ledger = MemoryLedger::new();
    let err = run_request(&ledger, "get", true, |unit| {
        unit.store_mut().get_bytes(AssetKind::ComputeTask, "missing")
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_scenario_create_then_duplicate_create_conflicts() {
    let ledger = MemoryLedger::new();

    run_request(&ledger, "create", false, |unit| {
        unit.store_mut()
            .create(AssetKind::ComputeTask, "t1", &json!({"a": 1}))
    })
    .unwrap();

    let read: Value = run_request(&ledger, "get", true, |unit| {
        unit.store_mut().get(AssetKind::ComputeTask, "t1")
    })
    .unwrap();
    assert_eq!(read, json!({"a": 1}));

    let err = run_request(&ledger, "create", false, |unit| {
        unit.store_mut()
            .create(AssetKind::ComputeTask, "t1", &json!({"a": 2}))
    })
    .unwrap_err();
    assert!(err.is_conflict(), "unexpected error {:?}", err);

    // The first value is untouched.
    let read: Value = run_request(&ledger, "get", true, |unit| {
        unit.store_mut().get(AssetKind::ComputeTask, "t1")
    })
    .unwrap();
    assert_eq!(read, json!({"a": 1}));
}

#[test]
fn test_duplicate_create_in_same_request_conflicts() {
    let ledger = MemoryLedger::new();
    let err = run_request(&ledger, "create", false, |unit| {
        let store = unit.store_mut();
        store.create(AssetKind::ComputeTask, "t1", &json!({"a": 1}))?;
        store.create(AssetKind::ComputeTask, "t1", &json!({"a": 2}))
    })
    .unwrap_err();
    assert!(err.is_conflict());

    // The failed request wrote nothing.
    assert!(ledger.is_empty());
}

#[test]
fn test_concurrent_duplicate_creates_are_rejected_at_commit() {
    // Two requests both see t1 absent and create it. The ledger accepts the
    // first commit and aborts the second on its stale read.
    let ledger = MemoryLedger::new();

    let mut first = ledger.begin();
    let mut second = ledger.begin();
    {
        let mut store = LedgerStore::new(&mut first, RequestContext::classified("create", false));
        store
            .create(AssetKind::ComputeTask, "t1", &json!({"by": "first"}))
            .unwrap();
    }
    {
        let mut store =
            LedgerStore::new(&mut second, RequestContext::classified("create", false));
        store
            .create(AssetKind::ComputeTask, "t1", &json!({"by": "second"}))
            .unwrap();
    }

    first.commit().unwrap();
    let err = second.commit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Aborted);

    let read: Value = run_request(&ledger, "get", true, |unit| {
        unit.store_mut().get(AssetKind::ComputeTask, "t1")
    })
    .unwrap();
    assert_eq!(read, json!({"by": "first"}));
}

#[test]
fn test_read_is_stable_for_the_request() {
    let ledger = MemoryLedger::new();
    run_request(&ledger, "create", false, |unit| {
        unit.store_mut()
            .create(AssetKind::ComputeTask, "t1", &json!({"v": 1}))
    })
    .unwrap();

    let mut reader = ledger.begin();
    let mut store = LedgerStore::new(&mut reader, RequestContext::classified("read", true));
    let before: Value = store.get(AssetKind::ComputeTask, "t1").unwrap();

    // Another request replaces the value in the meantime.
    run_request(&ledger, "update", false, |unit| {
        unit.store_mut()
            .update(AssetKind::ComputeTask, "t1", &json!({"v": 2}))
    })
    .unwrap();

    let after: Value = store.get(AssetKind::ComputeTask, "t1").unwrap();
    assert_eq!(before, after);
    assert_eq!(after, json!({"v": 1}));
    assert_eq!(store.overlay().len(), 1);
}

#[test]
fn test_update_requires_existing_asset() {
    let ledger = MemoryLedger::new();
    let err = run_request(&ledger, "update", false, |unit| {
        unit.store_mut()
            .update(AssetKind::ComputePlan, "p1", &json!({"name": "plan"}))
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_update_is_visible_in_same_request() {
    let ledger = MemoryLedger::new();
    let task = run_request(&ledger, "update", false, |unit| {
        let store = unit.store_mut();
        store.create(AssetKind::ComputeTask, "t1", &Task::new("t1", "p1", "WAITING", 0))?;
        store.update(AssetKind::ComputeTask, "t1", &Task::new("t1", "p1", "DOING", 0))?;
        store.get::<Task>(AssetKind::ComputeTask, "t1")
    })
    .unwrap();
    assert_eq!(task.status, "DOING");
}

#[test]
fn test_value_of_another_kind_is_not_found() {
    let ledger = MemoryLedger::new();

    // Corrupt the key of a task with an envelope of another kind.
    let mut transaction = ledger.begin();
    let envelope = StoredEnvelope::wrap(AssetKind::Model, br#"{"m":1}"#.to_vec()).unwrap();
    transaction
        .put_state("computetask:t1", envelope.encode().unwrap())
        .unwrap();
    transaction.commit().unwrap();

    let err = run_request(&ledger, "get", true, |unit| {
        unit.store_mut().get_bytes(AssetKind::ComputeTask, "t1")
    })
    .unwrap_err();
    assert!(matches!(err, ThothError::NotFound(_)));
}

#[test]
fn test_non_json_payload_is_bad_request() {
    let ledger = MemoryLedger::new();
    let err = run_request(&ledger, "put", false, |unit| {
        unit.store_mut()
            .put_bytes(AssetKind::ComputeTask, "t1", b"not json".to_vec())
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[test]
fn test_consistency_flag_is_set_once() {
    let mut context = RequestContext::new("create_task");
    assert_eq!(context.read_only(), None);
    context.set_read_only(false).unwrap();
    let err = context.set_read_only(true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(context.read_only(), Some(false));
}
