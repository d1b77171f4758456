//! Common utilities for Thoth integration tests.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thoth::config::ThothConfig;
use thoth::contract::ContractRouter;
use thoth::errors::Result;
use thoth::events::EventKind;
use thoth::gateway::{CallerIdentity, Credentials, LocalNetwork, StaticCredentials};
use thoth::ledger::{MemoryLedger, MemoryTransaction};
use thoth::retry::EntityRequest;
use thoth::store::{AssetQuery, Pagination, RequestContext, SortDirection};
use thoth::{AssetKind, Thoth, UnitOfWork};

/// Plan/status/task index, ordered so that tasks can be listed by plan or by
/// plan and status.
pub const TASK_INDEX: &str = "plan~status~task";

// --- Test assets ---

/// A compute task as the asset layer would store it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub key: String,
    pub plan: String,
    pub status: String,
    pub rank: u32,
}

impl Task {
    pub fn new(key: &str, plan: &str, status: &str, rank: u32) -> Self {
        Self {
            key: key.to_string(),
            plan: plan.to_string(),
            status: status.to_string(),
            rank,
        }
    }
}

impl EntityRequest for Task {
    fn entity_keys(&self) -> Vec<String> {
        vec![self.key.clone()]
    }
}

/// Arguments of `create_tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTasks {
    pub tasks: Vec<Task>,
}

impl EntityRequest for NewTasks {
    fn entity_keys(&self) -> Vec<String> {
        self.tasks.entity_keys()
    }
}

/// Arguments of `update_task_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub key: String,
    pub status: String,
}

/// Arguments of `list_plan_tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFilter {
    pub plan: String,
    pub status: Option<String>,
}

/// Arguments of `query_tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPageRequest {
    pub plan: String,
    pub token: String,
    pub size: u32,
}

/// Response of `query_tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub next_token: String,
}

// --- Helper Functions ---

/// Runs `f` in one request against `ledger` and commits it.
///
/// On error the unit of work and the ledger transaction are dropped.
pub fn run_request<T, F>(ledger: &MemoryLedger, method: &str, read_only: bool, f: F) -> Result<T>
where
    F: FnOnce(&mut UnitOfWork<'_, MemoryTransaction>) -> Result<T>,
{
    let mut transaction = ledger.begin();
    let context = RequestContext::classified(method, read_only);
    let mut unit = UnitOfWork::new(&mut transaction, context);
    let value = f(&mut unit)?;
    unit.commit()?;
    transaction.commit()?;
    Ok(value)
}

/// Stores `task` and its index entry, and queues its creation event.
pub fn store_task(unit: &mut UnitOfWork<'_, MemoryTransaction>, task: &Task) -> Result<()> {
    let store = unit.store_mut();
    store.create(AssetKind::ComputeTask, &task.key, task)?;
    store.create_index(
        TASK_INDEX,
        &[task.plan.as_str(), task.status.as_str(), task.key.as_str()],
    )?;
    unit.emit(
        AssetKind::ComputeTask,
        &task.key,
        EventKind::AssetCreated,
        Some(serde_json::to_value(task)?),
    );
    Ok(())
}

/// Commits `tasks` to `ledger` in a single request.
pub fn seed_tasks(ledger: &MemoryLedger, tasks: &[Task]) {
    run_request(ledger, "seed", false, |unit| {
        for task in tasks {
            store_task(unit, task)?;
        }
        Ok(())
    })
    .unwrap();
}

/// `count` tasks of plan `plan`, keyed `t000`, `t001`, ...
pub fn make_tasks(plan: &str, count: usize) -> Vec<Task> {
    (0..count)
        .map(|i| Task::new(&format!("t{:03}", i), plan, "WAITING", (i % 3) as u32))
        .collect()
}

/// The contract used by the gateway and retry tests.
pub fn task_router() -> ContractRouter<MemoryTransaction> {
    let mut router: ContractRouter<MemoryTransaction> = ContractRouter::new(ThothConfig::default());

    router.register_json("create_task", false, |unit, task: Task| {
        store_task(unit, &task)?;
        Ok(task)
    });

    router.register_json("create_tasks", false, |unit, request: NewTasks| {
        for task in &request.tasks {
            store_task(unit, task)?;
        }
        Ok(request.tasks)
    });

    router.register_json("update_task_status", false, |unit, change: StatusChange| {
        let store = unit.store_mut();
        let mut task: Task = store.get(AssetKind::ComputeTask, &change.key)?;
        store.update_index(
            TASK_INDEX,
            &[task.plan.as_str(), task.status.as_str(), task.key.as_str()],
            &[task.plan.as_str(), change.status.as_str(), task.key.as_str()],
        )?;
        task.status = change.status;
        store.update(AssetKind::ComputeTask, &task.key, &task)?;
        unit.emit(
            AssetKind::ComputeTask,
            &task.key,
            EventKind::AssetUpdated,
            Some(serde_json::to_value(&task)?),
        );
        Ok(task)
    });

    router.register_json("get_task", true, |unit, key: String| {
        unit.store_mut().get::<Task>(AssetKind::ComputeTask, &key)
    });

    router.register_json("list_plan_tasks", true, |unit, filter: PlanFilter| {
        let store = unit.store_mut();
        match &filter.status {
            Some(status) => store.list_keys(TASK_INDEX, &[filter.plan.as_str(), status.as_str()]),
            None => store.list_keys(TASK_INDEX, &[filter.plan.as_str()]),
        }
    });

    router.register_json("query_tasks", true, |unit, request: TaskPageRequest| {
        let query = AssetQuery::new(AssetKind::ComputeTask)
            .filter("plan", request.plan.as_str())
            .sort_by("rank", SortDirection::Ascending);
        let page = unit
            .store_mut()
            .query::<Task>(&query, &Pagination::new(request.token, request.size))?;
        Ok(TaskPage {
            tasks: page.items,
            next_token: page.next_token,
        })
    });

    // Misclassified on purpose: a rich query issued by a mutating method.
    router.register_json("count_tasks_for_update", false, |unit, plan: String| {
        let query = AssetQuery::new(AssetKind::ComputeTask).filter("plan", plan);
        Ok(unit.store_mut().query_unpaged::<Task>(&query)?.len())
    });

    router
}

pub fn org(label: &str) -> CallerIdentity {
    CallerIdentity::new(label)
}

/// Credentials for `org1`, `org2` and `org3`.
pub fn test_credentials() -> Arc<StaticCredentials> {
    let mut credentials = StaticCredentials::new();
    for label in ["org1", "org2", "org3"] {
        credentials.insert(Credentials {
            identity: org(label),
            msp_id: format!("{}MSP", label),
            certificate: format!("cert-{}", label).into_bytes(),
            private_key: format!("key-{}", label).into_bytes(),
        });
    }
    Arc::new(credentials)
}

/// A configuration with fast retries.
pub fn test_config() -> ThothConfig {
    let mut config = ThothConfig::default();
    config.retry.backoff_ms = 5;
    config
}

/// A local network serving [`task_router`] and a `Thoth` connected to it.
pub fn setup_thoth() -> (Thoth, LocalNetwork) {
    let config = test_config();
    let network = LocalNetwork::new(MemoryLedger::new(), task_router(), &config.gateway);
    let thoth = Thoth::local(config, &network, test_credentials()).unwrap();
    (thoth, network)
}
