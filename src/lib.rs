pub mod asset;
pub mod config;
pub mod context;
pub mod contract;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod ledger;
pub mod registry;
pub mod retry;
pub mod store;
pub mod thoth;
pub mod unit_of_work;

// Re-export key types and structs for easier access
pub use asset::AssetKind;
pub use config::ThothConfig;
pub use context::{CallContext, CancelHandle};
pub use contract::ContractRouter;
pub use errors::{ErrorKind, Result, ThothError};
pub use events::{DomainEvent, EventKind, EventQueue};
pub use gateway::{CallerIdentity, Gateway};
pub use ledger::{LedgerStub, MemoryLedger};
pub use registry::MethodRegistry;
pub use retry::{EntityRequest, Reconciler, RetryPolicy};
pub use store::LedgerStore;
pub use thoth::Thoth;
pub use unit_of_work::UnitOfWork;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
///
/// How the ledger network runs a call.
pub enum CallClass {
    ///
    /// [CallClass::Evaluate] runs the call on the peers the gateway reaches
    /// directly and returns their answer. Nothing is ordered or committed, so
    /// the call is cheap, but its state changes are discarded. Read-only
    /// methods are evaluated, and only they may issue rich queries.
    Evaluate,
    ///
    /// [CallClass::Submit] has the call endorsed, ordered by consensus and
    /// committed by every replica. Mutating methods are submitted; their
    /// latency is bound by the ordering service.
    Submit,
}
