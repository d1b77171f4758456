//! Safe repetition of mutating calls whose outcome a timeout left unknown.
//!
//! [`RetryPolicy`] re-runs an operation that failed with a timeout and marks
//! the context of every further attempt as a timeout retry. [`Reconciler`]
//! reads that marker: when a retried single-entity create hits a conflict,
//! the previous attempt did go through, and the entity is fetched and
//! returned instead of the error.

/// Outer timeout-retry policy.
pub mod policy;
/// Conflict reconciliation of retried single-entity calls.
pub mod reconciler;

pub use policy::RetryPolicy;
pub use reconciler::Reconciler;

/// A request whose entities can be named.
pub trait EntityRequest {
    /// Keys of the entities the request creates or changes. Exactly one key
    /// makes a single-entity request; anything else is a batch.
    fn entity_keys(&self) -> Vec<String>;
}

impl<T: EntityRequest> EntityRequest for [T] {
    fn entity_keys(&self) -> Vec<String> {
        self.iter().flat_map(EntityRequest::entity_keys).collect()
    }
}

impl<T: EntityRequest> EntityRequest for Vec<T> {
    fn entity_keys(&self) -> Vec<String> {
        self.as_slice().entity_keys()
    }
}
