use log::{debug, warn};
use std::future::Future;

use crate::context::CallContext;
use crate::errors::Result;
use crate::retry::EntityRequest;

/// Turns the conflict of a retried single-entity call into the entity.
///
/// A timeout leaves the outcome of a call unknown. When the retry of a create
/// fails because the entity already exists, the first attempt committed, and
/// the caller gets the entity as if that attempt had answered. Batches are
/// never reconciled: a conflict cannot tell a fully applied batch from a
/// partially applied one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    /// Runs `call` and reconciles its conflict with `fetch`.
    ///
    /// `fetch` receives the key of the single entity of `request` and runs
    /// only when `ctx` is a timeout retry, the call failed with a conflict
    /// and the request names exactly one entity. Every other error is
    /// returned unchanged.
    pub async fn call<R, T, C, CF, F, FF>(
        &self,
        ctx: &CallContext,
        request: &R,
        call: C,
        fetch: F,
    ) -> Result<T>
    where
        R: EntityRequest + ?Sized,
        C: FnOnce(CallContext) -> CF,
        CF: Future<Output = Result<T>>,
        F: FnOnce(CallContext, String) -> FF,
        FF: Future<Output = Result<T>>,
    {
        let err = match call(ctx.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !ctx.is_timeout_retry() || !err.is_conflict() {
            return Err(err);
        }

        let mut keys = request.entity_keys();
        if keys.len() != 1 {
            warn!(
                "Conflict after timeout on a batch of {} entities, not reconciled: {}",
                keys.len(),
                err
            );
            return Err(err);
        }

        let Some(key) = keys.pop() else {
            return Err(err);
        };
        warn!("Reconciling conflict on {} after a timeout: {}", key, err);
        let value = fetch(ctx.clone(), key.clone()).await?;
        debug!("Reconciled {}", key);
        Ok(value)
    }
}
