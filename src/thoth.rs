use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::ThothConfig;
use crate::context::CallContext;
use crate::errors::{Result, ThothError};
use crate::gateway::{CallerIdentity, ClientFactory, CredentialProvider, Gateway, LocalNetwork};
use crate::registry::MethodRegistry;
use crate::retry::{EntityRequest, Reconciler, RetryPolicy};

/// Thoth Prelude
pub mod prelude {
    pub use crate::config::*;
    pub use crate::context::*;
    pub use crate::contract::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::gateway::*;
    pub use crate::ledger::{LedgerStub, MemoryLedger, MemoryTransaction, QueryPage, QueryRow};
    pub use crate::registry::*;
    pub use crate::retry::*;
    pub use crate::store::*;
    pub use crate::unit_of_work::*;
    pub use crate::{AssetKind, CallClass, Thoth};
}

/// The process-level entry point: a gateway to the ledger network, wrapped by
/// the timeout-retry policy and the conflict reconciler.
pub struct Thoth {
    config: ThothConfig,
    gateway: Gateway,
    retry_policy: RetryPolicy,
    reconciler: Reconciler,
}

impl Thoth {
    /// Validates `config` and sets up the gateway. No connection is opened
    /// before the first call of each identity.
    pub fn new(
        config: ThothConfig,
        registry: MethodRegistry,
        credentials: Arc<dyn CredentialProvider>,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self> {
        config.validate()?;
        let gateway = Gateway::new(config.gateway.clone(), registry, credentials, factory);
        Ok(Self {
            retry_policy: RetryPolicy::from(config.retry),
            reconciler: Reconciler::new(),
            gateway,
            config,
        })
    }

    /// Connects to an in-process network, classifying methods the way its
    /// router does.
    pub fn local(
        config: ThothConfig,
        network: &LocalNetwork,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let registry = network.router().registry().clone();
        Self::new(config, registry, credentials, Arc::new(network.clone()))
    }

    pub fn config(&self) -> &ThothConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// One call of `method`, without retry.
    pub async fn invoke<A, R>(
        &self,
        ctx: &CallContext,
        identity: &CallerIdentity,
        method: &str,
        args: &A,
    ) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.gateway.invoke_json(ctx, identity, method, args).await
    }

    /// Calls `method`, retrying it while it times out.
    pub async fn invoke_with_retry<A, R>(
        &self,
        ctx: &CallContext,
        identity: &CallerIdentity,
        method: &str,
        args: &A,
    ) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.retry_policy
            .run(ctx, |attempt| async move {
                self.gateway.invoke_json(&attempt, identity, method, args).await
            })
            .await
    }

    /// Calls the mutating `method`, retrying it while it times out, and
    /// reconciling the conflict a retry of a single-entity request runs into.
    ///
    /// Reconciliation calls `fetch_method` with the entity key of `request`,
    /// as a JSON string, and returns its response.
    pub async fn invoke_reconciled<A, R>(
        &self,
        ctx: &CallContext,
        identity: &CallerIdentity,
        method: &str,
        request: &A,
        fetch_method: &str,
    ) -> Result<R>
    where
        A: Serialize + EntityRequest + ?Sized,
        R: DeserializeOwned,
    {
        let args = serde_json::to_vec(request)?;
        let gateway = &self.gateway;
        let reconciler = &self.reconciler;

        self.retry_policy
            .run(ctx, |attempt| {
                let args = args.clone();
                async move {
                    reconciler
                        .call(
                            &attempt,
                            request,
                            |call_ctx| async move {
                                let response = gateway.invoke(&call_ctx, identity, method, args).await?;
                                decode_response::<R>(method, &response)
                            },
                            |fetch_ctx, key| async move {
                                gateway
                                    .invoke_json::<String, R>(&fetch_ctx, identity, fetch_method, &key)
                                    .await
                            },
                        )
                        .await
                }
            })
            .await
    }

    /// Closes every connection.
    pub fn shutdown(&self) {
        self.gateway.shutdown();
    }
}

fn decode_response<R: DeserializeOwned>(method: &str, response: &[u8]) -> Result<R> {
    serde_json::from_slice(response)
        .map_err(|e| ThothError::Internal(format!("invalid response from {}: {}", method, e)))
}
