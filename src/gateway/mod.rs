//! Invocation gateway: pooled, per-identity, serialized calls into the ledger
//! network.

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::context::CallContext;
use crate::errors::{Result, ThothError};
use crate::registry::MethodRegistry;

/// Identities, credentials and ledger client traits.
pub mod client;
/// Serialized connection of one identity.
pub mod connection;
/// In-process ledger network.
pub mod local;
/// Connection pool keyed by identity.
pub mod pool;

pub use client::{
    CallerIdentity, ClientFactory, CredentialProvider, Credentials, LedgerClient,
    StaticCredentials,
};
pub use connection::{Connection, ConnectionState, InvocationRequest, PendingInvocation};
pub use local::{Fault, LocalNetwork};
pub use pool::ConnectionPool;

/// Dispatches calls to the configured channel and contract through the
/// connection of the calling identity.
pub struct Gateway {
    pool: ConnectionPool,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        registry: MethodRegistry,
        credentials: Arc<dyn CredentialProvider>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        let pool = ConnectionPool::new(credentials, factory, registry, config.queue_capacity);
        Self { pool, config }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Queues a call of `method` for `identity` without waiting for it.
    pub fn request(
        &self,
        identity: &CallerIdentity,
        method: &str,
        args: Vec<u8>,
    ) -> Result<PendingInvocation> {
        let connection = self.pool.get(identity)?;
        Ok(connection.request(InvocationRequest {
            channel: self.config.channel.clone(),
            contract: self.config.contract.clone(),
            method: method.to_string(),
            args,
        }))
    }

    /// Calls `method` for `identity` and waits for the response, or for `ctx`
    /// to be done.
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        identity: &CallerIdentity,
        method: &str,
        args: Vec<u8>,
    ) -> Result<Vec<u8>> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        debug!("Invoking {} for {} (attempt {})", method, identity, ctx.attempt());
        self.request(identity, method, args)?.wait(ctx).await
    }

    /// [`Gateway::invoke`] with JSON arguments and response.
    pub async fn invoke_json<A, R>(
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
        let args = serde_json::to_vec(args)?;
        let response = self.invoke(ctx, identity, method, args).await?;
        serde_json::from_slice(&response).map_err(|e| {
            ThothError::Internal(format!("invalid response from {}: {}", method, e))
        })
    }

    /// Closes every connection.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}
