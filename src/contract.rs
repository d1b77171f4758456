//! In-ledger dispatch of contract methods.

use ahash::AHashMap as HashMap;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ThothConfig;
use crate::errors::{Result, ThothError};
use crate::ledger::LedgerStub;
use crate::registry::MethodRegistry;
use crate::store::RequestContext;
use crate::unit_of_work::UnitOfWork;

/// A contract method: receives the unit of work of the request and the raw
/// arguments, returns the raw response.
pub type Handler<S> =
    Box<dyn Fn(&mut UnitOfWork<'_, S>, &[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// Routes method invocations to handlers inside a ledger transaction.
///
/// `ContractRouter::execute` is the single place where the consistency flag
/// of a request gets set, before any handler code runs.
pub struct ContractRouter<S: LedgerStub> {
    handlers: HashMap<String, Handler<S>>,
    registry: MethodRegistry,
    config: ThothConfig,
}

impl<S: LedgerStub> Default for ContractRouter<S> {
    fn default() -> Self {
        Self::new(ThothConfig::default())
    }
}

impl<S: LedgerStub> ContractRouter<S> {
    pub fn new(config: ThothConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            registry: MethodRegistry::new(),
            config,
        }
    }

    /// Registers `handler` under `method`, replacing any previous handler.
    pub fn register<F>(&mut self, method: impl Into<String>, read_only: bool, handler: F)
    where
        F: Fn(&mut UnitOfWork<'_, S>, &[u8]) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        let method = method.into();
        if read_only {
            self.registry.register_read_only(method.clone());
        }
        self.handlers.insert(method, Box::new(handler));
    }

    /// Registers a handler taking and returning JSON values.
    ///
    /// Arguments that do not decode as `A` are [`ThothError::BadRequest`].
    pub fn register_json<A, R, F>(&mut self, method: impl Into<String>, read_only: bool, handler: F)
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(&mut UnitOfWork<'_, S>, A) -> Result<R> + Send + Sync + 'static,
    {
        let method = method.into();
        let name = method.clone();
        self.register(method, read_only, move |unit, args| {
            let args: A = serde_json::from_slice(args).map_err(|e| {
                ThothError::BadRequest(format!("invalid arguments for {}: {}", name, e))
            })?;
            let response = handler(unit, args)?;
            Ok(serde_json::to_vec(&response)?)
        });
    }

    /// Classification of the registered methods.
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ThothConfig {
        &self.config
    }

    /// Executes `method` against the transaction behind `stub`.
    ///
    /// The request is classified, its unit of work is opened with the
    /// consistency flag set and handed to the handler. On success the unit of
    /// work is committed, dispatching its events onto `stub`; on failure it is
    /// abandoned and the caller is expected to drop the transaction.
    ///
    /// # Errors
    ///
    /// Unknown methods are [`ThothError::BadRequest`]. Handler and dispatch
    /// errors are returned unchanged.
    pub fn execute(&self, stub: &mut S, method: &str, args: &[u8]) -> Result<Vec<u8>> {
        let handler = self.handlers.get(method).ok_or_else(|| {
            warn!("Rejected call of unknown method {}", method);
            ThothError::BadRequest(format!("unknown method {}", method))
        })?;

        let mut context = RequestContext::new(method);
        context.set_read_only(self.registry.is_read_only(method))?;
        debug!(
            "Executing {} in transaction {} (read_only={})",
            method,
            stub.tx_id(),
            self.registry.is_read_only(method)
        );

        let mut unit = UnitOfWork::with_config(stub, context, &self.config);
        match handler(&mut unit, args) {
            Ok(response) => {
                unit.commit()?;
                Ok(response)
            }
            Err(e) => {
                unit.abandon();
                Err(e)
            }
        }
    }
}
