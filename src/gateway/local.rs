//! A ledger network running in the current process.
//!
//! [`LocalNetwork`] executes calls with a [`ContractRouter`] against a
//! [`MemoryLedger`], and can be told to fail upcoming submissions with a
//! timeout, either before the call runs or after it committed.

use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::GatewayConfig;
use crate::contract::ContractRouter;
use crate::errors::{Result, ThothError};
use crate::gateway::client::{CallerIdentity, ClientFactory, Credentials, LedgerClient};
use crate::ledger::{MemoryLedger, MemoryTransaction};

/// A failure injected into the next submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The call times out before reaching the ledger; nothing is written.
    TimeoutBeforeExecution,
    /// The call commits, then the response is lost and the caller sees a
    /// timeout.
    TimeoutAfterCommit,
}

struct Network {
    ledger: MemoryLedger,
    router: ContractRouter<MemoryTransaction>,
    channel: String,
    contract: String,
    faults: Mutex<VecDeque<Fault>>,
    evaluations: AtomicU64,
    submissions: AtomicU64,
}

/// [`ClientFactory`] of clients calling a [`ContractRouter`] in process.
///
/// Cloning yields another handle to the same network.
#[derive(Clone)]
pub struct LocalNetwork {
    network: Arc<Network>,
}

impl LocalNetwork {
    /// A network serving `router` on the channel and contract named by
    /// `config`.
    pub fn new(
        ledger: MemoryLedger,
        router: ContractRouter<MemoryTransaction>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            network: Arc::new(Network {
                ledger,
                router,
                channel: config.channel.clone(),
                contract: config.contract.clone(),
                faults: Mutex::new(VecDeque::new()),
                evaluations: AtomicU64::new(0),
                submissions: AtomicU64::new(0),
            }),
        }
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.network.ledger
    }

    pub fn router(&self) -> &ContractRouter<MemoryTransaction> {
        &self.network.router
    }

    /// Queues `fault` for an upcoming submission. Faults apply in the order
    /// they were injected, one per submission.
    pub fn inject(&self, fault: Fault) {
        self.network.faults.lock().push_back(fault);
    }

    /// Number of read-only calls evaluated so far.
    pub fn evaluations(&self) -> u64 {
        self.network.evaluations.load(Ordering::SeqCst)
    }

    /// Number of mutating calls submitted so far, failed ones included.
    pub fn submissions(&self) -> u64 {
        self.network.submissions.load(Ordering::SeqCst)
    }
}

impl ClientFactory for LocalNetwork {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn LedgerClient>> {
        debug!("Local client connected for {}", credentials.identity);
        Ok(Box::new(LocalClient {
            identity: credentials.identity.clone(),
            network: Arc::clone(&self.network),
        }))
    }
}

struct LocalClient {
    identity: CallerIdentity,
    network: Arc<Network>,
}

impl LocalClient {
    fn check_target(&self, channel: &str, contract: &str) -> Result<()> {
        if channel != self.network.channel || contract != self.network.contract {
            return Err(ThothError::BadRequest(format!(
                "no contract {} on channel {}",
                contract, channel
            )));
        }
        Ok(())
    }
}

/// Errors reach callers of a remote network as text only.
fn over_the_wire<T>(result: Result<T>) -> Result<T> {
    result.map_err(|e| ThothError::from_wire(&e.to_wire()))
}

impl LedgerClient for LocalClient {
    fn evaluate(
        &mut self,
        channel: &str,
        contract: &str,
        method: &str,
        args: &[u8],
    ) -> Result<Vec<u8>> {
        self.check_target(channel, contract)?;
        self.network.evaluations.fetch_add(1, Ordering::SeqCst);

        // Evaluated transactions are never committed.
        let mut transaction = self.network.ledger.begin();
        over_the_wire(self.network.router.execute(&mut transaction, method, args))
    }

    fn submit(
        &mut self,
        channel: &str,
        contract: &str,
        method: &str,
        args: &[u8],
    ) -> Result<Vec<u8>> {
        self.check_target(channel, contract)?;
        self.network.submissions.fetch_add(1, Ordering::SeqCst);
        let fault = self.network.faults.lock().pop_front();

        if fault == Some(Fault::TimeoutBeforeExecution) {
            warn!("Injected timeout before {} of {}", method, self.identity);
            return Err(ThothError::Timeout(format!("{} timed out", method)));
        }

        let mut transaction = self.network.ledger.begin();
        let response = over_the_wire(self.network.router.execute(&mut transaction, method, args))?;
        over_the_wire(transaction.commit())?;

        if fault == Some(Fault::TimeoutAfterCommit) {
            warn!("Injected timeout after {} of {} committed", method, self.identity);
            return Err(ThothError::Timeout(format!("{} timed out", method)));
        }
        Ok(response)
    }
}
