use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

use crate::CallClass;
use crate::context::CallContext;
use crate::errors::{Result, ThothError};
use crate::gateway::client::{CallerIdentity, LedgerClient};
use crate::registry::MethodRegistry;

/// Lifecycle of a connection: `Idle -> Processing -> Idle`, until `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Processing,
    Closed,
}

/// A call to dispatch through a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub channel: String,
    pub contract: String,
    pub method: String,
    pub args: Vec<u8>,
}

struct Job {
    request: InvocationRequest,
    responder: oneshot::Sender<Result<Vec<u8>>>,
}

/// The outcome of a queued call, delivered exactly once.
#[derive(Debug)]
pub struct PendingInvocation {
    method: String,
    receiver: oneshot::Receiver<Result<Vec<u8>>>,
}

impl PendingInvocation {
    fn resolved(method: String, result: Result<Vec<u8>>) -> Self {
        let (responder, receiver) = oneshot::channel();
        // The receiver is alive, the send cannot fail.
        let _ = responder.send(result);
        Self { method, receiver }
    }

    /// Waits for the outcome, or for `ctx` to be done.
    ///
    /// Giving up does not retract the call: the worker still runs it and its
    /// result is dropped.
    pub async fn wait(self, ctx: &CallContext) -> Result<Vec<u8>> {
        let PendingInvocation { method, receiver } = self;
        tokio::select! {
            biased;
            outcome = receiver => outcome.unwrap_or_else(|_| Err(worker_gone(&method))),
            err = ctx.done() => {
                warn!("Abandoned call of {}: {}", method, err);
                Err(err)
            }
        }
    }

    /// Blocks the current thread until the outcome is delivered.
    pub fn wait_blocking(self) -> Result<Vec<u8>> {
        let PendingInvocation { method, receiver } = self;
        futures::executor::block_on(receiver).unwrap_or_else(|_| Err(worker_gone(&method)))
    }
}

fn worker_gone(method: &str) -> ThothError {
    ThothError::Internal(format!("worker dropped the call of {}", method))
}

/// The connection of one caller identity.
///
/// Calls are queued and run strictly one after the other, in submission
/// order, by a dedicated worker thread that owns the client. Calls of
/// different connections run in parallel.
pub struct Connection {
    identity: CallerIdentity,
    sender: Mutex<Option<Sender<Job>>>,
    state: Arc<Mutex<ConnectionState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Starts the worker of `identity` around `client`.
    ///
    /// `capacity` bounds the number of queued calls; a call made while the
    /// queue is full is rejected.
    pub fn open(
        identity: CallerIdentity,
        client: Box<dyn LedgerClient>,
        registry: MethodRegistry,
        capacity: usize,
    ) -> Result<Self> {
        let (sender, receiver) = bounded::<Job>(capacity);
        let state = Arc::new(Mutex::new(ConnectionState::Idle));

        let worker_state = Arc::clone(&state);
        let worker_identity = identity.clone();
        let worker = thread::Builder::new()
            .name(format!("thoth-{}", identity))
            .spawn(move || run_worker(worker_identity, client, registry, receiver, worker_state))
            .map_err(|e| {
                ThothError::Internal(format!("cannot start the worker of {}: {}", identity, e))
            })?;

        info!("Opened connection for {}", identity);
        Ok(Self {
            identity,
            sender: Mutex::new(Some(sender)),
            state,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Queues `request` and returns without waiting for the worker.
    ///
    /// A request made after [`Connection::close`], or while the queue is full,
    /// resolves immediately with [`ThothError::Internal`].
    pub fn request(&self, request: InvocationRequest) -> PendingInvocation {
        let method = request.method.clone();
        let (responder, receiver) = oneshot::channel();
        let job = Job { request, responder };

        let sender = self.sender.lock();
        let rejected = match sender.as_ref() {
            None => Some((job, "connection is closed")),
            Some(sender) => match sender.try_send(job) {
                Ok(()) => None,
                Err(TrySendError::Full(job)) => Some((job, "request queue is full")),
                Err(TrySendError::Disconnected(job)) => Some((job, "connection is closed")),
            },
        };
        drop(sender);

        match rejected {
            None => PendingInvocation { method, receiver },
            Some((_, reason)) => {
                warn!("Rejected call of {} for {}: {}", method, self.identity, reason);
                let err = ThothError::Internal(format!("{}: {}", self.identity, reason));
                PendingInvocation::resolved(method, Err(err))
            }
        }
    }

    /// Closes the request queue, lets the worker run what was already queued
    /// and waits for it to stop. Closing twice is a no-op.
    pub fn close(&self) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };
        drop(sender);

        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("Worker of {} panicked", self.identity);
            }
        }
        *self.state.lock() = ConnectionState::Closed;
        info!("Closed connection for {}", self.identity);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(
    identity: CallerIdentity,
    mut client: Box<dyn LedgerClient>,
    registry: MethodRegistry,
    receiver: Receiver<Job>,
    state: Arc<Mutex<ConnectionState>>,
) {
    while let Ok(Job { request, responder }) = receiver.recv() {
        *state.lock() = ConnectionState::Processing;

        let class = registry.classify(&request.method);
        debug!("Worker of {} dispatching {} ({:?})", identity, request.method, class);
        let result = match class {
            CallClass::Evaluate => client.evaluate(
                &request.channel,
                &request.contract,
                &request.method,
                &request.args,
            ),
            CallClass::Submit => client.submit(
                &request.channel,
                &request.contract,
                &request.method,
                &request.args,
            ),
        };

        if responder.send(result).is_err() {
            debug!("Caller of {} gave up before its result", request.method);
        }
        *state.lock() = ConnectionState::Idle;
    }
    debug!("Worker of {} stopped", identity);
}
