use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::errors::ThothError;

/// Cancels the [`CallContext`]s it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// The context threaded through every call: cancellation, an optional
/// deadline and whether the call retries an attempt that timed out.
///
/// Contexts are cheap to clone; clones share the cancellation signal.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
    timeout_retry: bool,
    attempt: u32,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (_, cancel) = watch::channel(false);
        Self {
            cancel,
            deadline: None,
            timeout_retry: false,
            attempt: 1,
        }
    }

    /// A context cancelled by the returned handle.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (sender, cancel) = watch::channel(false);
        let context = Self {
            cancel,
            ..Self::background()
        };
        (
            context,
            CancelHandle {
                sender: Arc::new(sender),
            },
        )
    }

    /// A copy of this context that expires at `deadline`, or earlier if this
    /// context already had an earlier deadline.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// A copy of this context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A copy of this context for the next attempt of a call whose previous
    /// attempt failed with a timeout.
    pub fn with_timeout_retry(&self) -> Self {
        Self {
            timeout_retry: true,
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }

    /// Whether the previous attempt of this call failed with a timeout.
    pub fn is_timeout_retry(&self) -> bool {
        self.timeout_retry
    }

    /// Attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// The error a caller waiting on this context returns once it is done.
    pub fn err(&self) -> Option<ThothError> {
        if *self.cancel.borrow() {
            return Some(canceled());
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(deadline_exceeded()),
            _ => None,
        }
    }

    /// Resolves when the context is cancelled or its deadline passes, with
    /// the corresponding error. Never resolves for a background context.
    pub async fn done(&self) -> ThothError {
        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            loop {
                if *cancel.borrow_and_update() {
                    return;
                }
                if cancel.changed().await.is_err() {
                    // Nobody can cancel anymore.
                    futures::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = cancelled => canceled(),
                _ = tokio::time::sleep_until(deadline) => deadline_exceeded(),
            },
            None => {
                cancelled.await;
                canceled()
            }
        }
    }
}

fn canceled() -> ThothError {
    ThothError::Canceled("context canceled".to_string())
}

fn deadline_exceeded() -> ThothError {
    ThothError::Canceled("context deadline exceeded".to_string())
}
