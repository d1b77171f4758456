use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{Result, ThothError};

/// The principal on whose behalf calls are made.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallerIdentity {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// What it takes to open a connection for one identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: CallerIdentity,
    /// Organization the identity belongs to.
    pub msp_id: String,
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("msp_id", &self.msp_id)
            .field("certificate", &self.certificate.len())
            .finish_non_exhaustive()
    }
}

/// Source of the credentials of each identity.
///
/// Called once per identity for the lifetime of a pool.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self, identity: &CallerIdentity) -> Result<Credentials>;
}

/// Credentials registered up front.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    entries: HashMap<CallerIdentity, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, credentials: Credentials) {
        self.entries.insert(credentials.identity.clone(), credentials);
    }

    /// Builder form of [`StaticCredentials::insert`].
    pub fn with(mut self, credentials: Credentials) -> Self {
        self.insert(credentials);
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials(&self, identity: &CallerIdentity) -> Result<Credentials> {
        self.entries
            .get(identity)
            .cloned()
            .ok_or_else(|| ThothError::BadRequest(format!("no credentials for {}", identity)))
    }
}

/// A handle to the ledger network opened with one identity's credentials.
///
/// A client is owned by the worker of one connection and never used by two
/// calls at once, hence `Send` without `Sync`.
pub trait LedgerClient: Send {
    /// Runs a read-only call on the peers reachable from this client.
    fn evaluate(&mut self, channel: &str, contract: &str, method: &str, args: &[u8])
    -> Result<Vec<u8>>;

    /// Submits a mutating call for endorsement, ordering and commit.
    fn submit(&mut self, channel: &str, contract: &str, method: &str, args: &[u8])
    -> Result<Vec<u8>>;
}

/// Opens [`LedgerClient`]s.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn LedgerClient>>;
}
