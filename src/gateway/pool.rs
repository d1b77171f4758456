use ahash::AHashMap as HashMap;
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{Result, ThothError};
use crate::gateway::client::{CallerIdentity, ClientFactory, CredentialProvider};
use crate::gateway::connection::Connection;
use crate::registry::MethodRegistry;

/// One [`Connection`] per caller identity, opened on first use and kept until
/// [`ConnectionPool::shutdown`].
pub struct ConnectionPool {
    connections: RwLock<HashMap<CallerIdentity, Arc<Connection>>>,
    credentials: Arc<dyn CredentialProvider>,
    factory: Arc<dyn ClientFactory>,
    registry: MethodRegistry,
    queue_capacity: usize,
    shut_down: AtomicBool,
}

impl ConnectionPool {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        factory: Arc<dyn ClientFactory>,
        registry: MethodRegistry,
        queue_capacity: usize,
    ) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            credentials,
            factory,
            registry,
            queue_capacity,
            shut_down: AtomicBool::new(false),
        }
    }

    /// The connection of `identity`, opened if this is its first use.
    ///
    /// Lookups share the read lock. Opening takes the write lock and checks
    /// again, so concurrent first uses of an identity open one connection and
    /// fetch its credentials once.
    pub fn get(&self, identity: &CallerIdentity) -> Result<Arc<Connection>> {
        if let Some(connection) = self.connections.read().get(identity) {
            return Ok(Arc::clone(connection));
        }

        let mut connections = self.connections.write();
        if self.shut_down.load(Ordering::Acquire) {
            return Err(ThothError::Internal("connection pool is shut down".to_string()));
        }
        if let Some(connection) = connections.get(identity) {
            return Ok(Arc::clone(connection));
        }

        let credentials = self.credentials.credentials(identity)?;
        let client = self.factory.connect(&credentials)?;
        let connection = Arc::new(Connection::open(
            identity.clone(),
            client,
            self.registry.clone(),
            self.queue_capacity,
        )?);
        connections.insert(identity.clone(), Arc::clone(&connection));
        Ok(connection)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Closes every connection. Calls still holding one of them receive
    /// [`ThothError::Internal`], and the pool opens no new connection.
    pub fn shutdown(&self) {
        let connections: Vec<Arc<Connection>> = {
            let mut connections = self.connections.write();
            self.shut_down.store(true, Ordering::Release);
            connections.drain().map(|(_, connection)| connection).collect()
        };

        info!("Shutting down {} connections", connections.len());
        for connection in connections {
            connection.close();
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
