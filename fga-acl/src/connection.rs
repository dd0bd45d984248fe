//! Name-keyed cache of backend connections.
//!
//! The manager is constructed once at process start, shared by every query,
//! and torn down with [`ConnectionManager::shutdown`] at exit. Each logical
//! connection name moves through `Absent → Creating → Cached`:
//!
//! - a cache hit returns the cached connection,
//! - a miss builds a candidate **without holding any lock**, then inserts it
//!   only if the name is still absent,
//! - a caller that loses the insert race closes its own candidate and returns
//!   the winner's.
//!
//! A failed construction caches nothing, so the next call retries cleanly.

use crate::backend::{BoxFuture, FgaBackend};
use crate::config::FgaConfig;
use crate::error::AclError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(doc)]
use crate::grpc::GrpcConnector;

/// Builds a backend connection for a named connection profile.
///
/// [`GrpcConnector`] is the production implementation.
pub trait Connector: Send + Sync + 'static {
    fn connect<'a>(
        &'a self,
        name: &'a str,
        config: &'a FgaConfig,
    ) -> BoxFuture<'a, Result<Arc<dyn FgaBackend>, AclError>>;
}

/// A live backend connection shared read-only by every query on its name.
#[derive(Clone)]
pub struct CachedConnection {
    name: Arc<str>,
    backend: Arc<dyn FgaBackend>,
}

impl CachedConnection {
    /// The logical connection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store this connection was resolved against.
    pub fn store_id(&self) -> &str {
        self.backend.store_id()
    }

    pub fn backend(&self) -> &dyn FgaBackend {
        self.backend.as_ref()
    }

    /// Whether both handles point at the same underlying connection.
    pub fn same_as(&self, other: &CachedConnection) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }
}

impl fmt::Debug for CachedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedConnection")
            .field("name", &self.name)
            .field("store_id", &self.store_id())
            .finish()
    }
}

/// Clonable handle to the process-wide connection cache.
#[derive(Clone)]
pub struct ConnectionManager {
    connections: Arc<DashMap<String, CachedConnection>>,
    connector: Arc<dyn Connector>,
}

impl ConnectionManager {
    /// Create an empty manager building connections with `connector`.
    pub fn new(connector: impl Connector) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            connector: Arc::new(connector),
        }
    }

    /// Return the connection cached under `name`, creating it from `config` on first use.
    pub async fn get(&self, name: &str, config: &FgaConfig) -> Result<CachedConnection, AclError> {
        if let Some(cached) = self.connections.get(name) {
            return Ok(cached.clone());
        }

        // Build outside the map lock: construction performs network calls.
        let backend = self.connector.connect(name, config).await?;
        let candidate = CachedConnection {
            name: Arc::from(name),
            backend,
        };

        match self.connections.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                tracing::warn!(
                    connection = name,
                    "connection created concurrently, discarding duplicate"
                );
                let winner = existing.get().clone();
                drop(existing);
                candidate.backend.close();
                Ok(winner)
            }
            Entry::Vacant(slot) => {
                tracing::debug!(
                    connection = name,
                    store_id = candidate.store_id(),
                    "connection cached"
                );
                slot.insert(candidate.clone());
                Ok(candidate)
            }
        }
    }

    /// Drop and close the connection cached under `name`.
    ///
    /// Returns `true` if a connection was removed.
    pub fn invalidate(&self, name: &str) -> bool {
        match self.connections.remove(name) {
            Some((_, connection)) => {
                tracing::debug!(connection = name, "connection invalidated");
                connection.backend.close();
                true
            }
            None => false,
        }
    }

    /// Close every cached connection.
    pub fn shutdown(&self) {
        let names: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        for name in names {
            self.invalidate(&name);
        }
    }

    /// Whether a connection is cached under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Number of cached connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
