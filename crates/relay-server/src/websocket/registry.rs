//! Connection Registry: the live set of connections eligible for broadcast.
//!
//! One `RwLock` guards every mutation and every membership read. The
//! broadcaster takes a [`snapshot`](ConnectionRegistry::snapshot) and
//! releases the lock before sending, so a slow send can never hold up
//! joins or removals.

use std::collections::HashMap;
use std::sync::Arc;

use relay_core::ConnectionId;
use tokio::sync::RwLock;

use super::connection::ConnectionHandle;

/// Live connections keyed by identity.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection. Re-adding an ID replaces the previous handle.
    pub async fn add(&self, connection: Arc<ConnectionHandle>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id().clone(), connection);
    }

    /// Remove a connection by identity.
    ///
    /// Returns `false` when it was already absent; that is not an error.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        self.connections.write().await.remove(id).is_some()
    }

    /// Current membership, copied out under the read lock.
    pub async fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Whether `id` is currently registered.
    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connections are registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
