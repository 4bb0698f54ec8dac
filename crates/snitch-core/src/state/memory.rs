// # Memory Topology Store
//
// In-memory implementation of PersistedTopologyStore.
//
// ## When to Use
//
// - Testing environments
// - Nodes bootstrapping with no saved peer placement
// - Embedding the snitch where placement is supplied programmatically

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::endpoint::Endpoint;
use crate::traits::topology_store::{PersistedTopologyStore, TopologyEntry};

/// In-memory persisted topology store
///
/// # Example
///
/// ```rust,no_run
/// use snitch_core::state::MemoryTopologyStore;
/// use snitch_core::traits::{PersistedTopologyStore, TopologyEntry};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryTopologyStore::new();
///     store.insert("10.0.0.2".parse()?, TopologyEntry::new("dc2", "r1")).await;
///
///     let entries = store.load_all().await?;
///     assert_eq!(entries.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTopologyStore {
    inner: Arc<RwLock<HashMap<Endpoint, TopologyEntry>>>,
}

impl MemoryTopologyStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries
    pub fn with_entries(entries: impl IntoIterator<Item = (Endpoint, TopologyEntry)>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(entries.into_iter().collect())),
        }
    }

    /// Insert or replace the entry for an endpoint
    pub async fn insert(&self, endpoint: Endpoint, entry: TopologyEntry) {
        self.inner.write().await.insert(endpoint, entry);
    }

    /// Remove the entry for an endpoint
    pub async fn remove(&self, endpoint: &Endpoint) -> Option<TopologyEntry> {
        self.inner.write().await.remove(endpoint)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl PersistedTopologyStore for MemoryTopologyStore {
    async fn load_all(&self) -> Result<HashMap<Endpoint, TopologyEntry>, Error> {
        Ok(self.inner.read().await.clone())
    }
}
