//! Lazily loaded cache of persisted peer placement
//!
//! The persisted store is read on the first lookup that reaches this tier
//! and kept for the life of the process. There is no eviction or refresh:
//! live placement comes from the membership service, this tier only covers
//! peers that have not been heard from yet.
//!
//! Loading is double-checked. Racing first lookups may each read the store,
//! but the map is published whole behind the lock, so no reader ever sees a
//! partially populated cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::traits::{PersistedTopologyStore, TopologyEntry};

type Entries = Arc<HashMap<Endpoint, TopologyEntry>>;

pub struct TopologyCache {
    store: Arc<dyn PersistedTopologyStore>,
    entries: RwLock<Option<Entries>>,
    loads: AtomicUsize,
}

impl TopologyCache {
    pub fn new(store: Arc<dyn PersistedTopologyStore>) -> Self {
        Self {
            store,
            entries: RwLock::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Persisted entry for an endpoint, loading the store on first use
    ///
    /// Returns `None` when the endpoint is unknown or the store could not be
    /// read. A failed read leaves the cache unloaded so a later lookup
    /// retries.
    pub async fn get(&self, endpoint: &Endpoint) -> Option<TopologyEntry> {
        let entries = self.entries().await?;
        entries.get(endpoint).cloned()
    }

    /// Whether the store has been loaded
    pub async fn is_loaded(&self) -> bool {
        self.entries.read().await.is_some()
    }

    /// Number of completed store reads since construction
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Drop the loaded entries so the next miss reads the store again
    pub async fn reset(&self) {
        *self.entries.write().await = None;
        debug!("Topology cache reset");
    }

    async fn entries(&self) -> Option<Entries> {
        if let Some(entries) = self.entries.read().await.as_ref() {
            return Some(Arc::clone(entries));
        }

        // The store is read without holding the lock; a concurrent miss may
        // read it too, and the first result to be published wins.
        let loaded = match self.store.load_all().await {
            Ok(loaded) => Arc::new(loaded),
            Err(e) => {
                warn!("Failed to load persisted topology: {}", e);
                return None;
            }
        };
        self.loads.fetch_add(1, Ordering::SeqCst);

        let mut guard = self.entries.write().await;
        match guard.as_ref() {
            Some(existing) => Some(Arc::clone(existing)),
            None => {
                debug!("Loaded persisted topology: {} entries", loaded.len());
                *guard = Some(Arc::clone(&loaded));
                Some(loaded)
            }
        }
    }
}

impl std::fmt::Debug for TopologyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyCache")
            .field("loads", &self.load_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryTopologyStore;

    #[tokio::test]
    async fn loads_once_and_serves_hits_and_misses() {
        let known = Endpoint::from([10, 0, 0, 2]);
        let store = MemoryTopologyStore::with_entries([(known, TopologyEntry::new("dc2", "r1"))]);
        let cache = TopologyCache::new(Arc::new(store));

        assert!(!cache.is_loaded().await);
        assert_eq!(cache.get(&known).await, Some(TopologyEntry::new("dc2", "r1")));
        assert!(cache.get(&Endpoint::from([10, 0, 0, 9])).await.is_none());
        assert!(cache.get(&Endpoint::from([10, 0, 0, 8])).await.is_none());

        assert!(cache.is_loaded().await);
        assert_eq!(cache.load_count(), 1);
    }

    #[tokio::test]
    async fn later_store_writes_are_not_observed_until_reset() {
        let store = MemoryTopologyStore::new();
        let cache = TopologyCache::new(Arc::new(store.clone()));
        let late = Endpoint::from([10, 0, 0, 4]);

        assert!(cache.get(&late).await.is_none());
        store.insert(late, TopologyEntry::new("dc1", "r3")).await;
        assert!(cache.get(&late).await.is_none());

        cache.reset().await;
        assert_eq!(cache.get(&late).await.map(|e| e.rack), Some("r3".to_string()));
        assert_eq!(cache.load_count(), 2);
    }
}
