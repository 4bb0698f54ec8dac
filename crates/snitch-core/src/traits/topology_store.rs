// # Persisted Topology Store Trait
//
// Defines the interface to the node's persisted record of peer placement.
//
// ## Purpose
//
// Before a peer has been seen through the membership service (for example
// right after a restart), the last placement this node saved for it is the
// best answer available. The snitch reads the whole record once and keeps it
// for the life of the process.
//
// ## Implementations
//
// - File-based: `crate::state::FileTopologyStore`
// - In-memory: `crate::state::MemoryTopologyStore`

use async_trait::async_trait;
use std::collections::HashMap;

use crate::endpoint::Endpoint;

/// Persisted placement of one peer
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TopologyEntry {
    /// Datacenter the peer was last seen in
    pub data_center: String,
    /// Rack the peer was last seen in
    pub rack: String,
}

impl TopologyEntry {
    pub fn new(data_center: impl Into<String>, rack: impl Into<String>) -> Self {
        Self {
            data_center: data_center.into(),
            rack: rack.into(),
        }
    }
}

/// Trait for persisted topology stores
///
/// # Thread Safety
///
/// `load_all` may be called concurrently by racing first lookups.
/// Implementations must tolerate that and return the same content.
#[async_trait]
pub trait PersistedTopologyStore: Send + Sync {
    /// Load every persisted entry
    ///
    /// # Returns
    ///
    /// - `Ok(map)`: All known entries (possibly empty)
    /// - `Err(Error)`: The store could not be read
    async fn load_all(&self) -> crate::Result<HashMap<Endpoint, TopologyEntry>>;
}
