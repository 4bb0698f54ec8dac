//! Datacenter and rack resolution
//!
//! Every lookup walks the same chain, stopping at the first tier that
//! answers:
//!
//! 1. The local node answers from its own configuration.
//! 2. The membership service's live snapshot, if it carries the attribute.
//! 3. The legacy static table, if it loaded at construction.
//! 4. The persisted peer placement (loaded once), then the unknown sentinel.
//!
//! Datacenter and rack walk the chain independently, so the two halves of
//! one endpoint's placement can come from different tiers.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

use crate::cache::TopologyCache;
use crate::config::SelfIdentity;
use crate::endpoint::{Endpoint, TopologyInfo};
use crate::traits::{
    AttributeKind, MembershipService, PersistedTopologyStore, StaticTopology, TopologyEntry,
};

/// Datacenter reported when no tier knows the endpoint
pub const UNKNOWN_DC: &str = "UNKNOWN_DC";

/// Rack reported when no tier knows the endpoint
pub const UNKNOWN_RACK: &str = "UNKNOWN_RACK";

/// Topology lookups exposed to the rest of the node
///
/// Lookups never fail: an endpoint nobody knows resolves to the sentinels.
#[async_trait]
pub trait TopologyLookup: Send + Sync {
    async fn datacenter(&self, endpoint: &Endpoint) -> String;

    async fn rack(&self, endpoint: &Endpoint) -> String;

    async fn topology(&self, endpoint: &Endpoint) -> TopologyInfo {
        TopologyInfo {
            datacenter: self.datacenter(endpoint).await,
            rack: self.rack(endpoint).await,
        }
    }
}

/// Which half of the placement a lookup resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopologyField {
    Datacenter,
    Rack,
}

impl TopologyField {
    fn attribute(self) -> AttributeKind {
        match self {
            TopologyField::Datacenter => AttributeKind::Datacenter,
            TopologyField::Rack => AttributeKind::Rack,
        }
    }

    fn sentinel(self) -> &'static str {
        match self {
            TopologyField::Datacenter => UNKNOWN_DC,
            TopologyField::Rack => UNKNOWN_RACK,
        }
    }

    fn of_identity(self, identity: &SelfIdentity) -> &str {
        match self {
            TopologyField::Datacenter => &identity.datacenter,
            TopologyField::Rack => &identity.rack,
        }
    }

    fn of_static(self, topology: &dyn StaticTopology, endpoint: &Endpoint) -> String {
        match self {
            TopologyField::Datacenter => topology.datacenter(endpoint),
            TopologyField::Rack => topology.rack(endpoint),
        }
    }

    fn of_entry(self, entry: TopologyEntry) -> String {
        match self {
            TopologyField::Datacenter => entry.data_center,
            TopologyField::Rack => entry.rack,
        }
    }
}

/// Resolves endpoint placement through the fallback chain
pub struct TopologyResolver {
    identity: SelfIdentity,
    membership: Arc<dyn MembershipService>,
    static_topology: Option<Arc<dyn StaticTopology>>,
    cache: TopologyCache,
}

impl TopologyResolver {
    /// Create a resolver
    ///
    /// `static_topology` is whatever the legacy table load produced; `None`
    /// skips that tier for every lookup.
    pub fn new(
        identity: SelfIdentity,
        membership: Arc<dyn MembershipService>,
        static_topology: Option<Arc<dyn StaticTopology>>,
        store: Arc<dyn PersistedTopologyStore>,
    ) -> Self {
        Self {
            identity,
            membership,
            static_topology,
            cache: TopologyCache::new(store),
        }
    }

    pub fn identity(&self) -> &SelfIdentity {
        &self.identity
    }

    pub fn cache(&self) -> &TopologyCache {
        &self.cache
    }

    pub fn has_static_topology(&self) -> bool {
        self.static_topology.is_some()
    }

    async fn resolve(&self, endpoint: &Endpoint, field: TopologyField) -> String {
        if *endpoint == self.membership.self_address() {
            return field.of_identity(&self.identity).to_string();
        }

        if let Some(snapshot) = self.membership.snapshot(endpoint)
            && let Some(value) = snapshot.value(field.attribute())
        {
            trace!("{} of {} from live membership state", field.attribute(), endpoint);
            return value.to_string();
        }

        if let Some(topology) = &self.static_topology {
            trace!("{} of {} from static topology", field.attribute(), endpoint);
            return field.of_static(topology.as_ref(), endpoint);
        }

        match self.cache.get(endpoint).await {
            Some(entry) => {
                trace!("{} of {} from persisted topology", field.attribute(), endpoint);
                field.of_entry(entry)
            }
            None => field.sentinel().to_string(),
        }
    }
}

#[async_trait]
impl TopologyLookup for TopologyResolver {
    async fn datacenter(&self, endpoint: &Endpoint) -> String {
        self.resolve(endpoint, TopologyField::Datacenter).await
    }

    async fn rack(&self, endpoint: &Endpoint) -> String {
        self.resolve(endpoint, TopologyField::Rack).await
    }
}

impl std::fmt::Debug for TopologyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyResolver")
            .field("identity", &self.identity)
            .field("static_topology", &self.static_topology.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}
