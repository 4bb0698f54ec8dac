// # snitch-core
//
// Core library for the gossiping topology snitch.
//
// ## Architecture Overview
//
// Answers "which datacenter and rack is this endpoint in?" and re-routes
// same-datacenter peers to the internal address they advertise:
// - **TopologyResolver**: layered lookup (self → live membership state →
//   static table → persisted placement → sentinel)
// - **TopologyCache**: persisted placement, loaded once on first miss
// - **GossipingSnitch**: membership subscriber and startup hook
// - **ReconnectionTrigger**: same-datacenter route replacement
//
// ## Collaborators
//
// Everything outside the snitch is reached through the traits in
// [`traits`]: the membership service, the static table, the persisted
// store, the transport router and the host resolver. [`membership`],
// [`state`], [`static_topology`] and [`transport`] provide in-process
// implementations.

pub mod cache;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod membership;
pub mod reconnect;
pub mod resolver;
pub mod snitch;
pub mod state;
pub mod static_topology;
pub mod traits;
pub mod transport;

// Re-export core types for convenience
pub use cache::TopologyCache;
pub use config::{SelfIdentity, SnitchConfig};
pub use endpoint::{Endpoint, TopologyInfo};
pub use error::{Error, Result};
pub use membership::{LocalMembership, MembershipEvent};
pub use reconnect::{ReconnectOutcome, ReconnectionTrigger};
pub use resolver::{TopologyLookup, TopologyResolver, UNKNOWN_DC, UNKNOWN_RACK};
pub use snitch::{GossipingSnitch, SnitchCollaborators};
pub use state::{FileTopologyStore, MemoryTopologyStore};
pub use static_topology::{PropertyFileTopology, load_static_topology};
pub use traits::{
    Attribute, AttributeKind, EndpointSnapshot, HostResolver, MembershipService,
    MembershipSubscriber, PersistedTopologyStore, StaticTopology, TopologyEntry,
    TransportRouter,
};
pub use transport::{RouteTable, SystemHostResolver};
