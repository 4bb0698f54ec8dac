//! Collaborator traits for the snitch
//!
//! The snitch consumes these interfaces and never reaches for global state:
//!
//! - [`MembershipService`]: live per-endpoint attributes and event delivery
//! - [`StaticTopology`]: optional legacy placement table
//! - [`PersistedTopologyStore`]: last saved placement of peers
//! - [`TransportRouter`]: replaces the route used for a peer
//! - [`HostResolver`]: resolves advertised internal addresses

pub mod membership;
pub mod static_topology;
pub mod topology_store;
pub mod transport;

pub use membership::{
    Attribute, AttributeKind, EndpointSnapshot, MembershipService, MembershipSubscriber,
    SubscriptionId, VersionedValue,
};
pub use static_topology::StaticTopology;
pub use topology_store::{PersistedTopologyStore, TopologyEntry};
pub use transport::{HostResolver, TransportRouter};
