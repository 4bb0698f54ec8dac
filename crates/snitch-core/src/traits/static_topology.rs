// # Static Topology Trait
//
// Legacy, statically configured placement of endpoints. Loaded once when the
// snitch is built; when it cannot be loaded the snitch runs without it.

use crate::endpoint::Endpoint;

/// Statically configured endpoint placement
///
/// Lookups always answer: implementations apply their own default for
/// endpoints they do not list.
pub trait StaticTopology: Send + Sync {
    /// Datacenter of an endpoint
    fn datacenter(&self, endpoint: &Endpoint) -> String;

    /// Rack of an endpoint
    fn rack(&self, endpoint: &Endpoint) -> String;
}
