// # Transport Traits
//
// Interfaces to the connection layer: replacing the address outbound
// connections to a peer use, and turning advertised host strings into
// addresses.
//
// ## Implementations
//
// - `crate::transport::RouteTable` (in-memory router)
// - `crate::transport::SystemHostResolver` (tokio DNS lookup)

use async_trait::async_trait;
use std::net::IpAddr;

use crate::endpoint::Endpoint;

/// Owner of the active outbound route per peer
///
/// # Idempotency
///
/// `reset_route` must be safe to call repeatedly with the same or a different
/// target. Concurrent calls for the same endpoint must end with the last
/// write winning.
#[async_trait]
pub trait TransportRouter: Send + Sync {
    /// Replace the active route for `endpoint` with `target`
    async fn reset_route(&self, endpoint: &Endpoint, target: IpAddr) -> crate::Result<()>;
}

/// Resolves advertised host strings to concrete addresses
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve a host name or address literal
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The resolved address
    /// - `Err(Error::Resolution)`: The name could not be resolved
    async fn resolve(&self, host: &str) -> crate::Result<IpAddr>;
}
