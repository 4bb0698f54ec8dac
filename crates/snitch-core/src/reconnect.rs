//! Re-routing same-datacenter peers to their internal address
//!
//! Only peers resolved to the local datacenter are ever re-routed. Failures
//! are logged and leave the current route in place; the transport layer
//! still reaches the peer through its public address.

use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error};

use crate::endpoint::Endpoint;
use crate::resolver::{TopologyLookup, TopologyResolver};
use crate::traits::{HostResolver, TransportRouter};

/// What a reconnection attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// The peer is in another datacenter; nothing was touched
    OtherDatacenter { datacenter: String },
    /// The advertised address did not resolve; route unchanged
    Unresolvable,
    /// The router rejected the new route; route unchanged
    RouteFailed,
    /// The peer's route now targets this address
    Rerouted(IpAddr),
}

/// Replaces a peer's route with its advertised internal address
pub struct ReconnectionTrigger {
    resolver: Arc<TopologyResolver>,
    router: Arc<dyn TransportRouter>,
    host_resolver: Arc<dyn HostResolver>,
}

impl ReconnectionTrigger {
    pub fn new(
        resolver: Arc<TopologyResolver>,
        router: Arc<dyn TransportRouter>,
        host_resolver: Arc<dyn HostResolver>,
    ) -> Self {
        Self {
            resolver,
            router,
            host_resolver,
        }
    }

    /// Re-route `endpoint` to `internal_address` if it shares our datacenter
    ///
    /// Never fails: every error is logged and reported in the outcome.
    /// Repeating a call with the same arguments leaves the same route.
    pub async fn reconnect(&self, endpoint: Endpoint, internal_address: &str) -> ReconnectOutcome {
        let datacenter = self.resolver.datacenter(&endpoint).await;
        if datacenter != self.resolver.identity().datacenter {
            debug!(
                "Not re-routing {}: datacenter {} is not local",
                endpoint, datacenter
            );
            return ReconnectOutcome::OtherDatacenter { datacenter };
        }

        let target = match self.host_resolver.resolve(internal_address).await {
            Ok(target) => target,
            Err(e) => {
                error!(
                    "Error resolving internal address {} of {}: {}",
                    internal_address, endpoint, e
                );
                return ReconnectOutcome::Unresolvable;
            }
        };

        if let Err(e) = self.router.reset_route(&endpoint, target).await {
            error!("Failed to re-route {} to {}: {}", endpoint, target, e);
            return ReconnectOutcome::RouteFailed;
        }

        debug!(
            "Initiated reconnect to internal address {} for {}",
            target, endpoint
        );
        ReconnectOutcome::Rerouted(target)
    }
}

impl std::fmt::Debug for ReconnectionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectionTrigger")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
