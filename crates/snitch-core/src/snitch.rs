//! The gossiping snitch
//!
//! [`GossipingSnitch`] ties the pieces together:
//!
//! ```text
//!   callers ──datacenter/rack──► TopologyResolver ◄──────────┐
//!                                                            │ same-DC check
//!   membership ──on_join/on_change/on_alive──► handler ──► ReconnectionTrigger
//!                                                            │
//!                                                            ▼
//!                                                     TransportRouter
//! ```
//!
//! ## Lifecycle
//!
//! 1. Build with [`GossipingSnitch::new()`] (fails only on bad configuration)
//! 2. Call [`GossipingSnitch::on_service_starting()`] once, before the
//!    membership service starts dispatching
//! 3. Call [`GossipingSnitch::shutdown()`] to revoke the subscription

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use crate::config::{SelfIdentity, SnitchConfig};
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::reconnect::{ReconnectOutcome, ReconnectionTrigger};
use crate::resolver::{TopologyLookup, TopologyResolver};
use crate::traits::{
    Attribute, AttributeKind, EndpointSnapshot, HostResolver, MembershipService,
    MembershipSubscriber, PersistedTopologyStore, StaticTopology, SubscriptionId,
    TransportRouter,
};
use crate::transport::local_host_name;

/// Everything the snitch talks to
#[derive(Clone)]
pub struct SnitchCollaborators {
    pub membership: Arc<dyn MembershipService>,
    /// Legacy table, `None` when it failed to load
    pub static_topology: Option<Arc<dyn StaticTopology>>,
    pub store: Arc<dyn PersistedTopologyStore>,
    pub router: Arc<dyn TransportRouter>,
    pub host_resolver: Arc<dyn HostResolver>,
}

/// Topology snitch driven by membership dissemination
pub struct GossipingSnitch {
    resolver: Arc<TopologyResolver>,
    trigger: ReconnectionTrigger,
    membership: Arc<dyn MembershipService>,
    host_resolver: Arc<dyn HostResolver>,
    /// Configured internal address; the host name is used when unset
    listen_address: Option<String>,
    /// Set once the startup hook has run; held for its whole duration
    startup: tokio::sync::Mutex<bool>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl GossipingSnitch {
    /// Create a snitch
    ///
    /// # Returns
    ///
    /// - `Ok(snitch)`: ready for [`GossipingSnitch::on_service_starting`]
    /// - `Err(Error::Config)`: `dc` or `rack` is missing
    pub fn new(config: &SnitchConfig, collaborators: SnitchCollaborators) -> Result<Self> {
        let identity = config.identity()?;
        info!(
            "Snitch placement: datacenter={}, rack={}, prefer_local={}",
            identity.datacenter, identity.rack, identity.prefer_local
        );

        let resolver = Arc::new(TopologyResolver::new(
            identity,
            Arc::clone(&collaborators.membership),
            collaborators.static_topology,
            collaborators.store,
        ));
        let trigger = ReconnectionTrigger::new(
            Arc::clone(&resolver),
            collaborators.router,
            Arc::clone(&collaborators.host_resolver),
        );

        Ok(Self {
            resolver,
            trigger,
            membership: collaborators.membership,
            host_resolver: collaborators.host_resolver,
            listen_address: config.listen_address().map(str::to_string),
            startup: tokio::sync::Mutex::new(false),
            subscription: Mutex::new(None),
        })
    }

    pub fn identity(&self) -> &SelfIdentity {
        self.resolver.identity()
    }

    pub fn resolver(&self) -> &Arc<TopologyResolver> {
        &self.resolver
    }

    /// Startup hook, run once before event dispatch begins
    ///
    /// Publishes this node's internal address, then subscribes the snitch.
    /// Publishing problems are logged; the subscription is registered
    /// regardless. Later calls, including concurrent ones, wait for the
    /// first to finish and return its subscription (`None` once
    /// [`GossipingSnitch::shutdown`] has revoked it).
    pub async fn on_service_starting(self: &Arc<Self>) -> Option<SubscriptionId> {
        let mut started = self.startup.lock().await;
        if *started {
            warn!("Snitch startup hook already ran");
            return self.subscription_id();
        }
        *started = true;

        self.publish_internal_address().await;

        let id = self
            .membership
            .subscribe(Arc::clone(self) as Arc<dyn MembershipSubscriber>);
        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);
        Some(id)
    }

    /// Resolve and publish the address same-datacenter peers should use
    ///
    /// Loopback addresses are never published.
    async fn publish_internal_address(&self) {
        let host = match self.listen_address {
            Some(ref configured) => configured.clone(),
            None => match local_host_name() {
                Ok(name) => name,
                Err(e) => {
                    error!("Unable to determine local host name: {}", e);
                    return;
                }
            },
        };

        let addr = match self.host_resolver.resolve(&host).await {
            Ok(addr) => addr,
            Err(e) => {
                error!("Unable to resolve local address {}: {}", host, e);
                return;
            }
        };

        if addr.is_loopback() {
            warn!(
                "Local address {} resolves to loopback {}; not advertising an internal address",
                host, addr
            );
            return;
        }

        let attribute = Attribute::InternalIp(addr.to_string());
        match self.membership.publish_local_attribute(attribute).await {
            Ok(()) => info!("Published internal address {}", addr),
            Err(e) => error!("Failed to publish internal address {}: {}", addr, e),
        }
    }

    /// Revoke the membership subscription, if any
    pub fn shutdown(&self) {
        let id = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = id {
            self.membership.unsubscribe(id);
            info!("Snitch unsubscribed from membership events");
        }
    }

    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-route a peer to its internal address (same datacenter only)
    pub async fn reconnect(&self, endpoint: Endpoint, internal_address: &str) -> ReconnectOutcome {
        self.trigger.reconnect(endpoint, internal_address).await
    }

    async fn reconnect_from_snapshot(&self, endpoint: Endpoint, snapshot: &EndpointSnapshot) {
        if !self.identity().prefer_local {
            return;
        }
        if let Some(internal) = snapshot.value(AttributeKind::InternalIp) {
            self.reconnect(endpoint, internal).await;
        }
    }
}

#[async_trait]
impl MembershipSubscriber for GossipingSnitch {
    async fn on_join(&self, endpoint: Endpoint, snapshot: &EndpointSnapshot) {
        self.reconnect_from_snapshot(endpoint, snapshot).await;
    }

    async fn on_change(&self, endpoint: Endpoint, attribute: &Attribute) {
        match attribute {
            Attribute::InternalIp(internal) => {
                if self.identity().prefer_local {
                    self.reconnect(endpoint, internal).await;
                }
            }
            Attribute::Datacenter(_) | Attribute::Rack(_) => {}
        }
    }

    // A dead peer that comes back without re-joining only shows up here.
    async fn on_alive(&self, endpoint: Endpoint, snapshot: &EndpointSnapshot) {
        self.reconnect_from_snapshot(endpoint, snapshot).await;
    }

    async fn on_dead(&self, _endpoint: Endpoint, _snapshot: &EndpointSnapshot) {}

    async fn on_restart(&self, _endpoint: Endpoint, _snapshot: &EndpointSnapshot) {}

    async fn on_remove(&self, _endpoint: Endpoint) {}
}

#[async_trait]
impl TopologyLookup for GossipingSnitch {
    async fn datacenter(&self, endpoint: &Endpoint) -> String {
        self.resolver.datacenter(endpoint).await
    }

    async fn rack(&self, endpoint: &Endpoint) -> String {
        self.resolver.rack(endpoint).await
    }
}

impl std::fmt::Debug for GossipingSnitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipingSnitch")
            .field("resolver", &self.resolver)
            .field("listen_address", &self.listen_address)
            .field("subscription", &self.subscription_id())
            .finish_non_exhaustive()
    }
}
