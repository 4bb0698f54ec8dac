// # Membership Service Traits
//
// Defines the interface to the cluster's membership dissemination mechanism
// and the subscriber contract it delivers events through.
//
// ## Implementations
//
// - In-process: `crate::membership::LocalMembership`
// - Real gossip implementations live outside this crate
//
// ## Usage
//
// ```rust,ignore
// use snitch_core::traits::{Attribute, MembershipService};
//
// async fn advertise(membership: &dyn MembershipService) -> snitch_core::Result<()> {
//     membership
//         .publish_local_attribute(Attribute::InternalIp("10.0.0.5".into()))
//         .await
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::endpoint::Endpoint;

/// Kind of a disseminated endpoint attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Datacenter the endpoint lives in
    Datacenter,
    /// Rack the endpoint lives in
    Rack,
    /// Address same-datacenter peers should prefer
    InternalIp,
}

impl AttributeKind {
    /// Wire name of the attribute
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Datacenter => "DC",
            AttributeKind::Rack => "RACK",
            AttributeKind::InternalIp => "INTERNAL_IP",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An attribute together with its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Datacenter(String),
    Rack(String),
    InternalIp(String),
}

impl Attribute {
    /// Build an attribute from its kind and raw value
    pub fn new(kind: AttributeKind, value: impl Into<String>) -> Self {
        let value = value.into();
        match kind {
            AttributeKind::Datacenter => Attribute::Datacenter(value),
            AttributeKind::Rack => Attribute::Rack(value),
            AttributeKind::InternalIp => Attribute::InternalIp(value),
        }
    }

    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Datacenter(_) => AttributeKind::Datacenter,
            Attribute::Rack(_) => AttributeKind::Rack,
            Attribute::InternalIp(_) => AttributeKind::InternalIp,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Attribute::Datacenter(v) | Attribute::Rack(v) | Attribute::InternalIp(v) => v,
        }
    }
}

/// An attribute value stamped with the version it was published at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub value: String,
    pub version: u64,
}

impl VersionedValue {
    pub fn new(value: impl Into<String>, version: u64) -> Self {
        Self {
            value: value.into(),
            version,
        }
    }
}

/// Point-in-time view of one endpoint's disseminated attributes
///
/// Owned and versioned by the membership service; the snitch only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSnapshot {
    attributes: HashMap<AttributeKind, VersionedValue>,
    alive: bool,
}

impl EndpointSnapshot {
    /// Create an empty snapshot for a live endpoint
    pub fn new() -> Self {
        Self {
            attributes: HashMap::new(),
            alive: true,
        }
    }

    /// Builder-style attribute insertion
    pub fn with(mut self, attribute: Attribute, version: u64) -> Self {
        self.set(attribute, version);
        self
    }

    /// Insert or replace an attribute
    pub fn set(&mut self, attribute: Attribute, version: u64) {
        let kind = attribute.kind();
        let value = match attribute {
            Attribute::Datacenter(v) | Attribute::Rack(v) | Attribute::InternalIp(v) => v,
        };
        self.attributes
            .insert(kind, VersionedValue::new(value, version));
    }

    pub fn get(&self, kind: AttributeKind) -> Option<&VersionedValue> {
        self.attributes.get(&kind)
    }

    /// The raw value of an attribute, if present
    pub fn value(&self, kind: AttributeKind) -> Option<&str> {
        self.get(kind).map(|v| v.value.as_str())
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }
}

impl Default for EndpointSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiver of membership events
///
/// Implementations are invoked from the membership service's dispatch task,
/// concurrently with arbitrary callers. They must not fail back into the
/// dispatcher: every error is handled inside the callback.
#[async_trait]
pub trait MembershipSubscriber: Send + Sync {
    /// An endpoint joined the cluster
    async fn on_join(&self, endpoint: Endpoint, snapshot: &EndpointSnapshot);

    /// An attribute of an endpoint changed
    async fn on_change(&self, endpoint: Endpoint, attribute: &Attribute);

    /// A previously dead endpoint is alive again
    async fn on_alive(&self, endpoint: Endpoint, snapshot: &EndpointSnapshot);

    /// An endpoint was marked dead
    async fn on_dead(&self, endpoint: Endpoint, snapshot: &EndpointSnapshot);

    /// An endpoint restarted
    async fn on_restart(&self, endpoint: Endpoint, snapshot: &EndpointSnapshot);

    /// An endpoint was removed from the cluster
    async fn on_remove(&self, endpoint: Endpoint);
}

/// The cluster membership dissemination service
#[async_trait]
pub trait MembershipService: Send + Sync {
    /// Address this node is known by in the cluster
    fn self_address(&self) -> Endpoint;

    /// Current attribute snapshot for an endpoint, if known
    fn snapshot(&self, endpoint: &Endpoint) -> Option<EndpointSnapshot>;

    /// Publish an attribute into the local node's state
    async fn publish_local_attribute(&self, attribute: Attribute) -> crate::Result<()>;

    /// Register a subscriber for membership events
    fn subscribe(&self, subscriber: Arc<dyn MembershipSubscriber>) -> SubscriptionId;

    /// Revoke a subscription; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}
