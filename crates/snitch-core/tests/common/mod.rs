//! Test doubles and common utilities for snitch contract tests
//!
//! Each double records how it was called so tests can assert on the
//! snitch's side effects rather than on its internals.

#![allow(dead_code)]

use snitch_core::error::{Error, Result};
use snitch_core::traits::{
    Attribute, EndpointSnapshot, HostResolver, MembershipService, MembershipSubscriber,
    PersistedTopologyStore, StaticTopology, SubscriptionId, TopologyEntry, TransportRouter,
};
use snitch_core::{Endpoint, GossipingSnitch, SnitchCollaborators, SnitchConfig};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Address the local node is known by
pub const SELF: Endpoint = Endpoint::new(IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 1)));

/// Build an endpoint in 10.0.0.0/24
pub fn peer(last_octet: u8) -> Endpoint {
    Endpoint::from([10, 0, 0, last_octet])
}

/// A membership service whose state is set directly by the test
pub struct MockMembership {
    self_address: Endpoint,
    snapshots: Mutex<HashMap<Endpoint, EndpointSnapshot>>,
    published: Mutex<Vec<Attribute>>,
    subscribers: Mutex<Vec<(SubscriptionId, Arc<dyn MembershipSubscriber>)>>,
    /// Ordered log of "publish" / "subscribe" / "unsubscribe" calls
    calls: Mutex<Vec<&'static str>>,
    snapshot_call_count: AtomicUsize,
    next_id: AtomicU64,
    fail_publish: AtomicBool,
}

impl MockMembership {
    pub fn new(self_address: Endpoint) -> Self {
        Self {
            self_address,
            snapshots: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            snapshot_call_count: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            fail_publish: AtomicBool::new(false),
        }
    }

    /// Make the live snapshot of an endpoint carry these attributes
    pub fn set_snapshot(&self, endpoint: Endpoint, attributes: Vec<Attribute>) {
        let snapshot = attributes
            .into_iter()
            .enumerate()
            .fold(EndpointSnapshot::new(), |snapshot, (version, attribute)| {
                snapshot.with(attribute, version as u64 + 1)
            });
        self.snapshots.lock().unwrap().insert(endpoint, snapshot);
    }

    pub fn fail_publish(&self) {
        self.fail_publish.store(true, Ordering::SeqCst);
    }

    pub fn snapshot_call_count(&self) -> usize {
        self.snapshot_call_count.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<Attribute> {
        self.published.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl MembershipService for MockMembership {
    fn self_address(&self) -> Endpoint {
        self.self_address
    }

    fn snapshot(&self, endpoint: &Endpoint) -> Option<EndpointSnapshot> {
        self.snapshot_call_count.fetch_add(1, Ordering::SeqCst);
        self.snapshots.lock().unwrap().get(endpoint).cloned()
    }

    async fn publish_local_attribute(&self, attribute: Attribute) -> Result<()> {
        self.calls.lock().unwrap().push("publish");
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Error::membership("publish rejected"));
        }
        self.published.lock().unwrap().push(attribute);
        Ok(())
    }

    fn subscribe(&self, subscriber: Arc<dyn MembershipSubscriber>) -> SubscriptionId {
        self.calls.lock().unwrap().push("subscribe");
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.lock().unwrap().push((id, subscriber));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.calls.lock().unwrap().push("unsubscribe");
        self.subscribers.lock().unwrap().retain(|(existing, _)| *existing != id);
    }
}

/// A persisted store that counts loads and can be slowed down or broken
pub struct CountingStore {
    entries: Mutex<HashMap<Endpoint, TopologyEntry>>,
    load_count: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    fail: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            load_count: AtomicUsize::new(0),
            delay: Mutex::new(None),
            fail: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, endpoint: Endpoint, data_center: &str, rack: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(endpoint, TopologyEntry::new(data_center, rack));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PersistedTopologyStore for CountingStore {
    async fn load_all(&self) -> Result<HashMap<Endpoint, TopologyEntry>> {
        self.load_count.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::topology_store("store offline"));
        }
        Ok(self.entries.lock().unwrap().clone())
    }
}

/// A static table answering the same placement for every endpoint
pub struct FixedStaticTopology {
    datacenter: String,
    rack: String,
    call_count: AtomicUsize,
}

impl FixedStaticTopology {
    pub fn new(datacenter: &str, rack: &str) -> Self {
        Self {
            datacenter: datacenter.to_string(),
            rack: rack.to_string(),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl StaticTopology for FixedStaticTopology {
    fn datacenter(&self, _endpoint: &Endpoint) -> String {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.datacenter.clone()
    }

    fn rack(&self, _endpoint: &Endpoint) -> String {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.rack.clone()
    }
}

/// A router recording every reset and the resulting route table
pub struct RecordingRouter {
    resets: Mutex<Vec<(Endpoint, IpAddr)>>,
    routes: Mutex<HashMap<Endpoint, IpAddr>>,
    fail: AtomicBool,
}

impl RecordingRouter {
    pub fn new() -> Self {
        Self {
            resets: Mutex::new(Vec::new()),
            routes: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn resets(&self) -> Vec<(Endpoint, IpAddr)> {
        self.resets.lock().unwrap().clone()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.lock().unwrap().len()
    }

    pub fn routes(&self) -> HashMap<Endpoint, IpAddr> {
        self.routes.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl TransportRouter for RecordingRouter {
    async fn reset_route(&self, endpoint: &Endpoint, target: IpAddr) -> Result<()> {
        self.resets.lock().unwrap().push((*endpoint, target));
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::transport("connection pool closed"));
        }
        self.routes.lock().unwrap().insert(*endpoint, target);
        Ok(())
    }
}

/// A resolver with a fixed name table; unknown names fail
pub struct TableHostResolver {
    names: Mutex<HashMap<String, IpAddr>>,
    call_count: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl TableHostResolver {
    pub fn new() -> Self {
        Self {
            names: Mutex::new(HashMap::new()),
            call_count: AtomicUsize::new(0),
            delay: Mutex::new(None),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn add(&self, name: &str, addr: IpAddr) {
        self.names.lock().unwrap().insert(name.to_string(), addr);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HostResolver for TableHostResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let known = self.names.lock().unwrap().get(host).copied();
        if let Some(addr) = known {
            return Ok(addr);
        }
        host.parse()
            .map_err(|_| Error::resolution(format!("unknown host {}", host)))
    }
}

/// All doubles wired for one snitch
pub struct Harness {
    pub membership: Arc<MockMembership>,
    pub store: Arc<CountingStore>,
    pub static_topology: Option<Arc<FixedStaticTopology>>,
    pub router: Arc<RecordingRouter>,
    pub host_resolver: Arc<TableHostResolver>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            membership: Arc::new(MockMembership::new(SELF)),
            store: Arc::new(CountingStore::new()),
            static_topology: None,
            router: Arc::new(RecordingRouter::new()),
            host_resolver: Arc::new(TableHostResolver::new()),
        }
    }

    pub fn with_static_topology(mut self, datacenter: &str, rack: &str) -> Self {
        self.static_topology = Some(Arc::new(FixedStaticTopology::new(datacenter, rack)));
        self
    }

    pub fn collaborators(&self) -> SnitchCollaborators {
        SnitchCollaborators {
            membership: self.membership.clone(),
            static_topology: self
                .static_topology
                .clone()
                .map(|topology| topology as Arc<dyn StaticTopology>),
            store: self.store.clone(),
            router: self.router.clone(),
            host_resolver: self.host_resolver.clone(),
        }
    }

    /// Build a snitch for dc1/r1
    pub fn snitch(&self, prefer_local: bool) -> Arc<GossipingSnitch> {
        let config = SnitchConfig::new("dc1", "r1").with_prefer_local(prefer_local);
        self.snitch_with(&config)
    }

    pub fn snitch_with(&self, config: &SnitchConfig) -> Arc<GossipingSnitch> {
        Arc::new(
            GossipingSnitch::new(config, self.collaborators()).expect("snitch construction succeeds"),
        )
    }
}
