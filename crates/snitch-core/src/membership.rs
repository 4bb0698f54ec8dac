//! In-process membership service
//!
//! [`LocalMembership`] keeps per-endpoint attribute snapshots and delivers
//! membership events to subscribers from a dedicated dispatch task, the same
//! way a gossip implementation would deliver them from its own thread.
//!
//! ## Event Flow
//!
//! ```text
//! apply / join / mark_alive / ...      (caller task)
//!        │  state updated immediately, event queued
//!        ▼
//! ┌──────────────┐
//! │ dispatch task│── on_* ──► every subscriber registered when queued
//! └──────────────┘
//! ```
//!
//! Events are delivered in the order they were queued. A subscriber only
//! receives events queued after it subscribed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::traits::{
    Attribute, EndpointSnapshot, MembershipService, MembershipSubscriber, SubscriptionId,
};

/// Events delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    Join(Endpoint, EndpointSnapshot),
    Change(Endpoint, Attribute),
    Alive(Endpoint, EndpointSnapshot),
    Dead(Endpoint, EndpointSnapshot),
    Restart(Endpoint, EndpointSnapshot),
    Remove(Endpoint),
}

type Subscribers = Vec<(SubscriptionId, Arc<dyn MembershipSubscriber>)>;

enum Dispatch {
    Event {
        event: MembershipEvent,
        recipients: Vec<Arc<dyn MembershipSubscriber>>,
    },
    Flush(oneshot::Sender<()>),
}

/// In-process membership service
///
/// Cloning is cheap; clones share state and the dispatch task.
///
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct LocalMembership {
    inner: Arc<Inner>,
}

struct Inner {
    self_address: Endpoint,
    states: RwLock<HashMap<Endpoint, EndpointSnapshot>>,
    subscribers: RwLock<Subscribers>,
    next_subscription: AtomicU64,
    version: AtomicU64,
    dispatch_tx: mpsc::UnboundedSender<Dispatch>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl LocalMembership {
    /// Create a membership service for the node known as `self_address`
    pub fn new(self_address: Endpoint) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(run_dispatcher(dispatch_rx));

        let mut states = HashMap::new();
        states.insert(self_address, EndpointSnapshot::new());

        Self {
            inner: Arc::new(Inner {
                self_address,
                states: RwLock::new(states),
                subscribers: RwLock::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                version: AtomicU64::new(0),
                dispatch_tx,
                dispatcher: Mutex::new(Some(dispatcher)),
            }),
        }
    }

    /// Set an attribute of an endpoint and notify subscribers
    pub fn apply(&self, endpoint: Endpoint, attribute: Attribute) {
        let version = self.next_version();
        {
            let mut states = self.inner.states.write().unwrap_or_else(PoisonError::into_inner);
            states
                .entry(endpoint)
                .or_insert_with(EndpointSnapshot::new)
                .set(attribute.clone(), version);
        }
        self.enqueue(MembershipEvent::Change(endpoint, attribute));
    }

    /// Record a newly joined endpoint and notify subscribers
    pub fn join(&self, endpoint: Endpoint, snapshot: EndpointSnapshot) {
        self.replace_state(endpoint, snapshot.clone());
        self.enqueue(MembershipEvent::Join(endpoint, snapshot));
    }

    /// Mark a known endpoint alive; unknown endpoints are ignored
    pub fn mark_alive(&self, endpoint: Endpoint) {
        if let Some(snapshot) = self.set_alive(endpoint, true) {
            self.enqueue(MembershipEvent::Alive(endpoint, snapshot));
        }
    }

    /// Mark a known endpoint dead; unknown endpoints are ignored
    pub fn mark_dead(&self, endpoint: Endpoint) {
        if let Some(snapshot) = self.set_alive(endpoint, false) {
            self.enqueue(MembershipEvent::Dead(endpoint, snapshot));
        }
    }

    /// Record that an endpoint restarted with fresh state
    pub fn restart(&self, endpoint: Endpoint, snapshot: EndpointSnapshot) {
        self.replace_state(endpoint, snapshot.clone());
        self.enqueue(MembershipEvent::Restart(endpoint, snapshot));
    }

    /// Forget an endpoint
    pub fn remove(&self, endpoint: Endpoint) {
        self.inner
            .states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&endpoint);
        self.enqueue(MembershipEvent::Remove(endpoint));
    }

    /// Wait until every event queued so far has been delivered
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .dispatch_tx
            .send(Dispatch::Flush(tx))
            .map_err(|_| Error::membership("Dispatcher stopped"))?;
        rx.await
            .map_err(|_| Error::membership("Dispatcher stopped before flush completed"))
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop the dispatch task; queued events are dropped
    pub fn shutdown(&self) {
        let handle = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("Membership dispatcher stopped");
        }
    }

    fn next_version(&self) -> u64 {
        self.inner.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn replace_state(&self, endpoint: Endpoint, snapshot: EndpointSnapshot) {
        self.inner
            .states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(endpoint, snapshot);
    }

    fn set_alive(&self, endpoint: Endpoint, alive: bool) -> Option<EndpointSnapshot> {
        let mut states = self.inner.states.write().unwrap_or_else(PoisonError::into_inner);
        let snapshot = states.get_mut(&endpoint)?;
        snapshot.set_alive(alive);
        Some(snapshot.clone())
    }

    fn enqueue(&self, event: MembershipEvent) {
        let recipients = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();

        if self
            .inner
            .dispatch_tx
            .send(Dispatch::Event { event, recipients })
            .is_err()
        {
            warn!("Membership dispatcher stopped, dropping event");
        }
    }
}

#[async_trait]
impl MembershipService for LocalMembership {
    fn self_address(&self) -> Endpoint {
        self.inner.self_address
    }

    fn snapshot(&self, endpoint: &Endpoint) -> Option<EndpointSnapshot> {
        self.inner
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .cloned()
    }

    async fn publish_local_attribute(&self, attribute: Attribute) -> Result<()> {
        debug!("Publishing local {} = {}", attribute.kind(), attribute.value());
        self.apply(self.inner.self_address, attribute);
        Ok(())
    }

    fn subscribe(&self, subscriber: Arc<dyn MembershipSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _)| *existing != id);
    }
}

impl std::fmt::Debug for LocalMembership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMembership")
            .field("self_address", &self.inner.self_address)
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Deliver queued events until every sender is gone
async fn run_dispatcher(rx: mpsc::UnboundedReceiver<Dispatch>) {
    let mut queue = UnboundedReceiverStream::new(rx);

    while let Some(dispatch) = queue.next().await {
        match dispatch {
            Dispatch::Event { event, recipients } => {
                for subscriber in recipients {
                    deliver(subscriber.as_ref(), &event).await;
                }
            }
            Dispatch::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn deliver(subscriber: &dyn MembershipSubscriber, event: &MembershipEvent) {
    match event {
        MembershipEvent::Join(endpoint, snapshot) => subscriber.on_join(*endpoint, snapshot).await,
        MembershipEvent::Change(endpoint, attribute) => {
            subscriber.on_change(*endpoint, attribute).await
        }
        MembershipEvent::Alive(endpoint, snapshot) => {
            subscriber.on_alive(*endpoint, snapshot).await
        }
        MembershipEvent::Dead(endpoint, snapshot) => subscriber.on_dead(*endpoint, snapshot).await,
        MembershipEvent::Restart(endpoint, snapshot) => {
            subscriber.on_restart(*endpoint, snapshot).await
        }
        MembershipEvent::Remove(endpoint) => subscriber.on_remove(*endpoint).await,
    }
}
