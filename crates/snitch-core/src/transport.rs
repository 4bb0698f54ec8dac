//! Routing and resolution collaborators
//!
//! - [`RouteTable`]: in-memory [`TransportRouter`] keeping the preferred
//!   address per peer (last write wins)
//! - [`SystemHostResolver`]: [`HostResolver`] backed by the system resolver
//! - [`local_host_name`]: the machine's host name, advertised when no
//!   internal address is configured

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::traits::{HostResolver, TransportRouter};

/// In-memory route table
///
/// Holds the address outbound connections to each peer should use.
/// Concurrent resets for one peer are serialized by the lock; the last
/// one wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Arc<RwLock<HashMap<Endpoint, IpAddr>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address currently used for a peer, if it was re-routed
    pub async fn route(&self, endpoint: &Endpoint) -> Option<IpAddr> {
        self.routes.read().await.get(endpoint).copied()
    }

    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }
}

#[async_trait]
impl TransportRouter for RouteTable {
    async fn reset_route(&self, endpoint: &Endpoint, target: IpAddr) -> Result<()> {
        let previous = self.routes.write().await.insert(*endpoint, target);
        match previous {
            Some(previous) if previous == target => {
                trace!("Route for {} already targets {}", endpoint, target)
            }
            _ => debug!("Route for {} now targets {}", endpoint, target),
        }
        Ok(())
    }
}

/// Host resolver using the operating system's name service
///
/// Address literals are returned as-is without a lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostResolver;

impl SystemHostResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostResolver for SystemHostResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr> {
        let host = host.trim().trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(Error::resolution("Empty host name"));
        }

        if let Ok(addr) = host.parse::<IpAddr>() {
            return Ok(addr);
        }

        let mut addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| Error::resolution(format!("Failed to resolve {}: {}", host, e)))?;

        addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| Error::resolution(format!("No addresses found for {}", host)))
    }
}

/// Host name of this machine
pub fn local_host_name() -> Result<String> {
    let name = hostname::get()
        .map_err(|e| Error::resolution(format!("Failed to read local host name: {}", e)))?;
    let name = name.to_string_lossy().trim().to_string();
    if name.is_empty() {
        return Err(Error::resolution("Local host name is empty"));
    }
    Ok(name)
}
