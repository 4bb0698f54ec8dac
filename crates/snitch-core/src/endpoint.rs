//! Endpoint identity and topology value types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Network identity of a cluster member
///
/// This is the resolution key everywhere in the snitch. Equality is exact:
/// two endpoints are the same member only if their addresses are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(IpAddr);

impl Endpoint {
    /// Create an endpoint from an IP address
    pub const fn new(addr: IpAddr) -> Self {
        Self(addr)
    }

    /// The underlying address
    pub const fn addr(&self) -> IpAddr {
        self.0
    }
}

impl From<IpAddr> for Endpoint {
    fn from(addr: IpAddr) -> Self {
        Self(addr)
    }
}

impl From<[u8; 4]> for Endpoint {
    fn from(octets: [u8; 4]) -> Self {
        Self(IpAddr::from(octets))
    }
}

impl FromStr for Endpoint {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<IpAddr>()
            .map(Self)
            .map_err(|_| crate::Error::invalid_input(format!("Invalid endpoint address: {}", s)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Datacenter and rack of an endpoint
///
/// The two fields are resolved independently, so they may come from
/// different tiers of the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyInfo {
    pub datacenter: String,
    pub rack: String,
}

impl TopologyInfo {
    pub fn new(datacenter: impl Into<String>, rack: impl Into<String>) -> Self {
        Self {
            datacenter: datacenter.into(),
            rack: rack.into(),
        }
    }
}
