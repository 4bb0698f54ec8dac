//! Configuration types for the snitch
//!
//! The local node's placement is read once at construction. `dc` and `rack`
//! are required; `prefer_local` defaults to false.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Name of the properties file the local placement is usually read from
pub const RACKDC_PROPERTIES_FILENAME: &str = "snitch-rackdc.properties";

/// Raw snitch configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnitchConfig {
    /// Datacenter of the local node
    #[serde(default)]
    pub dc: Option<String>,

    /// Rack of the local node
    #[serde(default)]
    pub rack: Option<String>,

    /// Reconnect to same-datacenter peers through their internal address
    #[serde(default, alias = "preferLocal")]
    pub prefer_local: bool,

    /// Host or address advertised to peers as this node's internal address
    #[serde(default)]
    pub listen_address: Option<String>,
}

impl SnitchConfig {
    /// Create a configuration with the required placement set
    pub fn new(dc: impl Into<String>, rack: impl Into<String>) -> Self {
        Self {
            dc: Some(dc.into()),
            rack: Some(rack.into()),
            prefer_local: false,
            listen_address: None,
        }
    }

    /// Enable or disable internal-address reconnection
    pub fn with_prefer_local(mut self, prefer_local: bool) -> Self {
        self.prefer_local = prefer_local;
        self
    }

    /// Set the advertised internal address
    pub fn with_listen_address(mut self, listen_address: impl Into<String>) -> Self {
        self.listen_address = Some(listen_address.into());
        self
    }

    /// Parse the `key=value` properties format
    ///
    /// Blank lines and lines starting with `#` or `!` are ignored. Unknown
    /// keys are ignored. Missing keys are not an error here; see
    /// [`SnitchConfig::validate`].
    pub fn from_properties(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let Some((key, value)) = line.split_once(['=', ':']) else {
                return Err(Error::config(format!(
                    "Malformed line {} in {}: '{}'",
                    lineno + 1,
                    RACKDC_PROPERTIES_FILENAME,
                    line
                )));
            };

            let value = value.trim();
            match key.trim() {
                "dc" => config.dc = Some(value.to_string()),
                "rack" => config.rack = Some(value.to_string()),
                "prefer_local" | "preferLocal" => {
                    config.prefer_local = value.eq_ignore_ascii_case("true")
                }
                "listen_address" => config.listen_address = Some(value.to_string()),
                other => tracing::debug!("Ignoring unknown snitch property: {}", other),
            }
        }

        Ok(config)
    }

    /// Load and parse a properties file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read snitch properties {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_properties(&content)
    }

    /// Overlay `other` on top of this configuration
    ///
    /// `dc`, `rack` and `listen_address` are replaced when set in `other`.
    /// `prefer_local` is enabled when either side enables it; an overlay
    /// cannot switch it off, so callers with an explicit `false` assign
    /// the field after merging.
    pub fn merge(mut self, other: SnitchConfig) -> Self {
        if other.dc.is_some() {
            self.dc = other.dc;
        }
        if other.rack.is_some() {
            self.rack = other.rack;
        }
        if other.listen_address.is_some() {
            self.listen_address = other.listen_address;
        }
        self.prefer_local |= other.prefer_local;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.identity().map(|_| ())
    }

    /// Build the local node's identity
    ///
    /// Fails with a configuration error when `dc` or `rack` is missing or
    /// blank, regardless of any other setting.
    pub fn identity(&self) -> Result<SelfIdentity> {
        let dc = required(self.dc.as_deref());
        let rack = required(self.rack.as_deref());

        match (dc, rack) {
            (Some(dc), Some(rack)) => Ok(SelfIdentity {
                datacenter: dc.to_string(),
                rack: rack.to_string(),
                prefer_local: self.prefer_local,
            }),
            _ => Err(Error::config(format!(
                "DC or rack not found in snitch properties, check your configuration in: {}",
                RACKDC_PROPERTIES_FILENAME
            ))),
        }
    }

    /// Configured internal address, if any
    ///
    /// `None` means the machine's host name is advertised instead.
    pub fn listen_address(&self) -> Option<&str> {
        self.listen_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Placement of the local node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfIdentity {
    pub datacenter: String,
    pub rack: String,
    pub prefer_local: bool,
}
