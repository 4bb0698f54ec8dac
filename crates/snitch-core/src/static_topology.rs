//! Legacy static topology table
//!
//! Reads the old hand-maintained placement file:
//!
//! ```text
//! # <address>=<datacenter>:<rack>
//! 10.0.0.1=dc1:r1
//! 10.0.0.2=dc2:r1
//! default=dc1:r1
//! ```
//!
//! Endpoints not listed get the `default` line, or the unknown sentinels when
//! there is none. The snitch only consults this table when it loaded; a file
//! that is missing or malformed disables the tier for the process lifetime.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::endpoint::{Endpoint, TopologyInfo};
use crate::error::{Error, Result};
use crate::resolver::{UNKNOWN_DC, UNKNOWN_RACK};
use crate::traits::StaticTopology;

/// Name of the legacy placement file
pub const TOPOLOGY_PROPERTIES_FILENAME: &str = "snitch-topology.properties";

/// Static placement parsed from the legacy properties file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFileTopology {
    endpoints: HashMap<Endpoint, TopologyInfo>,
    default: TopologyInfo,
}

impl PropertyFileTopology {
    /// Parse the legacy format
    pub fn parse(content: &str) -> Result<Self> {
        let mut endpoints = HashMap::new();
        let mut default = TopologyInfo::new(UNKNOWN_DC, UNKNOWN_RACK);

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let malformed = || {
                Error::static_topology(format!(
                    "Malformed line {} in {}: '{}'",
                    lineno + 1,
                    TOPOLOGY_PROPERTIES_FILENAME,
                    line
                ))
            };

            let (key, value) = line.split_once('=').ok_or_else(malformed)?;
            let (dc, rack) = value.trim().split_once(':').ok_or_else(malformed)?;
            let (dc, rack) = (dc.trim(), rack.trim());
            if dc.is_empty() || rack.is_empty() {
                return Err(malformed());
            }
            let info = TopologyInfo::new(dc, rack);

            match key.trim() {
                "default" => default = info,
                host => {
                    let endpoint: Endpoint = host
                        .trim_start_matches('/')
                        .parse()
                        .map_err(|_| malformed())?;
                    endpoints.insert(endpoint, info);
                }
            }
        }

        Ok(Self { endpoints, default })
    }

    /// Read and parse the legacy file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::static_topology(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Number of explicitly listed endpoints
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    fn lookup(&self, endpoint: &Endpoint) -> &TopologyInfo {
        self.endpoints.get(endpoint).unwrap_or(&self.default)
    }
}

impl StaticTopology for PropertyFileTopology {
    fn datacenter(&self, endpoint: &Endpoint) -> String {
        self.lookup(endpoint).datacenter.clone()
    }

    fn rack(&self, endpoint: &Endpoint) -> String {
        self.lookup(endpoint).rack.clone()
    }
}

/// Load the legacy table if it is available
///
/// Failure is not an error for the snitch: it is logged and the tier is
/// skipped.
pub async fn load_static_topology<P: AsRef<Path>>(path: P) -> Option<Arc<dyn StaticTopology>> {
    match PropertyFileTopology::load(path.as_ref()).await {
        Ok(topology) => {
            tracing::info!(
                "Loaded {} for compatibility ({} endpoints)",
                path.as_ref().display(),
                topology.len()
            );
            Some(Arc::new(topology))
        }
        Err(e) => {
            tracing::info!(
                "Unable to load {}; compatibility mode disabled: {}",
                path.as_ref().display(),
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_and_default() {
        let topology = PropertyFileTopology::parse(
            "# legacy\n10.0.0.1=dc1:r1\n/10.0.0.2 = dc2 : r7\ndefault=dcX:rX\n",
        )
        .unwrap();

        let listed = Endpoint::from([10, 0, 0, 2]);
        assert_eq!(topology.datacenter(&listed), "dc2");
        assert_eq!(topology.rack(&listed), "r7");

        let unlisted = Endpoint::from([10, 9, 9, 9]);
        assert_eq!(topology.datacenter(&unlisted), "dcX");
        assert_eq!(topology.rack(&unlisted), "rX");
    }

    #[test]
    fn default_falls_back_to_sentinels() {
        let topology = PropertyFileTopology::parse("10.0.0.1=dc1:r1").unwrap();
        let unlisted = Endpoint::from([10, 0, 0, 5]);
        assert_eq!(topology.datacenter(&unlisted), UNKNOWN_DC);
        assert_eq!(topology.rack(&unlisted), UNKNOWN_RACK);
    }

    #[test]
    fn malformed_lines_fail_the_load() {
        assert!(PropertyFileTopology::parse("10.0.0.1=dc1").is_err());
        assert!(PropertyFileTopology::parse("node-a=dc1:r1").is_err());
        assert!(PropertyFileTopology::parse("10.0.0.1=:r1").is_err());
    }

    #[tokio::test]
    async fn missing_file_disables_tier() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_static_topology(dir.path().join("absent.properties")).await.is_none());
    }

    #[tokio::test]
    async fn present_file_enables_tier() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TOPOLOGY_PROPERTIES_FILENAME);
        tokio::fs::write(&path, "10.0.0.1=dc1:r1\n").await.unwrap();

        let topology = load_static_topology(&path).await.unwrap();
        assert_eq!(topology.datacenter(&Endpoint::from([10, 0, 0, 1])), "dc1");
    }
}
