// # File Topology Store
//
// File-based implementation of PersistedTopologyStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good document
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "peers": {
//     "10.0.0.2": { "data_center": "dc2", "rack": "r1" }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::endpoint::Endpoint;
use crate::traits::topology_store::{PersistedTopologyStore, TopologyEntry};

/// Peers file format version
const PEERS_FILE_VERSION: &str = "1.0";

/// File-based persisted topology store
///
/// The file is read on every [`PersistedTopologyStore::load_all`] call; the
/// snitch's cache makes that a once-per-process event.
#[derive(Debug, Clone)]
pub struct FileTopologyStore {
    path: PathBuf,
}

/// Serializable peers file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct PeersFileFormat {
    version: String,
    peers: HashMap<Endpoint, TopologyEntry>,
}

impl FileTopologyStore {
    /// Create a store backed by `path`
    ///
    /// The file does not need to exist; a missing file loads as empty.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load peers with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load the main file
    /// 2. If it is not valid JSON, try the backup
    /// 3. If the backup is missing or also corrupted, load nothing
    async fn load_with_recovery(
        path: &Path,
    ) -> Result<HashMap<Endpoint, TopologyEntry>, Error> {
        match Self::load_peers(path).await {
            Ok(peers) => {
                tracing::debug!("Loaded peers file: {} entries", peers.len());
                Ok(peers)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Peers file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Continuing without saved peers.");
                    return Ok(HashMap::new());
                }

                match Self::load_peers(&backup_path).await {
                    Ok(peers) => {
                        tracing::info!("Recovered peers from backup: {} entries", peers.len());
                        Ok(peers)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Continuing without saved peers.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load peers from a single file
    async fn load_peers(path: &Path) -> Result<HashMap<Endpoint, TopologyEntry>, Error> {
        if !path.exists() {
            tracing::debug!("Peers file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::topology_store(format!(
                "Failed to read peers file {}: {}",
                path.display(),
                e
            ))
        })?;

        let document: PeersFileFormat = serde_json::from_str(&content)?;

        if document.version != PEERS_FILE_VERSION {
            tracing::warn!(
                "Peers file version mismatch: expected {}, got {}. Attempting to load anyway.",
                PEERS_FILE_VERSION,
                document.version
            );
        }

        Ok(document.peers)
    }

    /// Write the peers file atomically, keeping the previous one as backup
    pub async fn save(&self, peers: &HashMap<Endpoint, TopologyEntry>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::topology_store(format!(
                    "Failed to create peers directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let document = PeersFileFormat {
            version: PEERS_FILE_VERSION.to_string(),
            peers: peers.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::topology_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::topology_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Peers file written: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl PersistedTopologyStore for FileTopologyStore {
    async fn load_all(&self) -> Result<HashMap<Endpoint, TopologyEntry>, Error> {
        Self::load_with_recovery(&self.path).await
    }
}
