//! The structure lock file.
//!
//! Remote container ids and view ids are cached on disk between runs so the
//! bootstrapper can skip searching for containers it already created. The
//! file is advisory: a missing file means an empty cache, and a cached id
//! that no longer resolves remotely is re-discovered and overwritten.

use crate::error::{SyncError, SyncResult};
use alm_core::{CollectionAddr, ContainerHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockFile {
    #[serde(skip)]
    path: PathBuf,
    containers: BTreeMap<String, ContainerHandle>,
}

impl LockFile {
    /// Loads the lock file, treating a missing file as empty.
    pub fn load(path: &Path) -> SyncResult<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => {
                let mut lock: LockFile =
                    serde_json::from_str(&raw).map_err(SyncError::lock)?;
                lock.path = path.to_path_buf();
                debug!(path = %path.display(), containers = lock.containers.len(), "Loaded lock file");
                Ok(lock)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self {
                path: path.to_path_buf(),
                containers: BTreeMap::new(),
            }),
            Err(err) => Err(SyncError::lock(err)),
        }
    }

    /// Writes the lock file atomically via a sibling temp file.
    pub fn save(&self) -> SyncResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(SyncError::lock)?;
        }
        let raw = serde_json::to_string_pretty(self).map_err(SyncError::lock)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(SyncError::lock)?;
        fs::rename(&tmp, &self.path).map_err(SyncError::lock)?;
        debug!(path = %self.path.display(), containers = self.containers.len(), "Saved lock file");
        Ok(())
    }

    pub fn container(&self, addr: &CollectionAddr) -> Option<&ContainerHandle> {
        self.containers.get(&addr.lock_key())
    }

    pub fn record(&mut self, addr: &CollectionAddr, handle: ContainerHandle) {
        self.containers.insert(addr.lock_key(), handle);
    }

    pub fn forget(&mut self, addr: &CollectionAddr) {
        self.containers.remove(&addr.lock_key());
    }
}
