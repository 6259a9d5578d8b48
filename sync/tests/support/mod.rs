//! Shared scaffolding for the engine integration suites.

use std::sync::Arc;

use alm_core::{CollectionAddr, CollectionKind, EntityId, RemoteId};
use sync::SyncDriver;
use testing::fixtures::ts;
use testing::{MemoryLocalStore, MemoryRemote};

/// A driver wired to in-memory stores, with direct handles kept around so
/// tests can seed and inspect both sides.
pub struct Engine {
    pub local: MemoryLocalStore,
    pub remote: MemoryRemote,
    pub driver: SyncDriver,
    _dir: tempfile::TempDir,
}

pub async fn engine() -> Engine {
    let dir = tempfile::tempdir().unwrap();
    let local = MemoryLocalStore::new();
    let remote = MemoryRemote::new();
    remote.set_now(ts(0)).await;
    let driver = SyncDriver::new(
        Arc::new(local.clone()),
        Arc::new(remote.clone()),
        dir.path().join("structure.lock.json"),
    );
    Engine {
        local,
        remote,
        driver,
        _dir: dir,
    }
}

impl Engine {
    /// Remote container id for `kind` under `parent`. Panics when the
    /// structure pass has not created it yet.
    pub async fn container(&self, kind: CollectionKind, parent: &EntityId) -> RemoteId {
        self.remote
            .container_for(&CollectionAddr::new(kind, parent.clone()))
            .await
            .unwrap_or_else(|| panic!("no {kind} container under {parent}"))
            .container_id
    }
}
