//! Container bootstrapping and schema upgrades.
//!
//! Each collection lives in one remote container. The bootstrapper finds the
//! container (lock file first, then a remote search), creates it when it is
//! missing and, on structure runs, upgrades its schema in place. Upgrades
//! preserve select option ids wherever the option value survives, because
//! existing records point at options by id and would lose their values
//! otherwise.

use crate::error::{SyncError, SyncResult};
use crate::lockfile::LockFile;
use alm_core::{CollectionAddr, ContainerHandle, FieldSpec, RemoteStore, Schema, SelectOption};
use tracing::{debug, info};

pub struct Bootstrapper<'a> {
    remote: &'a dyn RemoteStore,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(remote: &'a dyn RemoteStore) -> Self {
        Self { remote }
    }

    /// Finds or creates the container and upgrades its schema to `desired`.
    pub async fn ensure(
        &self,
        addr: &CollectionAddr,
        desired: &Schema,
        lock: &mut LockFile,
    ) -> SyncResult<ContainerHandle> {
        let handle = match self.locate(addr, lock).await? {
            Some(handle) => {
                let current = self
                    .remote
                    .load_schema(&handle.container_id)
                    .await
                    .map_err(|e| SyncError::remote(addr.kind, e))?;
                let merged = merge_schema(desired, &current);
                if merged != current {
                    self.remote
                        .store_schema(&handle.container_id, &merged)
                        .await
                        .map_err(|e| SyncError::remote(addr.kind, e))?;
                    info!(collection = %addr, container = %handle.container_id, "Upgraded container schema");
                }
                handle
            }
            None => self.create(addr, desired).await?,
        };
        lock.record(addr, handle.clone());
        Ok(handle)
    }

    /// Finds the container without touching an existing schema, creating it
    /// only when it is missing. Used outside structure runs, where a
    /// collection still has to have somewhere to sync into.
    pub async fn resolve(
        &self,
        addr: &CollectionAddr,
        desired: &Schema,
        lock: &mut LockFile,
    ) -> SyncResult<ContainerHandle> {
        let handle = match self.locate(addr, lock).await? {
            Some(handle) => handle,
            None => self.create(addr, desired).await?,
        };
        lock.record(addr, handle.clone());
        Ok(handle)
    }

    async fn locate(
        &self,
        addr: &CollectionAddr,
        lock: &LockFile,
    ) -> SyncResult<Option<ContainerHandle>> {
        if let Some(cached) = lock.container(addr) {
            let alive = self
                .remote
                .container_exists(&cached.container_id)
                .await
                .map_err(|e| SyncError::remote(addr.kind, e))?;
            if alive {
                return Ok(Some(cached.clone()));
            }
            debug!(collection = %addr, container = %cached.container_id, "Cached container id is stale");
        }
        self.remote
            .find_container(addr)
            .await
            .map_err(|e| SyncError::remote(addr.kind, e))
    }

    async fn create(
        &self,
        addr: &CollectionAddr,
        desired: &Schema,
    ) -> SyncResult<ContainerHandle> {
        let handle = self
            .remote
            .create_container(addr, desired)
            .await
            .map_err(|e| SyncError::remote(addr.kind, e))?;
        info!(collection = %addr, container = %handle.container_id, "Created container");
        Ok(handle)
    }
}

/// Merges the desired schema over the current one.
///
/// The desired shape wins field by field; fields the desired schema no
/// longer names are dropped. For select and multi-select fields the option
/// list comes from the desired schema, but an option keeps its current id
/// and color when an option with the same id or the same value already
/// exists. Id matches also win renames: the value updates under a stable id.
pub fn merge_schema(desired: &Schema, current: &Schema) -> Schema {
    let mut merged = Schema::new();
    for (name, want) in &desired.fields {
        let spec = match (want, current.field(name)) {
            (FieldSpec::Select { options: want_opts }, Some(FieldSpec::Select { options: have })) => {
                FieldSpec::Select {
                    options: merge_options(want_opts, have),
                }
            }
            (
                FieldSpec::MultiSelect { options: want_opts },
                Some(FieldSpec::MultiSelect { options: have }),
            ) => FieldSpec::MultiSelect {
                options: merge_options(want_opts, have),
            },
            (want, _) => want.clone(),
        };
        merged = merged.with_field(name.clone(), spec);
    }
    merged
}

fn merge_options(want: &[SelectOption], have: &[SelectOption]) -> Vec<SelectOption> {
    want.iter()
        .map(|option| {
            if have.iter().any(|h| h.id == option.id) {
                // Stable-id option: the desired value and color follow it,
                // so renames propagate.
                option.clone()
            } else if let Some(existing) = have.iter().find(|h| h.value == option.value) {
                existing.clone()
            } else {
                option.clone()
            }
        })
        .collect()
}
