use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use alm_core::{
    CollectionAddr, ContainerHandle, EntityId, FieldValue, RemoteError, RemoteId, RemoteRecord,
    RemoteResult, RemoteStore, Schema, Timestamp,
};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// In-memory remote store double with a manual clock.
///
/// Mirrors the semantics of the hosted service: API writes stamp records
/// with the current (manual) time and register them in the known set; the
/// seed helpers bypass the register so tests can stage UI-created records
/// and danglers. Trait-level writes are counted so idempotence tests can
/// assert a run performed none.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    now: Timestamp,
    next_record: u64,
    next_container: u64,
    writes: usize,
    containers: BTreeMap<RemoteId, ContainerState>,
    by_addr: BTreeMap<CollectionAddr, RemoteId>,
    fail_next: Option<RemoteError>,
    fail_list_for: BTreeMap<RemoteId, RemoteError>,
}

struct ContainerState {
    handle: ContainerHandle,
    schema: Schema,
    records: BTreeMap<RemoteId, RemoteRecord>,
    known: BTreeSet<RemoteId>,
}

impl Inner {
    fn take_injected(&mut self) -> RemoteResult<()> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn container(&self, id: &RemoteId) -> RemoteResult<&ContainerState> {
        self.containers
            .get(id)
            .ok_or_else(|| RemoteError::ContainerNotFound(id.clone()))
    }

    fn container_mut(&mut self, id: &RemoteId) -> RemoteResult<&mut ContainerState> {
        self.containers
            .get_mut(id)
            .ok_or_else(|| RemoteError::ContainerNotFound(id.clone()))
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_now(&self, now: Timestamp) {
        self.inner.lock().await.now = now;
    }

    pub async fn now(&self) -> Timestamp {
        self.inner.lock().await.now
    }

    /// Mutating trait calls performed so far.
    pub async fn write_count(&self) -> usize {
        self.inner.lock().await.writes
    }

    pub async fn reset_write_count(&self) {
        self.inner.lock().await.writes = 0;
    }

    /// Next trait call of any kind fails with the given error.
    pub async fn fail_next_with(&self, err: RemoteError) {
        self.inner.lock().await.fail_next = Some(err);
    }

    /// Next `list_all` on the given container fails with the given error.
    pub async fn fail_listing(&self, container: &RemoteId, err: RemoteError) {
        self.inner
            .lock()
            .await
            .fail_list_for
            .insert(container.clone(), err);
    }

    /// Stages a record as if a user created it in the remote UI: no ref id,
    /// absent from the known register, stamped with the current time.
    pub async fn seed_user_record(
        &self,
        container: &RemoteId,
        fields: Vec<(&str, FieldValue)>,
    ) -> RemoteId {
        let mut inner = self.inner.lock().await;
        inner.next_record += 1;
        let remote_id = RemoteId::new(format!("r-{}", inner.next_record));
        let mut record = RemoteRecord::new(remote_id.clone(), inner.now);
        for (name, value) in fields {
            record.set(name, value);
        }
        if let Some(state) = inner.containers.get_mut(container) {
            state.records.insert(remote_id.clone(), record);
        }
        remote_id
    }

    /// Stages a record that carries a ref id and is in the known register,
    /// as a previous sync run would have left it.
    pub async fn seed_bound_record(
        &self,
        container: &RemoteId,
        ref_id: EntityId,
        fields: Vec<(&str, FieldValue)>,
    ) -> RemoteId {
        let remote_id = self.seed_user_record(container, fields).await;
        let mut inner = self.inner.lock().await;
        if let Some(state) = inner.containers.get_mut(container) {
            if let Some(record) = state.records.get_mut(&remote_id) {
                record.ref_id = Some(ref_id);
            }
            state.known.insert(remote_id.clone());
        }
        remote_id
    }

    /// Stages a record that carries a ref id but is NOT in the known
    /// register, i.e. a duplicate or leftover the engine must clean up.
    pub async fn seed_dangling_record(
        &self,
        container: &RemoteId,
        ref_id: EntityId,
        fields: Vec<(&str, FieldValue)>,
    ) -> RemoteId {
        let remote_id = self.seed_user_record(container, fields).await;
        let mut inner = self.inner.lock().await;
        if let Some(state) = inner.containers.get_mut(container) {
            if let Some(record) = state.records.get_mut(&remote_id) {
                record.ref_id = Some(ref_id);
            }
        }
        remote_id
    }

    /// Drops a record from the known register, turning it into a dangler.
    pub async fn forget(&self, container: &RemoteId, remote_id: &RemoteId) {
        let mut inner = self.inner.lock().await;
        if let Some(state) = inner.containers.get_mut(container) {
            state.known.remove(remote_id);
        }
    }

    /// Applies a user edit to a record and stamps it with the current time.
    pub async fn edit_record(
        &self,
        container: &RemoteId,
        remote_id: &RemoteId,
        edit: impl FnOnce(&mut RemoteRecord),
    ) {
        let mut inner = self.inner.lock().await;
        let now = inner.now;
        if let Some(state) = inner.containers.get_mut(container) {
            if let Some(record) = state.records.get_mut(remote_id) {
                edit(record);
                record.last_edited_time = now;
            }
        }
    }

    pub async fn record(&self, container: &RemoteId, remote_id: &RemoteId) -> Option<RemoteRecord> {
        let inner = self.inner.lock().await;
        inner
            .containers
            .get(container)
            .and_then(|state| state.records.get(remote_id))
            .cloned()
    }

    pub async fn records_of(&self, container: &RemoteId) -> Vec<RemoteRecord> {
        let inner = self.inner.lock().await;
        inner
            .containers
            .get(container)
            .map(|state| state.records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn schema_of(&self, container: &RemoteId) -> Option<Schema> {
        let inner = self.inner.lock().await;
        inner.containers.get(container).map(|state| state.schema.clone())
    }

    pub async fn container_for(&self, addr: &CollectionAddr) -> Option<ContainerHandle> {
        let inner = self.inner.lock().await;
        let id = inner.by_addr.get(addr)?;
        inner.containers.get(id).map(|state| state.handle.clone())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list_all(&self, container: &RemoteId) -> RemoteResult<Vec<RemoteRecord>> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        if let Some(err) = inner.fail_list_for.remove(container) {
            return Err(err);
        }
        Ok(inner.container(container)?.records.values().cloned().collect())
    }

    async fn load(
        &self,
        container: &RemoteId,
        remote_id: &RemoteId,
    ) -> RemoteResult<RemoteRecord> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        inner
            .container(container)?
            .records
            .get(remote_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(remote_id.to_string()))
    }

    async fn create(
        &self,
        container: &RemoteId,
        record: RemoteRecord,
    ) -> RemoteResult<RemoteRecord> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        inner.writes += 1;
        inner.next_record += 1;
        let remote_id = RemoteId::new(format!("r-{}", inner.next_record));
        let now = inner.now;
        let state = inner.container_mut(container)?;
        let stored = RemoteRecord {
            remote_id: remote_id.clone(),
            ref_id: record.ref_id,
            last_edited_time: now,
            fields: record.fields,
        };
        state.records.insert(remote_id.clone(), stored.clone());
        state.known.insert(remote_id);
        Ok(stored)
    }

    async fn update(
        &self,
        container: &RemoteId,
        record: &RemoteRecord,
    ) -> RemoteResult<RemoteRecord> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        inner.writes += 1;
        let now = inner.now;
        let state = inner.container_mut(container)?;
        if !state.records.contains_key(&record.remote_id) {
            return Err(RemoteError::NotFound(record.remote_id.to_string()));
        }
        let stored = RemoteRecord {
            remote_id: record.remote_id.clone(),
            ref_id: record.ref_id.clone(),
            last_edited_time: now,
            fields: record.fields.clone(),
        };
        state.records.insert(record.remote_id.clone(), stored.clone());
        state.known.insert(record.remote_id.clone());
        Ok(stored)
    }

    async fn delete(&self, container: &RemoteId, remote_id: &RemoteId) -> RemoteResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        inner.writes += 1;
        let state = inner.container_mut(container)?;
        if state.records.remove(remote_id).is_none() {
            return Err(RemoteError::NotFound(remote_id.to_string()));
        }
        state.known.remove(remote_id);
        Ok(())
    }

    async fn drop_all(&self, container: &RemoteId) -> RemoteResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        inner.writes += 1;
        let state = inner.container_mut(container)?;
        state.records.clear();
        state.known.clear();
        Ok(())
    }

    async fn list_known_ref_ids(&self, container: &RemoteId) -> RemoteResult<Vec<EntityId>> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        let state = inner.container(container)?;
        Ok(state
            .known
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter_map(|record| record.ref_id.clone())
            .collect())
    }

    async fn list_known_remote_ids(&self, container: &RemoteId) -> RemoteResult<Vec<RemoteId>> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        Ok(inner.container(container)?.known.iter().cloned().collect())
    }

    async fn find_container(
        &self,
        addr: &CollectionAddr,
    ) -> RemoteResult<Option<ContainerHandle>> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        let found = inner.by_addr.get(addr).cloned();
        Ok(found.and_then(|id| inner.containers.get(&id).map(|state| state.handle.clone())))
    }

    async fn create_container(
        &self,
        addr: &CollectionAddr,
        schema: &Schema,
    ) -> RemoteResult<ContainerHandle> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        inner.writes += 1;
        inner.next_container += 1;
        let container_id = RemoteId::new(format!("c-{}", inner.next_container));
        let mut handle = ContainerHandle::new(container_id.clone());
        handle.view_ids.insert(
            "database".to_string(),
            RemoteId::new(format!("v-{}-all", inner.next_container)),
        );
        inner.containers.insert(
            container_id.clone(),
            ContainerState {
                handle: handle.clone(),
                schema: schema.clone(),
                records: BTreeMap::new(),
                known: BTreeSet::new(),
            },
        );
        inner.by_addr.insert(addr.clone(), container_id);
        Ok(handle)
    }

    async fn container_exists(&self, container: &RemoteId) -> RemoteResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        Ok(inner.containers.contains_key(container))
    }

    async fn load_schema(&self, container: &RemoteId) -> RemoteResult<Schema> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        Ok(inner.container(container)?.schema.clone())
    }

    async fn store_schema(&self, container: &RemoteId, schema: &Schema) -> RemoteResult<()> {
        let mut inner = self.inner.lock().await;
        inner.take_injected()?;
        inner.writes += 1;
        inner.container_mut(container)?.schema = schema.clone();
        Ok(())
    }
}
