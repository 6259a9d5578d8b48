use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use alm_core::entities::{
    BigPlan, InboxTask, Metric, MetricEntry, Person, Project, RecurringTask, RemoteLink,
    SmartList, SmartListItem, SyncedEntity, Vacation, Workspace,
};
use alm_core::error::{LocalError, LocalResult};
use alm_core::traits::{EntityRepository, LocalStore, RemoteLinkRepository, UnitOfWork};
use alm_core::types::{CollectionKind, EntityId};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// In-memory local store double.
///
/// `begin` clones the committed dataset; `commit` swaps the working copy
/// back in. Dropping a unit of work without committing discards it, which
/// matches the rollback semantics of the SQLite store.
#[derive(Clone, Default)]
pub struct MemoryLocalStore {
    committed: Arc<Mutex<Dataset>>,
}

#[derive(Default, Clone)]
pub(crate) struct Dataset {
    last_ref_id: u64,
    workspaces: BTreeMap<EntityId, Workspace>,
    vacations: BTreeMap<EntityId, Vacation>,
    projects: BTreeMap<EntityId, Project>,
    inbox_tasks: BTreeMap<EntityId, InboxTask>,
    recurring_tasks: BTreeMap<EntityId, RecurringTask>,
    big_plans: BTreeMap<EntityId, BigPlan>,
    smart_lists: BTreeMap<EntityId, SmartList>,
    smart_list_items: BTreeMap<EntityId, SmartListItem>,
    metrics: BTreeMap<EntityId, Metric>,
    metric_entries: BTreeMap<EntityId, MetricEntry>,
    persons: BTreeMap<EntityId, Person>,
    links: BTreeMap<(CollectionKind, EntityId), RemoteLink>,
}

pub(crate) trait StoredEntity: SyncedEntity {
    fn slot(ds: &Dataset) -> &BTreeMap<EntityId, Self>;
    fn slot_mut(ds: &mut Dataset) -> &mut BTreeMap<EntityId, Self>;
}

macro_rules! impl_stored_entity {
    ($ty:ty, $field:ident) => {
        impl StoredEntity for $ty {
            fn slot(ds: &Dataset) -> &BTreeMap<EntityId, Self> {
                &ds.$field
            }

            fn slot_mut(ds: &mut Dataset) -> &mut BTreeMap<EntityId, Self> {
                &mut ds.$field
            }
        }
    };
}

impl_stored_entity!(Workspace, workspaces);
impl_stored_entity!(Vacation, vacations);
impl_stored_entity!(Project, projects);
impl_stored_entity!(InboxTask, inbox_tasks);
impl_stored_entity!(RecurringTask, recurring_tasks);
impl_stored_entity!(BigPlan, big_plans);
impl_stored_entity!(SmartList, smart_lists);
impl_stored_entity!(SmartListItem, smart_list_items);
impl_stored_entity!(Metric, metrics);
impl_stored_entity!(MetricEntry, metric_entries);
impl_stored_entity!(Person, persons);

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn begin(&self) -> LocalResult<Box<dyn UnitOfWork>> {
        let snapshot = self.committed.lock().await.clone();
        let working = Arc::new(Mutex::new(snapshot));
        Ok(Box::new(MemoryUnitOfWork::new(
            working,
            self.committed.clone(),
        )))
    }
}

struct MemoryUnitOfWork {
    working: Arc<Mutex<Dataset>>,
    committed: Arc<Mutex<Dataset>>,
    workspaces: MemoryRepository<Workspace>,
    vacations: MemoryRepository<Vacation>,
    projects: MemoryRepository<Project>,
    inbox_tasks: MemoryRepository<InboxTask>,
    recurring_tasks: MemoryRepository<RecurringTask>,
    big_plans: MemoryRepository<BigPlan>,
    smart_lists: MemoryRepository<SmartList>,
    smart_list_items: MemoryRepository<SmartListItem>,
    metrics: MemoryRepository<Metric>,
    metric_entries: MemoryRepository<MetricEntry>,
    persons: MemoryRepository<Person>,
    remote_links: MemoryLinkRepository,
}

impl MemoryUnitOfWork {
    fn new(working: Arc<Mutex<Dataset>>, committed: Arc<Mutex<Dataset>>) -> Self {
        Self {
            workspaces: MemoryRepository::new(working.clone()),
            vacations: MemoryRepository::new(working.clone()),
            projects: MemoryRepository::new(working.clone()),
            inbox_tasks: MemoryRepository::new(working.clone()),
            recurring_tasks: MemoryRepository::new(working.clone()),
            big_plans: MemoryRepository::new(working.clone()),
            smart_lists: MemoryRepository::new(working.clone()),
            smart_list_items: MemoryRepository::new(working.clone()),
            metrics: MemoryRepository::new(working.clone()),
            metric_entries: MemoryRepository::new(working.clone()),
            persons: MemoryRepository::new(working.clone()),
            remote_links: MemoryLinkRepository {
                data: working.clone(),
            },
            working,
            committed,
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn workspaces(&self) -> &dyn EntityRepository<Workspace> {
        &self.workspaces
    }

    fn vacations(&self) -> &dyn EntityRepository<Vacation> {
        &self.vacations
    }

    fn projects(&self) -> &dyn EntityRepository<Project> {
        &self.projects
    }

    fn inbox_tasks(&self) -> &dyn EntityRepository<InboxTask> {
        &self.inbox_tasks
    }

    fn recurring_tasks(&self) -> &dyn EntityRepository<RecurringTask> {
        &self.recurring_tasks
    }

    fn big_plans(&self) -> &dyn EntityRepository<BigPlan> {
        &self.big_plans
    }

    fn smart_lists(&self) -> &dyn EntityRepository<SmartList> {
        &self.smart_lists
    }

    fn smart_list_items(&self) -> &dyn EntityRepository<SmartListItem> {
        &self.smart_list_items
    }

    fn metrics(&self) -> &dyn EntityRepository<Metric> {
        &self.metrics
    }

    fn metric_entries(&self) -> &dyn EntityRepository<MetricEntry> {
        &self.metric_entries
    }

    fn persons(&self) -> &dyn EntityRepository<Person> {
        &self.persons
    }

    fn remote_links(&self) -> &dyn RemoteLinkRepository {
        &self.remote_links
    }

    async fn commit(self: Box<Self>) -> LocalResult<()> {
        let snapshot = self.working.lock().await.clone();
        *self.committed.lock().await = snapshot;
        Ok(())
    }
}

struct MemoryRepository<E: StoredEntity> {
    data: Arc<Mutex<Dataset>>,
    _marker: std::marker::PhantomData<fn() -> E>,
}

impl<E: StoredEntity> MemoryRepository<E> {
    fn new(data: Arc<Mutex<Dataset>>) -> Self {
        Self {
            data,
            _marker: std::marker::PhantomData,
        }
    }
}

fn numeric(id: &EntityId) -> u64 {
    id.as_str().parse().unwrap_or(0)
}

#[async_trait]
impl<E: StoredEntity> EntityRepository<E> for MemoryRepository<E> {
    async fn create(&self, mut entity: E) -> LocalResult<E> {
        let mut ds = self.data.lock().await;
        if entity.meta().ref_id.is_unassigned() {
            ds.last_ref_id += 1;
            entity.meta_mut().ref_id = EntityId::from_index(ds.last_ref_id);
        } else {
            // Seeded ids must not collide with later allocations.
            ds.last_ref_id = ds.last_ref_id.max(numeric(&entity.meta().ref_id));
        }
        let ref_id = entity.meta().ref_id.clone();
        if E::slot(&ds).contains_key(&ref_id) {
            return Err(LocalError::storage(format!(
                "duplicate ref id {ref_id} in {}",
                E::KIND
            )));
        }
        E::slot_mut(&mut ds).insert(ref_id, entity.clone());
        Ok(entity)
    }

    async fn save(&self, mut entity: E) -> LocalResult<E> {
        let mut ds = self.data.lock().await;
        let ref_id = entity.meta().ref_id.clone();
        if !E::slot(&ds).contains_key(&ref_id) {
            return Err(LocalError::not_found(E::KIND, &ref_id));
        }
        entity.meta_mut().version += 1;
        E::slot_mut(&mut ds).insert(ref_id, entity.clone());
        Ok(entity)
    }

    async fn load_by_id(&self, ref_id: &EntityId) -> LocalResult<E> {
        let ds = self.data.lock().await;
        E::slot(&ds)
            .get(ref_id)
            .cloned()
            .ok_or_else(|| LocalError::not_found(E::KIND, ref_id))
    }

    async fn find_all(
        &self,
        parent_ref_id: Option<&EntityId>,
        allow_archived: bool,
        filter_ref_ids: Option<&BTreeSet<EntityId>>,
    ) -> LocalResult<Vec<E>> {
        let ds = self.data.lock().await;
        let mut entities: Vec<E> = E::slot(&ds)
            .values()
            .filter(|e| parent_ref_id.is_none_or(|p| e.meta().parent_ref_id == *p))
            .filter(|e| allow_archived || !e.meta().archived)
            .filter(|e| filter_ref_ids.is_none_or(|f| f.contains(&e.meta().ref_id)))
            .cloned()
            .collect();
        entities.sort_by_key(|e| numeric(&e.meta().ref_id));
        Ok(entities)
    }

    async fn remove(&self, ref_id: &EntityId) -> LocalResult<E> {
        let mut ds = self.data.lock().await;
        E::slot_mut(&mut ds)
            .remove(ref_id)
            .ok_or_else(|| LocalError::not_found(E::KIND, ref_id))
    }
}

struct MemoryLinkRepository {
    data: Arc<Mutex<Dataset>>,
}

#[async_trait]
impl RemoteLinkRepository for MemoryLinkRepository {
    async fn upsert(&self, mut link: RemoteLink) -> LocalResult<RemoteLink> {
        let mut ds = self.data.lock().await;
        let key = (link.collection, link.ref_id.clone());
        if let Some(old) = ds.links.get(&key) {
            link.created_time = old.created_time;
        }
        ds.links.insert(key, link.clone());
        Ok(link)
    }

    async fn find_all(
        &self,
        collection: CollectionKind,
        parent_ref_id: &EntityId,
    ) -> LocalResult<Vec<RemoteLink>> {
        let ds = self.data.lock().await;
        let mut links: Vec<RemoteLink> = ds
            .links
            .values()
            .filter(|l| l.collection == collection && l.parent_ref_id == *parent_ref_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| numeric(&l.ref_id));
        Ok(links)
    }

    async fn find_by_ref_id(
        &self,
        collection: CollectionKind,
        ref_id: &EntityId,
    ) -> LocalResult<Option<RemoteLink>> {
        let ds = self.data.lock().await;
        Ok(ds.links.get(&(collection, ref_id.clone())).cloned())
    }

    async fn remove(&self, collection: CollectionKind, ref_id: &EntityId) -> LocalResult<()> {
        let mut ds = self.data.lock().await;
        ds.links.remove(&(collection, ref_id.clone()));
        Ok(())
    }
}
