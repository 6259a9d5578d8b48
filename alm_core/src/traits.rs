use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::entities::{
    BigPlan, InboxTask, Metric, MetricEntry, Person, Project, RecurringTask, RemoteLink,
    SmartList, SmartListItem, SyncedEntity, Vacation, Workspace,
};
use crate::error::{LocalResult, RemoteResult};
use crate::record::{CollectionAddr, ContainerHandle, RemoteRecord, Schema};
use crate::types::{CollectionKind, EntityId, RemoteId};

/// The remote document-database service, one container per collection.
///
/// `list_known_remote_ids` is what separates a live record from a dangling
/// one: records the remote reports under the container but not in the known
/// set are duplicates or leftovers to be cleaned up.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_all(&self, container: &RemoteId) -> RemoteResult<Vec<RemoteRecord>>;

    async fn load(&self, container: &RemoteId, remote_id: &RemoteId)
    -> RemoteResult<RemoteRecord>;

    /// Creates a record; the result carries the remote-assigned id.
    async fn create(&self, container: &RemoteId, record: RemoteRecord)
    -> RemoteResult<RemoteRecord>;

    async fn update(&self, container: &RemoteId, record: &RemoteRecord)
    -> RemoteResult<RemoteRecord>;

    async fn delete(&self, container: &RemoteId, remote_id: &RemoteId) -> RemoteResult<()>;

    /// Deletes every record in the container.
    async fn drop_all(&self, container: &RemoteId) -> RemoteResult<()>;

    async fn list_known_ref_ids(&self, container: &RemoteId) -> RemoteResult<Vec<EntityId>>;

    async fn list_known_remote_ids(&self, container: &RemoteId) -> RemoteResult<Vec<RemoteId>>;

    async fn find_container(&self, addr: &CollectionAddr)
    -> RemoteResult<Option<ContainerHandle>>;

    async fn create_container(
        &self,
        addr: &CollectionAddr,
        schema: &Schema,
    ) -> RemoteResult<ContainerHandle>;

    async fn container_exists(&self, container: &RemoteId) -> RemoteResult<bool>;

    async fn load_schema(&self, container: &RemoteId) -> RemoteResult<Schema>;

    async fn store_schema(&self, container: &RemoteId, schema: &Schema) -> RemoteResult<()>;
}

/// Typed repository for one entity kind inside a unit of work.
#[async_trait]
pub trait EntityRepository<E: SyncedEntity>: Send + Sync {
    /// Persists a new entity. An unassigned `ref_id` is replaced with a
    /// freshly allocated one; the returned entity carries it.
    async fn create(&self, entity: E) -> LocalResult<E>;

    /// Persists changes to an existing entity, bumping its version.
    async fn save(&self, entity: E) -> LocalResult<E>;

    async fn load_by_id(&self, ref_id: &EntityId) -> LocalResult<E>;

    /// All entities, optionally scoped to a parent and a ref-id filter.
    /// Archived entities are included only when `allow_archived` is set.
    async fn find_all(
        &self,
        parent_ref_id: Option<&EntityId>,
        allow_archived: bool,
        filter_ref_ids: Option<&BTreeSet<EntityId>>,
    ) -> LocalResult<Vec<E>>;

    /// Hard delete. Archival is a field update through `save`.
    async fn remove(&self, ref_id: &EntityId) -> LocalResult<E>;
}

/// Identity-map persistence: ref id to remote id bindings per collection.
#[async_trait]
pub trait RemoteLinkRepository: Send + Sync {
    async fn upsert(&self, link: RemoteLink) -> LocalResult<RemoteLink>;

    async fn find_all(
        &self,
        collection: CollectionKind,
        parent_ref_id: &EntityId,
    ) -> LocalResult<Vec<RemoteLink>>;

    async fn find_by_ref_id(
        &self,
        collection: CollectionKind,
        ref_id: &EntityId,
    ) -> LocalResult<Option<RemoteLink>>;

    /// Removing an absent binding is not an error.
    async fn remove(&self, collection: CollectionKind, ref_id: &EntityId) -> LocalResult<()>;
}

/// One open transaction against the local store, with a typed repository
/// per entity kind. Dropping without commit rolls everything back.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn workspaces(&self) -> &dyn EntityRepository<Workspace>;
    fn vacations(&self) -> &dyn EntityRepository<Vacation>;
    fn projects(&self) -> &dyn EntityRepository<Project>;
    fn inbox_tasks(&self) -> &dyn EntityRepository<InboxTask>;
    fn recurring_tasks(&self) -> &dyn EntityRepository<RecurringTask>;
    fn big_plans(&self) -> &dyn EntityRepository<BigPlan>;
    fn smart_lists(&self) -> &dyn EntityRepository<SmartList>;
    fn smart_list_items(&self) -> &dyn EntityRepository<SmartListItem>;
    fn metrics(&self) -> &dyn EntityRepository<Metric>;
    fn metric_entries(&self) -> &dyn EntityRepository<MetricEntry>;
    fn persons(&self) -> &dyn EntityRepository<Person>;
    fn remote_links(&self) -> &dyn RemoteLinkRepository;

    async fn commit(self: Box<Self>) -> LocalResult<()>;
}

/// Factory for units of work. One per collection during a sync run so a
/// mid-run failure leaves a consistent prefix committed.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn begin(&self) -> LocalResult<Box<dyn UnitOfWork>>;
}
