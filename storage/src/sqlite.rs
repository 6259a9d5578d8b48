use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use alm_core::entities::{
    BigPlan, InboxTask, Metric, MetricEntry, Person, Project, RecurringTask, RemoteLink,
    SmartList, SmartListItem, SyncedEntity, Vacation, Workspace,
};
use alm_core::error::{LocalError, LocalResult};
use alm_core::traits::{EntityRepository, LocalStore, RemoteLinkRepository, UnitOfWork};
use alm_core::types::{CollectionKind, EntityId};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{AssertSqlSafe, Pool, Sqlite, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

type SharedTx = Arc<Mutex<Option<Transaction<'static, Sqlite>>>>;

fn table_for(kind: CollectionKind) -> &'static str {
    match kind {
        CollectionKind::Workspace => "workspaces",
        CollectionKind::Vacations => "vacations",
        CollectionKind::Projects => "projects",
        CollectionKind::InboxTasks => "inbox_tasks",
        CollectionKind::RecurringTasks => "recurring_tasks",
        CollectionKind::BigPlans => "big_plans",
        CollectionKind::SmartLists => "smart_lists",
        CollectionKind::SmartListItems => "smart_list_items",
        CollectionKind::Metrics => "metrics",
        CollectionKind::MetricEntries => "metric_entries",
        CollectionKind::Persons => "persons",
    }
}

/// Local store backed by a single SQLite file.
///
/// Every entity kind gets its own table with the `ref_id` primary key,
/// filter columns and a JSON payload; ref ids come from a counter table so
/// they are never reused across kinds or after deletes.
pub struct SqliteLocalStore {
    pool: Pool<Sqlite>,
}

impl SqliteLocalStore {
    pub async fn open(path: impl AsRef<Path>) -> LocalResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(LocalError::storage)?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> LocalResult<()> {
        debug!("initializing local store schema");
        for kind in [
            CollectionKind::Workspace,
            CollectionKind::Vacations,
            CollectionKind::Projects,
            CollectionKind::InboxTasks,
            CollectionKind::RecurringTasks,
            CollectionKind::BigPlans,
            CollectionKind::SmartLists,
            CollectionKind::SmartListItems,
            CollectionKind::Metrics,
            CollectionKind::MetricEntries,
            CollectionKind::Persons,
        ] {
            let table = table_for(kind);
            sqlx::query(AssertSqlSafe(format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    ref_id TEXT PRIMARY KEY,
                    parent_ref_id TEXT NOT NULL,
                    archived INTEGER NOT NULL DEFAULT 0,
                    data TEXT NOT NULL
                )"
            )))
            .execute(&self.pool)
            .await
            .map_err(LocalError::storage)?;

            sqlx::query(AssertSqlSafe(format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}(parent_ref_id)"
            )))
            .execute(&self.pool)
            .await
            .map_err(LocalError::storage)?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS remote_links (
                collection TEXT NOT NULL,
                ref_id TEXT NOT NULL,
                parent_ref_id TEXT NOT NULL,
                remote_id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (collection, ref_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(LocalError::storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS id_counter (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                next_ref_id INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(LocalError::storage)?;

        sqlx::query("INSERT OR IGNORE INTO id_counter (id, next_ref_id) VALUES (1, 1)")
            .execute(&self.pool)
            .await
            .map_err(LocalError::storage)?;

        Ok(())
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn begin(&self) -> LocalResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(LocalError::storage)?;
        Ok(Box::new(SqliteUnitOfWork::new(tx)))
    }
}

/// One open transaction plus a repository per table. Dropping without
/// commit rolls the transaction back when the connection is reused.
pub struct SqliteUnitOfWork {
    tx: SharedTx,
    workspaces: SqliteRepository<Workspace>,
    vacations: SqliteRepository<Vacation>,
    projects: SqliteRepository<Project>,
    inbox_tasks: SqliteRepository<InboxTask>,
    recurring_tasks: SqliteRepository<RecurringTask>,
    big_plans: SqliteRepository<BigPlan>,
    smart_lists: SqliteRepository<SmartList>,
    smart_list_items: SqliteRepository<SmartListItem>,
    metrics: SqliteRepository<Metric>,
    metric_entries: SqliteRepository<MetricEntry>,
    persons: SqliteRepository<Person>,
    remote_links: SqliteLinkRepository,
}

impl SqliteUnitOfWork {
    fn new(tx: Transaction<'static, Sqlite>) -> Self {
        let tx: SharedTx = Arc::new(Mutex::new(Some(tx)));
        Self {
            workspaces: SqliteRepository::new(tx.clone()),
            vacations: SqliteRepository::new(tx.clone()),
            projects: SqliteRepository::new(tx.clone()),
            inbox_tasks: SqliteRepository::new(tx.clone()),
            recurring_tasks: SqliteRepository::new(tx.clone()),
            big_plans: SqliteRepository::new(tx.clone()),
            smart_lists: SqliteRepository::new(tx.clone()),
            smart_list_items: SqliteRepository::new(tx.clone()),
            metrics: SqliteRepository::new(tx.clone()),
            metric_entries: SqliteRepository::new(tx.clone()),
            persons: SqliteRepository::new(tx.clone()),
            remote_links: SqliteLinkRepository { tx: tx.clone() },
            tx,
        }
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
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
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;
        tx.commit().await.map_err(LocalError::storage)
    }
}

async fn allocate_ref_id(tx: &mut Transaction<'static, Sqlite>) -> LocalResult<EntityId> {
    let (next,): (i64,) = sqlx::query_as("SELECT next_ref_id FROM id_counter WHERE id = 1")
        .fetch_one(&mut **tx)
        .await
        .map_err(LocalError::storage)?;
    sqlx::query("UPDATE id_counter SET next_ref_id = ? WHERE id = 1")
        .bind(next + 1)
        .execute(&mut **tx)
        .await
        .map_err(LocalError::storage)?;
    Ok(EntityId::from_index(next as u64))
}

struct SqliteRepository<E: SyncedEntity> {
    tx: SharedTx,
    table: &'static str,
    _marker: PhantomData<fn() -> E>,
}

impl<E: SyncedEntity> SqliteRepository<E> {
    fn new(tx: SharedTx) -> Self {
        Self {
            tx,
            table: table_for(E::KIND),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<E: SyncedEntity> EntityRepository<E> for SqliteRepository<E> {
    async fn create(&self, mut entity: E) -> LocalResult<E> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;

        if entity.meta().ref_id.is_unassigned() {
            entity.meta_mut().ref_id = allocate_ref_id(tx).await?;
        }
        let data = serde_json::to_string(&entity).map_err(LocalError::corrupt)?;
        sqlx::query(AssertSqlSafe(format!(
            "INSERT INTO {} (ref_id, parent_ref_id, archived, data) VALUES (?, ?, ?, ?)",
            self.table
        )))
        .bind(entity.meta().ref_id.as_str())
        .bind(entity.meta().parent_ref_id.as_str())
        .bind(entity.meta().archived)
        .bind(data)
        .execute(&mut **tx)
        .await
        .map_err(LocalError::storage)?;

        Ok(entity)
    }

    async fn save(&self, mut entity: E) -> LocalResult<E> {
        entity.meta_mut().version += 1;
        let data = serde_json::to_string(&entity).map_err(LocalError::corrupt)?;

        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;
        let result = sqlx::query(AssertSqlSafe(format!(
            "UPDATE {} SET parent_ref_id = ?, archived = ?, data = ? WHERE ref_id = ?",
            self.table
        )))
        .bind(entity.meta().parent_ref_id.as_str())
        .bind(entity.meta().archived)
        .bind(data)
        .bind(entity.meta().ref_id.as_str())
        .execute(&mut **tx)
        .await
        .map_err(LocalError::storage)?;

        if result.rows_affected() == 0 {
            return Err(LocalError::not_found(E::KIND, &entity.meta().ref_id));
        }
        Ok(entity)
    }

    async fn load_by_id(&self, ref_id: &EntityId) -> LocalResult<E> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;
        let row: Option<(String,)> = sqlx::query_as(AssertSqlSafe(format!(
            "SELECT data FROM {} WHERE ref_id = ?",
            self.table
        )))
        .bind(ref_id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(LocalError::storage)?;

        match row {
            Some((data,)) => serde_json::from_str(&data).map_err(LocalError::corrupt),
            None => Err(LocalError::not_found(E::KIND, ref_id)),
        }
    }

    async fn find_all(
        &self,
        parent_ref_id: Option<&EntityId>,
        allow_archived: bool,
        filter_ref_ids: Option<&BTreeSet<EntityId>>,
    ) -> LocalResult<Vec<E>> {
        let mut sql = format!("SELECT data FROM {}", self.table);
        let mut clauses = Vec::new();
        if parent_ref_id.is_some() {
            clauses.push("parent_ref_id = ?");
        }
        if !allow_archived {
            clauses.push("archived = 0");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY CAST(ref_id AS INTEGER)");

        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;
        let mut query = sqlx::query_as::<_, (String,)>(AssertSqlSafe(sql));
        if let Some(parent) = parent_ref_id {
            query = query.bind(parent.as_str());
        }
        let rows = query
            .fetch_all(&mut **tx)
            .await
            .map_err(LocalError::storage)?;

        let mut entities = Vec::with_capacity(rows.len());
        for (data,) in rows {
            let entity: E = serde_json::from_str(&data).map_err(LocalError::corrupt)?;
            if let Some(filter) = filter_ref_ids {
                if !filter.contains(&entity.meta().ref_id) {
                    continue;
                }
            }
            entities.push(entity);
        }
        Ok(entities)
    }

    async fn remove(&self, ref_id: &EntityId) -> LocalResult<E> {
        let entity = self.load_by_id(ref_id).await?;

        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;
        sqlx::query(AssertSqlSafe(format!(
            "DELETE FROM {} WHERE ref_id = ?",
            self.table
        )))
            .bind(ref_id.as_str())
            .execute(&mut **tx)
            .await
            .map_err(LocalError::storage)?;

        Ok(entity)
    }
}

struct SqliteLinkRepository {
    tx: SharedTx,
}

#[async_trait]
impl RemoteLinkRepository for SqliteLinkRepository {
    async fn upsert(&self, mut link: RemoteLink) -> LocalResult<RemoteLink> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT data FROM remote_links WHERE collection = ? AND ref_id = ?",
        )
        .bind(link.collection.to_string())
        .bind(link.ref_id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(LocalError::storage)?;

        if let Some((data,)) = existing {
            let old: RemoteLink = serde_json::from_str(&data).map_err(LocalError::corrupt)?;
            link.created_time = old.created_time;
            let data = serde_json::to_string(&link).map_err(LocalError::corrupt)?;
            sqlx::query(
                "UPDATE remote_links SET parent_ref_id = ?, remote_id = ?, data = ?
                 WHERE collection = ? AND ref_id = ?",
            )
            .bind(link.parent_ref_id.as_str())
            .bind(link.remote_id.as_str())
            .bind(data)
            .bind(link.collection.to_string())
            .bind(link.ref_id.as_str())
            .execute(&mut **tx)
            .await
            .map_err(LocalError::storage)?;
        } else {
            let data = serde_json::to_string(&link).map_err(LocalError::corrupt)?;
            sqlx::query(
                "INSERT INTO remote_links (collection, ref_id, parent_ref_id, remote_id, data)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(link.collection.to_string())
            .bind(link.ref_id.as_str())
            .bind(link.parent_ref_id.as_str())
            .bind(link.remote_id.as_str())
            .bind(data)
            .execute(&mut **tx)
            .await
            .map_err(LocalError::storage)?;
        }

        Ok(link)
    }

    async fn find_all(
        &self,
        collection: CollectionKind,
        parent_ref_id: &EntityId,
    ) -> LocalResult<Vec<RemoteLink>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT data FROM remote_links WHERE collection = ? AND parent_ref_id = ?
             ORDER BY CAST(ref_id AS INTEGER)",
        )
        .bind(collection.to_string())
        .bind(parent_ref_id.as_str())
        .fetch_all(&mut **tx)
        .await
        .map_err(LocalError::storage)?;

        rows.into_iter()
            .map(|(data,)| serde_json::from_str(&data).map_err(LocalError::corrupt))
            .collect()
    }

    async fn find_by_ref_id(
        &self,
        collection: CollectionKind,
        ref_id: &EntityId,
    ) -> LocalResult<Option<RemoteLink>> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT data FROM remote_links WHERE collection = ? AND ref_id = ?",
        )
        .bind(collection.to_string())
        .bind(ref_id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(LocalError::storage)?;

        match row {
            Some((data,)) => serde_json::from_str(&data)
                .map(Some)
                .map_err(LocalError::corrupt),
            None => Ok(None),
        }
    }

    async fn remove(&self, collection: CollectionKind, ref_id: &EntityId) -> LocalResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| LocalError::storage("transaction already committed"))?;
        sqlx::query("DELETE FROM remote_links WHERE collection = ? AND ref_id = ?")
            .bind(collection.to_string())
            .bind(ref_id.as_str())
            .execute(&mut **tx)
            .await
            .map_err(LocalError::storage)?;
        Ok(())
    }
}
