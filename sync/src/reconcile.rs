//! Per-collection reconciliation between local entities and remote records.
//!
//! One [`Reconciler`] run covers one collection under one parent: it pairs
//! records to entities by ref id, settles each pair by timestamp, adopts
//! records created by hand in the remote UI, deletes danglers and finally
//! materializes local entities the remote has never seen. Per-record
//! failures are logged and skipped; remote transport failures abort the run.

use crate::catalog::RefCatalog;
use crate::error::{SyncError, SyncResult};
use crate::report::{CollectionCounters, SyncReport};
use alm_core::{
    EntityId, EntityRepository, FieldTypeError, FieldValue, RemoteError, RemoteId,
    RemoteLink, RemoteLinkRepository, RemoteRecord, RemoteStore, Schema, SyncPrefer,
    SyncedEntity, Timestamp,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// What an adapter can see while translating between entities and records.
pub struct AdapterCx<'a> {
    pub catalog: &'a RefCatalog,
    pub right_now: Timestamp,
}

/// Translates one entity kind to and from its remote record shape.
///
/// Adapters are pure: the reconciler owns all store traffic and all metadata
/// (ref ids, archival, timestamps). `merge` and `promote` return warnings
/// for values they had to drop, such as a reference to an entity that no
/// longer exists.
pub trait CollectionAdapter: Send + Sync {
    type Entity: SyncedEntity;

    /// The schema the collection's container should carry.
    fn schema(&self, cx: &AdapterCx<'_>) -> Schema;

    /// Projects the entity payload onto record fields.
    fn project(&self, entity: &Self::Entity, cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue>;

    /// Folds a record's fields into an existing entity.
    fn merge(
        &self,
        entity: &mut Self::Entity,
        record: &RemoteRecord,
        cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError>;

    /// Builds a brand-new entity from a record that has no local
    /// counterpart yet.
    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(Self::Entity, Vec<String>), FieldTypeError>;
}

/// Knobs for one reconciliation pass.
pub struct ReconcileArgs<'a> {
    pub right_now: Timestamp,
    pub drop_remote_side: bool,
    pub sync_even_if_unmodified: bool,
    pub sync_prefer: SyncPrefer,
    pub filter_ref_ids: Option<&'a BTreeSet<EntityId>>,
    pub catalog: &'a RefCatalog,
}

pub struct Reconciler<'a, A: CollectionAdapter> {
    adapter: &'a A,
    remote: &'a dyn RemoteStore,
    container: &'a RemoteId,
    parent_ref_id: &'a EntityId,
}

impl<'a, A: CollectionAdapter> Reconciler<'a, A> {
    pub fn new(
        adapter: &'a A,
        remote: &'a dyn RemoteStore,
        container: &'a RemoteId,
        parent_ref_id: &'a EntityId,
    ) -> Self {
        Self {
            adapter,
            remote,
            container,
            parent_ref_id,
        }
    }

    fn remote_err(&self, source: RemoteError) -> SyncError {
        SyncError::remote(A::Entity::KIND, source)
    }

    /// Runs the pass and returns the final local entities of the collection,
    /// in ref-id order. The caller owns the unit of work and commits it.
    pub async fn run(
        &self,
        repo: &dyn EntityRepository<A::Entity>,
        links: &dyn RemoteLinkRepository,
        args: &ReconcileArgs<'_>,
        report: &mut SyncReport,
    ) -> SyncResult<Vec<A::Entity>> {
        let kind = A::Entity::KIND;
        let cx = AdapterCx {
            catalog: args.catalog,
            right_now: args.right_now,
        };
        let mut tally = CollectionCounters::default();

        let mut locals: BTreeMap<EntityId, A::Entity> = repo
            .find_all(Some(self.parent_ref_id), true, args.filter_ref_ids)
            .await?
            .into_iter()
            .map(|e| (e.ref_id().clone(), e))
            .collect();

        let records = if args.drop_remote_side {
            let doomed = self
                .remote
                .list_all(self.container)
                .await
                .map_err(|e| self.remote_err(e))?;
            self.remote
                .drop_all(self.container)
                .await
                .map_err(|e| self.remote_err(e))?;
            tally.removed_remote += doomed.len() as u32;
            info!(collection = %kind, parent = %self.parent_ref_id, dropped = doomed.len(), "Dropped remote side before reconciling");
            Vec::new()
        } else {
            self.remote
                .list_all(self.container)
                .await
                .map_err(|e| self.remote_err(e))?
        };

        let known: BTreeSet<RemoteId> = if records.is_empty() {
            BTreeSet::new()
        } else {
            self.remote
                .list_known_remote_ids(self.container)
                .await
                .map_err(|e| self.remote_err(e))?
                .into_iter()
                .collect()
        };

        debug!(
            collection = %kind,
            parent = %self.parent_ref_id,
            locals = locals.len(),
            records = records.len(),
            "Reconciling collection"
        );

        // Ref ids already bound to a record this pass. A second record
        // claiming the same ref id is a duplicate and goes the dangler way.
        let mut bound: BTreeSet<EntityId> = BTreeSet::new();

        for record in records {
            let Some(rid) = record.ref_id.clone() else {
                if args.filter_ref_ids.is_some() {
                    // Scoped runs never adopt UI records.
                    continue;
                }
                self.promote_record(repo, links, &cx, args, record, &mut locals, &mut bound, &mut tally, report)
                    .await?;
                continue;
            };

            if args
                .filter_ref_ids
                .is_some_and(|filter| !filter.contains(&rid))
            {
                continue;
            }

            let dangling = !locals.contains_key(&rid)
                || !known.contains(&record.remote_id)
                || bound.contains(&rid);
            if dangling {
                self.delete_dangler(links, kind, &rid, &record, &locals, &mut tally, report)
                    .await?;
                continue;
            }

            let Some(entity) = locals.get(&rid) else {
                continue;
            };
            let mut entity = entity.clone();
            bound.insert(rid.clone());

            let rebind = match links.find_by_ref_id(kind, &rid).await? {
                Some(link) => link.remote_id != record.remote_id,
                None => true,
            };
            if rebind {
                links
                    .upsert(RemoteLink::new(
                        kind,
                        self.parent_ref_id.clone(),
                        rid.clone(),
                        record.remote_id.clone(),
                        args.right_now,
                    ))
                    .await?;
            }

            let local_ts = entity.meta().last_modified_time;
            let remote_ts = record.last_edited_time;

            if entity.meta().archived {
                let resurrect =
                    args.sync_prefer == SyncPrefer::Remote && remote_ts > local_ts;
                if !resurrect {
                    // The tombstone wins: the remote representation goes away.
                    match self.remote.delete(self.container, &record.remote_id).await {
                        Ok(()) => {}
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(self.remote_err(e)),
                    }
                    links.remove(kind, &rid).await?;
                    tally.removed_remote += 1;
                    debug!(collection = %kind, ref_id = %rid, "Removed remote record of archived entity");
                    continue;
                }
            }

            match args.sync_prefer {
                SyncPrefer::Remote => {
                    if !args.sync_even_if_unmodified && remote_ts <= local_ts {
                        tally.untouched += 1;
                        continue;
                    }
                    match self.adapter.merge(&mut entity, &record, &cx) {
                        Ok(warnings) => {
                            for message in warnings {
                                warn!(collection = %kind, ref_id = %rid, message, "Dropped value while merging record");
                                report.add_issue(
                                    kind,
                                    Some(rid.clone()),
                                    Some(record.remote_id.clone()),
                                    message,
                                );
                            }
                            if entity.meta().archived {
                                entity.meta_mut().unarchive(args.right_now);
                            }
                            entity.meta_mut().last_modified_time = remote_ts;
                            let entity = repo.save(entity).await?;
                            locals.insert(rid, entity);
                            tally.pulled += 1;
                        }
                        Err(err) => {
                            self.skip_record(kind, Some(&rid), &record, &err, &mut tally, report);
                        }
                    }
                }
                SyncPrefer::Local => {
                    if !args.sync_even_if_unmodified && local_ts <= remote_ts {
                        tally.untouched += 1;
                        continue;
                    }
                    let mut updated = record.clone();
                    updated.ref_id = Some(rid.clone());
                    updated.fields = self.adapter.project(&entity, &cx);
                    match self.remote.update(self.container, &updated).await {
                        Ok(result) => {
                            entity.meta_mut().last_modified_time = result.last_edited_time;
                            let entity = repo.save(entity).await?;
                            locals.insert(rid, entity);
                            tally.pushed += 1;
                        }
                        Err(e) if e.is_not_found() => {
                            report.add_issue(
                                kind,
                                Some(rid.clone()),
                                Some(record.remote_id.clone()),
                                "record vanished mid-run; will be recreated next pass",
                            );
                            tally.skipped += 1;
                        }
                        Err(e) => return Err(self.remote_err(e)),
                    }
                }
            }
        }

        // Local entities the remote never covered: archived ones stay local
        // tombstones, live ones are materialized remotely.
        let mut result: Vec<A::Entity> = Vec::with_capacity(locals.len());
        for (rid, mut entity) in locals {
            if bound.contains(&rid) {
                result.push(entity);
                continue;
            }
            if entity.meta().archived {
                if links.find_by_ref_id(kind, &rid).await?.is_some() {
                    links.remove(kind, &rid).await?;
                }
                result.push(entity);
                continue;
            }
            let mut draft = RemoteRecord::draft(args.right_now);
            draft.ref_id = Some(rid.clone());
            draft.fields = self.adapter.project(&entity, &cx);
            let created = self
                .remote
                .create(self.container, draft)
                .await
                .map_err(|e| self.remote_err(e))?;
            links
                .upsert(RemoteLink::new(
                    kind,
                    self.parent_ref_id.clone(),
                    rid.clone(),
                    created.remote_id.clone(),
                    args.right_now,
                ))
                .await?;
            entity.meta_mut().last_modified_time = created.last_edited_time;
            let entity = repo.save(entity).await?;
            tally.created_remote += 1;
            result.push(entity);
        }
        result.sort_by_key(|e| numeric(e.ref_id()));

        emit_metrics(&tally);
        let counters = report.counters_mut(kind);
        counters.merge(&tally);

        if !tally.is_noop() {
            info!(
                collection = %kind,
                parent = %self.parent_ref_id,
                pulled = tally.pulled,
                pushed = tally.pushed,
                promoted = tally.promoted,
                created_remote = tally.created_remote,
                removed_remote = tally.removed_remote,
                skipped = tally.skipped,
                "Reconciled collection"
            );
        }

        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn promote_record(
        &self,
        repo: &dyn EntityRepository<A::Entity>,
        links: &dyn RemoteLinkRepository,
        cx: &AdapterCx<'_>,
        args: &ReconcileArgs<'_>,
        record: RemoteRecord,
        locals: &mut BTreeMap<EntityId, A::Entity>,
        bound: &mut BTreeSet<EntityId>,
        tally: &mut CollectionCounters,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let kind = A::Entity::KIND;
        let (entity, warnings) = match self.adapter.promote(&record, self.parent_ref_id, cx) {
            Ok(built) => built,
            Err(err) => {
                self.skip_record(kind, None, &record, &err, tally, report);
                return Ok(());
            }
        };
        for message in warnings {
            warn!(collection = %kind, remote_id = %record.remote_id, message, "Dropped value while promoting record");
            report.add_issue(kind, None, Some(record.remote_id.clone()), message);
        }

        let entity = repo.create(entity).await?;
        let rid = entity.ref_id().clone();
        info!(collection = %kind, ref_id = %rid, remote_id = %record.remote_id, "Promoted remote record to a local entity");

        let mut bound_record = record.clone();
        bound_record.ref_id = Some(rid.clone());
        match self.remote.update(self.container, &bound_record).await {
            Ok(result) => {
                let mut entity = entity;
                entity.meta_mut().last_modified_time = result.last_edited_time;
                let entity = repo.save(entity).await?;
                links
                    .upsert(RemoteLink::new(
                        kind,
                        self.parent_ref_id.clone(),
                        rid.clone(),
                        record.remote_id.clone(),
                        args.right_now,
                    ))
                    .await?;
                bound.insert(rid.clone());
                locals.insert(rid, entity);
                tally.promoted += 1;
            }
            Err(e) if e.is_not_found() => {
                // The record vanished between list and write-back. The local
                // entity stays and is materialized fresh further down.
                report.add_issue(
                    kind,
                    Some(rid.clone()),
                    Some(record.remote_id.clone()),
                    "record vanished before ref id write-back",
                );
                locals.insert(rid, entity);
                tally.promoted += 1;
            }
            Err(e) => return Err(self.remote_err(e)),
        }
        Ok(())
    }

    async fn delete_dangler(
        &self,
        links: &dyn RemoteLinkRepository,
        kind: alm_core::CollectionKind,
        rid: &EntityId,
        record: &RemoteRecord,
        locals: &BTreeMap<EntityId, A::Entity>,
        tally: &mut CollectionCounters,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        match self.remote.delete(self.container, &record.remote_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(self.remote_err(e)),
        }
        // Only drop the binding if it pointed at this very record; a
        // duplicate's binding already points at the surviving one.
        if let Some(link) = links.find_by_ref_id(kind, rid).await?
            && link.remote_id == record.remote_id
        {
            links.remove(kind, rid).await?;
        }
        let reason = if locals.contains_key(rid) {
            "duplicate claim on ref id"
        } else {
            "no matching local entity"
        };
        warn!(collection = %kind, ref_id = %rid, remote_id = %record.remote_id, reason, "Deleted dangling remote record");
        report.add_issue(
            kind,
            Some(rid.clone()),
            Some(record.remote_id.clone()),
            format!("dangling record removed: {reason}"),
        );
        tally.removed_remote += 1;
        Ok(())
    }

    fn skip_record(
        &self,
        kind: alm_core::CollectionKind,
        rid: Option<&EntityId>,
        record: &RemoteRecord,
        cause: &FieldTypeError,
        tally: &mut CollectionCounters,
        report: &mut SyncReport,
    ) {
        let err = SyncError::SchemaMismatch {
            collection: kind,
            remote_id: record.remote_id.clone(),
            detail: cause.to_string(),
        };
        warn!(error = %err, "Skipping record that does not fit the schema");
        report.add_issue(
            kind,
            rid.cloned(),
            Some(record.remote_id.clone()),
            cause.to_string(),
        );
        tally.skipped += 1;
    }
}

fn numeric(ref_id: &EntityId) -> u64 {
    ref_id.as_str().parse().unwrap_or(0)
}

fn emit_metrics(tally: &CollectionCounters) {
    metrics::counter!("sync.records.pulled").increment(u64::from(tally.pulled));
    metrics::counter!("sync.records.pushed").increment(u64::from(tally.pushed));
    metrics::counter!("sync.records.promoted").increment(u64::from(tally.promoted));
    metrics::counter!("sync.records.created_remote").increment(u64::from(tally.created_remote));
    metrics::counter!("sync.records.removed_remote").increment(u64::from(tally.removed_remote));
    metrics::counter!("sync.records.skipped").increment(u64::from(tally.skipped));
}
