//! Maintenance passes that run outside the regular sync.
//!
//! `gc` is duplicate-name anti-entropy over the referenceable collections:
//! the earliest-created live entity with a given name stays canonical, later
//! duplicates are removed from both stores and referrers are re-pointed at
//! the canonical entity. `remove_person` is the person removal cascade.

use tracing::{debug, info, warn};

use crate::adapters::{
    BigPlansAdapter, InboxTasksAdapter, MetricsAdapter, PersonsAdapter, ProjectsAdapter,
    SmartListsAdapter,
};
use crate::bootstrap::Bootstrapper;
use crate::catalog::RefCatalog;
use crate::driver::SyncDriver;
use crate::error::{SyncError, SyncResult};
use crate::lockfile::LockFile;
use crate::reconcile::{AdapterCx, CollectionAdapter};
use crate::report::SyncReport;
use alm_core::{
    BigPlan, CollectionAddr, CollectionKind, EntityId, EntityRepository, InboxTask, LocalStore,
    RemoteLinkRepository, RemoteStore, Schema, SyncedEntity, Timestamp, UnitOfWork,
};

impl SyncDriver {
    /// Removes later same-named duplicates of projects, big plans, smart
    /// lists, metrics and persons from both stores, re-pointing referrers at
    /// the canonical entity. Duplicates that still own live entities are
    /// kept and reported.
    pub async fn gc(&self, right_now: Timestamp) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new();
        let mut lock = LockFile::load(&self.lock_path)?;
        let outcome = self.gc_inner(right_now, &mut lock, &mut report).await;
        self.finish(outcome, lock, report)
    }

    /// Removes a person and every inbox task referring to them, on both
    /// sides, tasks first. Remote records that are already gone are logged
    /// and skipped.
    pub async fn remove_person(
        &self,
        person_ref: &EntityId,
        right_now: Timestamp,
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new();
        let mut lock = LockFile::load(&self.lock_path)?;
        let outcome = self
            .remove_person_inner(person_ref, right_now, &mut lock, &mut report)
            .await;
        self.finish(outcome, lock, report)
    }

    fn finish(
        &self,
        outcome: SyncResult<()>,
        lock: LockFile,
        mut report: SyncReport,
    ) -> SyncResult<SyncReport> {
        lock.save()?;
        match outcome {
            Ok(()) => report.complete(),
            Err(err) if err.is_reportable_abort() => {
                warn!(error = %err, "Maintenance pass aborted");
                report.abort(&err);
            }
            Err(err) => return Err(err),
        }
        Ok(report)
    }

    async fn gc_inner(
        &self,
        right_now: Timestamp,
        lock: &mut LockFile,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let workspace = self.load_workspace().await?;
        let ws_ref = workspace.ref_id().clone();
        let (catalog, _) = self.seed_catalog(&ws_ref).await?;
        let cx = AdapterCx {
            catalog: &catalog,
            right_now,
        };
        let uow = self.local.begin().await?;

        // Projects. A duplicate that still owns live entities cannot be
        // merged away without re-homing them, so it is kept and reported.
        let projects = uow.projects().find_all(Some(&ws_ref), false, None).await?;
        let schema = ProjectsAdapter.schema(&cx);
        for (canonical, dups) in duplicate_groups(&projects, |p| p.name.as_str()) {
            for dup in dups {
                let mut children = uow.big_plans().find_all(Some(&dup), false, None).await?.len();
                children += uow
                    .recurring_tasks()
                    .find_all(Some(&dup), false, None)
                    .await?
                    .len();
                children += uow.inbox_tasks().find_all(Some(&dup), false, None).await?.len();
                if children > 0 {
                    warn!(ref_id = %dup, children, "Duplicate project still owns live entities; kept");
                    report.add_issue(
                        CollectionKind::Projects,
                        Some(dup.clone()),
                        None,
                        format!("duplicate of project {canonical} kept; {children} live entities under it"),
                    );
                    continue;
                }
                let mut ws = uow.workspaces().load_by_id(&ws_ref).await?;
                if ws.default_project_ref_id.as_ref() == Some(&dup) {
                    ws.default_project_ref_id = Some(canonical.clone());
                    ws.meta_mut().touch(right_now);
                    uow.workspaces().save(ws).await?;
                }
                if self
                    .unlink_remote(CollectionKind::Projects, &dup, &schema, lock, uow.remote_links())
                    .await?
                {
                    report.counters_mut(CollectionKind::Projects).removed_remote += 1;
                }
                uow.projects().remove(&dup).await?;
                for kind in [
                    CollectionKind::BigPlans,
                    CollectionKind::RecurringTasks,
                    CollectionKind::InboxTasks,
                ] {
                    lock.forget(&CollectionAddr::new(kind, dup.clone()));
                }
                info!(ref_id = %dup, canonical = %canonical, "Removed duplicate project");
            }
        }

        // Big plans, across all projects. Referring tasks move to the
        // canonical plan and the move is pushed remotely right away.
        let all_projects = uow.projects().find_all(Some(&ws_ref), true, None).await?;
        let mut plans: Vec<BigPlan> = Vec::new();
        for project in &all_projects {
            plans.extend(
                uow.big_plans()
                    .find_all(Some(project.ref_id()), false, None)
                    .await?,
            );
        }
        let schema = BigPlansAdapter.schema(&cx);
        for (canonical, dups) in duplicate_groups(&plans, |p| p.name.as_str()) {
            for dup in dups {
                let tasks = uow.inbox_tasks().find_all(None, true, None).await?;
                for mut task in tasks
                    .into_iter()
                    .filter(|t| t.big_plan_ref_id.as_ref() == Some(&dup))
                {
                    task.big_plan_ref_id = Some(canonical.clone());
                    self.push_task(task, &catalog, right_now, lock, uow.as_ref(), report)
                        .await?;
                }
                if self
                    .unlink_remote(CollectionKind::BigPlans, &dup, &schema, lock, uow.remote_links())
                    .await?
                {
                    report.counters_mut(CollectionKind::BigPlans).removed_remote += 1;
                }
                uow.big_plans().remove(&dup).await?;
                info!(ref_id = %dup, canonical = %canonical, "Removed duplicate big plan");
            }
        }

        // Smart lists. Nothing references a list by id, so only the child
        // check applies.
        let lists = uow.smart_lists().find_all(Some(&ws_ref), false, None).await?;
        let schema = SmartListsAdapter.schema(&cx);
        for (canonical, dups) in duplicate_groups(&lists, |l| l.name.as_str()) {
            for dup in dups {
                let items = uow
                    .smart_list_items()
                    .find_all(Some(&dup), false, None)
                    .await?;
                if !items.is_empty() {
                    warn!(ref_id = %dup, items = items.len(), "Duplicate smart list still has live items; kept");
                    report.add_issue(
                        CollectionKind::SmartLists,
                        Some(dup.clone()),
                        None,
                        format!("duplicate of smart list {canonical} kept; {} live items under it", items.len()),
                    );
                    continue;
                }
                if self
                    .unlink_remote(CollectionKind::SmartLists, &dup, &schema, lock, uow.remote_links())
                    .await?
                {
                    report.counters_mut(CollectionKind::SmartLists).removed_remote += 1;
                }
                uow.smart_lists().remove(&dup).await?;
                lock.forget(&CollectionAddr::new(CollectionKind::SmartListItems, dup.clone()));
                info!(ref_id = %dup, canonical = %canonical, "Removed duplicate smart list");
            }
        }

        // Metrics. Entries are children, so the child check applies on top
        // of referrer re-pointing.
        let metrics_all = uow.metrics().find_all(Some(&ws_ref), false, None).await?;
        let schema = MetricsAdapter.schema(&cx);
        for (canonical, dups) in duplicate_groups(&metrics_all, |m| m.name.as_str()) {
            for dup in dups {
                let entries = uow
                    .metric_entries()
                    .find_all(Some(&dup), false, None)
                    .await?;
                if !entries.is_empty() {
                    warn!(ref_id = %dup, entries = entries.len(), "Duplicate metric still has live entries; kept");
                    report.add_issue(
                        CollectionKind::Metrics,
                        Some(dup.clone()),
                        None,
                        format!("duplicate of metric {canonical} kept; {} live entries under it", entries.len()),
                    );
                    continue;
                }
                let tasks = uow.inbox_tasks().find_all(None, true, None).await?;
                for mut task in tasks
                    .into_iter()
                    .filter(|t| t.metric_ref_id.as_ref() == Some(&dup))
                {
                    task.metric_ref_id = Some(canonical.clone());
                    self.push_task(task, &catalog, right_now, lock, uow.as_ref(), report)
                        .await?;
                }
                if self
                    .unlink_remote(CollectionKind::Metrics, &dup, &schema, lock, uow.remote_links())
                    .await?
                {
                    report.counters_mut(CollectionKind::Metrics).removed_remote += 1;
                }
                uow.metrics().remove(&dup).await?;
                lock.forget(&CollectionAddr::new(CollectionKind::MetricEntries, dup.clone()));
                info!(ref_id = %dup, canonical = %canonical, "Removed duplicate metric");
            }
        }

        // Persons.
        let persons = uow.persons().find_all(Some(&ws_ref), false, None).await?;
        let schema = PersonsAdapter.schema(&cx);
        for (canonical, dups) in duplicate_groups(&persons, |p| p.name.as_str()) {
            for dup in dups {
                let tasks = uow.inbox_tasks().find_all(None, true, None).await?;
                for mut task in tasks
                    .into_iter()
                    .filter(|t| t.person_ref_id.as_ref() == Some(&dup))
                {
                    task.person_ref_id = Some(canonical.clone());
                    self.push_task(task, &catalog, right_now, lock, uow.as_ref(), report)
                        .await?;
                }
                if self
                    .unlink_remote(CollectionKind::Persons, &dup, &schema, lock, uow.remote_links())
                    .await?
                {
                    report.counters_mut(CollectionKind::Persons).removed_remote += 1;
                }
                uow.persons().remove(&dup).await?;
                info!(ref_id = %dup, canonical = %canonical, "Removed duplicate person");
            }
        }

        uow.commit().await?;
        Ok(())
    }

    async fn remove_person_inner(
        &self,
        person_ref: &EntityId,
        right_now: Timestamp,
        lock: &mut LockFile,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let workspace = self.load_workspace().await?;
        let ws_ref = workspace.ref_id().clone();
        let (catalog, _) = self.seed_catalog(&ws_ref).await?;
        let cx = AdapterCx {
            catalog: &catalog,
            right_now,
        };
        let uow = self.local.begin().await?;

        let person = match uow.persons().load_by_id(person_ref).await {
            Ok(person) => person,
            Err(e) if e.is_not_found() => {
                return Err(SyncError::invalid_request(format!(
                    "no person with ref id {person_ref}"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let referring: Vec<InboxTask> = uow
            .inbox_tasks()
            .find_all(None, true, None)
            .await?
            .into_iter()
            .filter(|t| t.person_ref_id.as_ref() == Some(person_ref))
            .collect();

        let inbox_schema = InboxTasksAdapter.schema(&cx);
        for task in &referring {
            if self
                .unlink_remote(
                    CollectionKind::InboxTasks,
                    task.ref_id(),
                    &inbox_schema,
                    lock,
                    uow.remote_links(),
                )
                .await?
            {
                report.counters_mut(CollectionKind::InboxTasks).removed_remote += 1;
            }
            uow.inbox_tasks().remove(task.ref_id()).await?;
        }

        let persons_schema = PersonsAdapter.schema(&cx);
        if self
            .unlink_remote(
                CollectionKind::Persons,
                person_ref,
                &persons_schema,
                lock,
                uow.remote_links(),
            )
            .await?
        {
            report.counters_mut(CollectionKind::Persons).removed_remote += 1;
        }
        uow.persons().remove(person_ref).await?;
        uow.commit().await?;
        info!(
            person = %person.name,
            ref_id = %person_ref,
            tasks = referring.len(),
            "Removed person and the tasks referring to them"
        );
        Ok(())
    }

    /// Deletes the bound remote record of an entity, if any, and drops the
    /// binding. An already-gone record counts as removed.
    async fn unlink_remote(
        &self,
        kind: CollectionKind,
        ref_id: &EntityId,
        schema: &Schema,
        lock: &mut LockFile,
        links: &dyn RemoteLinkRepository,
    ) -> SyncResult<bool> {
        let Some(link) = links.find_by_ref_id(kind, ref_id).await? else {
            return Ok(false);
        };
        let addr = CollectionAddr::new(kind, link.parent_ref_id.clone());
        let handle = Bootstrapper::new(self.remote.as_ref())
            .resolve(&addr, schema, lock)
            .await?;
        match self.remote.delete(&handle.container_id, &link.remote_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(collection = %kind, ref_id = %ref_id, "Remote record already gone");
            }
            Err(e) => return Err(SyncError::remote(kind, e)),
        }
        links.remove(kind, ref_id).await?;
        metrics::counter!("sync.records.removed_remote").increment(1);
        Ok(true)
    }

    /// Saves a re-pointed task and pushes its new field values to the bound
    /// remote record, keeping both timestamps aligned.
    async fn push_task(
        &self,
        mut task: InboxTask,
        catalog: &RefCatalog,
        right_now: Timestamp,
        lock: &mut LockFile,
        uow: &dyn UnitOfWork,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let kind = CollectionKind::InboxTasks;
        let cx = AdapterCx { catalog, right_now };
        let mut remote_ts = None;
        if let Some(link) = uow.remote_links().find_by_ref_id(kind, task.ref_id()).await? {
            let addr = CollectionAddr::new(kind, task.parent_ref_id().clone());
            let handle = Bootstrapper::new(self.remote.as_ref())
                .resolve(&addr, &InboxTasksAdapter.schema(&cx), lock)
                .await?;
            match self.remote.load(&handle.container_id, &link.remote_id).await {
                Ok(mut record) => {
                    record.fields = InboxTasksAdapter.project(&task, &cx);
                    match self.remote.update(&handle.container_id, &record).await {
                        Ok(result) => remote_ts = Some(result.last_edited_time),
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(SyncError::remote(kind, e)),
                    }
                }
                Err(e) if e.is_not_found() => {
                    debug!(ref_id = %task.ref_id(), "Bound record is gone; re-point stays local");
                }
                Err(e) => return Err(SyncError::remote(kind, e)),
            }
        }
        match remote_ts {
            Some(ts) => task.meta_mut().last_modified_time = ts,
            None => task.meta_mut().touch(right_now),
        }
        uow.inbox_tasks().save(task).await?;
        metrics::counter!("sync.records.pushed").increment(1);
        report.counters_mut(kind).pushed += 1;
        Ok(())
    }
}

/// Groups live entities by name and returns `(canonical, later duplicates)`
/// per name that occurs more than once. The canonical entity is the earliest
/// created one, ties going to the first in ref-id order.
fn duplicate_groups<E: SyncedEntity>(
    entities: &[E],
    name_of: impl Fn(&E) -> &str,
) -> Vec<(EntityId, Vec<EntityId>)> {
    let mut by_name: std::collections::BTreeMap<&str, Vec<&E>> = std::collections::BTreeMap::new();
    for entity in entities {
        by_name.entry(name_of(entity)).or_default().push(entity);
    }
    let mut groups = Vec::new();
    for (_, members) in by_name {
        if members.len() < 2 {
            continue;
        }
        let mut canonical = members[0];
        for &member in &members[1..] {
            if member.meta().created_time < canonical.meta().created_time {
                canonical = member;
            }
        }
        let dups = members
            .iter()
            .filter(|m| m.ref_id() != canonical.ref_id())
            .map(|m| m.ref_id().clone())
            .collect();
        groups.push((canonical.ref_id().clone(), dups));
    }
    groups
}
