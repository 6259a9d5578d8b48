//! The run driver.
//!
//! Orders collection syncs so referenced collections settle before their
//! referrers, hands each collection its own unit of work, refreshes the
//! reference catalog as sections finish and folds everything into one
//! [`SyncReport`]. A remote failure aborts the rest of the run; collections
//! committed before it stay committed and the abort is reported, not raised.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::adapters::{
    BigPlansAdapter, InboxTasksAdapter, MetricEntriesAdapter, MetricsAdapter, PersonsAdapter,
    ProjectsAdapter, RecurringTasksAdapter, SmartListItemsAdapter, SmartListsAdapter,
    VacationsAdapter, WorkspaceAdapter,
};
use crate::bootstrap::Bootstrapper;
use crate::catalog::{CatalogEntry, RefCatalog};
use crate::error::{SyncError, SyncResult};
use crate::lockfile::LockFile;
use crate::propagate::Propagator;
use crate::reconcile::{AdapterCx, CollectionAdapter, ReconcileArgs, Reconciler};
use crate::report::SyncReport;
use crate::request::SyncRequest;
use crate::schedule::{catch_up_task_name, due_date_for, metric_task_name, timeline_for};
use alm_core::{
    BigPlan, CollectionAddr, CollectionKind, ContainerHandle, Difficulty, Eisenhower, EntityId,
    EntityMeta, EntityRepository, InboxTask, InboxTaskSource, LocalStore, Metric, Person, Project,
    RecurringTaskPeriod, RemoteLinkRepository, RemoteStore, SelectOption, SyncTarget,
    SyncedEntity, Timestamp, UnitOfWork, Workspace,
};
use uuid::Uuid;

pub struct SyncDriver {
    pub(crate) local: Arc<dyn LocalStore>,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) lock_path: PathBuf,
}

/// Inputs for regenerating the schedule-derived half of generated tasks.
struct Regeneration<'a> {
    source: InboxTaskSource,
    source_ref: &'a EntityId,
    source_modified: Timestamp,
    name: String,
    period: RecurringTaskPeriod,
    eisenhower: Eisenhower,
    difficulty: Option<Difficulty>,
}

impl SyncDriver {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        lock_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            local,
            remote,
            lock_path: lock_path.into(),
        }
    }

    /// Runs one sync pass over the requested targets.
    ///
    /// Only invalid requests, invariant violations and local storage or lock
    /// file failures come back as `Err`. A remote failure ends the run early
    /// with the abort reason on the report.
    pub async fn run(&self, request: &SyncRequest) -> SyncResult<SyncReport> {
        request.validate()?;
        let mut report = SyncReport::new();
        let mut lock = LockFile::load(&self.lock_path)?;

        let outcome = self.run_inner(request, &mut lock, &mut report).await;
        lock.save()?;
        match outcome {
            Ok(()) => {
                report.complete();
                metrics::counter!("sync.runs").increment(1);
                let totals = report.totals();
                info!(
                    pulled = totals.pulled,
                    pushed = totals.pushed,
                    promoted = totals.promoted,
                    created_remote = totals.created_remote,
                    removed_remote = totals.removed_remote,
                    skipped = totals.skipped,
                    issues = report.issues.len(),
                    "Sync run finished"
                );
            }
            Err(err) if err.is_reportable_abort() => {
                metrics::counter!("sync.runs.aborted").increment(1);
                warn!(error = %err, "Sync run aborted; collections synced so far stay committed");
                report.abort(&err);
            }
            Err(err) => return Err(err),
        }
        Ok(report)
    }

    async fn run_inner(
        &self,
        request: &SyncRequest,
        lock: &mut LockFile,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let workspace = self.load_workspace().await?;
        let ws_ref = workspace.ref_id().clone();
        let ws_parent = workspace.parent_ref_id().clone();
        let (mut catalog, mut plan_groups) = self.seed_catalog(&ws_ref).await?;
        let boot = Bootstrapper::new(self.remote.as_ref());
        let propagator = Propagator::new(self.remote.as_ref());

        if request.has_target(SyncTarget::Structure) {
            self.bootstrap_structure(&ws_ref, &ws_parent, &catalog, &plan_groups, request, lock)
                .await?;
        }

        if request.has_target(SyncTarget::Workspace) {
            let handle = {
                let cx = cx(&catalog, request);
                let addr = CollectionAddr::new(CollectionKind::Workspace, ws_parent.clone());
                boot.resolve(&addr, &WorkspaceAdapter.schema(&cx), lock).await?
            };
            let uow = self.local.begin().await?;
            self.reconcile_collection(
                &WorkspaceAdapter,
                &handle,
                &ws_parent,
                uow.workspaces(),
                uow.remote_links(),
                request,
                None,
                &catalog,
                report,
            )
            .await?;
            uow.commit().await?;
        }

        if request.has_target(SyncTarget::Vacations) {
            let handle = {
                let cx = cx(&catalog, request);
                let addr = CollectionAddr::new(CollectionKind::Vacations, ws_ref.clone());
                boot.resolve(&addr, &VacationsAdapter.schema(&cx), lock).await?
            };
            let uow = self.local.begin().await?;
            self.reconcile_collection(
                &VacationsAdapter,
                &handle,
                &ws_ref,
                uow.vacations(),
                uow.remote_links(),
                request,
                request.filter_vacation_ref_ids.as_ref(),
                &catalog,
                report,
            )
            .await?;
            uow.commit().await?;
        }

        if request.has_target(SyncTarget::Projects) {
            let handle = {
                let cx = cx(&catalog, request);
                let addr = CollectionAddr::new(CollectionKind::Projects, ws_ref.clone());
                boot.resolve(&addr, &ProjectsAdapter.schema(&cx), lock).await?
            };
            let uow = self.local.begin().await?;
            self.reconcile_collection(
                &ProjectsAdapter,
                &handle,
                &ws_ref,
                uow.projects(),
                uow.remote_links(),
                request,
                request.filter_project_ref_ids.as_ref(),
                &catalog,
                report,
            )
            .await?;
            uow.commit().await?;
        }

        // Re-read the project picture from the store: a filtered run only
        // reconciled part of it, and promoted projects need catalog entries
        // and containers below.
        let all_projects = {
            let uow = self.local.begin().await?;
            uow.projects().find_all(Some(&ws_ref), true, None).await?
        };
        catalog.set_projects(catalog_projects(&all_projects));
        for project in &all_projects {
            plan_groups.entry(project.ref_id().clone()).or_default();
        }
        let scoped: Vec<Project> = all_projects
            .iter()
            .filter(|p| !p.archived())
            .filter(|p| {
                request
                    .filter_project_ref_ids
                    .as_ref()
                    .is_none_or(|f| f.contains(p.ref_id()))
            })
            .cloned()
            .collect();

        if request.has_target(SyncTarget::Projects) {
            let options = catalog.project_options();
            for project in &scoped {
                let p_ref = project.ref_id().clone();
                let cx = cx(&catalog, request);
                let plans_handle = boot
                    .resolve(
                        &CollectionAddr::new(CollectionKind::BigPlans, p_ref.clone()),
                        &BigPlansAdapter.schema(&cx),
                        lock,
                    )
                    .await?;
                propagator
                    .push_options(
                        CollectionKind::BigPlans,
                        &plans_handle.container_id,
                        "project",
                        options.clone(),
                    )
                    .await?;
                let recurring_handle = boot
                    .resolve(
                        &CollectionAddr::new(CollectionKind::RecurringTasks, p_ref.clone()),
                        &RecurringTasksAdapter.schema(&cx),
                        lock,
                    )
                    .await?;
                propagator
                    .push_options(
                        CollectionKind::RecurringTasks,
                        &recurring_handle.container_id,
                        "project",
                        options.clone(),
                    )
                    .await?;
                let inbox_handle = boot
                    .resolve(
                        &CollectionAddr::new(CollectionKind::InboxTasks, p_ref),
                        &InboxTasksAdapter.schema(&cx),
                        lock,
                    )
                    .await?;
                propagator
                    .push_options(
                        CollectionKind::InboxTasks,
                        &inbox_handle.container_id,
                        "project",
                        options.clone(),
                    )
                    .await?;
            }
        }

        let mut inbox_state: Vec<(ContainerHandle, Vec<InboxTask>)> = Vec::new();
        for project in &scoped {
            let p_ref = project.ref_id().clone();

            if request.has_target(SyncTarget::BigPlans) {
                let handle = {
                    let cx = cx(&catalog, request);
                    let addr = CollectionAddr::new(CollectionKind::BigPlans, p_ref.clone());
                    boot.resolve(&addr, &BigPlansAdapter.schema(&cx), lock).await?
                };
                let uow = self.local.begin().await?;
                self.reconcile_collection(
                    &BigPlansAdapter,
                    &handle,
                    &p_ref,
                    uow.big_plans(),
                    uow.remote_links(),
                    request,
                    request.filter_big_plan_ref_ids.as_ref(),
                    &catalog,
                    report,
                )
                .await?;
                uow.commit().await?;

                let plans = {
                    let uow = self.local.begin().await?;
                    uow.big_plans().find_all(Some(&p_ref), true, None).await?
                };
                plan_groups.insert(p_ref.clone(), catalog_plans(&plans));
                catalog.set_big_plans(plan_groups.values().flatten().cloned().collect());

                // This project's plans become the big-plan label options of
                // its inbox container.
                let inbox_handle = {
                    let cx = cx(&catalog, request);
                    let addr = CollectionAddr::new(CollectionKind::InboxTasks, p_ref.clone());
                    boot.resolve(&addr, &InboxTasksAdapter.schema(&cx), lock).await?
                };
                propagator
                    .push_options(
                        CollectionKind::InboxTasks,
                        &inbox_handle.container_id,
                        "big-plan",
                        plan_options(&plans),
                    )
                    .await?;
            }

            if request.has_target(SyncTarget::RecurringTasks) {
                let handle = {
                    let cx = cx(&catalog, request);
                    let addr = CollectionAddr::new(CollectionKind::RecurringTasks, p_ref.clone());
                    boot.resolve(&addr, &RecurringTasksAdapter.schema(&cx), lock).await?
                };
                let uow = self.local.begin().await?;
                self.reconcile_collection(
                    &RecurringTasksAdapter,
                    &handle,
                    &p_ref,
                    uow.recurring_tasks(),
                    uow.remote_links(),
                    request,
                    request.filter_recurring_task_ref_ids.as_ref(),
                    &catalog,
                    report,
                )
                .await?;
                uow.commit().await?;
            }

            if request.has_target(SyncTarget::InboxTasks) {
                let handle = {
                    let cx = cx(&catalog, request);
                    let addr = CollectionAddr::new(CollectionKind::InboxTasks, p_ref.clone());
                    boot.resolve(&addr, &InboxTasksAdapter.schema(&cx), lock).await?
                };
                let uow = self.local.begin().await?;
                let tasks = self
                    .reconcile_collection(
                        &InboxTasksAdapter,
                        &handle,
                        &p_ref,
                        uow.inbox_tasks(),
                        uow.remote_links(),
                        request,
                        request.filter_inbox_task_ref_ids.as_ref(),
                        &catalog,
                        report,
                    )
                    .await?;
                uow.commit().await?;
                inbox_state.push((handle, tasks));
            }
        }

        // Reference labels are recomputed once every collection of the block
        // above has settled, so they reflect this run's final names.
        for (handle, tasks) in &inbox_state {
            let uow = self.local.begin().await?;
            propagator
                .relink_inbox_tasks(
                    &handle.container_id,
                    tasks,
                    uow.inbox_tasks(),
                    uow.remote_links(),
                    &catalog,
                    report,
                )
                .await?;
            uow.commit().await?;
        }

        if request.has_target(SyncTarget::SmartLists) {
            let handle = {
                let cx = cx(&catalog, request);
                let addr = CollectionAddr::new(CollectionKind::SmartLists, ws_ref.clone());
                boot.resolve(&addr, &SmartListsAdapter.schema(&cx), lock).await?
            };
            let uow = self.local.begin().await?;
            let lists = self
                .reconcile_collection(
                    &SmartListsAdapter,
                    &handle,
                    &ws_ref,
                    uow.smart_lists(),
                    uow.remote_links(),
                    request,
                    request.filter_smart_list_ref_ids.as_ref(),
                    &catalog,
                    report,
                )
                .await?;
            uow.commit().await?;

            for list in lists.iter().filter(|l| !l.archived()) {
                let handle = {
                    let cx = cx(&catalog, request);
                    let addr =
                        CollectionAddr::new(CollectionKind::SmartListItems, list.ref_id().clone());
                    boot.resolve(&addr, &SmartListItemsAdapter.schema(&cx), lock).await?
                };
                let uow = self.local.begin().await?;
                self.reconcile_collection(
                    &SmartListItemsAdapter,
                    &handle,
                    list.ref_id(),
                    uow.smart_list_items(),
                    uow.remote_links(),
                    request,
                    None,
                    &catalog,
                    report,
                )
                .await?;
                uow.commit().await?;
            }
        }

        if request.has_target(SyncTarget::Metrics) {
            let handle = {
                let cx = cx(&catalog, request);
                let addr = CollectionAddr::new(CollectionKind::Metrics, ws_ref.clone());
                boot.resolve(&addr, &MetricsAdapter.schema(&cx), lock).await?
            };
            let uow = self.local.begin().await?;
            let metrics_synced = self
                .reconcile_collection(
                    &MetricsAdapter,
                    &handle,
                    &ws_ref,
                    uow.metrics(),
                    uow.remote_links(),
                    request,
                    request.filter_metric_ref_ids.as_ref(),
                    &catalog,
                    report,
                )
                .await?;
            uow.commit().await?;
            {
                let uow = self.local.begin().await?;
                catalog.set_metrics(catalog_metrics(
                    &uow.metrics().find_all(Some(&ws_ref), true, None).await?,
                ));
            }

            for metric in metrics_synced.iter().filter(|m| !m.archived()) {
                let handle = {
                    let cx = cx(&catalog, request);
                    let addr =
                        CollectionAddr::new(CollectionKind::MetricEntries, metric.ref_id().clone());
                    boot.resolve(&addr, &MetricEntriesAdapter.schema(&cx), lock).await?
                };
                let uow = self.local.begin().await?;
                self.reconcile_collection(
                    &MetricEntriesAdapter,
                    &handle,
                    metric.ref_id(),
                    uow.metric_entries(),
                    uow.remote_links(),
                    request,
                    None,
                    &catalog,
                    report,
                )
                .await?;
                uow.commit().await?;

                if let Some(period) = metric.collection_period {
                    self.rederive_tasks(
                        Regeneration {
                            source: InboxTaskSource::Metric,
                            source_ref: metric.ref_id(),
                            source_modified: metric.meta().last_modified_time,
                            name: metric_task_name(metric),
                            period,
                            eisenhower: metric
                                .collection_eisenhower
                                .unwrap_or(Eisenhower::Regular),
                            difficulty: metric.collection_difficulty,
                        },
                        &catalog,
                        request,
                        lock,
                        report,
                    )
                    .await?;
                }
            }
        }

        if request.has_target(SyncTarget::Prm) {
            let handle = {
                let cx = cx(&catalog, request);
                let addr = CollectionAddr::new(CollectionKind::Persons, ws_ref.clone());
                boot.resolve(&addr, &PersonsAdapter.schema(&cx), lock).await?
            };
            let uow = self.local.begin().await?;
            let persons_synced = self
                .reconcile_collection(
                    &PersonsAdapter,
                    &handle,
                    &ws_ref,
                    uow.persons(),
                    uow.remote_links(),
                    request,
                    request.filter_person_ref_ids.as_ref(),
                    &catalog,
                    report,
                )
                .await?;
            uow.commit().await?;
            {
                let uow = self.local.begin().await?;
                catalog.set_persons(catalog_persons(
                    &uow.persons().find_all(Some(&ws_ref), true, None).await?,
                ));
            }

            for person in persons_synced.iter().filter(|p| !p.archived()) {
                if let Some(period) = person.catch_up_period {
                    self.rederive_tasks(
                        Regeneration {
                            source: InboxTaskSource::Person,
                            source_ref: person.ref_id(),
                            source_modified: person.meta().last_modified_time,
                            name: catch_up_task_name(person),
                            period,
                            eisenhower: person.catch_up_eisenhower.unwrap_or(Eisenhower::Regular),
                            difficulty: person.catch_up_difficulty,
                        },
                        &catalog,
                        request,
                        lock,
                        report,
                    )
                    .await?;
                }
            }
        }

        if request.has_target(SyncTarget::InboxTasks) {
            self.archive_cascade(request, &catalog, lock, report).await?;
        }

        Ok(())
    }

    pub(crate) async fn load_workspace(&self) -> SyncResult<Workspace> {
        let uow = self.local.begin().await?;
        uow.workspaces()
            .find_all(None, true, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SyncError::invalid_request("no workspace exists locally; initialize one first")
            })
    }

    /// Snapshot of the referenceable entities before anything syncs, so
    /// referrers syncing ahead of their referents still resolve.
    pub(crate) async fn seed_catalog(
        &self,
        ws_ref: &EntityId,
    ) -> SyncResult<(RefCatalog, BTreeMap<EntityId, Vec<CatalogEntry>>)> {
        let uow = self.local.begin().await?;
        let projects = uow.projects().find_all(Some(ws_ref), true, None).await?;
        let mut plan_groups: BTreeMap<EntityId, Vec<CatalogEntry>> = BTreeMap::new();
        for project in &projects {
            let plans = uow
                .big_plans()
                .find_all(Some(project.ref_id()), true, None)
                .await?;
            plan_groups.insert(project.ref_id().clone(), catalog_plans(&plans));
        }
        let mut catalog = RefCatalog::default();
        catalog.set_projects(catalog_projects(&projects));
        catalog.set_big_plans(plan_groups.values().flatten().cloned().collect());
        catalog.set_metrics(catalog_metrics(
            &uow.metrics().find_all(Some(ws_ref), true, None).await?,
        ));
        catalog.set_persons(catalog_persons(
            &uow.persons().find_all(Some(ws_ref), true, None).await?,
        ));
        Ok((catalog, plan_groups))
    }

    /// Finds or creates every container the local data calls for and
    /// upgrades their schemas in place.
    async fn bootstrap_structure(
        &self,
        ws_ref: &EntityId,
        ws_parent: &EntityId,
        catalog: &RefCatalog,
        plan_groups: &BTreeMap<EntityId, Vec<CatalogEntry>>,
        request: &SyncRequest,
        lock: &mut LockFile,
    ) -> SyncResult<()> {
        let boot = Bootstrapper::new(self.remote.as_ref());
        let cx = cx(catalog, request);

        let workspace_addr = CollectionAddr::new(CollectionKind::Workspace, ws_parent.clone());
        boot.ensure(&workspace_addr, &WorkspaceAdapter.schema(&cx), lock).await?;
        for (kind, schema) in [
            (CollectionKind::Vacations, VacationsAdapter.schema(&cx)),
            (CollectionKind::Projects, ProjectsAdapter.schema(&cx)),
            (CollectionKind::SmartLists, SmartListsAdapter.schema(&cx)),
            (CollectionKind::Metrics, MetricsAdapter.schema(&cx)),
            (CollectionKind::Persons, PersonsAdapter.schema(&cx)),
        ] {
            boot.ensure(&CollectionAddr::new(kind, ws_ref.clone()), &schema, lock).await?;
        }

        let uow = self.local.begin().await?;
        for project in uow.projects().find_all(Some(ws_ref), false, None).await? {
            let p_ref = project.ref_id().clone();
            // The inbox container's big-plan options are scoped to the
            // owning project's plans.
            let mut scoped = catalog.clone();
            scoped.set_big_plans(plan_groups.get(&p_ref).cloned().unwrap_or_default());
            let scoped_cx = cx_at(&scoped, request.right_now);
            boot.ensure(
                &CollectionAddr::new(CollectionKind::BigPlans, p_ref.clone()),
                &BigPlansAdapter.schema(&scoped_cx),
                lock,
            )
            .await?;
            boot.ensure(
                &CollectionAddr::new(CollectionKind::RecurringTasks, p_ref.clone()),
                &RecurringTasksAdapter.schema(&scoped_cx),
                lock,
            )
            .await?;
            boot.ensure(
                &CollectionAddr::new(CollectionKind::InboxTasks, p_ref),
                &InboxTasksAdapter.schema(&scoped_cx),
                lock,
            )
            .await?;
        }
        for list in uow.smart_lists().find_all(Some(ws_ref), false, None).await? {
            boot.ensure(
                &CollectionAddr::new(CollectionKind::SmartListItems, list.ref_id().clone()),
                &SmartListItemsAdapter.schema(&cx),
                lock,
            )
            .await?;
        }
        for metric in uow.metrics().find_all(Some(ws_ref), false, None).await? {
            boot.ensure(
                &CollectionAddr::new(CollectionKind::MetricEntries, metric.ref_id().clone()),
                &MetricEntriesAdapter.schema(&cx),
                lock,
            )
            .await?;
        }
        info!("Structure bootstrap complete");
        Ok(())
    }

    async fn reconcile_collection<A: CollectionAdapter>(
        &self,
        adapter: &A,
        handle: &ContainerHandle,
        parent: &EntityId,
        repo: &dyn EntityRepository<A::Entity>,
        links: &dyn RemoteLinkRepository,
        request: &SyncRequest,
        filter: Option<&std::collections::BTreeSet<EntityId>>,
        catalog: &RefCatalog,
        report: &mut SyncReport,
    ) -> SyncResult<Vec<A::Entity>> {
        let args = ReconcileArgs {
            right_now: request.right_now,
            drop_remote_side: request.drop_all_remote,
            sync_even_if_unmodified: request.sync_even_if_unmodified,
            sync_prefer: request.sync_prefer,
            filter_ref_ids: filter,
            catalog,
        };
        Reconciler::new(adapter, self.remote.as_ref(), &handle.container_id, parent)
            .run(repo, links, &args, report)
            .await
    }

    /// Recomputes name, timeline, due date and priority of open generated
    /// tasks whose source schedule changed after they were last generated,
    /// then pushes the result to both sides.
    async fn rederive_tasks(
        &self,
        regen: Regeneration<'_>,
        catalog: &RefCatalog,
        request: &SyncRequest,
        lock: &mut LockFile,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let kind = CollectionKind::InboxTasks;
        let uow = self.local.begin().await?;
        let candidates: Vec<InboxTask> = uow
            .inbox_tasks()
            .find_all(None, false, request.filter_inbox_task_ref_ids.as_ref())
            .await?
            .into_iter()
            .filter(|t| t.generated_from(regen.source, regen.source_ref))
            .filter(|t| t.status.is_open())
            .filter(|t| {
                t.recurring_gen_right_now
                    .is_none_or(|g| g < regen.source_modified)
            })
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let today = request.right_now.as_datetime().date_naive();
        let boot = Bootstrapper::new(self.remote.as_ref());
        let cx = cx_at(catalog, request.right_now);
        let mut refreshed: u32 = 0;
        for mut task in candidates {
            task.name = regen.name.clone();
            task.recurring_timeline = Some(timeline_for(regen.period, today));
            task.due_date = Some(due_date_for(regen.period, today));
            task.eisenhower = regen.eisenhower;
            task.difficulty = regen.difficulty;
            task.recurring_gen_right_now = Some(request.right_now);

            let mut remote_ts = None;
            if let Some(link) = uow.remote_links().find_by_ref_id(kind, task.ref_id()).await? {
                let addr = CollectionAddr::new(kind, task.parent_ref_id().clone());
                let handle = boot
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
                        report.add_issue(
                            kind,
                            Some(task.ref_id().clone()),
                            Some(link.remote_id.clone()),
                            "bound record is gone; refreshed locally, recreated next sync",
                        );
                    }
                    Err(e) => return Err(SyncError::remote(kind, e)),
                }
            }
            match remote_ts {
                Some(ts) => task.meta_mut().last_modified_time = ts,
                // No remote side reached: mark the local copy modified so
                // the next inbox sync pushes it.
                None => task.meta_mut().touch(request.right_now),
            }
            uow.inbox_tasks().save(task).await?;
            refreshed += 1;
        }
        uow.commit().await?;

        metrics::counter!("sync.records.pushed").increment(u64::from(refreshed));
        report.counters_mut(kind).pushed += refreshed;
        info!(
            source = %regen.source,
            source_ref = %regen.source_ref,
            refreshed,
            "Re-derived generated tasks from the current schedule"
        );
        Ok(())
    }

    /// Archives every live task whose generating big plan or recurring task
    /// is archived, removing the remote record of each. Already-archived
    /// tasks are not candidates, which makes the pass idempotent.
    async fn archive_cascade(
        &self,
        request: &SyncRequest,
        catalog: &RefCatalog,
        lock: &mut LockFile,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let kind = CollectionKind::InboxTasks;
        let uow = self.local.begin().await?;
        let tasks = uow
            .inbox_tasks()
            .find_all(None, false, request.filter_inbox_task_ref_ids.as_ref())
            .await?;
        let boot = Bootstrapper::new(self.remote.as_ref());
        let cx = cx_at(catalog, request.right_now);
        let mut archived: u32 = 0;
        for mut task in tasks {
            let mut doomed = false;
            if let Some(plan_ref) = &task.big_plan_ref_id {
                match uow.big_plans().load_by_id(plan_ref).await {
                    Ok(plan) => doomed |= plan.archived(),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
            if !doomed && let Some(recurring_ref) = &task.recurring_task_ref_id {
                match uow.recurring_tasks().load_by_id(recurring_ref).await {
                    Ok(source) => doomed |= source.archived(),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
            if !doomed {
                continue;
            }

            task.meta_mut().mark_archived(request.right_now);
            let ref_id = task.ref_id().clone();
            uow.inbox_tasks().save(task).await?;
            if let Some(link) = uow.remote_links().find_by_ref_id(kind, &ref_id).await? {
                let addr = CollectionAddr::new(kind, link.parent_ref_id.clone());
                let handle = boot
                    .resolve(&addr, &InboxTasksAdapter.schema(&cx), lock)
                    .await?;
                match self.remote.delete(&handle.container_id, &link.remote_id).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(SyncError::remote(kind, e)),
                }
                uow.remote_links().remove(kind, &ref_id).await?;
                metrics::counter!("sync.records.removed_remote").increment(1);
                report.counters_mut(kind).removed_remote += 1;
            }
            archived += 1;
        }
        uow.commit().await?;
        if archived > 0 {
            info!(archived, "Archived tasks whose source entity is archived");
        }
        Ok(())
    }
}

fn cx<'c>(catalog: &'c RefCatalog, request: &SyncRequest) -> AdapterCx<'c> {
    cx_at(catalog, request.right_now)
}

fn cx_at(catalog: &RefCatalog, right_now: Timestamp) -> AdapterCx<'_> {
    AdapterCx { catalog, right_now }
}

fn entry(ref_id: &EntityId, link_uuid: Uuid, name: &str, meta: &EntityMeta) -> CatalogEntry {
    let mut entry = CatalogEntry::new(ref_id.clone(), link_uuid, name, meta.created_time);
    entry.archived = meta.archived;
    entry
}

fn catalog_projects(projects: &[Project]) -> Vec<CatalogEntry> {
    projects
        .iter()
        .map(|p| entry(p.ref_id(), p.link_uuid, &p.name, p.meta()))
        .collect()
}

fn catalog_plans(plans: &[BigPlan]) -> Vec<CatalogEntry> {
    plans
        .iter()
        .map(|p| entry(p.ref_id(), p.link_uuid, &p.name, p.meta()))
        .collect()
}

fn catalog_metrics(metrics: &[Metric]) -> Vec<CatalogEntry> {
    metrics
        .iter()
        .map(|m| entry(m.ref_id(), m.link_uuid, &m.name, m.meta()))
        .collect()
}

fn catalog_persons(persons: &[Person]) -> Vec<CatalogEntry> {
    persons
        .iter()
        .map(|p| entry(p.ref_id(), p.link_uuid, &p.name, p.meta()))
        .collect()
}

fn plan_options(plans: &[BigPlan]) -> Vec<SelectOption> {
    plans
        .iter()
        .filter(|p| !p.archived())
        .map(|p| SelectOption::with_id(p.link_uuid, p.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alm_core::RemoteError;
    use testing::fixtures::{ts, workspace};
    use testing::{MemoryLocalStore, MemoryRemote};

    async fn seeded_local() -> MemoryLocalStore {
        let local = MemoryLocalStore::new();
        let uow = local.begin().await.unwrap();
        uow.workspaces().create(workspace()).await.unwrap();
        uow.commit().await.unwrap();
        local
    }

    fn driver(
        local: &MemoryLocalStore,
        remote: &MemoryRemote,
        dir: &tempfile::TempDir,
    ) -> SyncDriver {
        SyncDriver::new(
            Arc::new(local.clone()),
            Arc::new(remote.clone()),
            dir.path().join("structure.lock.json"),
        )
    }

    #[tokio::test]
    async fn test_run_requires_a_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let local = MemoryLocalStore::new();
        let remote = MemoryRemote::new();
        let err = driver(&local, &remote, &dir)
            .run(&SyncRequest::all(ts(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_invalid_filters_are_rejected_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let local = MemoryLocalStore::new();
        let remote = MemoryRemote::new();
        let request = SyncRequest {
            filter_metric_ref_ids: Some(["4".parse().unwrap()].into()),
            ..SyncRequest::all(ts(0))
        }
        .with_targets([SyncTarget::Workspace]);
        let err = driver(&local, &remote, &dir).run(&request).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidRequest(_)));
        assert_eq!(remote.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_workspace_round_trip_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let local = seeded_local().await;
        let remote = MemoryRemote::new();
        remote.set_now(ts(0)).await;
        let driver = driver(&local, &remote, &dir);
        let request =
            SyncRequest::all(ts(0)).with_targets([SyncTarget::Structure, SyncTarget::Workspace]);

        let report = driver.run(&request).await.unwrap();
        assert!(report.aborted.is_none());
        assert_eq!(report.counters(CollectionKind::Workspace).created_remote, 1);

        remote.reset_write_count().await;
        let report = driver.run(&request).await.unwrap();
        assert_eq!(remote.write_count().await, 0);
        assert_eq!(report.counters(CollectionKind::Workspace).untouched, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_reports_an_abort() {
        let dir = tempfile::tempdir().unwrap();
        let local = seeded_local().await;
        let remote = MemoryRemote::new();
        remote
            .fail_next_with(RemoteError::transport("connection reset"))
            .await;
        let report = driver(&local, &remote, &dir)
            .run(&SyncRequest::all(ts(0)).with_targets([SyncTarget::Workspace]))
            .await
            .unwrap();
        assert!(report.aborted.is_some());
        assert!(report.completed_at.is_some());
    }
}
