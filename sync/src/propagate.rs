//! Post-sync refresh of denormalized reference data.
//!
//! Referenced entities surface on their referrers twice: as select options
//! in the referrer container's schema and as label fields on individual
//! records. Both are display data the reconciler never trusts, so they are
//! refreshed after the referenced collection has synced, writing only where
//! the remote actually drifted.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::catalog::RefCatalog;
use crate::error::{SyncError, SyncResult};
use crate::report::SyncReport;
use alm_core::{
    CollectionKind, EntityRepository, FieldSpec, FieldValue, InboxTask, RemoteId,
    RemoteLinkRepository, RemoteRecord, RemoteStore, SelectOption, SyncedEntity,
};

pub struct Propagator<'a> {
    remote: &'a dyn RemoteStore,
}

impl<'a> Propagator<'a> {
    pub fn new(remote: &'a dyn RemoteStore) -> Self {
        Self { remote }
    }

    /// Replaces one select field's option set, keeping the rest of the
    /// schema as the container holds it. Returns whether a write happened.
    ///
    /// Option ids are the referenced entities' link uuids, so a renamed
    /// entity changes an option's value under the same id and records
    /// holding the option stay attached.
    pub async fn push_options(
        &self,
        kind: CollectionKind,
        container: &RemoteId,
        field: &str,
        options: Vec<SelectOption>,
    ) -> SyncResult<bool> {
        let mut schema = self
            .remote
            .load_schema(container)
            .await
            .map_err(|e| SyncError::remote(kind, e))?;
        let desired = FieldSpec::Select { options };
        if schema.field(field) == Some(&desired) {
            return Ok(false);
        }
        schema.fields.insert(field.to_string(), desired);
        self.remote
            .store_schema(container, &schema)
            .await
            .map_err(|e| SyncError::remote(kind, e))?;
        debug!(collection = %kind, container = %container, field, "Refreshed select options");
        Ok(true)
    }

    /// Recomputes the label half of every live task's references (big plan,
    /// metric, person) from the catalog and updates records whose labels
    /// drifted, say after the referenced entity was renamed. The
    /// authoritative `-id-ref` fields stay untouched.
    pub async fn relink_inbox_tasks(
        &self,
        container: &RemoteId,
        tasks: &[InboxTask],
        repo: &dyn EntityRepository<InboxTask>,
        links: &dyn RemoteLinkRepository,
        catalog: &RefCatalog,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let kind = CollectionKind::InboxTasks;
        if tasks.iter().all(SyncedEntity::archived) {
            return Ok(());
        }
        let records: BTreeMap<RemoteId, RemoteRecord> = self
            .remote
            .list_all(container)
            .await
            .map_err(|e| SyncError::remote(kind, e))?
            .into_iter()
            .map(|r| (r.remote_id.clone(), r))
            .collect();

        let mut refreshed: u32 = 0;
        for task in tasks.iter().filter(|t| !t.archived()) {
            let Some(link) = links.find_by_ref_id(kind, task.ref_id()).await? else {
                continue;
            };
            let Some(record) = records.get(&link.remote_id) else {
                continue;
            };

            let plan_label = task
                .big_plan_ref_id
                .as_ref()
                .and_then(|id| catalog.big_plan_by_ref(id))
                .map(|e| e.name.clone());
            let metric_label = task
                .metric_ref_id
                .as_ref()
                .and_then(|id| catalog.metric_by_ref(id))
                .map(|e| e.name.clone());
            let person_label = task
                .person_ref_id
                .as_ref()
                .and_then(|id| catalog.person_by_ref(id))
                .map(|e| e.name.clone());

            let read = (
                record.select("big-plan"),
                record.text("metric"),
                record.text("person"),
            );
            let (plan_now, metric_now, person_now) = match read {
                (Ok(a), Ok(b), Ok(c)) => (a, b, c),
                _ => {
                    report.add_issue(
                        kind,
                        Some(task.ref_id().clone()),
                        Some(record.remote_id.clone()),
                        "label fields hold the wrong shapes; left as-is",
                    );
                    continue;
                }
            };
            if plan_now == plan_label && metric_now == metric_label && person_now == person_label
            {
                continue;
            }

            let mut updated = record.clone();
            updated.set("big-plan", FieldValue::Select(plan_label));
            updated.set("metric", FieldValue::Text(metric_label));
            updated.set("person", FieldValue::Text(person_label));
            match self.remote.update(container, &updated).await {
                Ok(result) => {
                    let mut task = task.clone();
                    task.meta_mut().last_modified_time = result.last_edited_time;
                    repo.save(task).await?;
                    refreshed += 1;
                }
                Err(e) if e.is_not_found() => {
                    report.add_issue(
                        kind,
                        Some(task.ref_id().clone()),
                        Some(record.remote_id.clone()),
                        "record vanished before label refresh",
                    );
                }
                Err(e) => return Err(SyncError::remote(kind, e)),
            }
        }

        if refreshed > 0 {
            metrics::counter!("sync.records.pushed").increment(u64::from(refreshed));
            report.counters_mut(kind).pushed += refreshed;
            info!(container = %container, refreshed, "Refreshed drifted reference labels");
        }
        Ok(())
    }
}
