//! The sync request: which collections to touch and how.

use crate::error::{SyncError, SyncResult};
use alm_core::{EntityId, SyncPrefer, SyncTarget, Timestamp};
use std::collections::BTreeSet;
use strum::IntoEnumIterator;

/// Arguments for one sync run.
///
/// An empty filter set means "nothing matches", while `None` means "no
/// filter". Filters only make sense for targets that are part of the run,
/// which [`SyncRequest::validate`] enforces.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// The wall-clock instant the run is anchored to. Generated task names,
    /// timelines and due dates are derived from this, not from `now()` calls
    /// scattered through the engine.
    pub right_now: Timestamp,
    pub sync_targets: BTreeSet<SyncTarget>,
    pub drop_all_remote: bool,
    pub sync_even_if_unmodified: bool,
    pub sync_prefer: SyncPrefer,
    pub filter_vacation_ref_ids: Option<BTreeSet<EntityId>>,
    pub filter_project_ref_ids: Option<BTreeSet<EntityId>>,
    pub filter_inbox_task_ref_ids: Option<BTreeSet<EntityId>>,
    pub filter_recurring_task_ref_ids: Option<BTreeSet<EntityId>>,
    pub filter_big_plan_ref_ids: Option<BTreeSet<EntityId>>,
    pub filter_smart_list_ref_ids: Option<BTreeSet<EntityId>>,
    pub filter_metric_ref_ids: Option<BTreeSet<EntityId>>,
    pub filter_person_ref_ids: Option<BTreeSet<EntityId>>,
}

impl SyncRequest {
    /// A full run over every target with no filters, remote preferred.
    pub fn all(right_now: Timestamp) -> Self {
        Self {
            right_now,
            sync_targets: SyncTarget::iter().collect(),
            drop_all_remote: false,
            sync_even_if_unmodified: false,
            sync_prefer: SyncPrefer::default(),
            filter_vacation_ref_ids: None,
            filter_project_ref_ids: None,
            filter_inbox_task_ref_ids: None,
            filter_recurring_task_ref_ids: None,
            filter_big_plan_ref_ids: None,
            filter_smart_list_ref_ids: None,
            filter_metric_ref_ids: None,
            filter_person_ref_ids: None,
        }
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = SyncTarget>) -> Self {
        self.sync_targets = targets.into_iter().collect();
        self
    }

    pub fn has_target(&self, target: SyncTarget) -> bool {
        self.sync_targets.contains(&target)
    }

    /// Rejects filters that name a collection outside the requested targets.
    pub fn validate(&self) -> SyncResult<()> {
        if self.sync_targets.is_empty() {
            return Err(SyncError::invalid_request("no sync targets requested"));
        }
        let checks: [(&Option<BTreeSet<EntityId>>, SyncTarget, &str); 8] = [
            (
                &self.filter_vacation_ref_ids,
                SyncTarget::Vacations,
                "vacation",
            ),
            (&self.filter_project_ref_ids, SyncTarget::Projects, "project"),
            (
                &self.filter_inbox_task_ref_ids,
                SyncTarget::InboxTasks,
                "inbox task",
            ),
            (
                &self.filter_recurring_task_ref_ids,
                SyncTarget::RecurringTasks,
                "recurring task",
            ),
            (
                &self.filter_big_plan_ref_ids,
                SyncTarget::BigPlans,
                "big plan",
            ),
            (
                &self.filter_smart_list_ref_ids,
                SyncTarget::SmartLists,
                "smart list",
            ),
            (&self.filter_metric_ref_ids, SyncTarget::Metrics, "metric"),
            (&self.filter_person_ref_ids, SyncTarget::Prm, "person"),
        ];
        for (filter, target, label) in checks {
            if filter.is_some() && !self.has_target(target) {
                return Err(SyncError::invalid_request(format!(
                    "a {label} filter was given but the {target} target is not part of the run"
                )));
            }
        }
        Ok(())
    }
}
