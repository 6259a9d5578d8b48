//! Run reports: what a sync pass did, per collection, and what it skipped.

use alm_core::{CollectionKind, EntityId, RemoteId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-collection tally of reconciliation outcomes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CollectionCounters {
    /// Remote records merged into local entities.
    pub pulled: u32,
    /// Local entities pushed over their remote records.
    pub pushed: u32,
    /// Records created by hand remotely and adopted as new local entities.
    pub promoted: u32,
    /// Local entities materialized remotely for the first time.
    pub created_remote: u32,
    /// Remote records deleted: danglers, duplicates and archived entities.
    pub removed_remote: u32,
    /// Records skipped because of a per-record failure.
    pub skipped: u32,
    /// Pairs left alone because neither side was newer.
    pub untouched: u32,
}

impl CollectionCounters {
    pub fn merge(&mut self, other: &CollectionCounters) {
        self.pulled += other.pulled;
        self.pushed += other.pushed;
        self.promoted += other.promoted;
        self.created_remote += other.created_remote;
        self.removed_remote += other.removed_remote;
        self.skipped += other.skipped;
        self.untouched += other.untouched;
    }

    pub fn is_noop(&self) -> bool {
        self.pulled == 0
            && self.pushed == 0
            && self.promoted == 0
            && self.created_remote == 0
            && self.removed_remote == 0
            && self.skipped == 0
    }
}

/// A per-record problem that was logged and skipped rather than aborting
/// the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncIssue {
    pub collection: CollectionKind,
    pub ref_id: Option<EntityId>,
    pub remote_id: Option<RemoteId>,
    pub message: String,
    pub timestamp: Timestamp,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub collections: BTreeMap<CollectionKind, CollectionCounters>,
    pub issues: Vec<SyncIssue>,
    /// Set when a remote failure cut the run short. Collections reconciled
    /// before the failure stay committed.
    pub aborted: Option<String>,
}

impl SyncReport {
    pub fn new() -> Self {
        Self {
            started_at: Timestamp::now(),
            ..Default::default()
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Timestamp::now());
    }

    pub fn abort(&mut self, reason: impl ToString) {
        self.aborted = Some(reason.to_string());
        self.complete();
    }

    pub fn counters_mut(&mut self, collection: CollectionKind) -> &mut CollectionCounters {
        self.collections.entry(collection).or_default()
    }

    pub fn counters(&self, collection: CollectionKind) -> CollectionCounters {
        self.collections.get(&collection).copied().unwrap_or_default()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn add_issue(
        &mut self,
        collection: CollectionKind,
        ref_id: Option<EntityId>,
        remote_id: Option<RemoteId>,
        message: impl ToString,
    ) {
        self.issues.push(SyncIssue {
            collection,
            ref_id,
            remote_id,
            message: message.to_string(),
            timestamp: Timestamp::now(),
        });
    }

    /// Sum of counters across all collections, for one-line summaries.
    pub fn totals(&self) -> CollectionCounters {
        let mut total = CollectionCounters::default();
        for counters in self.collections.values() {
            total.merge(counters);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_per_collection() {
        let mut report = SyncReport::new();
        report.counters_mut(CollectionKind::Projects).pulled += 2;
        report.counters_mut(CollectionKind::Projects).pushed += 1;
        report.counters_mut(CollectionKind::Vacations).promoted += 1;

        assert_eq!(report.counters(CollectionKind::Projects).pulled, 2);
        assert_eq!(report.counters(CollectionKind::Vacations).promoted, 1);
        assert_eq!(report.counters(CollectionKind::Metrics).pulled, 0);

        let totals = report.totals();
        assert_eq!(totals.pulled, 2);
        assert_eq!(totals.pushed, 1);
        assert_eq!(totals.promoted, 1);
    }

    #[test]
    fn test_issues_do_not_mark_the_report_aborted() {
        let mut report = SyncReport::new();
        report.add_issue(
            CollectionKind::InboxTasks,
            None,
            Some(RemoteId::new("r-9")),
            "field `status` holds text, expected select",
        );
        assert!(report.has_issues());
        assert!(report.aborted.is_none());
    }

    #[test]
    fn test_report_serializes_collections_by_kind_name() {
        let mut report = SyncReport::new();
        report.counters_mut(CollectionKind::InboxTasks).pulled = 3;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["collections"]["inbox-tasks"]["pulled"], 3);
    }
}
