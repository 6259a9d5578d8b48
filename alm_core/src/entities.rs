use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::types::{
    BigPlanStatus, CollectionKind, Difficulty, Eisenhower, EntityId, EntityMeta, InboxTaskSource,
    InboxTaskStatus, MetricUnit, PersonRelationship, RecurringTaskKind, RecurringTaskPeriod,
    RemoteId, Timestamp,
};

/// Anything the sync engine can reconcile: a serializable record with the
/// shared metadata block and a fixed collection kind.
pub trait SyncedEntity:
    Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: CollectionKind;

    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;

    fn ref_id(&self) -> &EntityId {
        &self.meta().ref_id
    }

    fn parent_ref_id(&self) -> &EntityId {
        &self.meta().parent_ref_id
    }

    fn archived(&self) -> bool {
        self.meta().archived
    }
}

macro_rules! impl_synced_entity {
    ($ty:ty, $kind:expr) => {
        impl SyncedEntity for $ty {
            const KIND: CollectionKind = $kind;

            fn meta(&self) -> &EntityMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut EntityMeta {
                &mut self.meta
            }
        }
    };
}

/// The singleton root entity. Its own `ref_id` doubles as its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub timezone: String,
    pub default_project_ref_id: Option<EntityId>,
}

impl_synced_entity!(Workspace, CollectionKind::Workspace);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vacation {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl_synced_entity!(Vacation, CollectionKind::Vacations);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    /// Stable identity used as the select option id wherever other
    /// collections refer to this project. Survives renames.
    pub link_uuid: Uuid,
}

impl_synced_entity!(Project, CollectionKind::Projects);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxTask {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub status: InboxTaskStatus,
    pub source: InboxTaskSource,
    pub eisenhower: Eisenhower,
    pub difficulty: Option<Difficulty>,
    pub actionable_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub big_plan_ref_id: Option<EntityId>,
    pub recurring_task_ref_id: Option<EntityId>,
    pub metric_ref_id: Option<EntityId>,
    pub person_ref_id: Option<EntityId>,
    /// Period bucket this task was generated for, e.g. `2024-W07`.
    pub recurring_timeline: Option<String>,
    /// When the generating schedule last touched this task; used to decide
    /// whether a schedule change must be re-applied.
    pub recurring_gen_right_now: Option<Timestamp>,
}

impl_synced_entity!(InboxTask, CollectionKind::InboxTasks);

impl InboxTask {
    /// Whether this task was generated from the given source entity.
    pub fn generated_from(&self, source: InboxTaskSource, ref_id: &EntityId) -> bool {
        if self.source != source {
            return false;
        }
        match source {
            InboxTaskSource::RecurringTask => self.recurring_task_ref_id.as_ref() == Some(ref_id),
            InboxTaskSource::Metric => self.metric_ref_id.as_ref() == Some(ref_id),
            InboxTaskSource::Person => self.person_ref_id.as_ref() == Some(ref_id),
            InboxTaskSource::User => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTask {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub period: RecurringTaskPeriod,
    pub kind: RecurringTaskKind,
    pub eisenhower: Eisenhower,
    pub difficulty: Option<Difficulty>,
    /// Cron-ish exclusion rule, opaque to sync.
    pub skip_rule: Option<String>,
    pub must_do: bool,
    pub start_at_date: Option<NaiveDate>,
    pub end_at_date: Option<NaiveDate>,
    pub due_at_day: Option<u32>,
    pub due_at_month: Option<u32>,
    pub suspended: bool,
}

impl_synced_entity!(RecurringTask, CollectionKind::RecurringTasks);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigPlan {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub status: BigPlanStatus,
    pub due_date: Option<NaiveDate>,
    pub link_uuid: Uuid,
}

impl_synced_entity!(BigPlan, CollectionKind::BigPlans);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartList {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
}

impl_synced_entity!(SmartList, CollectionKind::SmartLists);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartListItem {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub is_done: bool,
    pub tags: Vec<String>,
    pub url: Option<String>,
}

impl_synced_entity!(SmartListItem, CollectionKind::SmartListItems);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub unit: Option<MetricUnit>,
    pub collection_period: Option<RecurringTaskPeriod>,
    pub collection_eisenhower: Option<Eisenhower>,
    pub collection_difficulty: Option<Difficulty>,
    pub link_uuid: Uuid,
}

impl_synced_entity!(Metric, CollectionKind::Metrics);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub collection_time: NaiveDate,
    pub value: f64,
    pub notes: Option<String>,
}

impl_synced_entity!(MetricEntry, CollectionKind::MetricEntries);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub relationship: PersonRelationship,
    pub catch_up_period: Option<RecurringTaskPeriod>,
    pub catch_up_eisenhower: Option<Eisenhower>,
    pub catch_up_difficulty: Option<Difficulty>,
    /// Free-form day-and-month string, e.g. `10 Apr`.
    pub birthday: Option<String>,
    pub link_uuid: Uuid,
}

impl_synced_entity!(Person, CollectionKind::Persons);

/// Local half of the identity map: which remote record an entity is bound
/// to. Lives in its own repository so entity timestamps stay untouched by
/// identity bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteLink {
    pub collection: CollectionKind,
    pub parent_ref_id: EntityId,
    pub ref_id: EntityId,
    pub remote_id: RemoteId,
    pub created_time: Timestamp,
    pub last_modified_time: Timestamp,
}

impl RemoteLink {
    pub fn new(
        collection: CollectionKind,
        parent_ref_id: EntityId,
        ref_id: EntityId,
        remote_id: RemoteId,
        now: Timestamp,
    ) -> Self {
        Self {
            collection,
            parent_ref_id,
            ref_id,
            remote_id,
            created_time: now,
            last_modified_time: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> EntityMeta {
        EntityMeta::new(EntityId::from_index(1), Timestamp::now())
    }

    #[test]
    fn test_entity_serde_round_trip_keeps_meta_flat() {
        let task = InboxTask {
            meta: meta(),
            name: "Water the plants".to_string(),
            status: InboxTaskStatus::Accepted,
            source: InboxTaskSource::User,
            eisenhower: Eisenhower::Regular,
            difficulty: None,
            actionable_date: None,
            due_date: NaiveDate::from_ymd_opt(2024, 2, 14),
            big_plan_ref_id: Some(EntityId::from_index(9)),
            recurring_task_ref_id: None,
            metric_ref_id: None,
            person_ref_id: None,
            recurring_timeline: None,
            recurring_gen_right_now: None,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["ref_id"], "0");
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["big_plan_ref_id"], "9");
        let back: InboxTask = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_generated_from_checks_source_and_link() {
        let mut task = InboxTask {
            meta: meta(),
            name: "Collect weight".to_string(),
            status: InboxTaskStatus::Accepted,
            source: InboxTaskSource::Metric,
            eisenhower: Eisenhower::Regular,
            difficulty: None,
            actionable_date: None,
            due_date: None,
            big_plan_ref_id: None,
            recurring_task_ref_id: None,
            metric_ref_id: Some(EntityId::from_index(3)),
            person_ref_id: None,
            recurring_timeline: None,
            recurring_gen_right_now: None,
        };
        assert!(task.generated_from(InboxTaskSource::Metric, &EntityId::from_index(3)));
        assert!(!task.generated_from(InboxTaskSource::Metric, &EntityId::from_index(4)));
        assert!(!task.generated_from(InboxTaskSource::Person, &EntityId::from_index(3)));
        task.source = InboxTaskSource::User;
        assert!(!task.generated_from(InboxTaskSource::User, &EntityId::from_index(3)));
    }
}
