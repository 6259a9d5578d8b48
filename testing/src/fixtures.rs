use alm_core::entities::{
    BigPlan, InboxTask, Metric, MetricEntry, Person, Project, RecurringTask, SmartList,
    SmartListItem, Vacation, Workspace,
};
use alm_core::types::{
    BigPlanStatus, Eisenhower, EntityId, EntityMeta, InboxTaskSource, InboxTaskStatus,
    PersonRelationship, RecurringTaskKind, RecurringTaskPeriod, Timestamp,
};
use chrono::NaiveDate;
use uuid::Uuid;

/// Deterministic fixture time base: 2024-02-10 12:00:00 UTC.
pub const BASE_MILLIS: i64 = 1_707_566_400_000;

/// Fixture timestamp `offset_secs` after the base instant.
pub fn ts(offset_secs: i64) -> Timestamp {
    Timestamp::from_millis(BASE_MILLIS + offset_secs * 1000).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn meta(parent: u64) -> EntityMeta {
    EntityMeta::new(EntityId::from_index(parent), ts(0))
}

pub fn workspace() -> Workspace {
    Workspace {
        meta: meta(0),
        name: "Personal".to_string(),
        timezone: "UTC".to_string(),
        default_project_ref_id: None,
    }
}

pub fn vacation(parent: u64, name: &str) -> Vacation {
    Vacation {
        meta: meta(parent),
        name: name.to_string(),
        start_date: date(2024, 7, 1),
        end_date: date(2024, 7, 14),
    }
}

pub fn project(parent: u64, name: &str) -> Project {
    Project {
        meta: meta(parent),
        name: name.to_string(),
        link_uuid: Uuid::new_v4(),
    }
}

pub fn inbox_task(parent: u64, name: &str) -> InboxTask {
    InboxTask {
        meta: meta(parent),
        name: name.to_string(),
        status: InboxTaskStatus::Accepted,
        source: InboxTaskSource::User,
        eisenhower: Eisenhower::Regular,
        difficulty: None,
        actionable_date: None,
        due_date: None,
        big_plan_ref_id: None,
        recurring_task_ref_id: None,
        metric_ref_id: None,
        person_ref_id: None,
        recurring_timeline: None,
        recurring_gen_right_now: None,
    }
}

pub fn recurring_task(parent: u64, name: &str, period: RecurringTaskPeriod) -> RecurringTask {
    RecurringTask {
        meta: meta(parent),
        name: name.to_string(),
        period,
        kind: RecurringTaskKind::Chore,
        eisenhower: Eisenhower::Regular,
        difficulty: None,
        skip_rule: None,
        must_do: false,
        start_at_date: None,
        end_at_date: None,
        due_at_day: None,
        due_at_month: None,
        suspended: false,
    }
}

pub fn big_plan(parent: u64, name: &str) -> BigPlan {
    BigPlan {
        meta: meta(parent),
        name: name.to_string(),
        status: BigPlanStatus::Accepted,
        due_date: None,
        link_uuid: Uuid::new_v4(),
    }
}

pub fn smart_list(parent: u64, name: &str) -> SmartList {
    SmartList {
        meta: meta(parent),
        name: name.to_string(),
    }
}

pub fn smart_list_item(parent: u64, name: &str) -> SmartListItem {
    SmartListItem {
        meta: meta(parent),
        name: name.to_string(),
        is_done: false,
        tags: Vec::new(),
        url: None,
    }
}

pub fn metric(parent: u64, name: &str) -> Metric {
    Metric {
        meta: meta(parent),
        name: name.to_string(),
        unit: None,
        collection_period: None,
        collection_eisenhower: None,
        collection_difficulty: None,
        link_uuid: Uuid::new_v4(),
    }
}

pub fn metric_entry(parent: u64, on: NaiveDate, value: f64) -> MetricEntry {
    MetricEntry {
        meta: meta(parent),
        collection_time: on,
        value,
        notes: None,
    }
}

pub fn person(parent: u64, name: &str) -> Person {
    Person {
        meta: meta(parent),
        name: name.to_string(),
        relationship: PersonRelationship::Friend,
        catch_up_period: None,
        catch_up_eisenhower: None,
        catch_up_difficulty: None,
        birthday: None,
        link_uuid: Uuid::new_v4(),
    }
}
