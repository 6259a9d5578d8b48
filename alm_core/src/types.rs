use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Stable local identifier for a synchronized entity.
///
/// Assigned by the local store on first creation, never reused, never
/// changed. The string `"0"` is the reserved unassigned sentinel; real
/// ids start at `"1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: String) -> Option<Self> {
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            None
        } else {
            Some(Self(id))
        }
    }

    /// The reserved sentinel for an entity that has not been persisted yet.
    pub fn unassigned() -> Self {
        Self("0".to_string())
    }

    pub fn from_index(index: u64) -> Self {
        Self(index.to_string())
    }

    pub fn is_unassigned(&self) -> bool {
        self.0 == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::unassigned()
    }
}

impl std::str::FromStr for EntityId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string()).ok_or_else(|| anyhow::anyhow!("Invalid entity ID: {s:?}"))
    }
}

/// Opaque identifier assigned by the remote service. Never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UTC instant with millisecond resolution.
///
/// Both stores report modification times at millisecond granularity, so
/// everything is truncated on the way in. Comparisons between local and
/// remote timestamps are only meaningful at this resolution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default,
)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let millis = dt.timestamp_millis();
        Self(Utc.timestamp_millis_opt(millis).single().unwrap_or(dt))
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Shared metadata block carried by every synchronized entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub ref_id: EntityId,
    pub parent_ref_id: EntityId,
    pub archived: bool,
    pub created_time: Timestamp,
    pub last_modified_time: Timestamp,
    pub archived_time: Option<Timestamp>,
    pub version: u32,
}

impl EntityMeta {
    /// Fresh metadata for a not-yet-persisted entity. The store assigns the
    /// real `ref_id` on create.
    pub fn new(parent_ref_id: EntityId, now: Timestamp) -> Self {
        Self {
            ref_id: EntityId::unassigned(),
            parent_ref_id,
            archived: false,
            created_time: now,
            last_modified_time: now,
            archived_time: None,
            version: 1,
        }
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.last_modified_time = now;
    }

    pub fn mark_archived(&mut self, now: Timestamp) {
        self.archived = true;
        self.archived_time = Some(now);
        self.last_modified_time = now;
    }

    pub fn unarchive(&mut self, now: Timestamp) {
        self.archived = false;
        self.archived_time = None;
        self.last_modified_time = now;
    }
}

/// One kind of user-editable record; each kind maps to its own remote
/// container and local table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CollectionKind {
    Workspace,
    Vacations,
    Projects,
    InboxTasks,
    RecurringTasks,
    BigPlans,
    SmartLists,
    SmartListItems,
    Metrics,
    MetricEntries,
    Persons,
}

impl CollectionKind {
    /// Human-facing container title on the remote side.
    pub fn container_title(&self) -> &'static str {
        match self {
            Self::Workspace => "Workspace",
            Self::Vacations => "Vacations",
            Self::Projects => "Projects",
            Self::InboxTasks => "Inbox Tasks",
            Self::RecurringTasks => "Recurring Tasks",
            Self::BigPlans => "Big Plans",
            Self::SmartLists => "Smart Lists",
            Self::SmartListItems => "Smart List Items",
            Self::Metrics => "Metrics",
            Self::MetricEntries => "Metric Entries",
            Self::Persons => "Persons",
        }
    }
}

/// Which collections a sync run touches.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
    EnumIter, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SyncTarget {
    Workspace,
    Structure,
    Vacations,
    Projects,
    InboxTasks,
    RecurringTasks,
    BigPlans,
    SmartLists,
    Metrics,
    Prm,
}

/// Which side wins a true conflict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, Default,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SyncPrefer {
    #[default]
    Remote,
    Local,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Eisenhower {
    Regular,
    Important,
    Urgent,
    ImportantAndUrgent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum InboxTaskStatus {
    Accepted,
    InProgress,
    Blocked,
    NotDone,
    Done,
}

impl InboxTaskStatus {
    /// Done and not-done are terminal; everything else counts as open.
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Done | Self::NotDone)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum InboxTaskSource {
    User,
    RecurringTask,
    Metric,
    Person,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RecurringTaskPeriod {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RecurringTaskKind {
    Chore,
    Habit,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BigPlanStatus {
    Accepted,
    InProgress,
    Blocked,
    NotDone,
    Done,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MetricUnit {
    Count,
    Money,
    Weight,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PersonRelationship {
    Family,
    Friend,
    Acquaintance,
    SchoolBuddy,
    WorkBuddy,
    Colleague,
    Other,
}
