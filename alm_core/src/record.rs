use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::types::{CollectionKind, EntityId, RemoteId, Timestamp};

/// One cell of a remote record.
///
/// Enum payloads travel as select values; cross-entity references travel as
/// a label field plus an authoritative side-channel reference field holding
/// the referenced entity's link uuid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum FieldValue {
    Text(Option<String>),
    Number(Option<f64>),
    Date(Option<NaiveDate>),
    Checkbox(bool),
    Select(Option<String>),
    MultiSelect(Vec<String>),
    Reference(Option<Uuid>),
}

impl FieldValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Date(_) => "date",
            Self::Checkbox(_) => "checkbox",
            Self::Select(_) => "select",
            Self::MultiSelect(_) => "multi-select",
            Self::Reference(_) => "reference",
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(Some(value.into()))
    }

    pub fn select(value: impl Into<String>) -> Self {
        Self::Select(Some(value.into()))
    }
}

/// A remote record field held a different type than the collection schema
/// calls for. Carries enough context for the caller to log and skip.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("field {field:?} holds {found}, expected {expected}")]
pub struct FieldTypeError {
    pub field: String,
    pub expected: &'static str,
    pub found: &'static str,
}

/// Color assigned to a select option. The remote picks one at random when
/// none is supplied, which makes schema writes non-idempotent, so one is
/// always derived deterministically from the option value instead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OptionColor {
    Gray,
    Brown,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Red,
}

impl OptionColor {
    const ALL: [Self; 9] = [
        Self::Gray,
        Self::Brown,
        Self::Orange,
        Self::Yellow,
        Self::Green,
        Self::Blue,
        Self::Purple,
        Self::Pink,
        Self::Red,
    ];

    /// Stable color for a given option value.
    pub fn for_value(value: &str) -> Self {
        let sum: usize = value.bytes().map(usize::from).sum();
        Self::ALL[sum % Self::ALL.len()]
    }
}

/// One option of a select or multi-select field. The `id` is the stable
/// identifier the remote stores on records; it must survive schema writes
/// as long as the `value` is unchanged, or every record holding the option
/// silently unlinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: Uuid,
    pub value: String,
    pub color: OptionColor,
}

impl SelectOption {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            id: Uuid::new_v4(),
            color: OptionColor::for_value(&value),
            value,
        }
    }

    /// Option whose id is a known stable identifier (entity link uuids).
    pub fn with_id(id: Uuid, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            id,
            color: OptionColor::for_value(&value),
            value,
        }
    }
}

/// Declared shape of one remote field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FieldSpec {
    Text,
    Number,
    Date,
    Checkbox,
    Select { options: Vec<SelectOption> },
    MultiSelect { options: Vec<SelectOption> },
    Reference,
}

impl FieldSpec {
    pub fn options(&self) -> Option<&[SelectOption]> {
        match self {
            Self::Select { options } | Self::MultiSelect { options } => Some(options),
            _ => None,
        }
    }
}

/// Schema of one remote container: field name to field spec.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn select_options(&self, name: &str) -> Option<&[SelectOption]> {
        self.fields.get(name).and_then(FieldSpec::options)
    }
}

/// A record as the remote holds it.
///
/// `ref_id` may be absent when a user created the record directly in the
/// remote UI; sync promotes such records to local entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub remote_id: RemoteId,
    pub ref_id: Option<EntityId>,
    pub last_edited_time: Timestamp,
    pub fields: BTreeMap<String, FieldValue>,
}

impl RemoteRecord {
    pub fn new(remote_id: RemoteId, last_edited_time: Timestamp) -> Self {
        Self {
            remote_id,
            ref_id: None,
            last_edited_time,
            fields: BTreeMap::new(),
        }
    }

    /// A record that does not exist remotely yet. The store assigns the real
    /// id when the record is created.
    pub fn draft(last_edited_time: Timestamp) -> Self {
        Self::new(RemoteId::new(""), last_edited_time)
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    fn mismatch(field: &str, expected: &'static str, found: &FieldValue) -> FieldTypeError {
        FieldTypeError {
            field: field.to_string(),
            expected,
            found: found.kind_name(),
        }
    }

    /// Absent fields read as empty; present fields of the wrong shape are a
    /// type error the caller reports as a schema mismatch.
    pub fn text(&self, name: &str) -> Result<Option<String>, FieldTypeError> {
        match self.fields.get(name) {
            None | Some(FieldValue::Text(None)) => Ok(None),
            Some(FieldValue::Text(Some(s))) => Ok(Some(s.clone())),
            Some(other) => Err(Self::mismatch(name, "text", other)),
        }
    }

    pub fn number(&self, name: &str) -> Result<Option<f64>, FieldTypeError> {
        match self.fields.get(name) {
            None | Some(FieldValue::Number(None)) => Ok(None),
            Some(FieldValue::Number(Some(n))) => Ok(Some(*n)),
            Some(other) => Err(Self::mismatch(name, "number", other)),
        }
    }

    pub fn date(&self, name: &str) -> Result<Option<NaiveDate>, FieldTypeError> {
        match self.fields.get(name) {
            None | Some(FieldValue::Date(None)) => Ok(None),
            Some(FieldValue::Date(Some(d))) => Ok(Some(*d)),
            Some(other) => Err(Self::mismatch(name, "date", other)),
        }
    }

    pub fn checkbox(&self, name: &str) -> Result<bool, FieldTypeError> {
        match self.fields.get(name) {
            None => Ok(false),
            Some(FieldValue::Checkbox(b)) => Ok(*b),
            Some(other) => Err(Self::mismatch(name, "checkbox", other)),
        }
    }

    pub fn select(&self, name: &str) -> Result<Option<String>, FieldTypeError> {
        match self.fields.get(name) {
            None | Some(FieldValue::Select(None)) => Ok(None),
            Some(FieldValue::Select(Some(s))) => Ok(Some(s.clone())),
            Some(other) => Err(Self::mismatch(name, "select", other)),
        }
    }

    pub fn multi_select(&self, name: &str) -> Result<Vec<String>, FieldTypeError> {
        match self.fields.get(name) {
            None => Ok(Vec::new()),
            Some(FieldValue::MultiSelect(values)) => Ok(values.clone()),
            Some(other) => Err(Self::mismatch(name, "multi-select", other)),
        }
    }

    pub fn reference(&self, name: &str) -> Result<Option<Uuid>, FieldTypeError> {
        match self.fields.get(name) {
            None | Some(FieldValue::Reference(None)) => Ok(None),
            Some(FieldValue::Reference(Some(id))) => Ok(Some(*id)),
            Some(other) => Err(Self::mismatch(name, "reference", other)),
        }
    }
}

/// Address of one collection's remote container: the kind plus the owning
/// entity. The pair is the lookup key in the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionAddr {
    pub kind: CollectionKind,
    pub parent_ref_id: EntityId,
}

impl CollectionAddr {
    pub fn new(kind: CollectionKind, parent_ref_id: EntityId) -> Self {
        Self { kind, parent_ref_id }
    }

    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.kind, self.parent_ref_id)
    }
}

impl std::fmt::Display for CollectionAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.parent_ref_id)
    }
}

/// What the bootstrapper records about a provisioned container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub container_id: RemoteId,
    pub view_ids: BTreeMap<String, RemoteId>,
}

impl ContainerHandle {
    pub fn new(container_id: RemoteId) -> Self {
        Self {
            container_id,
            view_ids: BTreeMap::new(),
        }
    }
}
