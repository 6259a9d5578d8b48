//! One adapter per collection: the field-level translation between entity
//! payloads and remote records. Everything metadata-shaped (ref ids,
//! archival, timestamps, identity bindings) is the reconciler's business,
//! not the adapters'.

use alm_core::{EntityId, FieldSpec, FieldTypeError, FieldValue, RemoteRecord, SelectOption};
use std::str::FromStr;
use strum::IntoEnumIterator;
use uuid::Uuid;

pub mod big_plans;
pub mod inbox_tasks;
pub mod metrics;
pub mod persons;
pub mod projects;
pub mod recurring_tasks;
pub mod smart_lists;
pub mod vacations;
pub mod workspace;

pub use big_plans::BigPlansAdapter;
pub use inbox_tasks::InboxTasksAdapter;
pub use metrics::{MetricEntriesAdapter, MetricsAdapter};
pub use persons::PersonsAdapter;
pub use projects::ProjectsAdapter;
pub use recurring_tasks::RecurringTasksAdapter;
pub use smart_lists::{SmartListItemsAdapter, SmartListsAdapter};
pub use vacations::VacationsAdapter;
pub use workspace::WorkspaceAdapter;

/// Select field whose options are an enum's values. Fresh option ids are
/// fine here: schema merges keep whatever ids the container already holds
/// for these values.
pub(crate) fn enum_select<T>() -> FieldSpec
where
    T: IntoEnumIterator + std::fmt::Display,
{
    FieldSpec::Select {
        options: T::iter().map(|v| SelectOption::new(v.to_string())).collect(),
    }
}

/// Reads a select field and parses it into an enum. A value outside the
/// enum is a schema mismatch, same as a wrongly-typed field.
pub(crate) fn parse_select<T>(
    record: &RemoteRecord,
    field: &str,
) -> Result<Option<T>, FieldTypeError>
where
    T: FromStr,
{
    match record.select(field)? {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| FieldTypeError {
            field: field.to_string(),
            expected: "a known select option",
            found: "select",
        }),
    }
}

pub(crate) fn select_value<T: std::fmt::Display>(value: Option<T>) -> FieldValue {
    FieldValue::Select(value.map(|v| v.to_string()))
}

/// Reads a text field holding a ref id in digits. Junk is dropped with a
/// warning rather than failing the record.
pub(crate) fn parse_ref_text(
    record: &RemoteRecord,
    field: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<EntityId>, FieldTypeError> {
    match record.text(field)? {
        None => Ok(None),
        Some(raw) => match EntityId::new(raw.trim().to_string()) {
            Some(id) if !id.is_unassigned() => Ok(Some(id)),
            _ => {
                warnings.push(format!("field {field:?} held {raw:?}, not a usable ref id"));
                Ok(None)
            }
        },
    }
}

/// Reads a reference field and resolves the link uuid through the catalog.
/// A uuid no catalog entry knows is a dangling reference and is cleared.
pub(crate) fn resolve_reference(
    record: &RemoteRecord,
    field: &str,
    lookup: impl Fn(Uuid) -> Option<EntityId>,
    warnings: &mut Vec<String>,
) -> Result<Option<EntityId>, FieldTypeError> {
    match record.reference(field)? {
        None => Ok(None),
        Some(uuid) => match lookup(uuid) {
            Some(ref_id) => Ok(Some(ref_id)),
            None => {
                warnings.push(format!(
                    "field {field:?} pointed at unknown entity {uuid}; reference cleared"
                ));
                Ok(None)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alm_core::{Eisenhower, RemoteId, Timestamp};

    fn record() -> RemoteRecord {
        RemoteRecord::new(RemoteId::new("r-1"), Timestamp::now())
    }

    #[test]
    fn test_enum_select_lists_every_value() {
        let spec = enum_select::<Eisenhower>();
        let FieldSpec::Select { options } = spec else {
            panic!("expected a select spec");
        };
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(
            values,
            vec!["regular", "important", "urgent", "important-and-urgent"]
        );
    }

    #[test]
    fn test_parse_select_rejects_unknown_values() {
        let mut rec = record();
        rec.set("eisenhower", FieldValue::select("very-important"));
        let err = parse_select::<Eisenhower>(&rec, "eisenhower").unwrap_err();
        assert_eq!(err.field, "eisenhower");

        rec.set("eisenhower", FieldValue::select("urgent"));
        assert_eq!(
            parse_select::<Eisenhower>(&rec, "eisenhower").unwrap(),
            Some(Eisenhower::Urgent)
        );
    }

    #[test]
    fn test_parse_ref_text_drops_junk_with_a_warning() {
        let mut rec = record();
        rec.set("recurring-task-ref-id", FieldValue::text("abc"));
        let mut warnings = Vec::new();
        let parsed = parse_ref_text(&rec, "recurring-task-ref-id", &mut warnings).unwrap();
        assert!(parsed.is_none());
        assert_eq!(warnings.len(), 1);

        rec.set("recurring-task-ref-id", FieldValue::text("12"));
        let parsed = parse_ref_text(&rec, "recurring-task-ref-id", &mut warnings).unwrap();
        assert_eq!(parsed, Some(EntityId::from_index(12)));
    }

    #[test]
    fn test_resolve_reference_clears_unknown_uuids() {
        let known = Uuid::new_v4();
        let mut rec = record();
        rec.set("person-id-ref", FieldValue::Reference(Some(Uuid::new_v4())));
        let mut warnings = Vec::new();
        let resolved = resolve_reference(
            &rec,
            "person-id-ref",
            |u| (u == known).then(|| EntityId::from_index(4)),
            &mut warnings,
        )
        .unwrap();
        assert!(resolved.is_none());
        assert_eq!(warnings.len(), 1);

        rec.set("person-id-ref", FieldValue::Reference(Some(known)));
        let resolved = resolve_reference(
            &rec,
            "person-id-ref",
            |u| (u == known).then(|| EntityId::from_index(4)),
            &mut warnings,
        )
        .unwrap();
        assert_eq!(resolved, Some(EntityId::from_index(4)));
    }
}
