use crate::adapters::{enum_select, parse_select, select_value};
use crate::reconcile::{AdapterCx, CollectionAdapter};
use alm_core::{
    Difficulty, Eisenhower, EntityId, EntityMeta, FieldSpec, FieldTypeError, FieldValue,
    RecurringTask, RecurringTaskKind, RecurringTaskPeriod, RemoteRecord, Schema, SyncedEntity,
};
use std::collections::BTreeMap;

pub struct RecurringTasksAdapter;

fn read_day_field(
    record: &RemoteRecord,
    field: &str,
    max: u32,
    warnings: &mut Vec<String>,
) -> Result<Option<u32>, FieldTypeError> {
    match record.number(field)? {
        None => Ok(None),
        Some(raw) => {
            let n = raw as i64;
            if n >= 1 && n <= i64::from(max) {
                Ok(Some(n as u32))
            } else {
                warnings.push(format!("field {field:?} held {raw}, outside 1..={max}; cleared"));
                Ok(None)
            }
        }
    }
}

impl CollectionAdapter for RecurringTasksAdapter {
    type Entity = RecurringTask;

    fn schema(&self, cx: &AdapterCx<'_>) -> Schema {
        Schema::new()
            .with_field("name", FieldSpec::Text)
            .with_field("period", enum_select::<RecurringTaskPeriod>())
            .with_field("kind", enum_select::<RecurringTaskKind>())
            .with_field("eisenhower", enum_select::<Eisenhower>())
            .with_field("difficulty", enum_select::<Difficulty>())
            .with_field("skip-rule", FieldSpec::Text)
            .with_field("must-do", FieldSpec::Checkbox)
            .with_field("start-at-date", FieldSpec::Date)
            .with_field("end-at-date", FieldSpec::Date)
            .with_field("due-at-day", FieldSpec::Number)
            .with_field("due-at-month", FieldSpec::Number)
            .with_field("suspended", FieldSpec::Checkbox)
            .with_field(
                "project",
                FieldSpec::Select {
                    options: cx.catalog.project_options(),
                },
            )
            .with_field("project-id-ref", FieldSpec::Reference)
    }

    fn project(&self, entity: &RecurringTask, cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        let owner = cx.catalog.project_by_ref(entity.parent_ref_id());
        BTreeMap::from([
            ("name".to_string(), FieldValue::text(&entity.name)),
            (
                "period".to_string(),
                FieldValue::select(entity.period.to_string()),
            ),
            (
                "kind".to_string(),
                FieldValue::select(entity.kind.to_string()),
            ),
            (
                "eisenhower".to_string(),
                FieldValue::select(entity.eisenhower.to_string()),
            ),
            ("difficulty".to_string(), select_value(entity.difficulty)),
            (
                "skip-rule".to_string(),
                FieldValue::Text(entity.skip_rule.clone()),
            ),
            ("must-do".to_string(), FieldValue::Checkbox(entity.must_do)),
            (
                "start-at-date".to_string(),
                FieldValue::Date(entity.start_at_date),
            ),
            (
                "end-at-date".to_string(),
                FieldValue::Date(entity.end_at_date),
            ),
            (
                "due-at-day".to_string(),
                FieldValue::Number(entity.due_at_day.map(f64::from)),
            ),
            (
                "due-at-month".to_string(),
                FieldValue::Number(entity.due_at_month.map(f64::from)),
            ),
            (
                "suspended".to_string(),
                FieldValue::Checkbox(entity.suspended),
            ),
            (
                "project".to_string(),
                FieldValue::Select(owner.map(|p| p.name.clone())),
            ),
            (
                "project-id-ref".to_string(),
                FieldValue::Reference(owner.map(|p| p.link_uuid)),
            ),
        ])
    }

    fn merge(
        &self,
        entity: &mut RecurringTask,
        record: &RemoteRecord,
        _cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(name) = record.text("name")? {
            entity.name = name;
        } else {
            warnings.push("record has no name; kept the local one".to_string());
        }
        if let Some(period) = parse_select::<RecurringTaskPeriod>(record, "period")? {
            entity.period = period;
        }
        if let Some(kind) = parse_select::<RecurringTaskKind>(record, "kind")? {
            entity.kind = kind;
        }
        if let Some(eisenhower) = parse_select::<Eisenhower>(record, "eisenhower")? {
            entity.eisenhower = eisenhower;
        }
        entity.difficulty = parse_select::<Difficulty>(record, "difficulty")?;
        entity.skip_rule = record.text("skip-rule")?;
        entity.must_do = record.checkbox("must-do")?;
        entity.start_at_date = record.date("start-at-date")?;
        entity.end_at_date = record.date("end-at-date")?;
        entity.due_at_day = read_day_field(record, "due-at-day", 31, &mut warnings)?;
        entity.due_at_month = read_day_field(record, "due-at-month", 12, &mut warnings)?;
        entity.suspended = record.checkbox("suspended")?;
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(RecurringTask, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        let task = RecurringTask {
            meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
            name,
            period: parse_select::<RecurringTaskPeriod>(record, "period")?
                .unwrap_or(RecurringTaskPeriod::Weekly),
            kind: parse_select::<RecurringTaskKind>(record, "kind")?
                .unwrap_or(RecurringTaskKind::Chore),
            eisenhower: parse_select::<Eisenhower>(record, "eisenhower")?
                .unwrap_or(Eisenhower::Regular),
            difficulty: parse_select::<Difficulty>(record, "difficulty")?,
            skip_rule: record.text("skip-rule")?,
            must_do: record.checkbox("must-do")?,
            start_at_date: record.date("start-at-date")?,
            end_at_date: record.date("end-at-date")?,
            due_at_day: read_day_field(record, "due-at-day", 31, &mut warnings)?,
            due_at_month: read_day_field(record, "due-at-month", 12, &mut warnings)?,
            suspended: record.checkbox("suspended")?,
        };
        Ok((task, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RefCatalog;
    use alm_core::{RemoteId, Timestamp};

    #[test]
    fn test_out_of_range_due_day_is_cleared_with_a_warning() {
        let catalog = RefCatalog::default();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::now(),
        };
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.set("name", FieldValue::text("Pay rent"));
        record.set("period", FieldValue::select("monthly"));
        record.set("due-at-day", FieldValue::Number(Some(42.0)));
        record.set("due-at-month", FieldValue::Number(Some(3.0)));

        let (task, warnings) = RecurringTasksAdapter
            .promote(&record, &EntityId::from_index(2), &cx)
            .unwrap();
        assert_eq!(task.period, RecurringTaskPeriod::Monthly);
        assert!(task.due_at_day.is_none());
        assert_eq!(task.due_at_month, Some(3));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_project_then_merge_round_trips() {
        let catalog = RefCatalog::default();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::from_millis(1_707_566_400_000).unwrap(),
        };
        let task = RecurringTask {
            meta: EntityMeta::new(EntityId::from_index(2), cx.right_now),
            name: "Weekly review".to_string(),
            period: RecurringTaskPeriod::Weekly,
            kind: RecurringTaskKind::Habit,
            eisenhower: Eisenhower::Important,
            difficulty: Some(Difficulty::Easy),
            skip_rule: Some("even-weeks".to_string()),
            must_do: true,
            start_at_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
            end_at_date: None,
            due_at_day: Some(7),
            due_at_month: None,
            suspended: false,
        };
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.fields = RecurringTasksAdapter.project(&task, &cx);

        let mut other = task.clone();
        other.name = "scratch".to_string();
        other.must_do = false;
        let warnings = RecurringTasksAdapter.merge(&mut other, &record, &cx).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(other, task);
    }
}
