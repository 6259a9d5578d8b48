use crate::adapters::{enum_select, parse_ref_text, parse_select, resolve_reference};
use crate::reconcile::{AdapterCx, CollectionAdapter};
use alm_core::{
    Difficulty, Eisenhower, EntityId, EntityMeta, FieldSpec, FieldTypeError, FieldValue,
    InboxTask, InboxTaskSource, InboxTaskStatus, RemoteRecord, Schema, SyncedEntity, Timestamp,
};
use std::collections::BTreeMap;

/// The richest collection on the wire. Cross-entity references travel as a
/// label (select for big plans, text for metrics and persons) plus an
/// authoritative `-id-ref` reference field holding the target's link uuid;
/// merges trust only the reference side. The `project` select is display
/// data, like everywhere else.
pub struct InboxTasksAdapter;

impl InboxTasksAdapter {
    fn reference_fields(
        &self,
        entity: &InboxTask,
        cx: &AdapterCx<'_>,
    ) -> BTreeMap<String, FieldValue> {
        let big_plan = entity
            .big_plan_ref_id
            .as_ref()
            .and_then(|id| cx.catalog.big_plan_by_ref(id));
        let metric = entity
            .metric_ref_id
            .as_ref()
            .and_then(|id| cx.catalog.metric_by_ref(id));
        let person = entity
            .person_ref_id
            .as_ref()
            .and_then(|id| cx.catalog.person_by_ref(id));
        BTreeMap::from([
            (
                "big-plan".to_string(),
                FieldValue::Select(big_plan.map(|e| e.name.clone())),
            ),
            (
                "big-plan-id-ref".to_string(),
                FieldValue::Reference(big_plan.map(|e| e.link_uuid)),
            ),
            (
                "metric".to_string(),
                FieldValue::Text(metric.map(|e| e.name.clone())),
            ),
            (
                "metric-id-ref".to_string(),
                FieldValue::Reference(metric.map(|e| e.link_uuid)),
            ),
            (
                "person".to_string(),
                FieldValue::Text(person.map(|e| e.name.clone())),
            ),
            (
                "person-id-ref".to_string(),
                FieldValue::Reference(person.map(|e| e.link_uuid)),
            ),
        ])
    }
}

impl CollectionAdapter for InboxTasksAdapter {
    type Entity = InboxTask;

    fn schema(&self, cx: &AdapterCx<'_>) -> Schema {
        Schema::new()
            .with_field("name", FieldSpec::Text)
            .with_field("status", enum_select::<InboxTaskStatus>())
            .with_field("source", enum_select::<InboxTaskSource>())
            .with_field("eisenhower", enum_select::<Eisenhower>())
            .with_field("difficulty", enum_select::<Difficulty>())
            .with_field("actionable-date", FieldSpec::Date)
            .with_field("due-date", FieldSpec::Date)
            .with_field(
                "project",
                FieldSpec::Select {
                    options: cx.catalog.project_options(),
                },
            )
            .with_field("project-id-ref", FieldSpec::Reference)
            .with_field(
                "big-plan",
                FieldSpec::Select {
                    options: cx.catalog.big_plan_options(),
                },
            )
            .with_field("big-plan-id-ref", FieldSpec::Reference)
            .with_field("recurring-task-ref-id", FieldSpec::Text)
            .with_field("metric", FieldSpec::Text)
            .with_field("metric-id-ref", FieldSpec::Reference)
            .with_field("person", FieldSpec::Text)
            .with_field("person-id-ref", FieldSpec::Reference)
            .with_field("recurring-timeline", FieldSpec::Text)
            .with_field("recurring-gen-right-now", FieldSpec::Number)
    }

    fn project(&self, entity: &InboxTask, cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        let owner = cx.catalog.project_by_ref(entity.parent_ref_id());
        let mut fields = self.reference_fields(entity, cx);
        fields.insert("name".to_string(), FieldValue::text(&entity.name));
        fields.insert(
            "status".to_string(),
            FieldValue::select(entity.status.to_string()),
        );
        fields.insert(
            "source".to_string(),
            FieldValue::select(entity.source.to_string()),
        );
        fields.insert(
            "eisenhower".to_string(),
            FieldValue::select(entity.eisenhower.to_string()),
        );
        fields.insert(
            "difficulty".to_string(),
            FieldValue::Select(entity.difficulty.map(|d| d.to_string())),
        );
        fields.insert(
            "actionable-date".to_string(),
            FieldValue::Date(entity.actionable_date),
        );
        fields.insert("due-date".to_string(), FieldValue::Date(entity.due_date));
        fields.insert(
            "project".to_string(),
            FieldValue::Select(owner.map(|p| p.name.clone())),
        );
        fields.insert(
            "project-id-ref".to_string(),
            FieldValue::Reference(owner.map(|p| p.link_uuid)),
        );
        fields.insert(
            "recurring-task-ref-id".to_string(),
            FieldValue::Text(
                entity
                    .recurring_task_ref_id
                    .as_ref()
                    .map(|id| id.as_str().to_string()),
            ),
        );
        fields.insert(
            "recurring-timeline".to_string(),
            FieldValue::Text(entity.recurring_timeline.clone()),
        );
        fields.insert(
            "recurring-gen-right-now".to_string(),
            FieldValue::Number(
                entity
                    .recurring_gen_right_now
                    .map(|ts| ts.as_millis() as f64),
            ),
        );
        fields
    }

    fn merge(
        &self,
        entity: &mut InboxTask,
        record: &RemoteRecord,
        cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(name) = record.text("name")? {
            entity.name = name;
        } else {
            warnings.push("record has no name; kept the local one".to_string());
        }
        if let Some(status) = parse_select::<InboxTaskStatus>(record, "status")? {
            entity.status = status;
        }
        if let Some(source) = parse_select::<InboxTaskSource>(record, "source")? {
            entity.source = source;
        }
        if let Some(eisenhower) = parse_select::<Eisenhower>(record, "eisenhower")? {
            entity.eisenhower = eisenhower;
        }
        entity.difficulty = parse_select::<Difficulty>(record, "difficulty")?;
        entity.actionable_date = record.date("actionable-date")?;
        entity.due_date = record.date("due-date")?;
        entity.big_plan_ref_id = resolve_reference(
            record,
            "big-plan-id-ref",
            |u| cx.catalog.big_plan_by_uuid(u).map(|e| e.ref_id.clone()),
            &mut warnings,
        )?;
        entity.recurring_task_ref_id =
            parse_ref_text(record, "recurring-task-ref-id", &mut warnings)?;
        entity.metric_ref_id = resolve_reference(
            record,
            "metric-id-ref",
            |u| cx.catalog.metric_by_uuid(u).map(|e| e.ref_id.clone()),
            &mut warnings,
        )?;
        entity.person_ref_id = resolve_reference(
            record,
            "person-id-ref",
            |u| cx.catalog.person_by_uuid(u).map(|e| e.ref_id.clone()),
            &mut warnings,
        )?;
        entity.recurring_timeline = record.text("recurring-timeline")?;
        entity.recurring_gen_right_now = match record.number("recurring-gen-right-now")? {
            None => None,
            Some(millis) => {
                let ts = Timestamp::from_millis(millis as i64);
                if ts.is_none() {
                    warnings.push(format!(
                        "field \"recurring-gen-right-now\" held unrepresentable instant {millis}; cleared"
                    ));
                }
                ts
            }
        };
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(InboxTask, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        let mut task = InboxTask {
            meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
            name,
            status: parse_select::<InboxTaskStatus>(record, "status")?
                .unwrap_or(InboxTaskStatus::Accepted),
            source: parse_select::<InboxTaskSource>(record, "source")?
                .unwrap_or(InboxTaskSource::User),
            eisenhower: parse_select::<Eisenhower>(record, "eisenhower")?
                .unwrap_or(Eisenhower::Regular),
            difficulty: parse_select::<Difficulty>(record, "difficulty")?,
            actionable_date: record.date("actionable-date")?,
            due_date: record.date("due-date")?,
            big_plan_ref_id: None,
            recurring_task_ref_id: None,
            metric_ref_id: None,
            person_ref_id: None,
            recurring_timeline: record.text("recurring-timeline")?,
            recurring_gen_right_now: None,
        };
        task.big_plan_ref_id = resolve_reference(
            record,
            "big-plan-id-ref",
            |u| cx.catalog.big_plan_by_uuid(u).map(|e| e.ref_id.clone()),
            &mut warnings,
        )?;
        task.metric_ref_id = resolve_reference(
            record,
            "metric-id-ref",
            |u| cx.catalog.metric_by_uuid(u).map(|e| e.ref_id.clone()),
            &mut warnings,
        )?;
        task.person_ref_id = resolve_reference(
            record,
            "person-id-ref",
            |u| cx.catalog.person_by_uuid(u).map(|e| e.ref_id.clone()),
            &mut warnings,
        )?;
        task.recurring_task_ref_id =
            parse_ref_text(record, "recurring-task-ref-id", &mut warnings)?;
        Ok((task, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, RefCatalog};
    use alm_core::RemoteId;
    use uuid::Uuid;

    fn catalog() -> (RefCatalog, Uuid, Uuid) {
        let plan_uuid = Uuid::new_v4();
        let person_uuid = Uuid::new_v4();
        let ts = Timestamp::from_millis(1_707_000_000_000).unwrap();
        let mut catalog = RefCatalog::default();
        catalog.set_projects(vec![CatalogEntry::new(
            EntityId::from_index(2),
            Uuid::new_v4(),
            "Work",
            ts,
        )]);
        catalog.set_big_plans(vec![CatalogEntry::new(
            EntityId::from_index(7),
            plan_uuid,
            "Ship v2",
            ts,
        )]);
        catalog.set_persons(vec![CatalogEntry::new(
            EntityId::from_index(9),
            person_uuid,
            "Alex",
            ts,
        )]);
        (catalog, plan_uuid, person_uuid)
    }

    fn task(cx: &AdapterCx<'_>) -> InboxTask {
        InboxTask {
            meta: EntityMeta::new(EntityId::from_index(2), cx.right_now),
            name: "Write the report".to_string(),
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

    #[test]
    fn test_references_round_trip_through_link_uuids() {
        let (catalog, plan_uuid, _) = catalog();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::from_millis(1_707_566_400_000).unwrap(),
        };
        let mut entity = task(&cx);
        entity.big_plan_ref_id = Some(EntityId::from_index(7));

        let fields = InboxTasksAdapter.project(&entity, &cx);
        assert_eq!(fields.get("big-plan"), Some(&FieldValue::select("Ship v2")));
        assert_eq!(
            fields.get("big-plan-id-ref"),
            Some(&FieldValue::Reference(Some(plan_uuid)))
        );

        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.fields = fields;
        let mut other = task(&cx);
        let warnings = InboxTasksAdapter.merge(&mut other, &record, &cx).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(other.big_plan_ref_id, Some(EntityId::from_index(7)));
    }

    #[test]
    fn test_merge_clears_dangling_references_with_a_warning() {
        let (catalog, _, _) = catalog();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::from_millis(1_707_566_400_000).unwrap(),
        };
        let mut entity = task(&cx);
        entity.person_ref_id = Some(EntityId::from_index(9));

        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.set("name", FieldValue::text("Write the report"));
        record.set("person-id-ref", FieldValue::Reference(Some(Uuid::new_v4())));

        let warnings = InboxTasksAdapter.merge(&mut entity, &record, &cx).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(entity.person_ref_id.is_none());
    }

    #[test]
    fn test_merge_trusts_the_reference_not_the_label() {
        let (catalog, plan_uuid, _) = catalog();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::from_millis(1_707_566_400_000).unwrap(),
        };
        let mut entity = task(&cx);

        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.set("name", FieldValue::text("Write the report"));
        record.set("big-plan", FieldValue::select("A stale label"));
        record.set("big-plan-id-ref", FieldValue::Reference(Some(plan_uuid)));

        let warnings = InboxTasksAdapter.merge(&mut entity, &record, &cx).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(entity.big_plan_ref_id, Some(EntityId::from_index(7)));
    }

    #[test]
    fn test_unknown_status_is_a_schema_mismatch() {
        let (catalog, _, _) = catalog();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::now(),
        };
        let mut entity = task(&cx);
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.set("status", FieldValue::select("parked"));
        let err = InboxTasksAdapter.merge(&mut entity, &record, &cx).unwrap_err();
        assert_eq!(err.field, "status");
    }

    #[test]
    fn test_promote_defaults_and_reads_generation_fields() {
        let (catalog, _, person_uuid) = catalog();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::from_millis(1_707_566_400_000).unwrap(),
        };
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.set("name", FieldValue::text("Catch up with Alex"));
        record.set("person-id-ref", FieldValue::Reference(Some(person_uuid)));

        let (task, warnings) = InboxTasksAdapter
            .promote(&record, &EntityId::from_index(2), &cx)
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(task.status, InboxTaskStatus::Accepted);
        assert_eq!(task.source, InboxTaskSource::User);
        assert_eq!(task.eisenhower, Eisenhower::Regular);
        assert_eq!(task.person_ref_id, Some(EntityId::from_index(9)));
    }
}
