use crate::adapters::{enum_select, parse_select};
use crate::reconcile::{AdapterCx, CollectionAdapter};
use alm_core::{
    BigPlan, BigPlanStatus, EntityId, EntityMeta, FieldSpec, FieldTypeError, FieldValue,
    RemoteRecord, Schema, SyncedEntity,
};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Big plans live in per-project containers. The `project` select is
/// denormalized display data whose options the propagator maintains;
/// ownership is the container itself, so merges never read it.
pub struct BigPlansAdapter;

impl CollectionAdapter for BigPlansAdapter {
    type Entity = BigPlan;

    fn schema(&self, cx: &AdapterCx<'_>) -> Schema {
        Schema::new()
            .with_field("name", FieldSpec::Text)
            .with_field("status", enum_select::<BigPlanStatus>())
            .with_field("due-date", FieldSpec::Date)
            .with_field(
                "project",
                FieldSpec::Select {
                    options: cx.catalog.project_options(),
                },
            )
            .with_field("project-id-ref", FieldSpec::Reference)
    }

    fn project(&self, entity: &BigPlan, cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        let owner = cx.catalog.project_by_ref(entity.parent_ref_id());
        BTreeMap::from([
            ("name".to_string(), FieldValue::text(&entity.name)),
            (
                "status".to_string(),
                FieldValue::select(entity.status.to_string()),
            ),
            ("due-date".to_string(), FieldValue::Date(entity.due_date)),
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
        entity: &mut BigPlan,
        record: &RemoteRecord,
        _cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(name) = record.text("name")? {
            entity.name = name;
        } else {
            warnings.push("record has no name; kept the local one".to_string());
        }
        if let Some(status) = parse_select::<BigPlanStatus>(record, "status")? {
            entity.status = status;
        }
        entity.due_date = record.date("due-date")?;
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(BigPlan, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        let status =
            parse_select::<BigPlanStatus>(record, "status")?.unwrap_or(BigPlanStatus::Accepted);
        Ok((
            BigPlan {
                meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
                name,
                status,
                due_date: record.date("due-date")?,
                link_uuid: Uuid::new_v4(),
            },
            warnings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, RefCatalog};
    use alm_core::{RemoteId, Timestamp};

    fn catalog_with_project() -> (RefCatalog, Uuid) {
        let uuid = Uuid::new_v4();
        let mut catalog = RefCatalog::default();
        catalog.set_projects(vec![CatalogEntry::new(
            EntityId::from_index(2),
            uuid,
            "Work",
            Timestamp::from_millis(1_707_000_000_000).unwrap(),
        )]);
        (catalog, uuid)
    }

    #[test]
    fn test_schema_project_options_use_link_uuids_as_ids() {
        let (catalog, uuid) = catalog_with_project();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::now(),
        };
        let schema = BigPlansAdapter.schema(&cx);
        let options = schema.select_options("project").unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].id, uuid);
        assert_eq!(options[0].value, "Work");
    }

    #[test]
    fn test_project_labels_the_owning_project() {
        let (catalog, uuid) = catalog_with_project();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::now(),
        };
        let plan = BigPlan {
            meta: EntityMeta::new(EntityId::from_index(2), cx.right_now),
            name: "Ship v2".to_string(),
            status: BigPlanStatus::InProgress,
            due_date: None,
            link_uuid: Uuid::new_v4(),
        };
        let fields = BigPlansAdapter.project(&plan, &cx);
        assert_eq!(
            fields.get("project"),
            Some(&FieldValue::select("Work"))
        );
        assert_eq!(
            fields.get("project-id-ref"),
            Some(&FieldValue::Reference(Some(uuid)))
        );
    }

    #[test]
    fn test_merge_ignores_the_project_label() {
        let (catalog, _) = catalog_with_project();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::now(),
        };
        let mut plan = BigPlan {
            meta: EntityMeta::new(EntityId::from_index(2), cx.right_now),
            name: "Ship v2".to_string(),
            status: BigPlanStatus::Accepted,
            due_date: None,
            link_uuid: Uuid::new_v4(),
        };
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.set("name", FieldValue::text("Ship v2"));
        record.set("status", FieldValue::select("done"));
        record.set("project", FieldValue::select("Someone Else's Project"));

        let warnings = BigPlansAdapter.merge(&mut plan, &record, &cx).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(plan.status, BigPlanStatus::Done);
        assert_eq!(plan.parent_ref_id(), &EntityId::from_index(2));
    }
}
