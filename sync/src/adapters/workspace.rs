use crate::adapters::parse_ref_text;
use crate::reconcile::{AdapterCx, CollectionAdapter};
use alm_core::{
    EntityId, EntityMeta, FieldSpec, FieldTypeError, FieldValue, RemoteRecord, Schema, Workspace,
};
use std::collections::BTreeMap;

/// The workspace syncs before projects exist catalog-side, so its default
/// project travels as a plain ref-id text field rather than a reference.
pub struct WorkspaceAdapter;

impl CollectionAdapter for WorkspaceAdapter {
    type Entity = Workspace;

    fn schema(&self, _cx: &AdapterCx<'_>) -> Schema {
        Schema::new()
            .with_field("name", FieldSpec::Text)
            .with_field("timezone", FieldSpec::Text)
            .with_field("default-project-ref-id", FieldSpec::Text)
    }

    fn project(&self, entity: &Workspace, _cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            ("name".to_string(), FieldValue::text(&entity.name)),
            ("timezone".to_string(), FieldValue::text(&entity.timezone)),
            (
                "default-project-ref-id".to_string(),
                FieldValue::Text(
                    entity
                        .default_project_ref_id
                        .as_ref()
                        .map(|id| id.as_str().to_string()),
                ),
            ),
        ])
    }

    fn merge(
        &self,
        entity: &mut Workspace,
        record: &RemoteRecord,
        _cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(name) = record.text("name")? {
            entity.name = name;
        } else {
            warnings.push("record has no name; kept the local one".to_string());
        }
        if let Some(timezone) = record.text("timezone")? {
            entity.timezone = timezone;
        }
        entity.default_project_ref_id =
            parse_ref_text(record, "default-project-ref-id", &mut warnings)?;
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(Workspace, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        let timezone = record.text("timezone")?.unwrap_or_else(|| "UTC".to_string());
        let default_project_ref_id =
            parse_ref_text(record, "default-project-ref-id", &mut warnings)?;
        Ok((
            Workspace {
                meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
                name,
                timezone,
                default_project_ref_id,
            },
            warnings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RefCatalog;
    use alm_core::{RemoteId, Timestamp};

    #[test]
    fn test_merge_reads_the_default_project_ref() {
        let catalog = RefCatalog::default();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::now(),
        };
        let mut workspace = Workspace {
            meta: EntityMeta::new(EntityId::from_index(1), cx.right_now),
            name: "Personal".to_string(),
            timezone: "UTC".to_string(),
            default_project_ref_id: None,
        };
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.set("name", FieldValue::text("Personal"));
        record.set("timezone", FieldValue::text("Europe/Bucharest"));
        record.set("default-project-ref-id", FieldValue::text("3"));

        let warnings = WorkspaceAdapter.merge(&mut workspace, &record, &cx).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(workspace.timezone, "Europe/Bucharest");
        assert_eq!(
            workspace.default_project_ref_id,
            Some(EntityId::from_index(3))
        );
    }
}
