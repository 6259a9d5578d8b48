use crate::reconcile::{AdapterCx, CollectionAdapter};
use alm_core::{
    EntityId, EntityMeta, FieldSpec, FieldTypeError, FieldValue, Project, RemoteRecord, Schema,
};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Projects keep their `link_uuid` local-side only; it surfaces remotely as
/// the option id of project selects on referrer containers.
pub struct ProjectsAdapter;

impl CollectionAdapter for ProjectsAdapter {
    type Entity = Project;

    fn schema(&self, _cx: &AdapterCx<'_>) -> Schema {
        Schema::new().with_field("name", FieldSpec::Text)
    }

    fn project(&self, entity: &Project, _cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([("name".to_string(), FieldValue::text(&entity.name))])
    }

    fn merge(
        &self,
        entity: &mut Project,
        record: &RemoteRecord,
        _cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(name) = record.text("name")? {
            entity.name = name;
        } else {
            warnings.push("record has no name; kept the local one".to_string());
        }
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(Project, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        Ok((
            Project {
                meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
                name,
                link_uuid: Uuid::new_v4(),
            },
            warnings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RefCatalog;
    use alm_core::{RemoteId, SyncedEntity, Timestamp};

    #[test]
    fn test_promote_assigns_a_fresh_link_uuid() {
        let catalog = RefCatalog::default();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::now(),
        };
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.set("name", FieldValue::text("Side Hustle"));

        let (first, warnings) = ProjectsAdapter
            .promote(&record, &EntityId::from_index(1), &cx)
            .unwrap();
        let (second, _) = ProjectsAdapter
            .promote(&record, &EntityId::from_index(1), &cx)
            .unwrap();

        assert!(warnings.is_empty());
        assert_eq!(first.name, "Side Hustle");
        assert!(first.ref_id().is_unassigned());
        assert_ne!(first.link_uuid, second.link_uuid);
    }
}
