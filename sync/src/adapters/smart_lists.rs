use crate::reconcile::{AdapterCx, CollectionAdapter};
use alm_core::{
    EntityId, EntityMeta, FieldSpec, FieldTypeError, FieldValue, RemoteRecord, Schema, SmartList,
    SmartListItem,
};
use std::collections::BTreeMap;

pub struct SmartListsAdapter;

impl CollectionAdapter for SmartListsAdapter {
    type Entity = SmartList;

    fn schema(&self, _cx: &AdapterCx<'_>) -> Schema {
        Schema::new().with_field("name", FieldSpec::Text)
    }

    fn project(&self, entity: &SmartList, _cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([("name".to_string(), FieldValue::text(&entity.name))])
    }

    fn merge(
        &self,
        entity: &mut SmartList,
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
    ) -> Result<(SmartList, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        Ok((
            SmartList {
                meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
                name,
            },
            warnings,
        ))
    }
}

/// Tags are free-form strings carried on the records themselves, so the
/// multi-select declares no options up front.
pub struct SmartListItemsAdapter;

impl CollectionAdapter for SmartListItemsAdapter {
    type Entity = SmartListItem;

    fn schema(&self, _cx: &AdapterCx<'_>) -> Schema {
        Schema::new()
            .with_field("name", FieldSpec::Text)
            .with_field("is-done", FieldSpec::Checkbox)
            .with_field("tags", FieldSpec::MultiSelect { options: vec![] })
            .with_field("url", FieldSpec::Text)
    }

    fn project(&self, entity: &SmartListItem, _cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            ("name".to_string(), FieldValue::text(&entity.name)),
            ("is-done".to_string(), FieldValue::Checkbox(entity.is_done)),
            (
                "tags".to_string(),
                FieldValue::MultiSelect(entity.tags.clone()),
            ),
            ("url".to_string(), FieldValue::Text(entity.url.clone())),
        ])
    }

    fn merge(
        &self,
        entity: &mut SmartListItem,
        record: &RemoteRecord,
        _cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(name) = record.text("name")? {
            entity.name = name;
        } else {
            warnings.push("record has no name; kept the local one".to_string());
        }
        entity.is_done = record.checkbox("is-done")?;
        entity.tags = record.multi_select("tags")?;
        entity.url = record.text("url")?;
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(SmartListItem, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        Ok((
            SmartListItem {
                meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
                name,
                is_done: record.checkbox("is-done")?,
                tags: record.multi_select("tags")?,
                url: record.text("url")?,
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
    fn test_item_tags_round_trip() {
        let catalog = RefCatalog::default();
        let cx = AdapterCx {
            catalog: &catalog,
            right_now: Timestamp::from_millis(1_707_566_400_000).unwrap(),
        };
        let item = SmartListItem {
            meta: EntityMeta::new(EntityId::from_index(5), cx.right_now),
            name: "The Pragmatic Programmer".to_string(),
            is_done: true,
            tags: vec!["books".to_string(), "career".to_string()],
            url: Some("https://example.com/tpp".to_string()),
        };
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.fields = SmartListItemsAdapter.project(&item, &cx);

        let (promoted, warnings) = SmartListItemsAdapter
            .promote(&record, &EntityId::from_index(5), &cx)
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(promoted.tags, item.tags);
        assert!(promoted.is_done);
        assert_eq!(promoted.url, item.url);
    }
}
