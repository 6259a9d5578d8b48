use crate::adapters::{enum_select, parse_select, select_value};
use crate::reconcile::{AdapterCx, CollectionAdapter};
use alm_core::{
    Difficulty, Eisenhower, EntityId, EntityMeta, FieldSpec, FieldTypeError, FieldValue, Person,
    PersonRelationship, RecurringTaskPeriod, RemoteRecord, Schema,
};
use std::collections::BTreeMap;
use uuid::Uuid;

pub struct PersonsAdapter;

impl CollectionAdapter for PersonsAdapter {
    type Entity = Person;

    fn schema(&self, _cx: &AdapterCx<'_>) -> Schema {
        Schema::new()
            .with_field("name", FieldSpec::Text)
            .with_field("relationship", enum_select::<PersonRelationship>())
            .with_field("catch-up-period", enum_select::<RecurringTaskPeriod>())
            .with_field("catch-up-eisenhower", enum_select::<Eisenhower>())
            .with_field("catch-up-difficulty", enum_select::<Difficulty>())
            .with_field("birthday", FieldSpec::Text)
    }

    fn project(&self, entity: &Person, _cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            ("name".to_string(), FieldValue::text(&entity.name)),
            (
                "relationship".to_string(),
                FieldValue::select(entity.relationship.to_string()),
            ),
            (
                "catch-up-period".to_string(),
                select_value(entity.catch_up_period),
            ),
            (
                "catch-up-eisenhower".to_string(),
                select_value(entity.catch_up_eisenhower),
            ),
            (
                "catch-up-difficulty".to_string(),
                select_value(entity.catch_up_difficulty),
            ),
            (
                "birthday".to_string(),
                FieldValue::Text(entity.birthday.clone()),
            ),
        ])
    }

    fn merge(
        &self,
        entity: &mut Person,
        record: &RemoteRecord,
        _cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(name) = record.text("name")? {
            entity.name = name;
        } else {
            warnings.push("record has no name; kept the local one".to_string());
        }
        if let Some(relationship) = parse_select::<PersonRelationship>(record, "relationship")? {
            entity.relationship = relationship;
        }
        entity.catch_up_period = parse_select::<RecurringTaskPeriod>(record, "catch-up-period")?;
        entity.catch_up_eisenhower = parse_select::<Eisenhower>(record, "catch-up-eisenhower")?;
        entity.catch_up_difficulty = parse_select::<Difficulty>(record, "catch-up-difficulty")?;
        entity.birthday = record.text("birthday")?;
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(Person, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        Ok((
            Person {
                meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
                name,
                relationship: parse_select::<PersonRelationship>(record, "relationship")?
                    .unwrap_or(PersonRelationship::Other),
                catch_up_period: parse_select::<RecurringTaskPeriod>(record, "catch-up-period")?,
                catch_up_eisenhower: parse_select::<Eisenhower>(record, "catch-up-eisenhower")?,
                catch_up_difficulty: parse_select::<Difficulty>(record, "catch-up-difficulty")?,
                birthday: record.text("birthday")?,
                link_uuid: Uuid::new_v4(),
            },
            warnings,
        ))
    }
}
