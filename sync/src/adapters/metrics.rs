use crate::adapters::{enum_select, parse_select, select_value};
use crate::reconcile::{AdapterCx, CollectionAdapter};
use alm_core::{
    Difficulty, Eisenhower, EntityId, EntityMeta, FieldSpec, FieldTypeError, FieldValue, Metric,
    MetricEntry, MetricUnit, RecurringTaskPeriod, RemoteRecord, Schema,
};
use std::collections::BTreeMap;
use uuid::Uuid;

pub struct MetricsAdapter;

impl CollectionAdapter for MetricsAdapter {
    type Entity = Metric;

    fn schema(&self, _cx: &AdapterCx<'_>) -> Schema {
        Schema::new()
            .with_field("name", FieldSpec::Text)
            .with_field("unit", enum_select::<MetricUnit>())
            .with_field("collection-period", enum_select::<RecurringTaskPeriod>())
            .with_field("collection-eisenhower", enum_select::<Eisenhower>())
            .with_field("collection-difficulty", enum_select::<Difficulty>())
    }

    fn project(&self, entity: &Metric, _cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            ("name".to_string(), FieldValue::text(&entity.name)),
            ("unit".to_string(), select_value(entity.unit)),
            (
                "collection-period".to_string(),
                select_value(entity.collection_period),
            ),
            (
                "collection-eisenhower".to_string(),
                select_value(entity.collection_eisenhower),
            ),
            (
                "collection-difficulty".to_string(),
                select_value(entity.collection_difficulty),
            ),
        ])
    }

    fn merge(
        &self,
        entity: &mut Metric,
        record: &RemoteRecord,
        _cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(name) = record.text("name")? {
            entity.name = name;
        } else {
            warnings.push("record has no name; kept the local one".to_string());
        }
        entity.unit = parse_select::<MetricUnit>(record, "unit")?;
        entity.collection_period =
            parse_select::<RecurringTaskPeriod>(record, "collection-period")?;
        entity.collection_eisenhower = parse_select::<Eisenhower>(record, "collection-eisenhower")?;
        entity.collection_difficulty =
            parse_select::<Difficulty>(record, "collection-difficulty")?;
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(Metric, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        Ok((
            Metric {
                meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
                name,
                unit: parse_select::<MetricUnit>(record, "unit")?,
                collection_period: parse_select::<RecurringTaskPeriod>(
                    record,
                    "collection-period",
                )?,
                collection_eisenhower: parse_select::<Eisenhower>(
                    record,
                    "collection-eisenhower",
                )?,
                collection_difficulty: parse_select::<Difficulty>(
                    record,
                    "collection-difficulty",
                )?,
                link_uuid: Uuid::new_v4(),
            },
            warnings,
        ))
    }
}

/// Entries keep no name of their own; the collection date is the anchor.
pub struct MetricEntriesAdapter;

impl CollectionAdapter for MetricEntriesAdapter {
    type Entity = MetricEntry;

    fn schema(&self, _cx: &AdapterCx<'_>) -> Schema {
        Schema::new()
            .with_field("collection-time", FieldSpec::Date)
            .with_field("value", FieldSpec::Number)
            .with_field("notes", FieldSpec::Text)
    }

    fn project(&self, entity: &MetricEntry, _cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            (
                "collection-time".to_string(),
                FieldValue::Date(Some(entity.collection_time)),
            ),
            ("value".to_string(), FieldValue::Number(Some(entity.value))),
            ("notes".to_string(), FieldValue::Text(entity.notes.clone())),
        ])
    }

    fn merge(
        &self,
        entity: &mut MetricEntry,
        record: &RemoteRecord,
        _cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(time) = record.date("collection-time")? {
            entity.collection_time = time;
        }
        if let Some(value) = record.number("value")? {
            entity.value = value;
        } else {
            warnings.push("record has no value; kept the local one".to_string());
        }
        entity.notes = record.text("notes")?;
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(MetricEntry, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let collection_time = record
            .date("collection-time")?
            .unwrap_or_else(|| cx.right_now.as_datetime().date_naive());
        let value = record.number("value")?.unwrap_or_else(|| {
            warnings.push("record has no value; recorded as zero".to_string());
            0.0
        });
        Ok((
            MetricEntry {
                meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
                collection_time,
                value,
                notes: record.text("notes")?,
            },
            warnings,
        ))
    }
}
