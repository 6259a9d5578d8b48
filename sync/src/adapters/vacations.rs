use crate::reconcile::{AdapterCx, CollectionAdapter};
use alm_core::{
    EntityId, EntityMeta, FieldSpec, FieldTypeError, FieldValue, RemoteRecord, Schema, Vacation,
};
use std::collections::BTreeMap;

pub struct VacationsAdapter;

impl CollectionAdapter for VacationsAdapter {
    type Entity = Vacation;

    fn schema(&self, _cx: &AdapterCx<'_>) -> Schema {
        Schema::new()
            .with_field("name", FieldSpec::Text)
            .with_field("start-date", FieldSpec::Date)
            .with_field("end-date", FieldSpec::Date)
    }

    fn project(&self, entity: &Vacation, _cx: &AdapterCx<'_>) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            ("name".to_string(), FieldValue::text(&entity.name)),
            (
                "start-date".to_string(),
                FieldValue::Date(Some(entity.start_date)),
            ),
            (
                "end-date".to_string(),
                FieldValue::Date(Some(entity.end_date)),
            ),
        ])
    }

    fn merge(
        &self,
        entity: &mut Vacation,
        record: &RemoteRecord,
        _cx: &AdapterCx<'_>,
    ) -> Result<Vec<String>, FieldTypeError> {
        let mut warnings = Vec::new();
        if let Some(name) = record.text("name")? {
            entity.name = name;
        } else {
            warnings.push("record has no name; kept the local one".to_string());
        }
        if let Some(start) = record.date("start-date")? {
            entity.start_date = start;
        }
        if let Some(end) = record.date("end-date")? {
            entity.end_date = end;
        }
        if entity.end_date < entity.start_date {
            warnings.push("end date precedes start date; swapped".to_string());
            std::mem::swap(&mut entity.start_date, &mut entity.end_date);
        }
        Ok(warnings)
    }

    fn promote(
        &self,
        record: &RemoteRecord,
        parent_ref_id: &EntityId,
        cx: &AdapterCx<'_>,
    ) -> Result<(Vacation, Vec<String>), FieldTypeError> {
        let mut warnings = Vec::new();
        let name = record.text("name")?.unwrap_or_else(|| {
            warnings.push("record has no name".to_string());
            String::new()
        });
        let today = cx.right_now.as_datetime().date_naive();
        let start_date = record.date("start-date")?.unwrap_or(today);
        let end_date = record.date("end-date")?.unwrap_or(start_date);
        let mut vacation = Vacation {
            meta: EntityMeta::new(parent_ref_id.clone(), cx.right_now),
            name,
            start_date,
            end_date,
        };
        if vacation.end_date < vacation.start_date {
            warnings.push("end date precedes start date; swapped".to_string());
            std::mem::swap(&mut vacation.start_date, &mut vacation.end_date);
        }
        Ok((vacation, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alm_core::{RemoteId, Timestamp};
    use crate::catalog::RefCatalog;

    fn cx(catalog: &RefCatalog) -> AdapterCx<'_> {
        AdapterCx {
            catalog,
            right_now: Timestamp::from_millis(1_707_566_400_000).unwrap(),
        }
    }

    #[test]
    fn test_merge_swaps_inverted_dates() {
        let catalog = RefCatalog::default();
        let cx = cx(&catalog);
        let mut vacation = Vacation {
            meta: EntityMeta::new(EntityId::from_index(1), cx.right_now),
            name: "Summer".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2024, 7, 14).unwrap(),
        };
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.set(
            "start-date",
            FieldValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 8, 10)),
        );
        record.set(
            "end-date",
            FieldValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 8, 1)),
        );

        let warnings = VacationsAdapter.merge(&mut vacation, &record, &cx).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(vacation.start_date < vacation.end_date);
    }

    #[test]
    fn test_project_then_merge_round_trips() {
        let catalog = RefCatalog::default();
        let cx = cx(&catalog);
        let vacation = Vacation {
            meta: EntityMeta::new(EntityId::from_index(1), cx.right_now),
            name: "Winter break".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
        };
        let mut record = RemoteRecord::new(RemoteId::new("r-1"), cx.right_now);
        record.fields = VacationsAdapter.project(&vacation, &cx);

        let mut other = vacation.clone();
        other.name = "scratch".to_string();
        let warnings = VacationsAdapter.merge(&mut other, &record, &cx).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(other, vacation);
    }
}
