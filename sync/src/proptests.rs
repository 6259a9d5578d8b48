//! Property checks for the pieces with real invariants: schedule math and
//! the option-preserving schema merge.

use chrono::NaiveDate;
use proptest::prelude::*;

use crate::bootstrap::merge_schema;
use crate::schedule::{due_date_for, timeline_for};
use alm_core::{FieldSpec, RecurringTaskPeriod, Schema, SelectOption};

fn any_period() -> impl Strategy<Value = RecurringTaskPeriod> {
    prop::sample::select(vec![
        RecurringTaskPeriod::Daily,
        RecurringTaskPeriod::Weekly,
        RecurringTaskPeriod::Monthly,
        RecurringTaskPeriod::Quarterly,
        RecurringTaskPeriod::Yearly,
    ])
}

// Day capped at 28 so every (year, month) combination is a real date.
fn any_date() -> impl Strategy<Value = NaiveDate> {
    (2015i32..2035, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

proptest! {
    #[test]
    fn test_due_date_never_precedes_the_day(period in any_period(), day in any_date()) {
        prop_assert!(due_date_for(period, day) >= day);
    }

    #[test]
    fn test_due_date_stays_inside_the_timeline_bucket(
        period in any_period(),
        day in any_date(),
    ) {
        let due = due_date_for(period, day);
        prop_assert_eq!(timeline_for(period, due), timeline_for(period, day));
    }

    #[test]
    fn test_schema_merge_keeps_ids_of_matching_option_values(
        values in prop::collection::btree_set("[a-z]{1,8}", 1..6),
    ) {
        let existing: Vec<SelectOption> =
            values.iter().map(|v| SelectOption::new(v.clone())).collect();
        // Same values, freshly minted ids, as every run produces.
        let desired: Vec<SelectOption> =
            values.iter().map(|v| SelectOption::new(v.clone())).collect();

        let current = Schema::new().with_field("status", FieldSpec::Select { options: existing.clone() });
        let want = Schema::new().with_field("status", FieldSpec::Select { options: desired });

        let merged = merge_schema(&want, &current);
        let options = merged.select_options("status").unwrap_or_default();
        prop_assert_eq!(options.len(), existing.len());
        for (kept, original) in options.iter().zip(existing.iter()) {
            prop_assert_eq!(kept.id, original.id);
            prop_assert_eq!(&kept.value, &original.value);
        }
    }
}
