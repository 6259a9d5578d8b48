//! Timelines and due dates for generated tasks.
//!
//! A generated inbox task (metric collection, person catch-up) is anchored to
//! a timeline bucket named after its period. Buckets are plain strings so the
//! remote side can show and group them without understanding periods.

use alm_core::{Metric, Person, RecurringTaskPeriod};
use chrono::{Datelike, Days, Months, NaiveDate};

/// The timeline bucket a date falls into for the given period.
///
/// Formats: daily `2024-02-14`, weekly `2024-W07` (ISO week), monthly
/// `2024-Feb`, quarterly `2024-Q1`, yearly `2024`.
pub fn timeline_for(period: RecurringTaskPeriod, date: NaiveDate) -> String {
    match period {
        RecurringTaskPeriod::Daily => date.format("%Y-%m-%d").to_string(),
        RecurringTaskPeriod::Weekly => date.format("%G-W%V").to_string(),
        RecurringTaskPeriod::Monthly => date.format("%Y-%b").to_string(),
        RecurringTaskPeriod::Quarterly => format!("{}-Q{}", date.year(), quarter_of(date)),
        RecurringTaskPeriod::Yearly => date.format("%Y").to_string(),
    }
}

/// The last day of the timeline bucket `date` falls into.
pub fn due_date_for(period: RecurringTaskPeriod, date: NaiveDate) -> NaiveDate {
    match period {
        RecurringTaskPeriod::Daily => date,
        RecurringTaskPeriod::Weekly => {
            let days_left = 7 - u64::from(date.weekday().number_from_monday());
            date + Days::new(days_left)
        }
        RecurringTaskPeriod::Monthly => month_end(date),
        RecurringTaskPeriod::Quarterly => {
            let end_month = quarter_of(date) * 3;
            let anchor = date
                .with_day(1)
                .and_then(|d| d.with_month(end_month))
                .unwrap_or(date);
            month_end(anchor)
        }
        RecurringTaskPeriod::Yearly => {
            NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date)
        }
    }
}

pub fn metric_task_name(metric: &Metric) -> String {
    format!("Collect value for {}", metric.name)
}

pub fn catch_up_task_name(person: &Person) -> String {
    format!("Catch up with {}", person.name)
}

fn quarter_of(date: NaiveDate) -> u32 {
    date.month0() / 3 + 1
}

fn month_end(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    first + Months::new(1) - Days::new(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_timeline_formats() {
        let date = d(2024, 2, 14);
        assert_eq!(timeline_for(RecurringTaskPeriod::Daily, date), "2024-02-14");
        assert_eq!(timeline_for(RecurringTaskPeriod::Weekly, date), "2024-W07");
        assert_eq!(timeline_for(RecurringTaskPeriod::Monthly, date), "2024-Feb");
        assert_eq!(timeline_for(RecurringTaskPeriod::Quarterly, date), "2024-Q1");
        assert_eq!(timeline_for(RecurringTaskPeriod::Yearly, date), "2024");
    }

    #[test]
    fn test_weekly_timeline_uses_iso_week_year() {
        // 2024-12-30 is a Monday belonging to ISO week 1 of 2025.
        assert_eq!(
            timeline_for(RecurringTaskPeriod::Weekly, d(2024, 12, 30)),
            "2025-W01"
        );
    }

    #[test]
    fn test_weekly_due_date_lands_on_sunday() {
        // 2024-02-14 is a Wednesday; the ISO week ends Sunday 2024-02-18.
        assert_eq!(
            due_date_for(RecurringTaskPeriod::Weekly, d(2024, 2, 14)),
            d(2024, 2, 18)
        );
        // Already a Sunday stays put.
        assert_eq!(
            due_date_for(RecurringTaskPeriod::Weekly, d(2024, 2, 18)),
            d(2024, 2, 18)
        );
    }

    #[test]
    fn test_monthly_due_date_handles_leap_february() {
        assert_eq!(
            due_date_for(RecurringTaskPeriod::Monthly, d(2024, 2, 14)),
            d(2024, 2, 29)
        );
        assert_eq!(
            due_date_for(RecurringTaskPeriod::Monthly, d(2023, 2, 14)),
            d(2023, 2, 28)
        );
        assert_eq!(
            due_date_for(RecurringTaskPeriod::Monthly, d(2024, 12, 1)),
            d(2024, 12, 31)
        );
    }

    #[test]
    fn test_quarterly_due_date_is_quarter_end() {
        assert_eq!(
            due_date_for(RecurringTaskPeriod::Quarterly, d(2024, 5, 31)),
            d(2024, 6, 30)
        );
        assert_eq!(
            due_date_for(RecurringTaskPeriod::Quarterly, d(2024, 10, 2)),
            d(2024, 12, 31)
        );
    }

    #[test]
    fn test_yearly_due_date_is_december_31() {
        assert_eq!(
            due_date_for(RecurringTaskPeriod::Yearly, d(2024, 3, 3)),
            d(2024, 12, 31)
        );
    }

    #[test]
    fn test_daily_due_date_is_the_date_itself() {
        assert_eq!(
            due_date_for(RecurringTaskPeriod::Daily, d(2024, 2, 14)),
            d(2024, 2, 14)
        );
    }
}
