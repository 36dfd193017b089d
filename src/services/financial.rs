//! Time-entry processing and reporting aggregates.
//!
//! FileMaker hands back loosely typed field data (numbers that may arrive as
//! strings, booleans encoded as `"1"`). Everything downstream works on the
//! normalized `TimeEntry` produced here.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use tracing::debug;

use crate::api::filemaker::FmRecord;
use crate::api::{ApiResult, Backend};
use crate::models::TimeEntry;

/// The FileMaker layout holding billable-hours records.
pub const TIME_ENTRY_LAYOUT: &str = "time_entries";

/// Load and normalize all time entries from FileMaker.
pub async fn load_time_entries(backend: &Backend) -> ApiResult<Vec<TimeEntry>> {
    let records = backend
        .filemaker
        .list_records(TIME_ENTRY_LAYOUT, None)
        .await?;
    let entries = process_financial_data(&records);
    debug!(count = entries.len(), "loaded time entries");
    Ok(entries)
}

/// Map raw FileMaker records into normalized time entries.
///
/// `amount` is always `hours * rate`; `billed` coerces FileMaker's
/// string-typed flag (`"1"` or the number 1).
pub fn process_financial_data(records: &[FmRecord]) -> Vec<TimeEntry> {
    records
        .iter()
        .map(|record| {
            let fields = &record.field_data;
            let hours = num_field(fields, "f_hours");
            let rate = num_field(fields, "f_rate");
            TimeEntry {
                id: text_field(fields, "f_uuid"),
                customer_id: text_field(fields, "f_customer_id"),
                project_id: text_field(fields, "f_project_id"),
                hours,
                rate,
                amount: hours * rate,
                date: parse_date(&text_field(fields, "f_date")),
                billed: flag_field(fields, "f_billed"),
                description: text_field(fields, "f_description"),
            }
        })
        .collect()
}

fn num_field(fields: &Value, key: &str) -> f64 {
    match fields.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn text_field(fields: &Value, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn flag_field(fields: &Value, key: &str) -> bool {
    match fields.get(key) {
        Some(Value::String(s)) => s == "1",
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Running sums for one grouping key.
#[derive(Debug, Clone)]
pub struct GroupTotals {
    pub key: String,
    pub total_hours: f64,
    pub total_amount: f64,
    pub entries: usize,
}

/// Group entries by customer. Entries without a customer id are retained
/// under an "unassigned" bucket, so the grouped totals always add up to the
/// ungrouped total.
pub fn group_by_customer(entries: &[TimeEntry]) -> Vec<GroupTotals> {
    let mut groups: BTreeMap<String, GroupTotals> = BTreeMap::new();
    for entry in entries {
        let key = if entry.customer_id.is_empty() {
            "unassigned".to_string()
        } else {
            entry.customer_id.clone()
        };
        accumulate(&mut groups, key, entry);
    }
    groups.into_values().collect()
}

/// Group entries by project. Entries without a project id are skipped.
pub fn group_by_project(entries: &[TimeEntry]) -> Vec<GroupTotals> {
    let mut groups: BTreeMap<String, GroupTotals> = BTreeMap::new();
    for entry in entries {
        if entry.project_id.is_empty() {
            continue;
        }
        accumulate(&mut groups, entry.project_id.clone(), entry);
    }
    groups.into_values().collect()
}

fn accumulate(groups: &mut BTreeMap<String, GroupTotals>, key: String, entry: &TimeEntry) {
    let group = groups.entry(key.clone()).or_insert(GroupTotals {
        key,
        total_hours: 0.0,
        total_amount: 0.0,
        entries: 0,
    });
    group.total_hours += entry.hours;
    group.total_amount += entry.amount;
    group.entries += 1;
}

/// Calendar bucketing period for the chart screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Month,
    Quarter,
    Year,
}

impl Period {
    pub fn label(&self) -> &'static str {
        match self {
            Period::Month => "Month",
            Period::Quarter => "Quarter",
            Period::Year => "Year",
        }
    }

    pub fn next(&self) -> Period {
        match self {
            Period::Month => Period::Quarter,
            Period::Quarter => Period::Year,
            Period::Year => Period::Month,
        }
    }
}

/// Bucket label for a date. Dates are plain calendar dates, so bucketing is
/// timezone-free.
pub fn bucket_label(date: NaiveDate, period: Period) -> String {
    match period {
        Period::Month => format!("{:04}-{:02}", date.year(), date.month()),
        Period::Quarter => format!("{:04}-Q{}", date.year(), (date.month() - 1) / 3 + 1),
        Period::Year => format!("{:04}", date.year()),
    }
}

/// Sum amounts per calendar bucket, sorted by bucket. Entries without a
/// parseable date are skipped.
pub fn period_totals(entries: &[TimeEntry], period: Period) -> Vec<(String, f64)> {
    let mut buckets: BTreeMap<String, f64> = BTreeMap::new();
    for entry in entries {
        if let Some(date) = entry.date {
            *buckets.entry(bucket_label(date, period)).or_default() += entry.amount;
        }
    }
    buckets.into_iter().collect()
}

/// Chart series: whole dollars per bucket, ready for the bar chart widget.
pub fn prepare_chart_data(entries: &[TimeEntry], period: Period) -> Vec<(String, u64)> {
    period_totals(entries, period)
        .into_iter()
        .map(|(label, amount)| (label, amount.round().max(0.0) as u64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> FmRecord {
        serde_json::from_value(json!({ "recordId": "1", "fieldData": fields })).unwrap()
    }

    fn entry(customer: &str, project: &str, hours: f64, rate: f64, date: &str) -> TimeEntry {
        TimeEntry {
            id: "e".to_string(),
            customer_id: customer.to_string(),
            project_id: project.to_string(),
            hours,
            rate,
            amount: hours * rate,
            date: parse_date(date),
            billed: false,
            description: String::new(),
        }
    }

    #[test]
    fn amount_is_hours_times_rate() {
        let records = vec![record(json!({
            "f_uuid": "a1", "f_hours": 2.5, "f_rate": "120", "f_date": "2026-03-04",
            "f_customer_id": "C-1", "f_project_id": "P-1", "f_billed": "0",
            "f_description": "support",
        }))];
        let entries = process_financial_data(&records);
        assert_eq!(entries.len(), 1);
        assert!((entries[0].amount - 300.0).abs() < 1e-9);
        assert_eq!(entries[0].date, NaiveDate::from_ymd_opt(2026, 3, 4));
    }

    #[test]
    fn billed_coerces_string_and_numeric_one() {
        for (raw, expected) in [
            (json!("1"), true),
            (json!(1), true),
            (json!("0"), false),
            (json!(0), false),
            (json!(""), false),
        ] {
            let records = vec![record(json!({ "f_billed": raw }))];
            assert_eq!(process_financial_data(&records)[0].billed, expected);
        }
    }

    #[test]
    fn customer_grouping_conserves_total_amount() {
        let entries = vec![
            entry("C-1", "P-1", 2.0, 100.0, "2026-01-10"),
            entry("C-1", "P-2", 1.0, 100.0, "2026-01-11"),
            entry("C-2", "P-1", 3.0, 50.0, "2026-02-01"),
            // No customer id: must still be counted somewhere
            entry("", "P-3", 4.0, 25.0, "2026-02-02"),
        ];
        let ungrouped: f64 = entries.iter().map(|e| e.amount).sum();
        let grouped: f64 = group_by_customer(&entries)
            .iter()
            .map(|g| g.total_amount)
            .sum();
        assert!((ungrouped - grouped).abs() < 1e-9);
    }

    #[test]
    fn project_grouping_drops_missing_keys() {
        let entries = vec![
            entry("C-1", "P-1", 2.0, 100.0, "2026-01-10"),
            entry("C-1", "", 1.0, 100.0, "2026-01-11"),
        ];
        let groups = group_by_project(&entries);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "P-1");
        assert_eq!(groups[0].entries, 1);
    }

    #[test]
    fn bucket_labels_are_calendar_based() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        assert_eq!(bucket_label(date, Period::Month), "2026-08");
        assert_eq!(bucket_label(date, Period::Quarter), "2026-Q3");
        assert_eq!(bucket_label(date, Period::Year), "2026");

        let jan = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(bucket_label(jan, Period::Quarter), "2026-Q1");
        let dec = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert_eq!(bucket_label(dec, Period::Quarter), "2026-Q4");
    }

    #[test]
    fn period_totals_sum_per_bucket() {
        let entries = vec![
            entry("C-1", "P-1", 2.0, 100.0, "2026-01-10"),
            entry("C-1", "P-1", 1.0, 100.0, "2026-01-20"),
            entry("C-1", "P-1", 1.0, 100.0, "2026-02-01"),
            // Unparseable date is skipped
            entry("C-1", "P-1", 9.0, 100.0, "not-a-date"),
        ];
        let totals = period_totals(&entries, Period::Month);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].0, "2026-01");
        assert!((totals[0].1 - 300.0).abs() < 1e-9);
        assert!((totals[1].1 - 100.0).abs() < 1e-9);
    }

    #[test]
    fn chart_data_rounds_to_whole_dollars() {
        let entries = vec![entry("C-1", "P-1", 1.5, 99.99, "2026-01-10")];
        let data = prepare_chart_data(&entries, Period::Year);
        assert_eq!(data, vec![("2026".to_string(), 150)]);
    }
}
