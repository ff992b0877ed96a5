//! Per-condition statistics derived from the raw log collection.
//!
//! Everything here is recomputed from scratch on each call. `now` is passed in
//! so results are deterministic.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Serialize, Serializer};

use crate::catalog::Catalog;
use crate::entry::LogEntry;

/// Length of a "month" when measuring the span of logged entries.
pub const DAYS_PER_MONTH: f64 = 30.0;
/// Minimum span, in months, before a rating estimate is attempted.
pub const MIN_MONTHS_SPANNED: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AverageSeverity {
    NotAvailable,
    Value(f64),
}

impl fmt::Display for AverageSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AverageSeverity::NotAvailable => write!(f, "N/A"),
            AverageSeverity::Value(value) => write!(f, "{:.1}", value),
        }
    }
}

impl Serialize for AverageSeverity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AverageSeverity::NotAvailable => serializer.serialize_str("N/A"),
            AverageSeverity::Value(value) => serializer.serialize_f64(*value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingEstimate {
    InsufficientData,
    Percent(u8),
}

impl fmt::Display for RatingEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingEstimate::InsufficientData => write!(f, "Insufficient data"),
            RatingEstimate::Percent(value) => write!(f, "{}%", value),
        }
    }
}

impl Serialize for RatingEstimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionStats {
    pub condition_id: String,
    pub total_logs: usize,
    pub most_recent_log: Option<LogEntry>,
    pub average_severity: AverageSeverity,
    pub prostrating_percentage: u32,
    pub days_since_last_log: Option<i64>,
    pub current_streak_days: u32,
    pub va_rating_estimate: RatingEstimate,
    pub rating_criteria: Option<String>,
}

/// Entries in `entries` that belong to `condition_id`, in original order.
pub fn entries_for<'a>(entries: &'a [LogEntry], condition_id: &str) -> Vec<&'a LogEntry> {
    entries
        .iter()
        .filter(|entry| entry.condition_id == condition_id)
        .collect()
}

/// Latest entry by timestamp; ties keep the first in iteration order.
pub fn most_recent<'a>(entries: &[&'a LogEntry]) -> Option<&'a LogEntry> {
    let mut latest: Option<&'a LogEntry> = None;
    for &entry in entries {
        match latest {
            Some(current) if entry.timestamp <= current.timestamp => {}
            _ => latest = Some(entry),
        }
    }
    latest
}

/// Mean severity with missing values counted as 0, rounded to one decimal.
pub fn average_severity(entries: &[&LogEntry]) -> AverageSeverity {
    if entries.is_empty() {
        return AverageSeverity::NotAvailable;
    }
    let total: f64 = entries
        .iter()
        .map(|entry| entry.severity().unwrap_or(0.0))
        .sum();
    AverageSeverity::Value(round_to_tenth(total / entries.len() as f64))
}

pub fn prostrating_count(entries: &[&LogEntry]) -> usize {
    entries.iter().filter(|entry| entry.is_prostrating()).count()
}

pub fn prostrating_percentage(entries: &[&LogEntry]) -> u32 {
    if entries.is_empty() {
        return 0;
    }
    let ratio = prostrating_count(entries) as f64 / entries.len() as f64;
    (ratio * 100.0).round() as u32
}

pub fn days_since(entry: &LogEntry, now: DateTime<Utc>) -> i64 {
    (now - entry.timestamp).num_milliseconds().div_euclid(Duration::days(1).num_milliseconds())
}

/// Months (of [`DAYS_PER_MONTH`] days) between the oldest and newest entry.
pub fn months_spanned(entries: &[&LogEntry]) -> f64 {
    let oldest = entries.iter().map(|entry| entry.timestamp).min();
    let newest = entries.iter().map(|entry| entry.timestamp).max();
    match (oldest, newest) {
        (Some(oldest), Some(newest)) => {
            let millis = (newest - oldest).num_milliseconds() as f64;
            millis / (DAYS_PER_MONTH * 24.0 * 60.0 * 60.0 * 1000.0)
        }
        _ => 0.0,
    }
}

/// Heuristic rating ladder. Illustrative only, not the VA rating schedule.
pub fn va_rating_estimate(entries: &[&LogEntry]) -> RatingEstimate {
    if entries.len() < 2 {
        return RatingEstimate::InsufficientData;
    }
    let months = months_spanned(entries);
    if months < MIN_MONTHS_SPANNED {
        return RatingEstimate::InsufficientData;
    }
    let monthly_rate = prostrating_count(entries) as f64 / months;
    let severe = entries.iter().any(|entry| entry.has_severe_impact());

    let percent = if monthly_rate > 1.0 && severe {
        50
    } else if monthly_rate >= 1.0 {
        30
    } else if monthly_rate >= 0.5 {
        10
    } else {
        0
    };
    RatingEstimate::Percent(percent)
}

/// Consecutive calendar days with a log, ending on the most recent log day.
pub fn current_streak_days(entries: &[&LogEntry]) -> u32 {
    let days: BTreeSet<NaiveDate> = entries
        .iter()
        .map(|entry| entry.timestamp.date_naive())
        .collect();
    let Some(mut day) = days.iter().next_back().copied() else {
        return 0;
    };
    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}

pub fn condition_stats(
    entries: &[LogEntry],
    condition_id: &str,
    now: DateTime<Utc>,
) -> ConditionStats {
    let scoped = entries_for(entries, condition_id);
    let latest = most_recent(&scoped);
    ConditionStats {
        condition_id: condition_id.to_string(),
        total_logs: scoped.len(),
        most_recent_log: latest.cloned(),
        average_severity: average_severity(&scoped),
        prostrating_percentage: prostrating_percentage(&scoped),
        days_since_last_log: latest.map(|entry| days_since(entry, now)),
        current_streak_days: current_streak_days(&scoped),
        va_rating_estimate: va_rating_estimate(&scoped),
        rating_criteria: None,
    }
}

/// Stats for one condition, annotated with the catalog criteria matching the
/// estimated rating.
pub fn condition_stats_with_catalog(
    entries: &[LogEntry],
    catalog: &Catalog,
    condition_id: &str,
    now: DateTime<Utc>,
) -> ConditionStats {
    let mut stats = condition_stats(entries, condition_id, now);
    if let (RatingEstimate::Percent(percent), Some(condition)) =
        (stats.va_rating_estimate, catalog.get(condition_id))
    {
        stats.rating_criteria = condition.criteria_for(percent).map(str::to_string);
    }
    stats
}

/// Stats for every catalog condition, in catalog order.
pub fn overview(entries: &[LogEntry], catalog: &Catalog, now: DateTime<Utc>) -> Vec<ConditionStats> {
    catalog
        .conditions()
        .iter()
        .map(|condition| condition_stats_with_catalog(entries, catalog, &condition.id, now))
        .collect()
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{FieldValue, LogData};
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap() + Duration::days(i64::from(day))
    }

    fn log(day: u32, severity: Option<f64>, prostrating: bool, impact: Option<&str>) -> LogEntry {
        let mut data = LogData::new();
        if let Some(severity) = severity {
            data.insert("severity".to_string(), FieldValue::Number(severity));
        }
        data.insert(
            "prostrating".to_string(),
            if prostrating { "Yes" } else { "No" }.into(),
        );
        if let Some(impact) = impact {
            data.insert("impact".to_string(), impact.into());
        }
        LogEntry::new("headaches", data, at(day, 12))
    }

    fn refs(entries: &[LogEntry]) -> Vec<&LogEntry> {
        entries.iter().collect()
    }

    #[test]
    fn average_severity_rounds_and_handles_empty() {
        let entries = vec![
            log(0, Some(4.0), false, None),
            log(1, Some(6.0), false, None),
            log(2, Some(8.0), false, None),
        ];
        assert_eq!(average_severity(&refs(&entries)), AverageSeverity::Value(6.0));
        assert_eq!(average_severity(&[]), AverageSeverity::NotAvailable);
        assert_eq!(AverageSeverity::NotAvailable.to_string(), "N/A");

        let entries = vec![
            log(0, Some(5.0), false, None),
            log(1, Some(6.0), false, None),
            log(2, None, false, None),
        ];
        assert_eq!(average_severity(&refs(&entries)), AverageSeverity::Value(3.7));
    }

    #[test]
    fn prostrating_percentage_rounds_to_integer() {
        let entries = vec![
            log(0, Some(5.0), true, None),
            log(1, Some(5.0), false, None),
            log(2, Some(5.0), false, None),
            log(3, Some(5.0), false, None),
        ];
        assert_eq!(prostrating_percentage(&refs(&entries)), 25);
        let thirds = vec![
            log(0, Some(5.0), true, None),
            log(1, Some(5.0), false, None),
            log(2, Some(5.0), false, None),
        ];
        assert_eq!(prostrating_percentage(&refs(&thirds)), 33);
        assert_eq!(prostrating_percentage(&[]), 0);
    }

    #[test]
    fn single_entry_is_insufficient_regardless_of_severity() {
        let entries = vec![log(0, Some(10.0), true, Some("Complete inability to function"))];
        assert_eq!(
            va_rating_estimate(&refs(&entries)),
            RatingEstimate::InsufficientData
        );
    }

    #[test]
    fn short_span_is_insufficient() {
        let entries = vec![log(0, Some(9.0), true, None), log(14, Some(9.0), true, None)];
        assert_eq!(
            va_rating_estimate(&refs(&entries)),
            RatingEstimate::InsufficientData
        );
    }

    #[test]
    fn half_month_span_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prostrating_at = |offset: Duration| {
            let mut data = LogData::new();
            data.insert("severity".to_string(), FieldValue::Number(7.0));
            data.insert("prostrating".to_string(), "Yes".into());
            LogEntry::new("headaches", data, start + offset)
        };

        let exactly = vec![prostrating_at(Duration::zero()), prostrating_at(Duration::days(15))];
        assert_eq!(months_spanned(&refs(&exactly)), MIN_MONTHS_SPANNED);
        assert_eq!(va_rating_estimate(&refs(&exactly)), RatingEstimate::Percent(30));

        let just_under = vec![
            prostrating_at(Duration::zero()),
            prostrating_at(Duration::days(15) - Duration::seconds(1)),
        ];
        assert!(months_spanned(&refs(&just_under)) < MIN_MONTHS_SPANNED);
        assert_eq!(
            va_rating_estimate(&refs(&just_under)),
            RatingEstimate::InsufficientData
        );
    }

    #[test]
    fn rating_ladder_thresholds() {
        // 3 prostrating over 60 days = 1.5/month, with a severe impact.
        let severe = vec![
            log(0, Some(8.0), true, Some("Severe limitation")),
            log(30, Some(8.0), true, None),
            log(60, Some(8.0), true, None),
        ];
        assert_eq!(va_rating_estimate(&refs(&severe)), RatingEstimate::Percent(50));

        // Same frequency without severe impact.
        let frequent = vec![
            log(0, Some(8.0), true, Some("Moderate limitation")),
            log(30, Some(8.0), true, None),
            log(60, Some(8.0), true, None),
        ];
        assert_eq!(va_rating_estimate(&refs(&frequent)), RatingEstimate::Percent(30));

        // Exactly one per month with severe impact is not above 1.
        let monthly = vec![
            log(0, Some(8.0), true, Some("Complete inability to function")),
            log(30, Some(8.0), false, None),
        ];
        assert_eq!(va_rating_estimate(&refs(&monthly)), RatingEstimate::Percent(30));

        // One prostrating over 60 days = 0.5/month.
        let occasional = vec![log(0, Some(6.0), true, None), log(60, Some(6.0), false, None)];
        assert_eq!(va_rating_estimate(&refs(&occasional)), RatingEstimate::Percent(10));

        let none = vec![log(0, Some(3.0), false, None), log(60, Some(3.0), false, None)];
        assert_eq!(va_rating_estimate(&refs(&none)), RatingEstimate::Percent(0));
        assert_eq!(RatingEstimate::Percent(0).to_string(), "0%");
    }

    #[test]
    fn most_recent_keeps_first_on_tie() {
        let first = log(5, Some(1.0), false, None);
        let mut second = log(5, Some(2.0), false, None);
        second.timestamp = first.timestamp;
        let older = log(1, Some(3.0), false, None);
        let entries = vec![older, first.clone(), second];
        assert_eq!(most_recent(&refs(&entries)).map(|e| e.id.clone()), Some(first.id));
    }

    #[test]
    fn condition_stats_reports_days_and_streak() {
        let entries = vec![
            log(0, Some(4.0), false, None),
            log(8, Some(6.0), true, None),
            log(9, Some(8.0), false, None),
            log(10, Some(8.0), false, None),
        ];
        let now = at(12, 11);
        let stats = condition_stats(&entries, "headaches", now);
        assert_eq!(stats.total_logs, 4);
        assert_eq!(stats.days_since_last_log, Some(1));
        assert_eq!(stats.current_streak_days, 3);
        assert_eq!(stats.most_recent_log.map(|e| e.id), Some(entries[3].id.clone()));

        let empty = condition_stats(&entries, "tinnitus", now);
        assert_eq!(empty.total_logs, 0);
        assert_eq!(empty.days_since_last_log, None);
        assert_eq!(empty.current_streak_days, 0);
        assert_eq!(empty.average_severity, AverageSeverity::NotAvailable);
        assert_eq!(empty.va_rating_estimate, RatingEstimate::InsufficientData);
    }

    #[test]
    fn stats_serialize_with_camel_case_keys() {
        let entries = vec![log(0, Some(4.0), true, None), log(1, None, false, None)];
        let stats = condition_stats(&entries, "headaches", at(3, 0));
        let value = serde_json::to_value(&stats).expect("json");
        assert_eq!(value["conditionId"], "headaches");
        assert_eq!(value["totalLogs"], 2);
        assert_eq!(value["averageSeverity"], 2.0);
        assert_eq!(value["vaRatingEstimate"], "Insufficient data");
        assert_eq!(value["mostRecentLog"]["conditionId"], "headaches");
        assert!(value.get("most_recent_log").is_none());
    }

    #[test]
    fn catalog_criteria_annotates_estimate() {
        let entries = vec![
            log(0, Some(8.0), true, Some("Moderate limitation")),
            log(30, Some(8.0), true, None),
            log(60, Some(8.0), true, None),
        ];
        let stats = condition_stats_with_catalog(&entries, Catalog::builtin(), "headaches", at(61, 0));
        assert_eq!(stats.va_rating_estimate, RatingEstimate::Percent(30));
        assert!(stats
            .rating_criteria
            .as_deref()
            .map(|c| c.contains("once a month"))
            .unwrap_or(false));

        let all = overview(&entries, Catalog::builtin(), at(61, 0));
        assert_eq!(all.len(), Catalog::builtin().conditions().len());
        assert_eq!(all[0].condition_id, "headaches");
    }
}
