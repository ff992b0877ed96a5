use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::entry::LogEntry;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    #[default]
    Newest,
    Oldest,
    SeverityHigh,
    SeverityLow,
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "newest" => Ok(SortBy::Newest),
            "oldest" => Ok(SortBy::Oldest),
            "severity-high" => Ok(SortBy::SeverityHigh),
            "severity-low" => Ok(SortBy::SeverityLow),
            other => Err(format!(
                "unknown sort order '{}' (expected newest, oldest, severity-high, severity-low)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_set(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map(|from| date >= from).unwrap_or(true)
            && self.to.map(|to| date <= to).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SeverityRange {
    pub fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, severity: f64) -> bool {
        self.min.map(|min| severity >= min).unwrap_or(true)
            && self.max.map(|max| severity <= max).unwrap_or(true)
    }
}

/// View criteria for the log list. The default shows everything, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub condition: Option<String>,
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub severity_range: SeverityRange,
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub sort_by: SortBy,
}

/// Filter and sort `entries`. Search matches notes and tags.
pub fn apply(entries: &[LogEntry], criteria: &FilterCriteria) -> Vec<LogEntry> {
    run(entries, criteria, None)
}

/// Like [`apply`], but search also matches the condition's display name.
pub fn apply_with_catalog(
    entries: &[LogEntry],
    criteria: &FilterCriteria,
    catalog: &Catalog,
) -> Vec<LogEntry> {
    run(entries, criteria, Some(catalog))
}

fn run(entries: &[LogEntry], criteria: &FilterCriteria, catalog: Option<&Catalog>) -> Vec<LogEntry> {
    let mut result: Vec<&LogEntry> = entries.iter().collect();

    if let Some(condition) = criteria.condition.as_deref() {
        result.retain(|entry| entry.condition_id == condition);
    }
    if criteria.date_range.is_set() {
        result.retain(|entry| criteria.date_range.contains(entry.occurrence_date()));
    }
    if criteria.severity_range.is_set() {
        result.retain(|entry| {
            entry
                .severity()
                .map(|severity| criteria.severity_range.contains(severity))
                .unwrap_or(false)
        });
    }
    let needle = criteria.search_text.trim().to_lowercase();
    if !needle.is_empty() {
        result.retain(|entry| matches_search(entry, &needle, catalog));
    }

    sort_entries(&mut result, criteria.sort_by);
    result.into_iter().cloned().collect()
}

fn matches_search(entry: &LogEntry, needle: &str, catalog: Option<&Catalog>) -> bool {
    if entry
        .notes()
        .map(|notes| notes.to_lowercase().contains(needle))
        .unwrap_or(false)
    {
        return true;
    }
    if entry
        .tags()
        .iter()
        .any(|tag| tag.to_lowercase().contains(needle))
    {
        return true;
    }
    catalog
        .and_then(|catalog| catalog.get(&entry.condition_id))
        .map(|condition| condition.name.to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Stable sort. Entries without a severity sort last in both severity orders.
pub fn sort_entries(entries: &mut [&LogEntry], sort_by: SortBy) {
    match sort_by {
        SortBy::Newest => entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        SortBy::Oldest => entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
        SortBy::SeverityHigh => {
            entries.sort_by(|a, b| compare_severity(a.severity(), b.severity(), true))
        }
        SortBy::SeverityLow => {
            entries.sort_by(|a, b| compare_severity(a.severity(), b.severity(), false))
        }
    }
}

fn compare_severity(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
