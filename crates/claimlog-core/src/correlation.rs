use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::entry::LogEntry;

pub const TOP_PAIRS: usize = 5;
pub const RECENT_DAYS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionPair {
    pub first: String,
    pub second: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiConditionDay {
    pub date: NaiveDate,
    pub condition_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationReport {
    pub pairs: Vec<ConditionPair>,
    pub days: Vec<MultiConditionDay>,
}

/// Conditions logged on the same calendar day (UTC date of the timestamp).
///
/// Each unordered pair counts once per day. Pairs are ordered by count, then
/// by ids; days newest first.
pub fn analyze(entries: &[LogEntry]) -> CorrelationReport {
    let mut by_day: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    for entry in entries {
        by_day
            .entry(entry.timestamp.date_naive())
            .or_default()
            .insert(entry.condition_id.as_str());
    }

    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    let mut days = Vec::new();
    for (date, conditions) in by_day.iter().rev() {
        if conditions.len() < 2 {
            continue;
        }
        let ids: Vec<&str> = conditions.iter().copied().collect();
        for (idx, first) in ids.iter().enumerate() {
            for second in &ids[idx + 1..] {
                *counts.entry((*first, *second)).or_insert(0) += 1;
            }
        }
        days.push(MultiConditionDay {
            date: *date,
            condition_ids: ids.iter().map(|id| id.to_string()).collect(),
        });
    }
    days.truncate(RECENT_DAYS);

    let mut pairs: Vec<ConditionPair> = counts
        .into_iter()
        .map(|((first, second), count)| ConditionPair {
            first: first.to_string(),
            second: second.to_string(),
            count,
        })
        .collect();
    pairs.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.first.cmp(&b.first))
            .then_with(|| a.second.cmp(&b.second))
    });
    pairs.truncate(TOP_PAIRS);

    CorrelationReport { pairs, days }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogData;
    use crate::seed::bundled_seed;
    use chrono::{Duration, TimeZone, Utc};

    fn at(condition: &str, day: i64, hour: u32) -> LogEntry {
        let timestamp = Utc.with_ymd_and_hms(2024, 4, 1, hour, 0, 0).unwrap() + Duration::days(day);
        LogEntry::new(condition, LogData::new(), timestamp)
    }

    #[test]
    fn two_conditions_same_day_make_one_pair() {
        let report = analyze(&[at("tinnitus", 0, 8), at("headaches", 0, 20)]);
        assert_eq!(
            report.pairs,
            vec![ConditionPair {
                first: "headaches".to_string(),
                second: "tinnitus".to_string(),
                count: 1,
            }]
        );
        assert_eq!(report.days.len(), 1);
        assert_eq!(report.days[0].condition_ids, vec!["headaches", "tinnitus"]);
    }

    #[test]
    fn repeated_condition_on_one_day_is_not_a_pair() {
        let report = analyze(&[at("headaches", 0, 8), at("headaches", 0, 20), at("ptsd", 1, 9)]);
        assert_eq!(report, CorrelationReport::default());
    }

    #[test]
    fn pairs_are_ranked_and_capped() {
        let mut entries = Vec::new();
        let conditions = ["a", "b", "c", "d"];
        for day in 0..12 {
            for condition in &conditions {
                entries.push(at(condition, day, 10));
            }
        }
        entries.push(at("a", 20, 10));
        entries.push(at("b", 20, 11));
        let report = analyze(&entries);
        assert_eq!(report.pairs.len(), TOP_PAIRS);
        assert_eq!(report.pairs[0].count, 13);
        assert_eq!((report.pairs[0].first.as_str(), report.pairs[0].second.as_str()), ("a", "b"));
        assert!(report.pairs[1..].iter().all(|pair| pair.count == 12));
        assert_eq!(report.days.len(), RECENT_DAYS);
        assert_eq!(report.days[0].condition_ids, vec!["a", "b"]);
    }

    #[test]
    fn seed_has_three_co_occurring_days() {
        let report = analyze(&bundled_seed());
        assert_eq!(report.days.len(), 3);
        assert_eq!(report.pairs.len(), 3);
        assert!(report.pairs.iter().all(|pair| pair.count == 1));
        assert_eq!(report.days[0].date, NaiveDate::from_ymd_opt(2024, 6, 21).unwrap());
    }
}
