use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Key every condition accepts in addition to its declared fields.
pub const TAGS_FIELD: &str = "tags";

/// Impact answers that count as a severe limitation for the rating estimate.
pub const SEVERE_IMPACTS: [&str; 2] = ["Complete inability to function", "Severe limitation"];

/// A single stored form value. Serialized untagged so the on-disk shape is a
/// plain JSON object of field name to value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(value) => value.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(value) => value.trim().is_empty(),
            FieldValue::List(values) => values.is_empty(),
            FieldValue::Flag(_) | FieldValue::Number(_) => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(value) => write!(f, "{}", value),
            FieldValue::Number(value) => write!(f, "{}", value),
            FieldValue::Text(value) => write!(f, "{}", value),
            FieldValue::List(values) => write!(f, "{}", values.join(", ")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

pub type LogData = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub condition_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "data_without_nulls")]
    pub data: LogData,
}

/// `null` values carry nothing, so their keys are dropped on read.
fn data_without_nulls<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LogData, D::Error> {
    let raw = BTreeMap::<String, Option<FieldValue>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect())
}

impl LogEntry {
    pub fn new(condition_id: &str, data: LogData, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: new_entry_id(),
            condition_id: condition_id.to_string(),
            timestamp,
            data,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.data.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_text)
    }

    /// Numeric severity, accepting either a number or numeric text.
    pub fn severity(&self) -> Option<f64> {
        self.field("severity").and_then(FieldValue::as_number)
    }

    pub fn is_prostrating(&self) -> bool {
        self.text("prostrating")
            .map(|value| value.trim() == "Yes")
            .unwrap_or(false)
    }

    pub fn has_severe_impact(&self) -> bool {
        self.text("impact")
            .map(|value| SEVERE_IMPACTS.contains(&value.trim()))
            .unwrap_or(false)
    }

    pub fn notes(&self) -> Option<&str> {
        self.text("notes")
    }

    pub fn tags(&self) -> &[String] {
        match self.field(TAGS_FIELD) {
            Some(FieldValue::List(values)) => values.as_slice(),
            _ => &[],
        }
    }

    /// The logged occurrence date: `data.date` when it parses, otherwise the
    /// UTC calendar date of the creation timestamp.
    pub fn occurrence_date(&self) -> NaiveDate {
        self.text("date")
            .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok())
            .unwrap_or_else(|| self.timestamp.date_naive())
    }
}

pub fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}
