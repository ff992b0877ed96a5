use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::{FieldValue, LogData, TAGS_FIELD};

const BUILTIN_CATALOG: &str = include_str!("../assets/catalog.yaml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Duplicate condition id in catalog: {0}")]
    DuplicateId(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingRequired(String),
    #[error("Unknown field for {condition}: {field}")]
    UnknownField { condition: String, field: String },
    #[error("Field {field} expects {expected}")]
    WrongType { field: String, expected: &'static str },
    #[error("Field {field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },
    #[error("Field {field} does not allow option: {value}")]
    InvalidOption { field: String, value: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Time,
    Select,
    Textarea,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FieldSchema {
    /// Convert raw form input (e.g. `severity=7`) into the value this field stores.
    pub fn parse_input(&self, raw: &str) -> Result<FieldValue, ValidationError> {
        let raw = raw.trim();
        let value = match self.field_type {
            FieldType::Number => raw
                .parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|_| self.wrong_type("a number"))?,
            FieldType::Checkbox if self.options.is_none() => match raw.to_lowercase().as_str() {
                "true" | "yes" | "1" => FieldValue::Flag(true),
                "false" | "no" | "0" => FieldValue::Flag(false),
                _ => return Err(self.wrong_type("true or false")),
            },
            FieldType::Checkbox => FieldValue::List(
                raw.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect(),
            ),
            _ => FieldValue::Text(raw.to_string()),
        };
        self.check(&value)?;
        Ok(value)
    }

    /// Check a stored value against this field's type, options and bounds.
    pub fn check(&self, value: &FieldValue) -> Result<(), ValidationError> {
        match (self.field_type, value) {
            (FieldType::Number, FieldValue::Number(number)) => {
                let min = self.min.unwrap_or(f64::NEG_INFINITY);
                let max = self.max.unwrap_or(f64::INFINITY);
                if *number < min || *number > max {
                    return Err(ValidationError::OutOfRange {
                        field: self.name.clone(),
                        min,
                        max,
                    });
                }
                Ok(())
            }
            (FieldType::Number, _) => Err(self.wrong_type("a number")),
            (FieldType::Date, FieldValue::Text(text)) => {
                NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                    .map(|_| ())
                    .map_err(|_| self.wrong_type("a date (YYYY-MM-DD)"))
            }
            (FieldType::Date, _) => Err(self.wrong_type("a date (YYYY-MM-DD)")),
            (FieldType::Time, FieldValue::Text(text)) => {
                if time_pattern().is_match(text.trim()) {
                    Ok(())
                } else {
                    Err(self.wrong_type("a time (HH:MM)"))
                }
            }
            (FieldType::Time, _) => Err(self.wrong_type("a time (HH:MM)")),
            (FieldType::Select, FieldValue::Text(text)) => self.check_option(text),
            (FieldType::Select, _) => Err(self.wrong_type("one of its options")),
            (FieldType::Checkbox, FieldValue::List(items)) if self.options.is_some() => {
                items.iter().try_for_each(|item| self.check_option(item))
            }
            (FieldType::Checkbox, FieldValue::Flag(_)) if self.options.is_none() => Ok(()),
            (FieldType::Checkbox, _) => {
                if self.options.is_some() {
                    Err(self.wrong_type("a list of its options"))
                } else {
                    Err(self.wrong_type("true or false"))
                }
            }
            (FieldType::Text | FieldType::Textarea, FieldValue::Text(_)) => Ok(()),
            (FieldType::Text | FieldType::Textarea, _) => Err(self.wrong_type("text")),
        }
    }

    fn check_option(&self, value: &str) -> Result<(), ValidationError> {
        match &self.options {
            Some(options) if !options.iter().any(|option| option == value) => {
                Err(ValidationError::InvalidOption {
                    field: self.name.clone(),
                    value: value.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn wrong_type(&self, expected: &'static str) -> ValidationError {
        ValidationError::WrongType {
            field: self.name.clone(),
            expected,
        }
    }
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("regex"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingThreshold {
    pub percentage: u8,
    pub criteria: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub rating_thresholds: Vec<RatingThreshold>,
}

impl ConditionDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn criteria_for(&self, percentage: u8) -> Option<&str> {
        self.rating_thresholds
            .iter()
            .find(|threshold| threshold.percentage == percentage)
            .map(|threshold| threshold.criteria.as_str())
    }

    /// Convert numeric text held by `number` fields into numbers, so data
    /// written by older or foreign tools validates.
    pub fn normalize(&self, data: &mut LogData) {
        for field in self.fields.iter().filter(|field| field.field_type == FieldType::Number) {
            let parsed = match data.get(&field.name) {
                Some(FieldValue::Text(text)) => text.trim().parse::<f64>().ok(),
                _ => None,
            };
            if let Some(number) = parsed {
                data.insert(field.name.clone(), FieldValue::Number(number));
            }
        }
    }

    /// Validate a complete `data` mapping: required fields present and every
    /// value typed per its schema.
    pub fn validate(&self, data: &LogData) -> Result<(), ValidationError> {
        for field in self.fields.iter().filter(|field| field.required) {
            match data.get(&field.name) {
                Some(value) if !value.is_empty() => {}
                _ => return Err(ValidationError::MissingRequired(field.name.clone())),
            }
        }
        for (name, value) in data {
            if name == TAGS_FIELD {
                if !matches!(value, FieldValue::List(_)) {
                    return Err(ValidationError::WrongType {
                        field: TAGS_FIELD.to_string(),
                        expected: "a list of tags",
                    });
                }
                continue;
            }
            let Some(schema) = self.field(name) else {
                return Err(ValidationError::UnknownField {
                    condition: self.id.clone(),
                    field: name.clone(),
                });
            };
            if value.is_empty() && !schema.required {
                continue;
            }
            schema.check(value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    conditions: Vec<ConditionDefinition>,
}

impl Catalog {
    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_yaml::from_str(text)?;
        let mut seen = std::collections::HashSet::new();
        for condition in &catalog.conditions {
            if !seen.insert(condition.id.as_str()) {
                return Err(CatalogError::DuplicateId(condition.id.clone()));
            }
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// The catalog compiled into the crate.
    pub fn builtin() -> &'static Catalog {
        static BUILTIN: OnceLock<Catalog> = OnceLock::new();
        BUILTIN.get_or_init(|| Catalog::from_yaml(BUILTIN_CATALOG).expect("bundled catalog"))
    }

    pub fn conditions(&self) -> &[ConditionDefinition] {
        &self.conditions
    }

    pub fn get(&self, id: &str) -> Option<&ConditionDefinition> {
        self.conditions.iter().find(|condition| condition.id == id)
    }

    pub fn name_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|condition| condition.name.as_str()).unwrap_or(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headaches() -> &'static ConditionDefinition {
        Catalog::builtin().get("headaches").expect("headaches")
    }

    fn data(pairs: &[(&str, FieldValue)]) -> LogData {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn builtin_catalog_parses_with_unique_ids() {
        let catalog = Catalog::builtin();
        let ids: Vec<&str> = catalog.conditions().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["headaches", "tinnitus", "back-pain", "ptsd", "sleep-apnea"]
        );
        let severity = headaches().field("severity").expect("severity");
        assert_eq!(severity.field_type, FieldType::Number);
        assert_eq!(severity.max, Some(10.0));
        assert_eq!(headaches().criteria_for(30).map(|c| c.contains("once a month")), Some(true));
    }

    #[test]
    fn normalize_turns_numeric_text_into_numbers() {
        let mut values = data(&[
            ("date", "2024-01-01".into()),
            ("severity", " 7 ".into()),
            ("prostrating", "No".into()),
            ("medication", "200".into()),
        ]);
        headaches().normalize(&mut values);
        assert_eq!(values["severity"], FieldValue::Number(7.0));
        assert_eq!(values["medication"], FieldValue::from("200"));
        assert!(headaches().validate(&values).is_ok());

        let mut words = data(&[("severity", "high".into())]);
        headaches().normalize(&mut words);
        assert_eq!(words["severity"], FieldValue::from("high"));
    }

    #[test]
    fn validate_requires_required_fields() {
        let err = headaches()
            .validate(&data(&[("date", "2024-01-01".into()), ("severity", 5.0.into())]))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingRequired("prostrating".to_string()));
    }

    #[test]
    fn validate_rejects_unknown_and_mistyped_fields() {
        let base = [
            ("date", FieldValue::from("2024-01-01")),
            ("severity", FieldValue::from(5.0)),
            ("prostrating", FieldValue::from("No")),
        ];
        let mut unknown = data(&base);
        unknown.insert("mood".to_string(), "ok".into());
        assert!(matches!(
            headaches().validate(&unknown),
            Err(ValidationError::UnknownField { .. })
        ));

        let mut out_of_range = data(&base);
        out_of_range.insert("severity".to_string(), 11.0.into());
        assert!(matches!(
            headaches().validate(&out_of_range),
            Err(ValidationError::OutOfRange { .. })
        ));

        let mut bad_option = data(&base);
        bad_option.insert("prostrating".to_string(), "Maybe".into());
        assert!(matches!(
            headaches().validate(&bad_option),
            Err(ValidationError::InvalidOption { .. })
        ));

        let mut tagged = data(&base);
        tagged.insert("tags".to_string(), vec!["work".to_string()].into());
        assert!(headaches().validate(&tagged).is_ok());
    }

    #[test]
    fn parse_input_follows_field_type() {
        let condition = headaches();
        let severity = condition.field("severity").expect("severity");
        assert_eq!(severity.parse_input(" 7 ").unwrap(), FieldValue::Number(7.0));
        assert!(severity.parse_input("seven").is_err());

        let symptoms = condition.field("symptoms").expect("symptoms");
        assert_eq!(
            symptoms.parse_input("Nausea, Aura").unwrap(),
            FieldValue::List(vec!["Nausea".to_string(), "Aura".to_string()])
        );

        let time = condition.field("time").expect("time");
        assert!(time.parse_input("14:30").is_ok());
        assert!(time.parse_input("25:00").is_err());

        let radiating = Catalog::builtin()
            .get("back-pain")
            .and_then(|c| c.field("radiating"))
            .expect("radiating");
        assert_eq!(radiating.parse_input("yes").unwrap(), FieldValue::Flag(true));
    }

    #[test]
    fn from_yaml_rejects_duplicate_ids() {
        let yaml = "conditions:\n  - {id: a, name: A, description: x, fields: []}\n  - {id: a, name: B, description: y, fields: []}\n";
        assert!(matches!(
            Catalog::from_yaml(yaml),
            Err(CatalogError::DuplicateId(id)) if id == "a"
        ));
    }
}
