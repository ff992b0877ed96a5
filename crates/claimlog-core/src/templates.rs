use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::catalog::ConditionDefinition;
use crate::entry::LogData;

const BUILTIN_TEMPLATES: &str = include_str!("../assets/templates.yaml");

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Mild,
    Moderate,
    Severe,
}

impl FromStr for SeverityTier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mild" => Ok(SeverityTier::Mild),
            "moderate" => Ok(SeverityTier::Moderate),
            "severe" => Ok(SeverityTier::Severe),
            other => Err(format!("unknown template tier '{}' (expected mild, moderate, severe)", other)),
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeverityTier::Mild => "mild",
            SeverityTier::Moderate => "moderate",
            SeverityTier::Severe => "severe",
        };
        f.write_str(name)
    }
}

/// Partial log data used to prefill the logging form, keyed by condition id
/// and severity tier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Templates {
    by_condition: BTreeMap<String, BTreeMap<SeverityTier, LogData>>,
}

impl Templates {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn builtin() -> &'static Templates {
        static BUILTIN: OnceLock<Templates> = OnceLock::new();
        BUILTIN.get_or_init(|| Templates::from_yaml(BUILTIN_TEMPLATES).expect("bundled templates"))
    }

    pub fn prefill(&self, condition_id: &str, tier: SeverityTier) -> Option<&LogData> {
        self.by_condition.get(condition_id)?.get(&tier)
    }

    /// Template values that fit `condition` as it is currently defined. Fields
    /// the condition does not declare, or whose value it would reject, are left
    /// out so a replaced catalog never receives invalid prefill.
    pub fn prefill_for(&self, condition: &ConditionDefinition, tier: SeverityTier) -> Option<LogData> {
        let template = self.prefill(&condition.id, tier)?;
        Some(
            template
                .iter()
                .filter(|(name, value)| {
                    condition
                        .field(name)
                        .map(|field| field.check(value).is_ok())
                        .unwrap_or(false)
                })
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn tiers(&self, condition_id: &str) -> Vec<SeverityTier> {
        self.by_condition
            .get(condition_id)
            .map(|tiers| tiers.keys().copied().collect())
            .unwrap_or_default()
    }
}
