use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tshrag_core::Time;

/// Severity attached to a rule and carried into its violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleLevel {
    #[default]
    Warning,
    Error,
    Critical,
}

impl fmt::Display for RuleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleLevel::Warning => write!(f, "WARNING"),
            RuleLevel::Error => write!(f, "ERROR"),
            RuleLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl FromStr for RuleLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WARNING" => Ok(RuleLevel::Warning),
            "ERROR" => Ok(RuleLevel::Error),
            "CRITICAL" => Ok(RuleLevel::Critical),
            other => Err(format!("unknown rule level: '{}'", other)),
        }
    }
}

// Levels are accepted in any case.
impl<'de> Deserialize<'de> for RuleLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A declarative check over one metric key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub description: String,
    pub condition: String,
    #[serde(default)]
    pub level: RuleLevel,
}

impl Rule {
    pub fn new(condition: impl Into<String>, level: RuleLevel) -> Self {
        Self {
            description: String::new(),
            condition: condition.into(),
            level,
        }
    }
}

/// A failed rule: the rule itself plus what was evaluated and when.
///
/// `statistic` is empty for per-entry conditions; `when` then lists every
/// offending entry's time. For statistic conditions `when` is the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    #[serde(flatten)]
    pub rule: Rule,
    pub key: String,
    #[serde(default)]
    pub statistic: String,
    #[serde(default)]
    pub when: Vec<Time>,
}
