use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ReportError, Result};
use crate::schema::Rule;

/// Declarative report layout, usually taken from `Profile.reporting`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct View {
    #[serde(default)]
    pub sections: Vec<ViewSection>,
}

impl View {
    /// Interpret a profile's reporting document. `null` is an empty view.
    pub fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|e| ReportError::InvalidView(e.to_string()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| ReportError::InvalidView(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewSection {
    #[serde(default)]
    pub name: String,
    pub items: Vec<ViewItem>,
}

/// A metric to report: which statistics to show and which rules to check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewEntry {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub statistics: Vec<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Sections carry `items`, entries carry `key`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ViewItem {
    Section(ViewSection),
    Entry(ViewEntry),
}

impl<'de> Deserialize<'de> for ViewItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        super::deserialize_item(deserializer, ViewItem::Section, ViewItem::Entry)
    }
}
