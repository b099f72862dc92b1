use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use tshrag_core::{DutId, Job, Profile, TestId, Time};

use crate::schema::RuleViolation;

/// Rendered [`ViewEntry`](crate::schema::ViewEntry).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportEntry {
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
    pub violations: Vec<RuleViolation>,
    /// Statistic name to value.
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportSection {
    #[serde(default)]
    pub name: String,
    pub items: Vec<ReportItem>,
}

/// Same shape as the view item it was rendered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportItem {
    Section(ReportSection),
    Entry(ReportEntry),
}

impl<'de> Deserialize<'de> for ReportItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        super::deserialize_item(deserializer, ReportItem::Section, ReportItem::Entry)
    }
}

/// Report of one test over an evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: TestId,
    pub profile: Profile,
    pub start_time: Time,
    pub end_time: Time,
    pub machine: BTreeSet<DutId>,
    pub device: BTreeSet<DutId>,
    pub env: BTreeMap<String, String>,
    pub jobs: Vec<Job>,
    pub sections: Vec<ReportSection>,
}

impl Report {
    /// Every violation in the report, depth-first.
    pub fn violations(&self) -> Vec<&RuleViolation> {
        fn walk<'a>(items: &'a [ReportItem], out: &mut Vec<&'a RuleViolation>) {
            for item in items {
                match item {
                    ReportItem::Section(section) => walk(&section.items, out),
                    ReportItem::Entry(entry) => out.extend(entry.violations.iter()),
                }
            }
        }
        let mut out = Vec::new();
        for section in &self.sections {
            walk(&section.items, &mut out);
        }
        out
    }
}
