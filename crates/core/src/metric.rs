use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{DutId, MetricId};
use crate::time::Time;

/// Metadata of one time series, stored once per metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: MetricId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    /// Resources that qualify the series; `id` is the key followed by them.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub resources: BTreeSet<DutId>,
}

impl Metric {
    pub fn new(id: MetricId) -> Self {
        let name = id.to_string();
        Self {
            id,
            name,
            kind: String::new(),
            description: String::new(),
            resources: BTreeSet::new(),
        }
    }
}

/// One immutable sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub time: Time,
    pub value: Value,
}

impl MetricEntry {
    pub fn new(time: Time, value: impl Into<Value>) -> Self {
        Self {
            time,
            value: value.into(),
        }
    }
}
