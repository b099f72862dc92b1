//! On-demand aggregates over a metric's entries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tshrag_core::{MetricEntry, Time};

use crate::error::ReportError;

/// Closed set of statistic names a view or rule may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticKind {
    Raw,
    Hist,
    Vtimes,
    Values,
    Cnt,
    Cntval,
    Cntnan,
    Sum,
    Avg,
    Min,
    Max,
}

impl StatisticKind {
    pub const ALL: [StatisticKind; 11] = [
        StatisticKind::Raw,
        StatisticKind::Hist,
        StatisticKind::Vtimes,
        StatisticKind::Values,
        StatisticKind::Cnt,
        StatisticKind::Cntval,
        StatisticKind::Cntnan,
        StatisticKind::Sum,
        StatisticKind::Avg,
        StatisticKind::Min,
        StatisticKind::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKind::Raw => "raw",
            StatisticKind::Hist => "hist",
            StatisticKind::Vtimes => "vtimes",
            StatisticKind::Values => "values",
            StatisticKind::Cnt => "cnt",
            StatisticKind::Cntval => "cntval",
            StatisticKind::Cntnan => "cntnan",
            StatisticKind::Sum => "sum",
            StatisticKind::Avg => "avg",
            StatisticKind::Min => "min",
            StatisticKind::Max => "max",
        }
    }
}

impl fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatisticKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        StatisticKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| ReportError::UnknownStatistic(s.to_string()))
    }
}

/// Numeric reading of a raw value: JSON numbers, and strings that parse as
/// a finite or infinite float. Booleans, null and containers are not numeric.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
        _ => None,
    }
}

/// Text reading of a raw value, used for histograms and regex matching.
pub fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Aggregates over `(time, value)` pairs. Numeric aggregates are `None` when
/// no value is numeric.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistic {
    pub raw: Vec<(Time, Value)>,
    pub hist: BTreeMap<String, usize>,
    pub vtimes: Vec<Time>,
    pub values: Vec<f64>,
    pub cnt: usize,
    pub cntval: usize,
    pub cntnan: usize,
    pub sum: Option<f64>,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Statistic {
    pub fn compute(raw: Vec<(Time, Value)>) -> Self {
        let mut hist = BTreeMap::new();
        let mut vtimes = Vec::new();
        let mut values = Vec::new();

        for (time, value) in &raw {
            *hist.entry(text(value)).or_insert(0) += 1;
            if let Some(v) = numeric(value) {
                vtimes.push(*time);
                values.push(v);
            }
        }

        let cnt = raw.len();
        let cntval = values.len();
        let (sum, avg, min, max) = if values.is_empty() {
            (None, None, None, None)
        } else {
            let sum: f64 = values.iter().sum();
            (
                Some(sum),
                Some(sum / cntval as f64),
                values.iter().copied().reduce(f64::min),
                values.iter().copied().reduce(f64::max),
            )
        };

        Self {
            raw,
            hist,
            vtimes,
            values,
            cnt,
            cntval,
            cntnan: cnt - cntval,
            sum,
            avg,
            min,
            max,
        }
    }

    pub fn from_entries(entries: &[MetricEntry]) -> Self {
        Self::compute(entries.iter().map(|e| (e.time, e.value.clone())).collect())
    }

    /// One field rendered as JSON.
    pub fn value(&self, kind: StatisticKind) -> Value {
        match kind {
            StatisticKind::Raw => json(&self.raw),
            StatisticKind::Hist => json(&self.hist),
            StatisticKind::Vtimes => json(&self.vtimes),
            StatisticKind::Values => json(&self.values),
            StatisticKind::Cnt => Value::from(self.cnt),
            StatisticKind::Cntval => Value::from(self.cntval),
            StatisticKind::Cntnan => Value::from(self.cntnan),
            StatisticKind::Sum => number(self.sum),
            StatisticKind::Avg => number(self.avg),
            StatisticKind::Min => number(self.min),
            StatisticKind::Max => number(self.max),
        }
    }
}

fn number(v: Option<f64>) -> Value {
    v.and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn json<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}
