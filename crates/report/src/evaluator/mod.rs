//! Rule evaluation and statistic lookup against a metric store.
//!
//! Every evaluation reads the entries of one metric key within a window,
//! merged across all resource-qualified series stored under that key.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use tshrag_core::{DutId, MetricId, Window};
use tshrag_mdb::Mdb;

use crate::condition::Condition;
use crate::error::Result;
use crate::schema::{Rule, RuleViolation};
use crate::statistic::{Statistic, StatisticKind};


/// Statistic of `key` (optionally restricted to `resources`) over `window`.
pub fn query_statistic(
    mdb: &Mdb,
    key: &str,
    resources: Option<&BTreeSet<DutId>>,
    window: &Window,
) -> Result<Statistic> {
    let id = MetricId::parse(key)?;
    let entries = mdb.query_entries(&id, resources, window);
    Ok(Statistic::from_entries(&entries))
}

/// Violations of `rule` for `key` over `window`.
///
/// Per-entry conditions yield at most one violation listing every offending
/// entry's time. Statistic conditions yield one violation spanning the window
/// when the comparison fails; values that cannot be compared yield none.
/// Directives are accepted and currently check nothing.
pub fn evaluate_rule(mdb: &Mdb, key: &str, rule: &Rule, window: &Window) -> Result<Vec<RuleViolation>> {
    let condition = Condition::parse(&rule.condition)?;
    let violation = |statistic: &str, when| RuleViolation {
        rule: rule.clone(),
        key: key.to_string(),
        statistic: statistic.to_string(),
        when,
    };

    let violations = match condition {
        Condition::Entry(comparison) => {
            let id = MetricId::parse(key)?;
            let when: Vec<_> = mdb
                .query_entries(&id, None, window)
                .into_iter()
                .filter(|entry| comparison.test(&entry.value).unwrap_or(false))
                .map(|entry| entry.time)
                .collect();
            if when.is_empty() {
                Vec::new()
            } else {
                vec![violation("", when)]
            }
        }
        Condition::Statistic { kind, comparison } => {
            let statistic = query_statistic(mdb, key, None, window)?;
            match comparison.test(&statistic.value(kind)) {
                Some(false) => vec![violation(kind.as_str(), vec![window.start, window.end])],
                Some(true) => Vec::new(),
                None => {
                    debug!(key, statistic = %kind, condition = %rule.condition, "Statistic not comparable");
                    Vec::new()
                }
            }
        }
        Condition::Directive { name, args } => {
            debug!(key, directive = %name, args = ?args, "Directive has no checks");
            Vec::new()
        }
    };

    Ok(violations)
}

/// Requested statistics of `key` over `window`, deduplicated by name.
pub fn render_report_data(
    mdb: &Mdb,
    key: &str,
    statistics: &[String],
    window: &Window,
) -> Result<BTreeMap<String, Value>> {
    let kinds = statistics
        .iter()
        .map(|name| name.parse::<StatisticKind>())
        .collect::<Result<BTreeSet<_>>>()?;
    if kinds.is_empty() {
        return Ok(BTreeMap::new());
    }

    let statistic = query_statistic(mdb, key, None, window)?;
    Ok(kinds
        .into_iter()
        .map(|kind| (kind.to_string(), statistic.value(kind)))
        .collect())
}
