//! Resource-qualified metric access.
//!
//! A job reports a metric by `key` plus the resources it ran on. The stored
//! id is the key's segments followed by the sorted resource ids, so the same
//! key on different rigs lands in separate series. Each series records its
//! qualifiers, so a lookup without a resource set merges exactly the series
//! of that key and never a longer key such as `key::sub`.

use std::collections::BTreeSet;

use tracing::debug;

use tshrag_core::{DutId, Metric, MetricEntry, MetricId, MetricIdPattern, Window};

use crate::store::Mdb;

/// Stored id for `key` reported against `resources`.
pub fn metric_id_for(key: &MetricId, resources: Option<&BTreeSet<DutId>>) -> MetricId {
    match resources {
        Some(resources) => key.join(resources.iter().map(DutId::as_str)),
        None => key.clone(),
    }
}

/// Whether `metric` is `key` qualified by the resources it recorded.
fn is_series_of(metric: &Metric, key: &MetricId) -> bool {
    metric.id == metric_id_for(key, Some(&metric.resources))
}

/// Fresh metadata for a series, named after its key.
fn new_series(key: &MetricId, resources: Option<&BTreeSet<DutId>>) -> Metric {
    let mut metric = Metric::new(metric_id_for(key, resources));
    metric.name = key.to_string();
    metric.resources = resources.cloned().unwrap_or_default();
    metric
}

impl Mdb {
    /// Metrics addressed by `key`: the exact qualified series when
    /// `resources` is given, else every series of `key` whatever its
    /// qualifiers.
    pub fn metrics_for(&self, key: &MetricId, resources: Option<&BTreeSet<DutId>>) -> Vec<Metric> {
        match resources {
            Some(_) => self
                .get(&metric_id_for(key, resources))
                .into_iter()
                .collect(),
            None => self
                .list(&MetricIdPattern::all())
                .into_iter()
                .filter(|m| m.id.starts_with(key) && is_series_of(m, key))
                .collect(),
        }
    }

    /// Entries under `key` within `window`, merged across series and sorted
    /// by time.
    pub fn query_entries(
        &self,
        key: &MetricId,
        resources: Option<&BTreeSet<DutId>>,
        window: &Window,
    ) -> Vec<MetricEntry> {
        let metrics = self.metrics_for(key, resources);
        let mut entries: Vec<MetricEntry> = metrics
            .iter()
            .flat_map(|m| self.read(&m.id, window.start, window.end))
            .collect();
        entries.sort_by(|a, b| a.time.cmp(&b.time));
        debug!(key = %key, series = metrics.len(), results = entries.len(), "Query completed");
        entries
    }

    /// Append an entry, creating the series (named after `key`) if missing.
    pub fn add_entry(
        &self,
        key: &MetricId,
        resources: Option<&BTreeSet<DutId>>,
        entry: &MetricEntry,
    ) -> bool {
        let id = metric_id_for(key, resources);
        if self.get(&id).is_none() {
            let metric = new_series(key, resources);
            // Losing a creation race is fine; the series exists either way.
            self.create(&metric);
        }
        self.write(&id, entry)
    }

    /// Create or overwrite the metadata of the series `key`/`resources`.
    pub fn update_info(
        &self,
        key: &MetricId,
        resources: Option<&BTreeSet<DutId>>,
        name: Option<&str>,
        kind: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        let id = metric_id_for(key, resources);
        let mut metric = self.get(&id).unwrap_or_else(|| new_series(key, resources));
        if let Some(name) = name {
            metric.name = name.to_string();
        }
        if let Some(kind) = kind {
            metric.kind = kind.to_string();
        }
        if let Some(description) = description {
            metric.description = description.to_string();
        }
        self.update(&metric)
    }
}
