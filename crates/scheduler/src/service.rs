//! Metric and report operations addressed by test id.
//!
//! Each test owns one metric store; these wrappers resolve it and forward
//! to the store and the report renderer. A missing test is
//! `ReportError::TestNotFound`.

use std::collections::BTreeSet;

use serde_json::Value;

use tshrag_core::{DutId, Metric, MetricEntry, MetricId, MetricIdPattern, Test, TestId, Window};
use tshrag_mdb::{metric_id_for, Mdb};
use tshrag_report::{query_statistic, render_report, Report, ReportError, StatisticKind};

use crate::error::Result;
use crate::runner::Tshrag;

impl Tshrag {
    fn existing_test(&self, test_id: &TestId) -> Result<Test> {
        self.query_test(test_id)
            .ok_or_else(|| ReportError::TestNotFound(test_id.to_string()).into())
    }

    /// The metric store of a test.
    pub fn open_mdb(&self, test_id: &TestId) -> Result<Mdb> {
        let test = self.existing_test(test_id)?;
        Ok(Mdb::open(&test.mdb, self.mdb_config())?)
    }

    pub fn list_metric_info(&self, test_id: &TestId, pattern: &MetricIdPattern) -> Result<Vec<Metric>> {
        Ok(self.open_mdb(test_id)?.list(pattern))
    }

    /// Metadata of the series `key` qualified by `resources`.
    pub fn query_metric_info(
        &self,
        test_id: &TestId,
        key: &str,
        resources: Option<&BTreeSet<DutId>>,
    ) -> Result<Option<Metric>> {
        let key = MetricId::parse(key)?;
        Ok(self.open_mdb(test_id)?.get(&metric_id_for(&key, resources)))
    }

    /// Create or overwrite a metric's metadata.
    pub fn update_metric_info(&self, test_id: &TestId, metric: &Metric) -> Result<bool> {
        Ok(self.open_mdb(test_id)?.update(metric))
    }

    /// Entries of `key` in `window` (everything when unset), sorted by time.
    pub fn query_metric_entry(
        &self,
        test_id: &TestId,
        key: &str,
        resources: Option<&BTreeSet<DutId>>,
        window: Option<Window>,
    ) -> Result<Vec<MetricEntry>> {
        let key = MetricId::parse(key)?;
        let window = window.unwrap_or_else(Window::all);
        Ok(self.open_mdb(test_id)?.query_entries(&key, resources, &window))
    }

    pub fn add_metric_entry(
        &self,
        test_id: &TestId,
        key: &str,
        entry: &MetricEntry,
        resources: Option<&BTreeSet<DutId>>,
    ) -> Result<bool> {
        let key = MetricId::parse(key)?;
        Ok(self.open_mdb(test_id)?.add_entry(&key, resources, entry))
    }

    /// One statistic of `key` in `window` (everything when unset).
    pub fn query_metric_statistic(
        &self,
        test_id: &TestId,
        key: &str,
        statistic: &str,
        resources: Option<&BTreeSet<DutId>>,
        window: Option<Window>,
    ) -> Result<Value> {
        let kind: StatisticKind = statistic.parse()?;
        let mdb = self.open_mdb(test_id)?;
        let window = window.unwrap_or_else(Window::all);
        Ok(query_statistic(&mdb, key, resources, &window)?.value(kind))
    }

    /// Render the report of a test over `window`, defaulting to the test's
    /// own window.
    pub fn report_test(&self, test_id: &TestId, window: Option<Window>) -> Result<Report> {
        let test = self.existing_test(test_id)?;
        let mdb = Mdb::open(&test.mdb, self.mdb_config())?;
        let jobs = self.query_jobs(&test);
        Ok(render_report(&test, jobs, &mdb, window)?)
    }
}
