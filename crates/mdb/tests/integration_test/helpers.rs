use tempfile::TempDir;

use tshrag_core::{MdbConfig, Metric, MetricEntry, MetricId, Time};
use tshrag_mdb::Mdb;

/// Open a store in a fresh temp directory. Keep the guard alive for the test.
pub fn open_store() -> (TempDir, Mdb) {
    let dir = tempfile::tempdir().unwrap();
    let mdb = Mdb::open(dir.path().join("metric.db"), &MdbConfig::default()).unwrap();
    (dir, mdb)
}

/// Create a metric and return its id.
pub fn make_metric(mdb: &Mdb, raw: &str) -> MetricId {
    let id = MetricId::parse(raw).unwrap();
    assert!(mdb.create(&Metric::new(id.clone())));
    id
}

pub fn at(raw: &str) -> Time {
    Time::parse(raw).unwrap()
}

/// Entry `secs` seconds after `base` carrying `value`.
pub fn entry_after(base: &str, secs: u64, value: i64) -> MetricEntry {
    MetricEntry::new(at(base).saturating_add_secs(secs), value)
}
