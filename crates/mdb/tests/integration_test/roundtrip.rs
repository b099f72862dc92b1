use serde_json::json;

use tshrag_core::{MetricEntry, Time};
use tshrag_mdb::Mdb;

use crate::helpers::{at, entry_after, make_metric, open_store};

#[test]
fn test_shuffled_writes_read_back_sorted() {
    let (_dir, mdb) = open_store();
    let id = make_metric(&mdb, "power::draw");

    // Spread over several hours so writes land in many buckets.
    let offsets = [7200u64, 5, 3600, 0, 7201, 60, 3599];
    for (i, secs) in offsets.iter().enumerate() {
        assert!(mdb.write(&id, &entry_after("20240601", *secs, i as i64)));
    }

    let entries = mdb.read(&id, Time::min(), Time::max());
    assert_eq!(entries.len(), offsets.len());
    assert!(entries.windows(2).all(|w| w[0].time <= w[1].time));

    let mut expected = offsets.to_vec();
    expected.sort();
    let times: Vec<Time> = entries.iter().map(|e| e.time).collect();
    let expected_times: Vec<Time> = expected
        .iter()
        .map(|s| at("20240601").saturating_add_secs(*s))
        .collect();
    assert_eq!(times, expected_times);
}

#[test]
fn test_string_and_numeric_values_survive() {
    let (_dir, mdb) = open_store();
    let id = make_metric(&mdb, "status");

    let values = [json!(1.25), json!("OK"), json!(true), json!(null), json!(-3)];
    for (i, value) in values.iter().enumerate() {
        let entry = MetricEntry::new(at("20240601").saturating_add_secs(i as u64), value.clone());
        assert!(mdb.write(&id, &entry));
    }

    let read: Vec<_> = mdb
        .read(&id, Time::min(), Time::max())
        .into_iter()
        .map(|e| e.value)
        .collect();
    assert_eq!(read, values);
}

#[test]
fn test_reopen_sees_previous_writes() {
    let (dir, mdb) = open_store();
    let id = make_metric(&mdb, "uptime");
    mdb.write(&id, &entry_after("20240601", 0, 1));
    drop(mdb);

    let reopened = Mdb::open(dir.path().join("metric.db"), &Default::default()).unwrap();
    assert_eq!(reopened.read(&id, Time::min(), Time::max()).len(), 1);
    assert!(reopened.get(&id).is_some());
}

#[test]
fn test_equal_timestamps_keep_append_order() {
    let (_dir, mdb) = open_store();
    let id = make_metric(&mdb, "burst");
    for value in 0..4 {
        mdb.write(&id, &entry_after("20240601", 0, value));
    }
    let read: Vec<_> = mdb
        .read(&id, Time::min(), Time::max())
        .into_iter()
        .map(|e| e.value)
        .collect();
    assert_eq!(read, [json!(0), json!(1), json!(2), json!(3)]);
}
