use std::fs;

use tshrag_core::Time;

use crate::helpers::{at, entry_after, make_metric, open_store};

#[test]
fn test_range_returns_exact_subset() {
    let (_dir, mdb) = open_store();
    let id = make_metric(&mdb, "rtt");

    // One entry every 45 seconds for an hour, crossing many minute buckets.
    let all: Vec<_> = (0..80u64).map(|i| entry_after("20240601100000", i * 45, i as i64)).collect();
    for entry in &all {
        assert!(mdb.write(&id, entry));
    }

    let ranges = [
        (at("20240601100000"), at("20240601100000")),
        (at("20240601100130"), at("20240601101500")),
        (at("20240601100001"), at("20240601100044")),
        (at("20240601103000"), Time::max()),
        (Time::min(), at("20240601100059")),
    ];
    for (start, end) in ranges {
        let expected: Vec<_> = all
            .iter()
            .filter(|e| start <= e.time && e.time <= end)
            .cloned()
            .collect();
        assert_eq!(mdb.read(&id, start, end), expected, "range {start}..{end}");
    }
}

#[test]
fn test_out_of_range_buckets_are_not_opened() {
    let (_dir, mdb) = open_store();
    let id = make_metric(&mdb, "rtt");
    mdb.write(&id, &entry_after("20240601100000", 0, 1));
    mdb.write(&id, &entry_after("20240601120000", 0, 2));

    // A bucket outside the range that is not even valid UTF-8 must not matter.
    fs::write(mdb.root().join("rtt/202401010000.jsonl"), [0xff, 0xfe, 0x00]).unwrap();
    // Stray non-bucket files are ignored.
    fs::write(mdb.root().join("rtt/notes.txt"), "hello").unwrap();

    let entries = mdb.read(&id, at("20240601"), at("20240602"));
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_unknown_metric_reads_empty() {
    let (_dir, mdb) = open_store();
    let id = tshrag_core::MetricId::parse("missing").unwrap();
    assert!(mdb.read(&id, Time::min(), Time::max()).is_empty());
}
