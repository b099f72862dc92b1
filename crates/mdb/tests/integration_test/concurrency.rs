use std::thread;

use tshrag_core::Time;

use crate::helpers::{entry_after, make_metric, open_store};

#[test]
fn test_parallel_writers_lose_nothing() {
    let (_dir, mdb) = open_store();
    let id = make_metric(&mdb, "load");

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let mdb = mdb.clone();
            let id = id.clone();
            thread::spawn(move || {
                for i in 0..25u64 {
                    let value = worker * 100 + i as i64;
                    assert!(mdb.write(&id, &entry_after("20240601", i, value)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = mdb.read(&id, Time::min(), Time::max());
    assert_eq!(entries.len(), 100);
    assert!(entries.windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn test_concurrent_create_has_one_winner() {
    let (_dir, mdb) = open_store();
    let metric = tshrag_core::Metric::new(tshrag_core::MetricId::parse("race").unwrap());

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let mdb = mdb.clone();
            let metric = metric.clone();
            thread::spawn(move || mdb.create(&metric))
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|created| *created)
        .count();
    assert_eq!(winners, 1);
}
