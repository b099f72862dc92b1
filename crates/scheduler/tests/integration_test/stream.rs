use serde_json::json;
use tokio::sync::mpsc;

use tshrag_core::{MdbConfig, MetricEntry, MetricId, Time, Window};
use tshrag_mdb::Mdb;
use tshrag_scheduler::{ingest_stream, MetricAck, MetricBatch};

use crate::helpers::at;

fn batch(key: &str, values: &[i64]) -> MetricBatch {
    MetricBatch {
        key: key.to_string(),
        resources: None,
        entries: values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricEntry::new(at("20240601080000").saturating_add_secs(i as u64), *v))
            .collect(),
    }
}

#[tokio::test]
async fn test_batches_are_acked_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mdb = Mdb::open(dir.path(), &MdbConfig::default()).unwrap();
    let (batch_tx, batch_rx) = mpsc::channel(8);
    let (ack_tx, mut ack_rx) = mpsc::channel(8);
    let ingest = tokio::spawn(ingest_stream(mdb.clone(), batch_rx, ack_tx));

    batch_tx.send(batch("temp", &[40, 41, 42])).await.unwrap();
    batch_tx.send(batch("::", &[1])).await.unwrap();
    batch_tx.send(batch("fan::rpm", &[])).await.unwrap();
    drop(batch_tx);

    let mut acks: Vec<MetricAck> = Vec::new();
    while let Some(ack) = ack_rx.recv().await {
        acks.push(ack);
    }
    assert_eq!(ingest.await.unwrap().unwrap(), 3);

    assert_eq!(acks.iter().map(|a| a.seq).collect::<Vec<_>>(), [1, 2, 3]);
    assert_eq!((acks[0].accepted, acks[0].rejected), (3, 0));
    assert_eq!((acks[1].accepted, acks[1].rejected), (0, 1));
    assert!(acks[1].error.is_some());
    assert_eq!((acks[2].accepted, acks[2].rejected), (0, 0));

    let temp = MetricId::parse("temp").unwrap();
    let stored = mdb.query_entries(&temp, None, &Window::all());
    assert_eq!(stored.iter().map(|e| e.value.clone()).collect::<Vec<_>>(), [json!(40), json!(41), json!(42)]);
    assert_eq!(stored[0].time, at("20240601080000"));
}

#[tokio::test]
async fn test_stream_stops_when_acks_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let mdb = Mdb::open(dir.path(), &MdbConfig::default()).unwrap();
    let (batch_tx, batch_rx) = mpsc::channel(8);
    let (ack_tx, ack_rx) = mpsc::channel(8);
    drop(ack_rx);

    batch_tx.send(batch("temp", &[1])).await.unwrap();
    batch_tx.send(batch("temp", &[2])).await.unwrap();
    let processed = ingest_stream(mdb.clone(), batch_rx, ack_tx).await.unwrap();
    assert_eq!(processed, 1);

    // The first batch was still written before the dropped receiver was seen.
    let temp = MetricId::parse("temp").unwrap();
    assert_eq!(mdb.query_entries(&temp, None, &Window::new(None, Some(Time::max()))).len(), 1);
}

#[test]
fn test_batch_wire_shape() {
    let batch: MetricBatch = serde_json::from_value(json!({
        "key": "temp",
        "resources": ["rig_a"],
        "entries": [{"time": "20240601080000", "value": 40}]
    }))
    .unwrap();
    assert_eq!(batch.entries[0].time, at("20240601080000"));
    assert_eq!(batch.resources.unwrap().len(), 1);

    let minimal: MetricBatch = serde_json::from_value(json!({"key": "temp"})).unwrap();
    assert!(minimal.resources.is_none() && minimal.entries.is_empty());
}
