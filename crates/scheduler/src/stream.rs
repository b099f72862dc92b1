//! Streaming metric ingestion.
//!
//! High-rate telemetry arrives as a sequence of batches on one channel.
//! Every batch is appended to the store and answered with its own ack, in
//! arrival order.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tshrag_core::{DutId, MetricEntry, MetricId};
use tshrag_mdb::Mdb;

use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBatch {
    pub key: String,
    #[serde(default)]
    pub resources: Option<BTreeSet<DutId>>,
    #[serde(default)]
    pub entries: Vec<MetricEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricAck {
    /// 1-based position of the batch in the stream.
    pub seq: u64,
    pub key: String,
    pub accepted: usize,
    pub rejected: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn apply_batch(mdb: &Mdb, seq: u64, batch: MetricBatch) -> MetricAck {
    let key = match MetricId::parse(&batch.key) {
        Ok(key) => key,
        Err(e) => {
            warn!(seq, key = %batch.key, error = %e, "Batch rejected");
            return MetricAck {
                seq,
                key: batch.key,
                accepted: 0,
                rejected: batch.entries.len(),
                error: Some(e.to_string()),
            };
        }
    };

    let resources = batch.resources.as_ref();
    let accepted = batch
        .entries
        .iter()
        .filter(|entry| mdb.add_entry(&key, resources, entry))
        .count();
    MetricAck {
        seq,
        key: batch.key,
        accepted,
        rejected: batch.entries.len() - accepted,
        error: None,
    }
}

/// Drain `rx` into `mdb`, acknowledging each batch on `tx`.
///
/// Ends when `rx` closes or the ack receiver goes away. Returns the number
/// of batches processed.
pub async fn ingest_stream(
    mdb: Mdb,
    mut rx: mpsc::Receiver<MetricBatch>,
    tx: mpsc::Sender<MetricAck>,
) -> Result<u64> {
    let mut seq = 0u64;
    while let Some(batch) = rx.recv().await {
        seq += 1;
        let store = mdb.clone();
        let ack = tokio::task::spawn_blocking(move || apply_batch(&store, seq, batch))
            .await
            .map_err(|e| SchedulerError::Step(format!("ingest worker failed: {e}")))?;
        debug!(seq, key = %ack.key, accepted = ack.accepted, rejected = ack.rejected, "Batch ingested");
        if tx.send(ack).await.is_err() {
            warn!(seq, "Ack receiver dropped, stopping ingestion");
            break;
        }
    }
    info!(batches = seq, root = %mdb.root().display(), "Ingestion stream closed");
    Ok(seq)
}
