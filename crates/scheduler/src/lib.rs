//! Test scheduling and execution for tshrag.
//!
//! This crate provides:
//! - The [`Tshrag`] scheduler: file-backed test/job records, admission
//!   control over exclusive resources, and worker supervision
//! - Distribution/execution drivers running step sequences per machine
//! - A metric/report facade over each test's metric store
//! - Streaming metric ingestion over a tokio channel

pub mod driver;
pub mod error;
pub mod runner;
pub mod service;
pub mod stream;
pub mod test_main;

pub use driver::{Sequencer, Stage, StepHandler, StepSequencer};
pub use error::SchedulerError;
pub use runner::{TestMain, TestPlan, Tshrag};
pub use stream::{ingest_stream, MetricAck, MetricBatch};
pub use test_main::default_test_main;
