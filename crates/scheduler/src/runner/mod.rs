//! Scheduler runner: file-backed records, admission control and worker
//! supervision.
//!
//! Split into focused submodules:
//! - `core`: the `Tshrag` struct, on-disk paths, locks and scoped
//!   read-modify-write of test/job records
//! - `records`: creating and querying tests and jobs
//! - `scheduling`: rescheduling, cancellation and the `refresh` admission tick
//! - `execution`: starting and supervising worker threads

mod core;
mod execution;
mod records;
mod scheduling;

pub use self::core::{TestMain, Tshrag};
pub use self::records::TestPlan;
