pub mod config;
pub mod error;
pub mod id;
pub mod job;
pub mod lock;
pub mod metric;
pub mod profile;
pub mod run;
pub mod time;

pub use config::{Config, MdbConfig, SchedulerConfig};
pub use error::*;
pub use id::*;
pub use job::Job;
pub use lock::ScopedLock;
pub use metric::{Metric, MetricEntry};
pub use profile::Profile;
pub use run::{Run, RunStatus};
pub use test::Test;
pub use time::{Time, Window};
