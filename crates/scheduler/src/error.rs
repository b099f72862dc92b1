use thiserror::Error;

use tshrag_core::TshragError;
use tshrag_report::ReportError;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Core(#[from] TshragError),

    #[error(transparent)]
    Report(#[from] ReportError),

    /// The persisted status of the test turned CANCELLED while it ran.
    #[error("Test cancelled: {0}")]
    Cancelled(String),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Failed to spawn {what}: {source}")]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Step failed: {0}")]
    Step(String),
}

impl SchedulerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SchedulerError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
