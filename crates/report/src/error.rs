use thiserror::Error;

use tshrag_core::TshragError;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Malformed rule condition: {0:?}")]
    MalformedRule(String),

    #[error("Unknown statistic: {0:?}")]
    UnknownStatistic(String),

    #[error("Invalid regex in condition {condition:?}: {source}")]
    InvalidPattern {
        condition: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid view: {0}")]
    InvalidView(String),

    #[error("Test not found: {0}")]
    TestNotFound(String),

    #[error(transparent)]
    Core(#[from] TshragError),
}

pub type Result<T> = std::result::Result<T, ReportError>;
