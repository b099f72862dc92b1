use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TshragError;
use crate::time::{Time, Window};

/// Lifecycle state shared by tests and jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    #[default]
    Pending,
    Preparing,
    Running,
    Completed,
    Crashed,
    Cancelled,
}

impl RunStatus {
    /// Terminal states are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Crashed | Self::Cancelled)
    }

    /// States in which a test holds its resources.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Preparing | Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Preparing => "PREPARING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Crashed => "CRASHED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = TshragError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PREPARING" => Ok(Self::Preparing),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "CRASHED" => Ok(Self::Crashed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(TshragError::Other(format!("unknown run status: {s}"))),
        }
    }
}

/// Status plus time bounds. Unset bounds are `MIN`/`MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default = "Time::min")]
    pub start_time: Time,
    #[serde(default = "Time::max")]
    pub end_time: Time,
}

impl Default for Run {
    fn default() -> Self {
        Self {
            status: RunStatus::Pending,
            start_time: Time::min(),
            end_time: Time::max(),
        }
    }
}

impl Run {
    pub fn new(start_time: Time, end_time: Time) -> Self {
        Self {
            status: RunStatus::Pending,
            start_time,
            end_time,
        }
    }

    pub fn window(&self) -> Window {
        Window {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Strict overlap: `end_time > window.start && start_time < window.end`.
    pub fn overlaps(&self, window: &Window) -> bool {
        self.end_time > window.start && self.start_time < window.end
    }

    /// True while `start_time < now < end_time`.
    pub fn is_open_at(&self, now: &Time) -> bool {
        self.start_time < *now && *now < self.end_time
    }
}
