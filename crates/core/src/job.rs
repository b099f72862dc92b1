use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::id::{DutId, JobId, TestId};
use crate::run::Run;

/// One subprocess launched on behalf of a test.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub test_id: TestId,
    #[serde(flatten)]
    pub run: Run,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<DutId>,
    #[serde(default)]
    pub device: BTreeSet<DutId>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub retcode: Option<i32>,
}

impl Job {
    pub fn new(id: JobId, test_id: TestId) -> Self {
        Self {
            id,
            test_id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunStatus;
    use crate::time::Time;

    #[test]
    fn fresh_job_is_pending_and_unbounded() {
        let job = Job::new(JobId::new("j"), TestId::new("t"));
        assert_eq!(job.run.status, RunStatus::Pending);
        assert_eq!(job.run.start_time, Time::min());
        assert_eq!(job.run.end_time, Time::max());
        assert!(job.pid.is_none() && job.retcode.is_none());
    }

    #[test]
    fn crashed_launch_serializes_null_pid() {
        let mut job = Job::new(JobId::new("j"), TestId::new("t"));
        job.run.status = RunStatus::Crashed;
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "CRASHED");
        assert!(json["pid"].is_null());
        assert!(json["retcode"].is_null());
    }
}
