use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use tracing::{debug, info};
use uuid::Uuid;

use tshrag_core::{DutId, Job, JobId, Profile, Run, Test, TestId, Time, TshragError};
use tshrag_mdb::Mdb;

use super::core::{Tshrag, FILE_METRIC, FILE_TEST, PATH_JOBS, RECORD_EXTENSION};
use crate::error::{Result, SchedulerError};

/// Scheduling request for [`Tshrag::create_test`].
///
/// An unset start means now. An unset end is derived from the duration
/// (the plan's, else the profile's) and is `MAX` without one.
#[derive(Debug, Clone, Default)]
pub struct TestPlan {
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub duration: Option<u64>,
    pub machine: BTreeSet<DutId>,
    pub device: BTreeSet<DutId>,
    pub env: BTreeMap<String, String>,
}

impl TestPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(mut self, start: Option<Time>, end: Option<Time>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn duration(mut self, secs: u64) -> Self {
        self.duration = Some(secs);
        self
    }

    pub fn machine(mut self, id: impl Into<DutId>) -> Self {
        self.machine.insert(id.into());
        self
    }

    pub fn device(mut self, id: impl Into<DutId>) -> Self {
        self.device.insert(id.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

fn fresh_suffix() -> String {
    Uuid::new_v4().simple().to_string()
}

impl Tshrag {
    /// Ids of every test under the root, sorted.
    pub fn list_tests(&self) -> Vec<TestId> {
        let Ok(dir) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut ids: Vec<TestId> = dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(FILE_TEST).is_file())
            .filter_map(|entry| entry.file_name().to_str().map(TestId::new))
            .collect();
        ids.sort();
        ids
    }

    /// Create a PENDING test with a fresh id and an empty metric store.
    ///
    /// Resource conflicts are not checked here; admission resolves them.
    pub fn create_test(&self, profile: Profile, plan: TestPlan) -> Result<Test> {
        let start_time = plan.start_time.unwrap_or_else(Time::now);
        let duration = plan.duration.or(profile.duration);
        let end_time = plan
            .end_time
            .or_else(|| duration.map(|secs| start_time.saturating_add_secs(secs)))
            .unwrap_or_else(Time::max);
        if start_time > end_time {
            return Err(SchedulerError::Rejected(format!(
                "start {start_time} is after end {end_time}"
            )));
        }

        let id = TestId::new(format!("{}_{}", profile.name, fresh_suffix()));
        let dir = self.test_dir(&id);
        fs::create_dir_all(dir.join(PATH_JOBS)).map_err(TshragError::from)?;
        let mdb = Mdb::open(dir.join(FILE_METRIC), &self.mdb_config)?;

        let test = Test {
            id,
            profile,
            run: Run::new(start_time, end_time),
            duration,
            machine: plan.machine,
            device: plan.device,
            env: plan.env,
            jobs: Vec::new(),
            mdb: mdb.root().to_path_buf(),
        };
        {
            let _lock = self.lock_test(&test.id)?;
            self.store_test(&test)?;
        }
        info!(
            test_id = %test.id,
            start = %test.start_time(),
            end = %test.end_time(),
            resources = test.resources().len(),
            "Test created"
        );
        Ok(test)
    }

    /// The persisted test, or `None` when absent or unreadable.
    pub fn query_test(&self, id: &TestId) -> Option<Test> {
        match self.load_test(id) {
            Ok(test) => Some(test),
            Err(e) => {
                debug!(test_id = %id, error = %e, "Test not loaded");
                None
            }
        }
    }

    /// Create a PENDING job and append it to the owning test's job list.
    pub fn create_job(&self, test_id: &TestId, prefix: Option<&str>) -> Result<Job> {
        if !self.test_file(test_id).is_file() {
            return Err(TshragError::NotFound(format!("test {test_id}")).into());
        }
        let id = match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => JobId::new(format!("{prefix}_{}", fresh_suffix())),
            None => JobId::new(fresh_suffix()),
        };
        let job = Job::new(id, test_id.clone());
        {
            let _lock = self.lock_job(test_id, &job.id)?;
            self.store_job(&job)?;
        }
        self.update_test(test_id, |test| test.jobs.push(job.id.clone()))?;
        debug!(test_id = %test_id, job_id = %job.id, "Job created");
        Ok(job)
    }

    /// The persisted job, or `None` when absent or unreadable.
    pub fn query_job(&self, test_id: &TestId, job_id: &JobId) -> Option<Job> {
        match self.load_job(test_id, job_id) {
            Ok(job) => Some(job),
            Err(e) => {
                debug!(test_id = %test_id, job_id = %job_id, error = %e, "Job not loaded");
                None
            }
        }
    }

    /// Ids of every job record of a test, sorted.
    pub fn list_jobs(&self, test_id: &TestId) -> Vec<JobId> {
        let Ok(dir) = fs::read_dir(self.jobs_dir(test_id)) else {
            return Vec::new();
        };
        let mut ids: Vec<JobId> = dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == RECORD_EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(JobId::new))
            .collect();
        ids.sort();
        ids
    }

    /// Every readable job of a test, in the order they were created.
    pub fn query_jobs(&self, test: &Test) -> Vec<Job> {
        test.jobs
            .iter()
            .filter_map(|job_id| self.query_job(&test.id, job_id))
            .collect()
    }
}
