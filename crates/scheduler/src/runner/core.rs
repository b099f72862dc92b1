use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use tshrag_core::{Job, JobId, MdbConfig, SchedulerConfig, ScopedLock, Test, TestId, TshragError};

use crate::error::Result;

pub(crate) const FILE_TEST: &str = "status.json";
pub(crate) const FILE_METRIC: &str = "metric.db";
pub(crate) const FILE_LOCK: &str = ".lock";
pub(crate) const FILE_DAEMON_LOCK: &str = "daemon.lock";
pub(crate) const PATH_JOBS: &str = "jobs";
pub(crate) const RECORD_EXTENSION: &str = "json";
pub(crate) const LOCK_EXTENSION: &str = "lock";

/// Body of an admitted test, run on its own worker thread.
///
/// Returning `Ok` completes the test, `Err(SchedulerError::Cancelled)`
/// cancels it and any other error crashes it.
pub type TestMain = Arc<dyn Fn(&Tshrag, &TestId) -> Result<()> + Send + Sync>;

/// The test scheduler.
///
/// All shared state lives on disk under `root` and is guarded by advisory
/// file locks, so several instances (threads or processes) may operate on
/// the same root. The in-memory part is only the bookkeeping of worker
/// threads this instance started. Clones share that bookkeeping.
#[derive(Clone)]
pub struct Tshrag {
    pub(super) root: PathBuf,
    pub(super) host: String,
    pub(super) lock_timeout: Duration,
    pub(super) max_workers: usize,
    pub(super) mdb_config: MdbConfig,
    pub(super) test_main: Option<TestMain>,
    pub(super) workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl fmt::Debug for Tshrag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tshrag")
            .field("root", &self.root)
            .field("host", &self.host)
            .field("lock_timeout", &self.lock_timeout)
            .field("max_workers", &self.max_workers)
            .field("has_test_main", &self.test_main.is_some())
            .finish_non_exhaustive()
    }
}

impl Tshrag {
    /// Create a scheduler over `config.root`, creating the directory if needed.
    ///
    /// No test main is installed; admission is a no-op until one is set
    /// with [`Tshrag::with_test_main`].
    pub fn new(config: &SchedulerConfig, mdb_config: MdbConfig) -> Result<Self> {
        fs::create_dir_all(&config.root).map_err(TshragError::from)?;
        let max_workers = config.resolved_max_workers();
        info!(
            root = %config.root.display(),
            max_workers,
            lock_timeout_ms = config.lock_timeout_ms,
            "Scheduler initialized"
        );
        Ok(Self {
            root: config.root.clone(),
            host: config.host.clone(),
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            max_workers,
            mdb_config,
            test_main: None,
            workers: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn with_test_main<F>(mut self, test_main: F) -> Self
    where
        F: Fn(&Tshrag, &TestId) -> Result<()> + Send + Sync + 'static,
    {
        self.test_main = Some(Arc::new(test_main));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn mdb_config(&self) -> &MdbConfig {
        &self.mdb_config
    }

    // ── Layout ───────────────────────────────────────────────────

    pub fn test_dir(&self, id: &TestId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Held by a running daemon for its whole lifetime.
    pub fn daemon_lock_file(&self) -> PathBuf {
        self.root.join(FILE_DAEMON_LOCK)
    }

    pub(super) fn test_file(&self, id: &TestId) -> PathBuf {
        self.test_dir(id).join(FILE_TEST)
    }

    pub(super) fn jobs_dir(&self, test_id: &TestId) -> PathBuf {
        self.test_dir(test_id).join(PATH_JOBS)
    }

    fn job_file(&self, test_id: &TestId, job_id: &JobId) -> PathBuf {
        self.jobs_dir(test_id)
            .join(format!("{job_id}.{RECORD_EXTENSION}"))
    }

    // ── Locks ────────────────────────────────────────────────────

    pub(super) fn lock_global(&self) -> Result<ScopedLock> {
        Ok(ScopedLock::acquire(self.root.join(FILE_LOCK), self.lock_timeout)?)
    }

    pub(super) fn lock_test(&self, id: &TestId) -> Result<ScopedLock> {
        Ok(ScopedLock::acquire(
            self.test_dir(id).join(FILE_LOCK),
            self.lock_timeout,
        )?)
    }

    pub(super) fn lock_job(&self, test_id: &TestId, job_id: &JobId) -> Result<ScopedLock> {
        Ok(ScopedLock::acquire(
            self.jobs_dir(test_id)
                .join(format!("{job_id}.{LOCK_EXTENSION}")),
            self.lock_timeout,
        )?)
    }

    pub(super) fn workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Records ──────────────────────────────────────────────────

    pub(super) fn load_test(&self, id: &TestId) -> Result<Test> {
        Ok(read_record(&self.test_file(id))?)
    }

    pub(super) fn store_test(&self, test: &Test) -> Result<()> {
        Ok(write_record(&self.test_file(&test.id), test)?)
    }

    pub(super) fn load_job(&self, test_id: &TestId, job_id: &JobId) -> Result<Job> {
        Ok(read_record(&self.job_file(test_id, job_id))?)
    }

    pub(super) fn store_job(&self, job: &Job) -> Result<()> {
        Ok(write_record(&self.job_file(&job.test_id, &job.id), job)?)
    }

    /// Scoped read-modify-write of a test record under its lock.
    ///
    /// The record is written back on every exit path. A panic inside `f` is
    /// re-raised after the write.
    pub fn update_test<R>(&self, id: &TestId, f: impl FnOnce(&mut Test) -> R) -> Result<R> {
        let _lock = self.lock_test(id)?;
        let mut test = self.load_test(id)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut test)));
        let stored = self.store_test(&test);
        match outcome {
            Ok(value) => stored.map(|()| value),
            Err(payload) => {
                if let Err(e) = stored {
                    warn!(test_id = %id, error = %e, "Failed to persist test after panic");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Scoped read-modify-write of a job record under its lock.
    pub fn update_job<R>(
        &self,
        test_id: &TestId,
        job_id: &JobId,
        f: impl FnOnce(&mut Job) -> R,
    ) -> Result<R> {
        let _lock = self.lock_job(test_id, job_id)?;
        let mut job = self.load_job(test_id, job_id)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut job)));
        let stored = self.store_job(&job);
        match outcome {
            Ok(value) => stored.map(|()| value),
            Err(payload) => {
                if let Err(e) = stored {
                    warn!(test_id = %test_id, job_id = %job_id, error = %e, "Failed to persist job after panic");
                }
                panic::resume_unwind(payload)
            }
        }
    }
}

fn read_record<T: DeserializeOwned>(path: &Path) -> tshrag_core::Result<T> {
    let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TshragError::NotFound(path.display().to_string()),
        _ => TshragError::Io(e),
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write through a sibling temp file so readers never see a torn record.
fn write_record<T: Serialize>(path: &Path, record: &T) -> tshrag_core::Result<()> {
    let tmp = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
    fs::write(&tmp, serde_json::to_string_pretty(record)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
