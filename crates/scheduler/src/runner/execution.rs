use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tracing::{debug, error, info, warn};

use tshrag_core::{RunStatus, TestId, Time};

use super::core::{TestMain, Tshrag};
use crate::error::{Result, SchedulerError};

impl Tshrag {
    /// Drop finished workers from the bookkeeping and count the rest.
    pub fn live_workers(&self) -> usize {
        let mut workers = self.workers();
        workers.retain(|handle| !handle.is_finished());
        workers.len()
    }

    /// Start the test main of `id` on a new worker thread.
    ///
    /// Returns false without side effects when no test main is installed or
    /// the pool is full. Otherwise the test moves PENDING to PREPARING and
    /// the worker is started; a test that cannot be started is cancelled.
    pub fn task(&self, id: &TestId) -> bool {
        let Some(test_main) = self.test_main.clone() else {
            debug!(test_id = %id, "No test main installed");
            return false;
        };

        let mut workers = self.workers();
        workers.retain(|handle| !handle.is_finished());
        if workers.len() >= self.max_workers {
            debug!(test_id = %id, max_workers = self.max_workers, "Worker pool full");
            return false;
        }

        let prepared = self.update_test(id, |test| {
            if test.status() == RunStatus::Pending {
                test.run.status = RunStatus::Preparing;
                true
            } else {
                false
            }
        });
        match prepared {
            Ok(true) => {}
            Ok(false) => {
                debug!(test_id = %id, "Test is not pending");
                return false;
            }
            Err(e) => {
                warn!(test_id = %id, error = %e, "Failed to prepare test");
                return false;
            }
        }

        let scheduler = self.clone();
        let test_id = id.clone();
        let spawned = thread::Builder::new()
            .name(format!("tshrag-{id}"))
            .spawn(move || scheduler.supervise(&test_id, test_main));
        match spawned {
            Ok(handle) => {
                workers.push(handle);
                info!(test_id = %id, workers = workers.len(), "Test admitted");
                true
            }
            Err(e) => {
                error!(test_id = %id, error = %e, "Failed to start worker");
                let cancelled = self.update_test(id, |test| {
                    test.run.status = RunStatus::Cancelled;
                    test.run.end_time = Time::now();
                });
                if let Err(e) = cancelled {
                    warn!(test_id = %id, error = %e, "Failed to cancel unstarted test");
                }
                false
            }
        }
    }

    /// Worker thread body: run the test main and settle the final status.
    ///
    /// The outcome is only applied while the test is still RUNNING. A
    /// terminal status set by someone else is kept, and any other state is
    /// settled as CRASHED so no test is left active.
    fn supervise(&self, id: &TestId, test_main: TestMain) {
        if let Err(e) = self.update_test(id, |test| test.run.start_time = Time::now()) {
            warn!(test_id = %id, error = %e, "Failed to record start time");
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| test_main(self, id))) {
            Ok(Ok(())) => RunStatus::Completed,
            Ok(Err(e)) if e.is_cancelled() => {
                info!(test_id = %id, "Test unwound after cancellation");
                RunStatus::Cancelled
            }
            Ok(Err(e)) => {
                error!(test_id = %id, error = %e, "Test failed");
                RunStatus::Crashed
            }
            Err(_) => {
                error!(test_id = %id, "Test panicked");
                RunStatus::Crashed
            }
        };

        let settled = self.update_test(id, |test| {
            test.run.end_time = Time::now();
            match test.status() {
                status if status.is_terminal() => {}
                RunStatus::Running => test.run.status = outcome,
                _ => test.run.status = RunStatus::Crashed,
            }
            test.status()
        });
        match settled {
            Ok(status) => info!(test_id = %id, status = %status, "Test finished"),
            Err(e) => error!(test_id = %id, error = %e, "Failed to record test outcome"),
        }
    }

    /// `Err(Cancelled)` once the persisted status of `id` is CANCELLED.
    ///
    /// Test mains call this between steps to unwind cooperatively.
    pub fn check_cancelled(&self, id: &TestId) -> Result<()> {
        let test = self.load_test(id)?;
        if test.status() == RunStatus::Cancelled {
            return Err(SchedulerError::Cancelled(id.to_string()));
        }
        Ok(())
    }

    /// Join finished workers and report the ones still running.
    ///
    /// Running workers are detached; their tests keep their persisted state
    /// and are settled by the worker when it returns. Returns the number of
    /// workers still in flight.
    pub fn shutdown(&self) -> usize {
        let handles: Vec<_> = self.workers().drain(..).collect();
        let (finished, running): (Vec<_>, Vec<_>) =
            handles.into_iter().partition(|handle| handle.is_finished());

        for handle in finished {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(worker = %name, "Worker panicked");
            }
        }
        for handle in &running {
            info!(worker = handle.thread().name().unwrap_or("worker"), "Worker still in flight");
        }
        info!(in_flight = running.len(), "Scheduler shut down");
        running.len()
    }
}
