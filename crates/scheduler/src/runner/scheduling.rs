use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use tshrag_core::{DutId, RunStatus, Test, TestId, Time};

use super::core::Tshrag;
use crate::error::{Result, SchedulerError};

/// Validate and apply a schedule change to `test`. Nothing is modified when
/// the change is rejected.
fn apply_schedule(
    test: &mut Test,
    start: Option<Time>,
    end: Option<Time>,
    duration: Option<u64>,
) -> Result<()> {
    let status = test.status();
    if start.is_some() && status != RunStatus::Pending {
        return Err(SchedulerError::Rejected(format!(
            "start of {} cannot change while {status}",
            test.id
        )));
    }
    if (end.is_some() || duration.is_some()) && status.is_terminal() {
        return Err(SchedulerError::Rejected(format!(
            "end of {} cannot change once {status}",
            test.id
        )));
    }

    let start_time = start.unwrap_or(test.start_time());
    let end_time = match (end, duration) {
        (Some(end), _) => end,
        (None, Some(secs)) => start_time.saturating_add_secs(secs),
        (None, None) => test.end_time(),
    };
    if start_time > end_time {
        return Err(SchedulerError::Rejected(format!(
            "start {start_time} is after end {end_time}"
        )));
    }

    test.run.start_time = start_time;
    test.run.end_time = end_time;
    if duration.is_some() {
        test.duration = duration;
    }
    Ok(())
}

impl Tshrag {
    /// Move a test's window. A new end takes precedence over a new duration.
    ///
    /// Returns false when the change is rejected or the test cannot be
    /// updated; the persisted record is then unchanged.
    pub fn reschedule_test(
        &self,
        id: &TestId,
        start: Option<Time>,
        end: Option<Time>,
        duration: Option<u64>,
    ) -> bool {
        let outcome = self
            .update_test(id, |test| apply_schedule(test, start, end, duration))
            .and_then(|applied| applied);
        match outcome {
            Ok(()) => {
                info!(test_id = %id, "Test rescheduled");
                true
            }
            Err(e) => {
                warn!(test_id = %id, error = %e, "Reschedule rejected");
                false
            }
        }
    }

    /// Start a PENDING test now instead of at its scheduled start.
    pub fn start_now(&self, id: &TestId) -> bool {
        self.reschedule_test(id, Some(Time::now()), None, None)
    }

    /// End a test's window now. A PENDING test that had not started yet
    /// gets an empty window at now.
    pub fn stop_now(&self, id: &TestId) -> bool {
        let now = Time::now();
        let outcome = self
            .update_test(id, |test| {
                let start = (test.status() == RunStatus::Pending && test.start_time() > now)
                    .then_some(now);
                apply_schedule(test, start, Some(now), None)
            })
            .and_then(|applied| applied);
        match outcome {
            Ok(()) => {
                info!(test_id = %id, "Test stopped");
                true
            }
            Err(e) => {
                warn!(test_id = %id, error = %e, "Stop rejected");
                false
            }
        }
    }

    /// Force a test to CANCELLED from any state.
    ///
    /// A running worker is not interrupted; it observes the status on its
    /// next check and unwinds.
    pub fn cancel_test(&self, id: &TestId) -> bool {
        match self.update_test(id, |test| test.run.status = RunStatus::Cancelled) {
            Ok(()) => {
                info!(test_id = %id, "Test cancelled");
                true
            }
            Err(e) => {
                warn!(test_id = %id, error = %e, "Failed to cancel test");
                false
            }
        }
    }

    /// Cancel `id` if, under its lock, it is still PENDING with a window that
    /// ended before `now`. The scan in [`Tshrag::refresh`] reads records
    /// without test locks, so the decision is taken again on the fresh record.
    pub(super) fn cancel_expired(&self, id: &TestId, now: Time) -> bool {
        let outcome = self.update_test(id, |test| {
            let expired = test.status() == RunStatus::Pending && test.end_time() < now;
            if expired {
                test.run.status = RunStatus::Cancelled;
            }
            (expired, test.end_time())
        });
        match outcome {
            Ok((true, end)) => {
                info!(test_id = %id, end = %end, "Window passed, cancelled");
                true
            }
            Ok((false, _)) => {
                debug!(test_id = %id, "Test changed since scan, not cancelling");
                false
            }
            Err(e) => {
                warn!(test_id = %id, error = %e, "Failed to cancel expired test");
                false
            }
        }
    }

    /// One admission pass. Returns the ids of the tests admitted.
    ///
    /// Under the global lock: PENDING tests whose window already ended are
    /// cancelled, then PENDING tests whose window is open are admitted in
    /// start-time order when none of their resources is held by an active
    /// test or by a test admitted earlier in the same pass.
    pub fn refresh(&self) -> Result<Vec<TestId>> {
        if self.live_workers() >= self.max_workers {
            debug!(max_workers = self.max_workers, "Worker pool full, skipping refresh");
            return Ok(Vec::new());
        }

        let _lock = self.lock_global()?;
        let now = Time::now();
        let mut tests: Vec<Test> = self
            .list_tests()
            .iter()
            .filter_map(|id| self.query_test(id))
            .collect();
        tests.sort_by_key(|test| test.start_time());

        let mut occupied: BTreeSet<DutId> = tests
            .iter()
            .filter(|test| test.status().is_active())
            .flat_map(|test| test.resources())
            .collect();

        let mut admitted = Vec::new();
        for test in tests.iter().filter(|t| t.status() == RunStatus::Pending) {
            if test.end_time() < now {
                self.cancel_expired(&test.id, now);
                continue;
            }
            if !test.run.is_open_at(&now) {
                continue;
            }
            let resources = test.resources();
            if !occupied.is_disjoint(&resources) {
                debug!(test_id = %test.id, "Resources busy, deferring");
                continue;
            }
            if self.task(&test.id) {
                occupied.extend(resources);
                admitted.push(test.id.clone());
            }
        }

        if !admitted.is_empty() {
            info!(admitted = admitted.len(), "Refresh admitted tests");
        }
        Ok(admitted)
    }
}
