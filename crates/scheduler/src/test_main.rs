//! The stock test main: distribute, then execute.

use tracing::info;

use tshrag_core::{RunStatus, TestId};

use crate::driver::{run_stage, Stage, StepSequencer};
use crate::error::{Result, SchedulerError};
use crate::runner::Tshrag;

/// Move the test PREPARING to RUNNING, then run its distribution and
/// execution stages on every machine with the built-in step sequencer.
///
/// Cancellation is checked before each stage and before each step.
pub fn default_test_main(scheduler: &Tshrag, id: &TestId) -> Result<()> {
    let test = scheduler.update_test(id, |test| match test.status() {
        RunStatus::Preparing => {
            test.run.status = RunStatus::Running;
            Ok(test.clone())
        }
        RunStatus::Cancelled => Err(SchedulerError::Cancelled(id.to_string())),
        other => Err(SchedulerError::Rejected(format!(
            "test {id} is {other}, expected PREPARING"
        ))),
    })??;
    info!(test_id = %id, machines = test.machine.len(), "Test running");

    let sequencer = StepSequencer::standard(scheduler.clone());
    for stage in [Stage::Distribution, Stage::Execution] {
        scheduler.check_cancelled(id)?;
        run_stage(scheduler, &test, stage, &sequencer)?;
    }
    scheduler.check_cancelled(id)
}

impl Tshrag {
    pub fn with_default_test_main(self) -> Self {
        self.with_test_main(default_test_main)
    }
}
