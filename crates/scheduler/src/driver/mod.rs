//! Distribution and execution drivers.
//!
//! A stage runs the profile's sequence document once per machine of the
//! test, each on its own thread with its own working directory
//! `<root>/<test_id>/<stage>/<machine>`. The stage returns when every
//! machine's sequence has finished.

mod cmd;
pub mod env;
mod sequencer;

use std::fmt;
use std::fs;
use std::thread;

use serde_json::Value;
use tracing::{error, info};

use tshrag_core::{Test, TshragError};

pub use cmd::CmdStep;
pub use env::expand_variables;
pub use sequencer::{SequenceContext, Sequencer, StepHandler, StepSequencer};

use crate::error::{Result, SchedulerError};
use crate::runner::Tshrag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Distribution,
    Execution,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Distribution => "distribution",
            Stage::Execution => "execution",
        }
    }

    /// The profile's sequence document for this stage.
    pub fn document<'a>(&self, test: &'a Test) -> &'a Value {
        match self {
            Stage::Distribution => &test.profile.distribution,
            Stage::Execution => &test.profile.execution,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-machine contexts of `stage` for `test`.
pub fn contexts(scheduler: &Tshrag, test: &Test, stage: Stage) -> Vec<SequenceContext> {
    let mut base = test.env.clone();
    base.insert(env::TSHRAG_HOST.to_string(), scheduler.host().to_string());
    base.insert(env::TSHRAG_TEST_ID.to_string(), test.id.to_string());
    base.insert(env::TSHRAG_TEST_MACHINE.to_string(), env::join_ids(&test.machine));
    base.insert(env::TSHRAG_TEST_DEVICE.to_string(), env::join_ids(&test.device));

    test.machine
        .iter()
        .map(|machine| {
            let cwd = scheduler
                .test_dir(&test.id)
                .join(stage.as_str())
                .join(machine.as_str());
            let mut env = base.clone();
            env.insert(env::TSHRAG_TEST_DIR.to_string(), cwd.display().to_string());
            SequenceContext {
                stage,
                test_id: test.id.clone(),
                machine: machine.clone(),
                device: test.device.clone(),
                cwd,
                env,
            }
        })
        .collect()
}

/// Run `stage` of `test` on every machine and wait for all of them.
///
/// Every machine runs to its end even when another fails; the first
/// failure is returned afterwards. A cancellation wins over other failures.
pub fn run_stage(
    scheduler: &Tshrag,
    test: &Test,
    stage: Stage,
    sequencer: &dyn Sequencer,
) -> Result<()> {
    let document = stage.document(test);
    let contexts = contexts(scheduler, test, stage);
    info!(test_id = %test.id, stage = %stage, machines = contexts.len(), "Stage started");

    let results: Vec<Result<()>> = thread::scope(|scope| {
        let handles: Vec<_> = contexts
            .iter()
            .map(|ctx| {
                let name = format!("{}-{}-{}", test.id, stage, ctx.machine);
                let builder = thread::Builder::new().name(name.clone());
                let spawned = builder.spawn_scoped(scope, move || -> Result<()> {
                    fs::create_dir_all(&ctx.cwd).map_err(TshragError::from)?;
                    sequencer.run(ctx, document)
                });
                (name, spawned)
            })
            .collect();

        handles
            .into_iter()
            .map(|(name, spawned)| match spawned {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(SchedulerError::Step(format!("{name} panicked")))),
                Err(source) => Err(SchedulerError::Spawn { what: name, source }),
            })
            .collect()
    });

    let mut failure: Option<SchedulerError> = None;
    for result in results {
        if let Err(e) = result {
            error!(test_id = %test.id, stage = %stage, error = %e, "Machine sequence failed");
            failure = match failure {
                Some(existing) if existing.is_cancelled() || !e.is_cancelled() => Some(existing),
                _ => Some(e),
            };
        }
    }
    match failure {
        Some(e) => Err(e),
        None => {
            info!(test_id = %test.id, stage = %stage, "Stage finished");
            Ok(())
        }
    }
}
