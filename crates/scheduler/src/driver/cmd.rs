//! The `cmd` step: launch one job as a subprocess and record it.
//!
//! A job that cannot be launched, exits non-zero or is killed by a signal
//! ends CRASHED. These outcomes are recorded on the job and never fail the
//! sequence.

use std::path::PathBuf;
use std::process::{Child, Command};

use serde_json::Value;
use tracing::{info, warn};

use tshrag_core::{Job, JobId, RunStatus, TestId, Time};

use super::env::{
    expand_variables, join_ids, TSHRAG_JOB_DEVICE, TSHRAG_JOB_DIR, TSHRAG_JOB_ID,
    TSHRAG_JOB_MACHINE,
};
use super::sequencer::{SequenceContext, StepHandler};
use crate::error::{Result, SchedulerError};
use crate::runner::Tshrag;

/// `{"cmd": "prog --flag 'quoted arg'"}` or `{"cmd": ["prog", "--flag"]}`
#[derive(Debug, Clone)]
pub struct CmdStep {
    scheduler: Tshrag,
}

impl CmdStep {
    pub fn new(scheduler: Tshrag) -> Self {
        Self { scheduler }
    }
}

/// Command line of a `cmd` step before expansion.
fn command_line(args: &Value) -> Result<Vec<String>> {
    let argv = match args {
        Value::String(line) => shlex::split(line)
            .ok_or_else(|| SchedulerError::Step(format!("unbalanced quoting in {line:?}")))?,
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        other => return Err(SchedulerError::Step(format!("invalid command {other}"))),
    };
    if argv.is_empty() {
        return Err(SchedulerError::Step("empty command".to_string()));
    }
    Ok(argv)
}

fn launch(job: &Job) -> std::io::Result<Child> {
    let (program, rest) = job
        .args
        .split_first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;
    let mut command = Command::new(program);
    command.args(rest).envs(&job.env);
    if let Some(cwd) = &job.cwd {
        command.current_dir(cwd);
    }
    command.spawn()
}

/// Mark the job RUNNING and spawn its process.
///
/// `Ok(None)` when the process could not start; the job is then recorded
/// CRASHED. When the RUNNING record cannot be persisted the spawned process
/// is killed and reaped before the error is returned.
pub(super) fn start_job(scheduler: &Tshrag, test_id: &TestId, job_id: &JobId) -> Result<Option<Child>> {
    let mut spawned: Option<Child> = None;
    let persisted = scheduler.update_job(test_id, job_id, |job| {
        job.run.status = RunStatus::Running;
        job.run.start_time = Time::now();
        match launch(job) {
            Ok(child) => {
                job.pid = Some(child.id());
                spawned = Some(child);
                None
            }
            Err(e) => {
                job.run.status = RunStatus::Crashed;
                job.run.end_time = Time::now();
                job.pid = None;
                job.retcode = None;
                Some(e)
            }
        }
    });

    match persisted {
        Ok(None) => Ok(spawned),
        Ok(Some(e)) => {
            warn!(test_id = %test_id, job_id = %job_id, error = %e, "Job failed to launch");
            Ok(None)
        }
        Err(e) => {
            if let Some(mut child) = spawned {
                warn!(test_id = %test_id, job_id = %job_id, pid = child.id(), error = %e, "Job record lost, killing job");
                reap(&mut child);
            }
            Err(e)
        }
    }
}

fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(pid = child.id(), error = %e, "Failed to kill job");
    }
    if let Err(e) = child.wait() {
        warn!(pid = child.id(), error = %e, "Failed to reap job");
    }
}

impl StepHandler for CmdStep {
    fn run(&self, ctx: &SequenceContext, args: &Value) -> Result<()> {
        let argv = command_line(args)?;
        let job = self.scheduler.create_job(&ctx.test_id, Some(ctx.stage.as_str()))?;

        let mut env = ctx.env.clone();
        env.insert(TSHRAG_JOB_ID.to_string(), job.id.to_string());
        env.insert(TSHRAG_JOB_MACHINE.to_string(), ctx.machine.to_string());
        env.insert(TSHRAG_JOB_DEVICE.to_string(), join_ids(&ctx.device));
        env.insert(TSHRAG_JOB_DIR.to_string(), ctx.cwd.display().to_string());
        let argv: Vec<String> = argv.iter().map(|arg| expand_variables(arg, &env)).collect();
        let cwd = PathBuf::from(expand_variables(&ctx.cwd.to_string_lossy(), &env));

        self.scheduler.update_job(&ctx.test_id, &job.id, |job| {
            job.machine = Some(ctx.machine.clone());
            job.device = ctx.device.clone();
            job.args = argv;
            job.cwd = Some(cwd);
            job.env = env;
        })?;

        let Some(mut child) = start_job(&self.scheduler, &ctx.test_id, &job.id)? else {
            return Ok(());
        };
        info!(test_id = %ctx.test_id, job_id = %job.id, pid = child.id(), "Job launched");

        let waited = child.wait();
        let retcode = self.scheduler.update_job(&ctx.test_id, &job.id, |job| {
            job.run.end_time = Time::now();
            job.retcode = waited.as_ref().ok().and_then(|status| status.code());
            job.run.status = match job.retcode {
                Some(0) => RunStatus::Completed,
                _ => RunStatus::Crashed,
            };
            job.retcode
        })?;
        if let Err(e) = waited {
            warn!(test_id = %ctx.test_id, job_id = %job.id, error = %e, "Failed to wait for job");
        }
        info!(test_id = %ctx.test_id, job_id = %job.id, retcode = ?retcode, "Job finished");
        Ok(())
    }
}
