//! Step sequencing.
//!
//! A sequence document is either `{"steps": [...]}` or a bare array. Each
//! step is a single-key object whose key names the handler and whose value
//! is the handler's argument:
//!
//! ```json
//! {"steps": [{"comment": "warm up"}, {"sleep": 1.5}, {"cmd": "./soak.sh --hours 2"}]}
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use tshrag_core::{DutId, TestId};

use super::cmd::CmdStep;
use super::Stage;
use crate::error::{Result, SchedulerError};
use crate::runner::Tshrag;

/// Where and for whom a sequence runs.
#[derive(Debug, Clone)]
pub struct SequenceContext {
    pub stage: Stage,
    pub test_id: TestId,
    pub machine: DutId,
    pub device: BTreeSet<DutId>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

/// Runs a whole sequence document for one machine.
pub trait Sequencer: Send + Sync {
    fn run(&self, ctx: &SequenceContext, document: &Value) -> Result<()>;
}

/// Handles one kind of step.
pub trait StepHandler: Send + Sync {
    fn run(&self, ctx: &SequenceContext, args: &Value) -> Result<()>;
}

/// Built-in sequencer dispatching steps to named handlers.
#[derive(Clone)]
pub struct StepSequencer {
    handlers: BTreeMap<String, Arc<dyn StepHandler>>,
    /// Checked for cancellation before every step when set.
    scheduler: Option<Tshrag>,
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepSequencer {
    /// Sequencer with the `sleep` and `comment` handlers.
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
            scheduler: None,
        }
        .with_handler("sleep", SleepStep)
        .with_handler("comment", CommentStep)
    }

    /// Sequencer with every built-in handler, launching jobs through
    /// `scheduler` and unwinding once the test is cancelled.
    pub fn standard(scheduler: Tshrag) -> Self {
        let mut sequencer = Self::new().with_handler("cmd", CmdStep::new(scheduler.clone()));
        sequencer.scheduler = Some(scheduler);
        sequencer
    }

    pub fn with_handler(mut self, name: &str, handler: impl StepHandler + 'static) -> Self {
        self.handlers.insert(name.to_ascii_lowercase(), Arc::new(handler));
        self
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

const NO_STEPS: &[Value] = &[];

/// The step list of a document; null means no steps.
fn steps(document: &Value) -> Result<&[Value]> {
    match document {
        Value::Null => Ok(NO_STEPS),
        Value::Array(steps) => Ok(steps.as_slice()),
        Value::Object(map) => match map.get("steps") {
            Some(Value::Array(steps)) => Ok(steps.as_slice()),
            Some(Value::Null) | None => Ok(NO_STEPS),
            Some(other) => Err(SchedulerError::Step(format!("steps must be a list, got {other}"))),
        },
        other => Err(SchedulerError::Step(format!("unsupported sequence document: {other}"))),
    }
}

impl Sequencer for StepSequencer {
    fn run(&self, ctx: &SequenceContext, document: &Value) -> Result<()> {
        let steps = steps(document)?;
        debug!(
            test_id = %ctx.test_id,
            stage = %ctx.stage,
            machine = %ctx.machine,
            steps = steps.len(),
            "Running sequence"
        );
        for (index, step) in steps.iter().enumerate() {
            if let Some(scheduler) = &self.scheduler {
                scheduler.check_cancelled(&ctx.test_id)?;
            }
            let (name, args) = match step.as_object() {
                Some(map) if map.len() == 1 => map
                    .iter()
                    .next()
                    .map(|(name, args)| (name.to_ascii_lowercase(), args))
                    .ok_or_else(|| SchedulerError::Step(format!("step {index} is empty")))?,
                _ => {
                    return Err(SchedulerError::Step(format!(
                        "step {index} must be a single-key object, got {step}"
                    )))
                }
            };
            let handler = self
                .handlers
                .get(&name)
                .ok_or_else(|| SchedulerError::Step(format!("step {index}: unknown step {name:?}")))?;
            handler.run(ctx, args).map_err(|e| match e {
                SchedulerError::Step(msg) => SchedulerError::Step(format!("step {index} ({name}): {msg}")),
                other => other,
            })?;
        }
        Ok(())
    }
}

/// `{"sleep": seconds}`
struct SleepStep;

impl StepHandler for SleepStep {
    fn run(&self, ctx: &SequenceContext, args: &Value) -> Result<()> {
        let secs = match args {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .ok_or_else(|| SchedulerError::Step(format!("invalid sleep duration {args}")))?;
        debug!(test_id = %ctx.test_id, machine = %ctx.machine, secs, "Sleeping");
        thread::sleep(Duration::from_secs_f64(secs));
        Ok(())
    }
}

/// `{"comment": "..."}`
struct CommentStep;

impl StepHandler for CommentStep {
    fn run(&self, ctx: &SequenceContext, args: &Value) -> Result<()> {
        let text = match args {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        info!(test_id = %ctx.test_id, stage = %ctx.stage, machine = %ctx.machine, "{text}");
        Ok(())
    }
}
