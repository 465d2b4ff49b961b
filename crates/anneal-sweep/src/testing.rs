//! In-memory solver stubs for unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SolverInvocationError;
use crate::solver::{RawTrialOutput, Solver};

/// Output in the sequential solver format, with an earlier worse schedule.
pub(crate) fn solver_output(cost: f64, time: f64) -> String {
    format!(
        "Initial solution:\nSchedule (M=2, N=10): (K1)={}\n\nBest solution found (time {} s):\nSchedule (M=2, N=10): (K1)={}\n",
        cost * 2.0 + 1.0,
        time,
        cost
    )
}

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Output(String),
    Timed(String, Duration),
    Fail,
}

/// Replays a fixed script of outputs, then repeats `fallback` forever.
pub(crate) struct ScriptedSolver {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<Step>,
    overrides: Mutex<Vec<Option<usize>>>,
    instances: Mutex<Vec<String>>,
}

impl ScriptedSolver {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            overrides: Mutex::new(Vec::new()),
            instances: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn always(step: Step) -> Self {
        Self {
            fallback: Some(step),
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.overrides.lock().unwrap().len()
    }

    pub(crate) fn overrides(&self) -> Vec<Option<usize>> {
        self.overrides.lock().unwrap().clone()
    }

    /// Instance file contents as seen at each call.
    pub(crate) fn instances(&self) -> Vec<String> {
        self.instances.lock().unwrap().clone()
    }
}

#[async_trait]
impl Solver for ScriptedSolver {
    async fn run(
        &self,
        instance: &Path,
        processor_override: Option<usize>,
    ) -> Result<RawTrialOutput, SolverInvocationError> {
        self.overrides.lock().unwrap().push(processor_override);
        self.instances
            .lock()
            .unwrap()
            .push(std::fs::read_to_string(instance).unwrap_or_default());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or(Step::Fail);

        match step {
            Step::Output(stdout) => Ok(RawTrialOutput {
                stdout,
                elapsed: Duration::from_millis(10),
            }),
            Step::Timed(stdout, elapsed) => Ok(RawTrialOutput { stdout, elapsed }),
            Step::Fail => Err(SolverInvocationError::NonZeroExit {
                code: Some(1),
                stderr: "scripted failure".to_string(),
            }),
        }
    }
}
