//! Solver invocation: the black-box annealing executable.
//!
//! The harness only ever talks to the solver through the [`Solver`] trait, so
//! tests and alternative launchers can stand in for the real process.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::SolverInvocationError;

/// Captured output of one solver run.
#[derive(Debug, Clone)]
pub struct RawTrialOutput {
    /// Everything the solver wrote to stdout
    pub stdout: String,
    /// Wall-clock time measured around the invocation
    pub elapsed: Duration,
}

/// A solver that can be run against an instance file.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Run once against `instance`, optionally overriding the processor count.
    async fn run(
        &self,
        instance: &Path,
        processor_override: Option<usize>,
    ) -> Result<RawTrialOutput, SolverInvocationError>;
}

/// Runs the solver as an external process: `<executable> file <instance> [processors]`.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessSolver {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: None,
        }
    }

    /// Kill the solver if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(&self, instance: &Path, processor_override: Option<usize>) -> Command {
        let mut command = Command::new(&self.executable);
        command.arg("file").arg(instance);
        if let Some(processors) = processor_override {
            command.arg(processors.to_string());
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Solver for ProcessSolver {
    async fn run(
        &self,
        instance: &Path,
        processor_override: Option<usize>,
    ) -> Result<RawTrialOutput, SolverInvocationError> {
        let start = Instant::now();

        let child = self
            .command(instance, processor_override)
            .spawn()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => SolverInvocationError::NotFound {
                    path: self.executable.clone(),
                },
                _ => SolverInvocationError::Spawn {
                    path: self.executable.clone(),
                    source,
                },
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let execution = child.wait_with_output();
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, execution)
                .await
                .map_err(|_| SolverInvocationError::Timeout { after: timeout })?,
            None => execution.await,
        }
        .map_err(|source| SolverInvocationError::Spawn {
            path: self.executable.clone(),
            source,
        })?;

        let elapsed = start.elapsed();

        if !output.status.success() {
            return Err(SolverInvocationError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            elapsed_ms = elapsed.as_millis() as u64,
            bytes = stdout.len(),
            "Solver finished"
        );

        Ok(RawTrialOutput { stdout, elapsed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_arguments() {
        let solver = ProcessSolver::new("./main");
        let command = solver.command(Path::new("input/input.csv"), None);
        let args: Vec<_> = command.as_std().get_args().collect();
        assert_eq!(args, ["file", "input/input.csv"]);

        let command = solver.command(Path::new("input/input.csv"), Some(8));
        let args: Vec<_> = command.as_std().get_args().collect();
        assert_eq!(args, ["file", "input/input.csv", "8"]);
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let solver = ProcessSolver::new("/nonexistent/anneal-solver-binary");
        let err = solver.run(Path::new("input.csv"), None).await.unwrap_err();
        assert!(matches!(err, SolverInvocationError::NotFound { .. }));
    }
}
