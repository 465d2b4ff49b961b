//! Trial aggregation: repeat one configuration and average the survivors.
//!
//! A failed trial (the solver could not run, or its output could not be
//! parsed) is logged, counted and skipped. It is never averaged in as zero.
//! If no trial succeeds there is no mean, and [`AggregateFailure`] is returned.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AggregateFailure, TrialFailure};
use crate::instance::CoolingStrategy;
use crate::parser::{MetricRecord, OutputParser};
use crate::solver::Solver;

/// One cell of the sweep grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrialConfig {
    pub job_count: usize,
    pub processor_count: usize,
    pub cooling: CoolingStrategy,
}

impl fmt::Display for TrialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "jobs={} processors={} cooling={}",
            self.job_count, self.processor_count, self.cooling
        )
    }
}

/// Which duration is averaged into `mean_time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// Seconds printed by the solver itself
    #[default]
    Reported,
    /// Wall-clock time measured around the process
    WallClock,
}

/// Mean metrics over the successful trials of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub config: TrialConfig,
    pub mean_cost: f64,
    pub mean_time: f64,
    pub successful_trials: usize,
    pub failed_trials: usize,
}

/// Runs a configuration repeatedly through a solver and parser.
pub struct TrialAggregator<'a> {
    solver: &'a dyn Solver,
    parser: &'a OutputParser,
    time_source: TimeSource,
    override_processors: bool,
}

impl<'a> TrialAggregator<'a> {
    pub fn new(solver: &'a dyn Solver, parser: &'a OutputParser, time_source: TimeSource) -> Self {
        Self {
            solver,
            parser,
            time_source,
            override_processors: false,
        }
    }

    /// Pass the configuration's processor count to the solver on the command line,
    /// overriding the count stored in the instance file.
    pub fn with_processor_override(mut self, enabled: bool) -> Self {
        self.override_processors = enabled;
        self
    }

    /// Run `repeat_count` independent trials and average the successful ones.
    pub async fn aggregate(
        &self,
        config: TrialConfig,
        instance: &Path,
        repeat_count: usize,
    ) -> Result<AggregateResult, AggregateFailure> {
        let processor_override = self.override_processors.then_some(config.processor_count);

        let mut costs = Vec::with_capacity(repeat_count);
        let mut times = Vec::with_capacity(repeat_count);
        let mut failures = Vec::new();

        for trial in 0..repeat_count {
            match self.run_trial(instance, processor_override).await {
                Ok((record, time)) => {
                    debug!(
                        %config,
                        trial = trial,
                        cost = record.final_cost,
                        time = time,
                        "Trial succeeded"
                    );
                    costs.push(record.final_cost);
                    times.push(time);
                }
                Err(failure) => {
                    warn!(%config, trial = trial, error = %failure, "Trial failed");
                    failures.push(failure);
                }
            }
        }

        if costs.is_empty() {
            return Err(AggregateFailure {
                config,
                attempted: repeat_count,
                failures,
            });
        }

        Ok(AggregateResult {
            config,
            mean_cost: mean(&costs),
            mean_time: mean(&times),
            successful_trials: costs.len(),
            failed_trials: failures.len(),
        })
    }

    async fn run_trial(
        &self,
        instance: &Path,
        processor_override: Option<usize>,
    ) -> Result<(MetricRecord, f64), TrialFailure> {
        let output = self.solver.run(instance, processor_override).await?;
        let record = self.parser.parse(&output.stdout)?;
        let time = match self.time_source {
            TimeSource::Reported => record.reported_time,
            TimeSource::WallClock => output.elapsed.as_secs_f64(),
        };
        Ok((record, time))
    }
}

/// Arithmetic mean. Callers guarantee a non-empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::{ParseError, SolverInvocationError};
    use crate::testing::{solver_output, ScriptedSolver, Step};

    fn cell() -> TrialConfig {
        TrialConfig {
            job_count: 10,
            processor_count: 2,
            cooling: CoolingStrategy::Cauchy,
        }
    }

    #[tokio::test]
    async fn test_failed_trials_are_skipped_not_zeroed() {
        let solver = ScriptedSolver::new(vec![
            Step::Output(solver_output(10.0, 1.0)),
            Step::Fail,
            Step::Output(solver_output(20.0, 2.0)),
            Step::Output("Schedule (M=2, N=10): (K1)=5\n".to_string()),
            Step::Output(solver_output(30.0, 3.0)),
        ]);
        let parser = OutputParser::default();
        let aggregator = TrialAggregator::new(&solver, &parser, TimeSource::Reported);

        let result = aggregator
            .aggregate(cell(), Path::new("input.csv"), 5)
            .await
            .unwrap();

        assert_eq!(result.successful_trials, 3);
        assert_eq!(result.failed_trials, 2);
        assert_eq!(result.mean_cost, 20.0);
        assert_eq!(result.mean_time, 2.0);
        assert_eq!(solver.calls(), 5);
    }

    #[tokio::test]
    async fn test_all_trials_failing_is_explicit_failure() {
        let solver = ScriptedSolver::new(vec![Step::Fail; 5]);
        let parser = OutputParser::default();
        let aggregator = TrialAggregator::new(&solver, &parser, TimeSource::Reported);

        let failure = aggregator
            .aggregate(cell(), Path::new("input.csv"), 5)
            .await
            .unwrap_err();

        assert_eq!(failure.config, cell());
        assert_eq!(failure.attempted, 5);
        assert_eq!(failure.failures.len(), 5);
        assert!(matches!(
            failure.failures[0],
            TrialFailure::Invocation(SolverInvocationError::NonZeroExit { .. })
        ));
    }

    #[tokio::test]
    async fn test_parse_failures_are_tagged() {
        let solver = ScriptedSolver::new(vec![Step::Output("nothing useful\n".to_string())]);
        let parser = OutputParser::default();
        let aggregator = TrialAggregator::new(&solver, &parser, TimeSource::Reported);

        let failure = aggregator
            .aggregate(cell(), Path::new("input.csv"), 1)
            .await
            .unwrap_err();

        match &failure.failures[0] {
            TrialFailure::Parse(err) => assert_eq!(
                *err,
                ParseError::Missing {
                    marker: crate::error::Marker::Cost
                }
            ),
            other => panic!("expected parse failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wall_clock_time_source() {
        let solver = ScriptedSolver::new(vec![
            Step::Timed(solver_output(8.0, 100.0), Duration::from_millis(500)),
            Step::Timed(solver_output(4.0, 100.0), Duration::from_millis(1500)),
        ]);
        let parser = OutputParser::default();
        let aggregator = TrialAggregator::new(&solver, &parser, TimeSource::WallClock);

        let result = aggregator
            .aggregate(cell(), Path::new("input.csv"), 2)
            .await
            .unwrap();

        assert_eq!(result.mean_cost, 6.0);
        assert!((result.mean_time - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_processor_override_passed_through() {
        let solver = ScriptedSolver::new(vec![Step::Output(solver_output(1.0, 1.0)); 2]);
        let parser = OutputParser::default();

        TrialAggregator::new(&solver, &parser, TimeSource::Reported)
            .aggregate(cell(), Path::new("input.csv"), 1)
            .await
            .unwrap();
        TrialAggregator::new(&solver, &parser, TimeSource::Reported)
            .with_processor_override(true)
            .aggregate(cell(), Path::new("input.csv"), 1)
            .await
            .unwrap();

        assert_eq!(solver.overrides(), vec![None, Some(2)]);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
        assert_eq!(mean(&[42.0]), 42.0);
    }
}
