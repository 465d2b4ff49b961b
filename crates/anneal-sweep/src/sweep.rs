//! Sweep driver and scalability study.
//!
//! The driver walks the (jobs x processors x cooling) grid strictly in order.
//! Each (jobs, processors) pair gets one generated instance, written to the
//! single instance path. Every cooling strategy then rewrites only the
//! strategy field of that file before its trials run, so all strategies of a
//! cell see identical durations.
//!
//! Cells whose trials all fail are recorded in the report and left out of the
//! table. Instance, schema and table I/O errors abort the run.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{AggregateResult, TrialAggregator, TrialConfig};
use crate::config::{ScalingConfig, SweepConfig};
use crate::error::{AggregateFailure, InstanceGenerationError, SweepError};
use crate::generator::InstanceGenerator;
use crate::instance::{set_cooling_in_place, ProblemInstance};
use crate::results::{CellRow, ProcessorRow, ResultRow, ResultTable, RowWriter, Schema};
use crate::solver::Solver;

/// A cell for which no trial succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellFailure {
    pub config: TrialConfig,
    pub attempted: usize,
    /// One message per failed trial
    pub reasons: Vec<String>,
}

impl From<AggregateFailure> for CellFailure {
    fn from(failure: AggregateFailure) -> Self {
        Self {
            config: failure.config,
            attempted: failure.attempted,
            reasons: failure.failures.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Counts and failures of a finished run, without the table itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub cells_attempted: usize,
    pub rows_written: usize,
    pub failures: Vec<CellFailure>,
}

impl RunSummary {
    /// Save the summary as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a summary from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let summary = serde_json::from_str(&json)?;
        Ok(summary)
    }
}

/// Outcome of a sweep or scaling run.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub table: ResultTable,
    pub cells_attempted: usize,
    pub rows_written: usize,
    pub failures: Vec<CellFailure>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SweepReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            started_at: self.started_at,
            ended_at: self.ended_at,
            cells_attempted: self.cells_attempted,
            rows_written: self.rows_written,
            failures: self.failures.clone(),
        }
    }
}

/// Scalability runs report the same shape, over a processor-averaged table.
pub type ScalingReport = SweepReport;

/// Collects rows into a table and, optionally, a streaming CSV.
struct RowSink {
    table: ResultTable,
    writer: Option<RowWriter>,
    cells_attempted: usize,
    failures: Vec<CellFailure>,
    started_at: DateTime<Utc>,
}

impl RowSink {
    fn new(schema: Schema, output: Option<&Path>) -> Result<Self, SweepError> {
        let writer = output
            .map(|path| RowWriter::create(path, schema))
            .transpose()?;
        Ok(Self {
            table: ResultTable::new(schema),
            writer,
            cells_attempted: 0,
            failures: Vec::new(),
            started_at: Utc::now(),
        })
    }

    fn push(&mut self, row: ResultRow) -> Result<(), SweepError> {
        self.table.append(row.clone())?;
        if let Some(writer) = self.writer.as_mut() {
            writer.write(&row)?;
        }
        Ok(())
    }

    fn fail(&mut self, failure: AggregateFailure) {
        warn!(
            config = %failure.config,
            attempted = failure.attempted,
            "All trials failed, cell omitted"
        );
        self.failures.push(failure.into());
    }

    fn finish(self) -> SweepReport {
        let rows_written = self.table.len();
        info!(
            attempted = self.cells_attempted,
            written = rows_written,
            failed = self.failures.len(),
            "Run finished"
        );
        SweepReport {
            table: self.table,
            cells_attempted: self.cells_attempted,
            rows_written,
            failures: self.failures,
            started_at: self.started_at,
            ended_at: Utc::now(),
        }
    }
}

/// Runs the full parameter sweep.
///
/// Output is parsed with the config's `markers`. The solver is supplied by
/// the caller; [`SweepConfig::process_solver`] builds the external one from
/// `solver` and `solver_timeout_secs`.
pub struct SweepDriver<'a> {
    config: SweepConfig,
    solver: &'a dyn Solver,
}

impl<'a> SweepDriver<'a> {
    pub fn new(config: SweepConfig, solver: &'a dyn Solver) -> Self {
        Self { config, solver }
    }

    /// Run every cell of the grid in order and collect the averaged rows.
    pub async fn run(&self) -> Result<SweepReport, SweepError> {
        let config = &self.config;
        config.validate()?;
        let parser = config.parser()?;
        ensure_parent_dir(&config.instance_path)?;

        info!(
            cells = config.cell_count(),
            repeats = config.repeat_count,
            solver = %config.solver.display(),
            "Starting sweep"
        );

        let mut generator = InstanceGenerator::new(config.seed);
        let aggregator = TrialAggregator::new(self.solver, &parser, config.time_source);
        let mut sink = RowSink::new(Schema::CellAveraged, config.output.as_deref())?;
        let total = config.cell_count();

        for &job_count in &config.job_counts {
            for &processor_count in &config.processor_counts {
                let instance = generator.generate(
                    job_count,
                    processor_count,
                    config.reference_cooling,
                    config.min_duration,
                    config.max_duration,
                )?;
                instance.write_to(&config.instance_path)?;

                for &cooling in &config.cooling_strategies {
                    set_cooling_in_place(&config.instance_path, cooling)?;

                    let cell = TrialConfig {
                        job_count,
                        processor_count,
                        cooling,
                    };
                    sink.cells_attempted += 1;

                    match aggregator
                        .aggregate(cell, &config.instance_path, config.repeat_count)
                        .await
                    {
                        Ok(result) => {
                            log_cell(&result, sink.cells_attempted, total);
                            sink.push(CellRow::from(&result).into())?;
                        }
                        Err(failure) => sink.fail(failure),
                    }
                }
            }
        }

        Ok(sink.finish())
    }
}

/// Measures how an existing instance scales with the processor count.
///
/// The instance file is left untouched; each processor count is passed to
/// the solver on the command line instead. Markers and solver are handled as
/// in [`SweepDriver`].
pub struct ScalingStudy<'a> {
    config: ScalingConfig,
    solver: &'a dyn Solver,
}

impl<'a> ScalingStudy<'a> {
    pub fn new(config: ScalingConfig, solver: &'a dyn Solver) -> Self {
        Self { config, solver }
    }

    pub async fn run(&self) -> Result<ScalingReport, SweepError> {
        let config = &self.config;
        config.validate()?;
        let parser = config.parser()?;

        let instance = ProblemInstance::read_from(&config.instance_path)?;
        info!(
            jobs = instance.job_count(),
            cooling = %instance.cooling(),
            processor_counts = ?config.processor_counts,
            "Starting scalability study"
        );

        let aggregator = TrialAggregator::new(self.solver, &parser, config.time_source)
            .with_processor_override(true);
        let mut sink = RowSink::new(Schema::ProcessorAveraged, config.output.as_deref())?;
        let total = config.processor_counts.len();

        for &processor_count in &config.processor_counts {
            let cell = TrialConfig {
                job_count: instance.job_count(),
                processor_count,
                cooling: instance.cooling(),
            };
            sink.cells_attempted += 1;

            match aggregator
                .aggregate(cell, &config.instance_path, config.repeat_count)
                .await
            {
                Ok(result) => {
                    log_cell(&result, sink.cells_attempted, total);
                    sink.push(ProcessorRow::from(&result).into())?;
                }
                Err(failure) => sink.fail(failure),
            }
        }

        Ok(sink.finish())
    }
}

fn log_cell(result: &AggregateResult, completed: usize, total: usize) {
    info!(
        progress = format!("{}/{}", completed, total),
        config = %result.config,
        cost = result.mean_cost,
        time = result.mean_time,
        failed_trials = result.failed_trials,
        "Completed cell"
    );
}

fn ensure_parent_dir(path: &Path) -> Result<(), InstanceGenerationError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| InstanceGenerationError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
