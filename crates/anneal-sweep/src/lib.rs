//! Anneal Sweep: benchmarking harness for an external simulated-annealing scheduler.
//!
//! This crate drives parameter sweeps over a black-box solver:
//! - Generates random job-scheduling instances
//! - Runs the solver repeatedly per (jobs, processors, cooling) cell
//! - Parses cost and time from solver output and averages successful trials
//! - Collects fixed-schema result tables and pivots them for heatmaps

pub mod aggregate;
pub mod config;
pub mod error;
pub mod generator;
pub mod heatmap;
pub mod instance;
pub mod parser;
pub mod results;
pub mod solver;
pub mod sweep;

#[cfg(test)]
mod testing;

pub use aggregate::{AggregateResult, TimeSource, TrialAggregator, TrialConfig};
pub use config::{ScalingConfig, SweepConfig};
pub use error::{AggregateFailure, ParseError, SchemaMismatchError, SolverInvocationError, SweepError};
pub use generator::InstanceGenerator;
pub use instance::{CoolingStrategy, ProblemInstance};
pub use parser::{MarkerPatterns, MarkerPreset, MetricRecord, OutputParser};
pub use results::{CellRow, Dimension, Metric, PivotGrid, ProcessorRow, ResultTable, Schema};
pub use solver::{ProcessSolver, RawTrialOutput, Solver};
pub use sweep::{CellFailure, RunSummary, ScalingStudy, SweepDriver, SweepReport};
