//! Error types for the sweep harness.
//!
//! Trial-level errors (`SolverInvocationError`, `ParseError`) are absorbed by
//! the aggregator. `AggregateFailure` is absorbed by the sweep driver. The
//! rest are fatal and surface as `SweepError`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::aggregate::TrialConfig;
use crate::results::Schema;

/// Invalid generation parameters or a malformed instance file.
#[derive(Debug, thiserror::Error)]
pub enum InstanceGenerationError {
    #[error("job count must be at least 1")]
    ZeroJobs,
    #[error("processor count must be at least 1")]
    ZeroProcessors,
    #[error("invalid duration bounds [{min}, {max}]: both must be positive and min <= max")]
    InvalidBounds { min: u32, max: u32 },
    #[error("duration {value} at position {index} is outside [{min}, {max}]")]
    DurationOutOfBounds {
        index: usize,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("instance declares {declared} jobs but lists {found} durations")]
    LengthMismatch { declared: usize, found: usize },
    #[error("malformed instance: {0}")]
    Malformed(String),
    #[error(transparent)]
    UnknownCooling(#[from] UnknownCoolingStrategy),
    #[error("instance file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A cooling strategy name the solver does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cooling strategy {0:?} (valid: Boltzmann, Cauchy, Mixed)")]
pub struct UnknownCoolingStrategy(pub String);

/// The external solver could not produce output.
#[derive(Debug, thiserror::Error)]
pub enum SolverInvocationError {
    #[error("solver executable not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to run solver {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("solver exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("solver did not finish within {after:?}")]
    Timeout { after: Duration },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Which output marker a parse error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Cost,
    Time,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Cost => write!(f, "cost"),
            Marker::Time => write!(f, "time"),
        }
    }
}

/// Solver output did not contain a usable metric.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("{marker} marker not found in solver output")]
    Missing { marker: Marker },
    #[error("{marker} marker value {raw:?} is not a number")]
    NonNumeric { marker: Marker, raw: String },
    #[error("{marker} marker value {value} is negative or not finite")]
    OutOfRange { marker: Marker, value: f64 },
}

impl ParseError {
    /// The marker that failed.
    pub fn marker(&self) -> Marker {
        match self {
            ParseError::Missing { marker }
            | ParseError::NonNumeric { marker, .. }
            | ParseError::OutOfRange { marker, .. } => *marker,
        }
    }
}

/// A row or file does not fit the table's fixed column schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaMismatchError {
    #[error("cannot append a {found} row to a {expected} table")]
    Row { expected: Schema, found: Schema },
    #[error("unrecognised result header: {header}")]
    Header { header: String },
}

/// Reading or writing a result table failed.
#[derive(Debug, thiserror::Error)]
pub enum ResultTableError {
    #[error("result file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Schema(#[from] SchemaMismatchError),
}

/// One failed trial inside an aggregate.
#[derive(Debug, thiserror::Error)]
pub enum TrialFailure {
    #[error("invocation failed: {0}")]
    Invocation(#[from] SolverInvocationError),
    #[error("unparseable output: {0}")]
    Parse(#[from] ParseError),
}

/// Every trial of a cell failed, so no mean exists.
#[derive(Debug, thiserror::Error)]
#[error("all {attempted} trials failed for {config}")]
pub struct AggregateFailure {
    pub config: TrialConfig,
    pub attempted: usize,
    pub failures: Vec<TrialFailure>,
}

/// Configuration could not be loaded or is structurally invalid.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("invalid {marker} marker pattern: {reason}")]
    InvalidPattern { marker: Marker, reason: String },
}

/// Fatal errors that abort a sweep or scaling run.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Instance(#[from] InstanceGenerationError),
    #[error(transparent)]
    Schema(#[from] SchemaMismatchError),
    #[error(transparent)]
    Table(#[from] ResultTableError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_reports_marker() {
        let err = ParseError::Missing {
            marker: Marker::Time,
        };
        assert_eq!(err.marker(), Marker::Time);
        assert_eq!(err.to_string(), "time marker not found in solver output");

        let err = ParseError::NonNumeric {
            marker: Marker::Cost,
            raw: "4x2".to_string(),
        };
        assert_eq!(err.marker(), Marker::Cost);
        assert!(err.to_string().contains("\"4x2\""));
    }

    #[test]
    fn test_non_zero_exit_display() {
        let err = SolverInvocationError::NonZeroExit {
            code: Some(3),
            stderr: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "solver exited with status 3: boom");

        let err = SolverInvocationError::NonZeroExit {
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("a signal"));
    }
}
