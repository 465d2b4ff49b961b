//! Solver output parsing.
//!
//! The solver prints free-form text. Two markers are extracted independently:
//!
//! - **cost**: the `(K1)=` value of a schedule report. Intermediate schedules
//!   may be printed along the way, so the *last* occurrence wins.
//! - **time**: the elapsed seconds printed next to the solution message. The
//!   first occurrence is used.
//!
//! Each pattern captures the raw value token rather than a number, so a marker
//! that is present but garbled is reported differently from one that is absent.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Marker, ParseError};

/// Metrics extracted from one solver run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRecord {
    /// Objective value (K1) of the final schedule
    pub final_cost: f64,
    /// Elapsed seconds as reported by the solver
    pub reported_time: f64,
}

/// Regular expressions locating the cost and time markers.
///
/// Each pattern must have exactly one capture group around the value token.
#[derive(Debug, Clone)]
pub struct MarkerPatterns {
    cost: Regex,
    time: Regex,
}

/// Output format of a known solver build, or user-supplied patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPreset {
    /// Sequential build: `Best solution found (time T s):` then a schedule line
    Sequential,
    /// Threaded build: progress schedules, then a total-time line
    Parallel,
    /// Custom patterns, each with one capture group
    Custom { cost: String, time: String },
}

impl MarkerPreset {
    pub fn patterns(&self) -> Result<MarkerPatterns, ConfigError> {
        match self {
            Self::Sequential => Ok(MarkerPatterns::sequential()),
            Self::Parallel => Ok(MarkerPatterns::parallel()),
            Self::Custom { cost, time } => MarkerPatterns::custom(cost, time),
        }
    }
}

impl MarkerPatterns {
    /// Markers printed by the sequential solver build.
    pub fn sequential() -> Self {
        Self::from_known(r"\(K1\)=(\S+)", r"Best solution found \(time (\S+) s\)")
    }

    /// Markers printed by the threaded solver build.
    pub fn parallel() -> Self {
        Self::from_known(
            r"Schedule\s*\(M=\d+,\s*N=\d+\):\s*\(K1\)=(\S+)",
            r"Общее время работы:\s*(\S+)\s*сек",
        )
    }

    /// Compile user-supplied patterns.
    pub fn custom(cost: &str, time: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            cost: compile(Marker::Cost, cost)?,
            time: compile(Marker::Time, time)?,
        })
    }

    fn from_known(cost: &str, time: &str) -> Self {
        Self::custom(cost, time).expect("built-in marker patterns are valid")
    }
}

fn compile(marker: Marker, pattern: &str) -> Result<Regex, ConfigError> {
    let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        marker,
        reason: e.to_string(),
    })?;
    // captures_len counts the implicit whole-match group
    if regex.captures_len() != 2 {
        return Err(ConfigError::InvalidPattern {
            marker,
            reason: format!(
                "expected exactly one capture group, found {}",
                regex.captures_len() - 1
            ),
        });
    }
    Ok(regex)
}

/// Extracts a [`MetricRecord`] from solver stdout.
#[derive(Debug, Clone)]
pub struct OutputParser {
    patterns: MarkerPatterns,
}

impl OutputParser {
    pub fn new(patterns: MarkerPatterns) -> Self {
        Self { patterns }
    }

    /// Parse solver output. Fails if either marker is missing or unusable.
    pub fn parse(&self, stdout: &str) -> Result<MetricRecord, ParseError> {
        let cost_raw = self
            .patterns
            .cost
            .captures_iter(stdout)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        let final_cost = to_metric(Marker::Cost, cost_raw)?;

        let time_raw = self
            .patterns
            .time
            .captures(stdout)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        let reported_time = to_metric(Marker::Time, time_raw)?;

        Ok(MetricRecord {
            final_cost,
            reported_time,
        })
    }
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new(MarkerPatterns::sequential())
    }
}

const TRAILING_PUNCTUATION: &[char] = &[',', ';', ':', ')', ']'];

fn to_metric(marker: Marker, raw: Option<&str>) -> Result<f64, ParseError> {
    let raw = raw.ok_or(ParseError::Missing { marker })?;
    // Punctuation glued to the token, e.g. "12.5," or "3.0)"; nothing else is stripped
    let token = raw.trim_end_matches(TRAILING_PUNCTUATION);
    let value: f64 = token.parse().map_err(|_| ParseError::NonNumeric {
        marker,
        raw: raw.to_string(),
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(ParseError::OutOfRange { marker, value });
    }
    Ok(value)
}
