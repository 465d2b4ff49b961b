//! ProblemInstance: the scheduling problem handed to the solver.
//!
//! On disk an instance is two comma-separated lines:
//!
//! ```text
//! jobCount,processorCount,coolingStrategy,minDuration,maxDuration
//! d1,d2,...,dN
//! ```
//!
//! The instance file is the single handoff point between the harness and the
//! solver, so writes are flushed and closed before returning.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InstanceGenerationError, UnknownCoolingStrategy};

/// Temperature-reduction schedule used by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoolingStrategy {
    Boltzmann,
    Cauchy,
    Mixed,
}

impl CoolingStrategy {
    /// Every strategy the solver understands.
    pub fn all() -> Vec<Self> {
        vec![Self::Boltzmann, Self::Cauchy, Self::Mixed]
    }

    /// Canonical name, as written to instance and result files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boltzmann => "Boltzmann",
            Self::Cauchy => "Cauchy",
            Self::Mixed => "Mixed",
        }
    }
}

impl fmt::Display for CoolingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CoolingStrategy {
    type Err = UnknownCoolingStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "boltzmann" => Ok(Self::Boltzmann),
            "cauchy" => Ok(Self::Cauchy),
            "mixed" => Ok(Self::Mixed),
            _ => Err(UnknownCoolingStrategy(s.to_string())),
        }
    }
}

/// A job-scheduling problem: N job durations to spread over M processors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemInstance {
    processor_count: usize,
    cooling: CoolingStrategy,
    min_duration: u32,
    max_duration: u32,
    durations: Vec<u32>,
}

impl ProblemInstance {
    /// Create an instance, checking counts and that every duration is in bounds.
    pub fn new(
        processor_count: usize,
        cooling: CoolingStrategy,
        min_duration: u32,
        max_duration: u32,
        durations: Vec<u32>,
    ) -> Result<Self, InstanceGenerationError> {
        validate_shape(durations.len(), processor_count, min_duration, max_duration)?;

        if let Some((index, &value)) = durations
            .iter()
            .enumerate()
            .find(|&(_, &d)| d < min_duration || d > max_duration)
        {
            return Err(InstanceGenerationError::DurationOutOfBounds {
                index,
                value,
                min: min_duration,
                max: max_duration,
            });
        }

        Ok(Self {
            processor_count,
            cooling,
            min_duration,
            max_duration,
            durations,
        })
    }

    pub fn job_count(&self) -> usize {
        self.durations.len()
    }

    pub fn processor_count(&self) -> usize {
        self.processor_count
    }

    pub fn cooling(&self) -> CoolingStrategy {
        self.cooling
    }

    /// Duration bounds the instance was generated with.
    pub fn bounds(&self) -> (u32, u32) {
        (self.min_duration, self.max_duration)
    }

    pub fn durations(&self) -> &[u32] {
        &self.durations
    }

    /// Replace the cooling strategy, leaving durations and counts untouched.
    pub fn set_cooling(&mut self, cooling: CoolingStrategy) {
        self.cooling = cooling;
    }

    /// Serialize to the two-line instance format.
    pub fn encode(&self) -> String {
        let durations: Vec<String> = self.durations.iter().map(|d| d.to_string()).collect();
        format!(
            "{},{},{},{},{}\n{}\n",
            self.job_count(),
            self.processor_count,
            self.cooling,
            self.min_duration,
            self.max_duration,
            durations.join(",")
        )
    }

    /// Parse the two-line instance format.
    pub fn decode(text: &str) -> Result<Self, InstanceGenerationError> {
        let mut lines = text.lines();

        let header = lines
            .next()
            .ok_or_else(|| InstanceGenerationError::Malformed("empty instance".to_string()))?;
        let fields: Vec<&str> = header.split(',').map(str::trim).collect();
        if fields.len() != 5 {
            return Err(InstanceGenerationError::Malformed(format!(
                "header has {} fields, expected 5 (jobCount,processorCount,coolingStrategy,minDuration,maxDuration)",
                fields.len()
            )));
        }

        let job_count: usize = parse_field(fields[0], "jobCount")?;
        let processor_count: usize = parse_field(fields[1], "processorCount")?;
        let cooling: CoolingStrategy = fields[2].parse()?;
        let min_duration: u32 = parse_field(fields[3], "minDuration")?;
        let max_duration: u32 = parse_field(fields[4], "maxDuration")?;

        let durations_line = lines.next().ok_or_else(|| {
            InstanceGenerationError::Malformed("missing durations line".to_string())
        })?;
        let durations = durations_line
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_field::<u32>(s, "duration"))
            .collect::<Result<Vec<_>, _>>()?;

        if durations.len() != job_count {
            return Err(InstanceGenerationError::LengthMismatch {
                declared: job_count,
                found: durations.len(),
            });
        }

        if lines.any(|l| !l.trim().is_empty()) {
            return Err(InstanceGenerationError::Malformed(
                "unexpected content after durations line".to_string(),
            ));
        }

        Self::new(processor_count, cooling, min_duration, max_duration, durations)
    }

    /// Write the instance to `path`, flushing and closing the file before returning.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), InstanceGenerationError> {
        let path = path.as_ref();
        let io_err = |source| InstanceGenerationError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.encode().as_bytes()).map_err(io_err)?;
        let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;
        Ok(())
    }

    /// Read and validate an instance file.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, InstanceGenerationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| InstanceGenerationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&text)
    }
}

/// Rewrite only the cooling strategy of the instance stored at `path`.
///
/// Loads the structured instance, swaps the strategy and re-serializes, so the
/// durations the solver sees stay identical across strategies.
pub fn set_cooling_in_place(
    path: impl AsRef<Path>,
    cooling: CoolingStrategy,
) -> Result<(), InstanceGenerationError> {
    let path = path.as_ref();
    let mut instance = ProblemInstance::read_from(path)?;
    instance.set_cooling(cooling);
    instance.write_to(path)
}

/// Check the counts and bounds every instance must satisfy.
pub(crate) fn validate_shape(
    job_count: usize,
    processor_count: usize,
    min_duration: u32,
    max_duration: u32,
) -> Result<(), InstanceGenerationError> {
    if job_count == 0 {
        return Err(InstanceGenerationError::ZeroJobs);
    }
    if processor_count == 0 {
        return Err(InstanceGenerationError::ZeroProcessors);
    }
    if min_duration == 0 || min_duration > max_duration {
        return Err(InstanceGenerationError::InvalidBounds {
            min: min_duration,
            max: max_duration,
        });
    }
    Ok(())
}

fn parse_field<T: FromStr>(raw: &str, field: &str) -> Result<T, InstanceGenerationError> {
    raw.parse().map_err(|_| {
        InstanceGenerationError::Malformed(format!("{} is not a valid number: {:?}", field, raw))
    })
}

impl fmt::Display for ProblemInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} jobs on {} processors, {} cooling, durations in [{}, {}]",
            self.job_count(),
            self.processor_count,
            self.cooling,
            self.min_duration,
            self.max_duration
        )?;
        let total: u64 = self.durations.iter().map(|&d| d as u64).sum();
        write!(f, "Total work: {}", total)
    }
}
