//! Run configuration.
//!
//! Everything a run needs (paths, grid axes, repeat counts, seed) travels in
//! an explicit config value. Configs load from TOML; any field left out takes
//! the default below, and CLI flags override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::aggregate::TimeSource;
use crate::error::ConfigError;
use crate::instance::CoolingStrategy;
use crate::parser::{MarkerPatterns, MarkerPreset, OutputParser};
use crate::solver::ProcessSolver;

/// Configuration for a full (jobs x processors x cooling) sweep.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Solver executable
    pub solver: PathBuf,
    /// The single instance file shared by all strategies of a cell
    pub instance_path: PathBuf,
    /// Stream rows to this CSV while the sweep runs
    pub output: Option<PathBuf>,
    pub job_counts: Vec<usize>,
    pub processor_counts: Vec<usize>,
    pub cooling_strategies: Vec<CoolingStrategy>,
    /// Strategy written when an instance is first generated
    pub reference_cooling: CoolingStrategy,
    pub min_duration: u32,
    pub max_duration: u32,
    /// Solver runs per cell
    pub repeat_count: usize,
    /// Seed for instance generation (None = nondeterministic)
    pub seed: Option<u64>,
    /// Per-run solver timeout in seconds; 0 disables the timeout
    pub solver_timeout_secs: u64,
    pub time_source: TimeSource,
    pub markers: MarkerPreset,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            solver: PathBuf::from("./main"),
            instance_path: PathBuf::from("input/input.csv"),
            output: None,
            job_counts: (1..=20).map(|i| 500 * i).collect(),
            processor_counts: (1..=10).map(|i| 5 * i).collect(),
            cooling_strategies: CoolingStrategy::all(),
            reference_cooling: CoolingStrategy::Cauchy,
            min_duration: 2,
            max_duration: 20,
            repeat_count: 5,
            seed: None,
            solver_timeout_secs: 600,
            time_source: TimeSource::Reported,
            markers: MarkerPreset::Sequential,
        }
    }
}

impl SweepConfig {
    /// Load from a TOML file and validate.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: SweepConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive_axis("job_counts", &self.job_counts)?;
        require_positive_axis("processor_counts", &self.processor_counts)?;

        if self.cooling_strategies.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cooling_strategies",
                reason: "must list at least one strategy".to_string(),
            });
        }
        for (i, strategy) in self.cooling_strategies.iter().enumerate() {
            if self.cooling_strategies[..i].contains(strategy) {
                return Err(ConfigError::InvalidValue {
                    field: "cooling_strategies",
                    reason: format!("{} is listed twice", strategy),
                });
            }
        }

        if self.min_duration == 0 || self.min_duration > self.max_duration {
            return Err(ConfigError::InvalidValue {
                field: "min_duration",
                reason: format!(
                    "duration bounds [{}, {}] must be positive with min <= max",
                    self.min_duration, self.max_duration
                ),
            });
        }

        require_repeats(self.repeat_count)?;
        self.markers.patterns()?;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.solver_timeout_secs)
    }

    pub fn patterns(&self) -> Result<MarkerPatterns, ConfigError> {
        self.markers.patterns()
    }

    /// Parser for the configured output markers.
    pub fn parser(&self) -> Result<OutputParser, ConfigError> {
        Ok(OutputParser::new(self.patterns()?))
    }

    /// The configured solver executable with its timeout applied.
    pub fn process_solver(&self) -> ProcessSolver {
        ProcessSolver::new(&self.solver).with_timeout(self.timeout())
    }

    /// Number of cells the sweep will attempt.
    pub fn cell_count(&self) -> usize {
        self.job_counts.len() * self.processor_counts.len() * self.cooling_strategies.len()
    }
}

/// Configuration for a scalability study over processor counts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScalingConfig {
    pub solver: PathBuf,
    /// Existing instance file; its processor count is overridden per run
    pub instance_path: PathBuf,
    pub output: Option<PathBuf>,
    pub processor_counts: Vec<usize>,
    pub repeat_count: usize,
    pub solver_timeout_secs: u64,
    pub time_source: TimeSource,
    pub markers: MarkerPreset,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            solver: PathBuf::from("./main_parallel"),
            instance_path: PathBuf::from("input/input.csv"),
            output: None,
            processor_counts: (2..=14).step_by(2).collect(),
            repeat_count: 2,
            solver_timeout_secs: 600,
            time_source: TimeSource::Reported,
            markers: MarkerPreset::Parallel,
        }
    }
}

impl ScalingConfig {
    /// Load from a TOML file and validate.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ScalingConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive_axis("processor_counts", &self.processor_counts)?;
        require_repeats(self.repeat_count)?;
        self.markers.patterns()?;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.solver_timeout_secs)
    }

    pub fn patterns(&self) -> Result<MarkerPatterns, ConfigError> {
        self.markers.patterns()
    }

    pub fn parser(&self) -> Result<OutputParser, ConfigError> {
        Ok(OutputParser::new(self.patterns()?))
    }

    pub fn process_solver(&self) -> ProcessSolver {
        ProcessSolver::new(&self.solver).with_timeout(self.timeout())
    }
}

fn require_positive_axis(field: &'static str, values: &[usize]) -> Result<(), ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if values.contains(&0) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "values must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn require_repeats(repeat_count: usize) -> Result<(), ConfigError> {
    if repeat_count == 0 {
        return Err(ConfigError::InvalidValue {
            field: "repeat_count",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SweepConfig::default();
        config.validate().unwrap();
        assert_eq!(config.job_counts.first(), Some(&500));
        assert_eq!(config.job_counts.last(), Some(&10_000));
        assert_eq!(config.processor_counts, vec![5, 10, 15, 20, 25, 30, 35, 40, 45, 50]);
        assert_eq!(config.cell_count(), 20 * 10 * 3);
        assert_eq!(config.timeout(), Some(Duration::from_secs(600)));

        let scaling = ScalingConfig::default();
        scaling.validate().unwrap();
        assert_eq!(scaling.processor_counts, vec![2, 4, 6, 8, 10, 12, 14]);
    }

    #[test]
    fn test_toml_overrides_and_defaults() {
        let config: SweepConfig = toml::from_str(
            r#"
            solver = "./build/main"
            job_counts = [10, 20]
            processor_counts = [2]
            cooling_strategies = ["Cauchy", "Boltzmann"]
            repeat_count = 1
            seed = 7
            solver_timeout_secs = 0
            time_source = "wall_clock"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.solver, PathBuf::from("./build/main"));
        assert_eq!(config.job_counts, vec![10, 20]);
        assert_eq!(
            config.cooling_strategies,
            vec![CoolingStrategy::Cauchy, CoolingStrategy::Boltzmann]
        );
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.timeout(), None);
        assert_eq!(config.time_source, TimeSource::WallClock);
        // Untouched fields keep their defaults
        assert_eq!(config.min_duration, 2);
        assert_eq!(config.markers, MarkerPreset::Sequential);
    }

    #[test]
    fn test_custom_markers_from_toml() {
        let config: ScalingConfig = toml::from_str(
            r#"
            [markers.custom]
            cost = 'cost=(\S+)'
            time = 'took (\S+)s'
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert!(matches!(config.markers, MarkerPreset::Custom { .. }));
    }

    #[test]
    fn test_parser_follows_markers() {
        let config = SweepConfig {
            markers: MarkerPreset::Custom {
                cost: r"cost=(\S+)".to_string(),
                time: r"took (\S+)s".to_string(),
            },
            ..Default::default()
        };
        let record = config.parser().unwrap().parse("cost=4\ntook 0.5s\n").unwrap();
        assert_eq!(record.final_cost, 4.0);
        assert_eq!(record.reported_time, 0.5);

        // The parallel preset does not understand sequential output
        let scaling = ScalingConfig::default();
        assert!(scaling
            .parser()
            .unwrap()
            .parse("Best solution found (time 1 s):\n(K1)=3\n")
            .is_err());
    }

    #[test]
    fn test_process_solver_uses_configured_executable() {
        let config = SweepConfig {
            solver: PathBuf::from("/opt/anneal/main"),
            ..Default::default()
        };
        assert_eq!(config.process_solver().executable(), Path::new("/opt/anneal/main"));
        assert_eq!(
            ScalingConfig::default().process_solver().executable(),
            Path::new("./main_parallel")
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<SweepConfig, _> = toml::from_str("repeats = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let invalid = [
            SweepConfig {
                job_counts: vec![],
                ..Default::default()
            },
            SweepConfig {
                processor_counts: vec![4, 0],
                ..Default::default()
            },
            SweepConfig {
                cooling_strategies: vec![],
                ..Default::default()
            },
            SweepConfig {
                cooling_strategies: vec![CoolingStrategy::Mixed, CoolingStrategy::Mixed],
                ..Default::default()
            },
            SweepConfig {
                min_duration: 30,
                max_duration: 20,
                ..Default::default()
            },
            SweepConfig {
                repeat_count: 0,
                ..Default::default()
            },
            SweepConfig {
                markers: MarkerPreset::Custom {
                    cost: "no group".to_string(),
                    time: r"(\S+)".to_string(),
                },
                ..Default::default()
            },
        ];

        for config in invalid {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.toml");
        std::fs::write(&path, "repeat_count = 0\n").unwrap();
        assert!(matches!(
            SweepConfig::from_path(&path),
            Err(ConfigError::InvalidValue {
                field: "repeat_count",
                ..
            })
        ));

        std::fs::write(&path, "repeat_count = 3\n").unwrap();
        assert_eq!(SweepConfig::from_path(&path).unwrap().repeat_count, 3);

        assert!(matches!(
            SweepConfig::from_path(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
