//! Anneal Sweep CLI.
//!
//! Commands:
//! - generate: Write a random instance file
//! - sweep: Run the full jobs × processors × cooling sweep
//! - scaling: Run one instance across processor counts
//! - heatmaps: Export pivot grids from a results CSV

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use anneal_sweep::aggregate::TimeSource;
use anneal_sweep::config::{ScalingConfig, SweepConfig};
use anneal_sweep::generator::InstanceGenerator;
use anneal_sweep::heatmap::write_heatmaps;
use anneal_sweep::instance::CoolingStrategy;
use anneal_sweep::parser::MarkerPreset;
use anneal_sweep::results::ResultTable;
use anneal_sweep::sweep::{ScalingStudy, SweepDriver, SweepReport};

/// Generate a timestamped output path from the given path.
/// e.g., "results.csv" -> "results-20260108-010530.csv"
fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("csv");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

#[derive(Parser)]
#[command(name = "anneal-sweep")]
#[command(version)]
#[command(about = "Parameter sweeps over an external simulated-annealing scheduler")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random instance file
    Generate {
        /// Number of jobs
        #[arg(long, default_value = "500")]
        jobs: usize,

        /// Number of processors
        #[arg(long, default_value = "5")]
        processors: usize,

        /// Cooling strategy written to the instance
        #[arg(long, default_value = "Cauchy")]
        cooling: String,

        /// Minimum job duration
        #[arg(long, default_value = "2")]
        min_duration: u32,

        /// Maximum job duration
        #[arg(long, default_value = "20")]
        max_duration: u32,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Instance file to write
        #[arg(long, default_value = "input/input.csv")]
        output: PathBuf,
    },

    /// Run the full parameter sweep
    Sweep {
        /// TOML config file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Solver executable
        #[arg(long)]
        solver: Option<PathBuf>,

        /// Instance file the solver reads
        #[arg(long)]
        instance: Option<PathBuf>,

        /// Job counts to test (comma-separated)
        #[arg(long, value_delimiter = ',')]
        jobs: Option<Vec<usize>>,

        /// Processor counts to test (comma-separated)
        #[arg(long, value_delimiter = ',')]
        processors: Option<Vec<usize>>,

        /// Cooling strategies to test (comma-separated). Default: all
        /// Valid: Boltzmann, Cauchy, Mixed
        #[arg(long, value_delimiter = ',')]
        strategies: Option<Vec<String>>,

        /// Solver runs per cell
        #[arg(long)]
        repeats: Option<usize>,

        /// Random seed for instance generation
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        run: RunArgs,

        /// Output file for results [default: results.csv]
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run one instance across processor counts
    Scaling {
        /// TOML config file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Solver executable
        #[arg(long)]
        solver: Option<PathBuf>,

        /// Existing instance file
        #[arg(long)]
        instance: Option<PathBuf>,

        /// Processor counts to test (comma-separated)
        #[arg(long, value_delimiter = ',')]
        processors: Option<Vec<usize>>,

        /// Solver runs per processor count
        #[arg(long)]
        repeats: Option<usize>,

        #[command(flatten)]
        run: RunArgs,

        /// Output file for results [default: results_parallel.csv]
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Export heatmap grids from a sweep results CSV
    Heatmaps {
        /// Cell-averaged results CSV
        input: PathBuf,

        /// Directory for the grid CSVs
        #[arg(long, default_value = "heatmaps")]
        out_dir: PathBuf,
    },
}

/// Flags shared by the sweep and scaling commands.
#[derive(clap::Args)]
struct RunArgs {
    /// Per-run solver timeout in seconds (0 disables)
    #[arg(long)]
    timeout: Option<u64>,

    /// Average wall-clock time instead of the time the solver reports
    #[arg(long)]
    wall_clock: bool,

    /// Output marker format: sequential or parallel
    #[arg(long)]
    markers: Option<String>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Write results to the output path as given, without a timestamp suffix
    #[arg(long)]
    no_timestamp: bool,
}

impl RunArgs {
    /// `--output` beats the config file, which beats `fallback`.
    fn output_path(&self, flag: Option<PathBuf>, file: Option<PathBuf>, fallback: &str) -> PathBuf {
        let output = flag.or(file).unwrap_or_else(|| PathBuf::from(fallback));
        if self.no_timestamp {
            output
        } else {
            timestamped_path(&output)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Generate {
            jobs,
            processors,
            cooling,
            min_duration,
            max_duration,
            seed,
            output,
        } => {
            let cooling: CoolingStrategy = cooling.parse()?;
            let mut generator = InstanceGenerator::new(seed);
            let instance =
                generator.generate(jobs, processors, cooling, min_duration, max_duration)?;

            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            instance.write_to(&output)?;

            println!("\n=== Generated Instance ===");
            println!("{}", instance);
            println!("Written to: {}", output.display());
        }

        Commands::Sweep {
            config,
            solver,
            instance,
            jobs,
            processors,
            strategies,
            repeats,
            seed,
            run,
            output,
        } => {
            let mut config = match config {
                Some(path) => SweepConfig::from_path(&path)
                    .with_context(|| format!("loading sweep config {}", path.display()))?,
                None => SweepConfig::default(),
            };
            if let Some(solver) = solver {
                config.solver = solver;
            }
            if let Some(instance) = instance {
                config.instance_path = instance;
            }
            if let Some(jobs) = jobs {
                config.job_counts = jobs;
            }
            if let Some(processors) = processors {
                config.processor_counts = processors;
            }
            if let Some(names) = strategies {
                config.cooling_strategies = parse_strategies(&names)?;
            }
            if let Some(repeats) = repeats {
                config.repeat_count = repeats;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(timeout) = run.timeout {
                config.solver_timeout_secs = timeout;
            }
            if run.wall_clock {
                config.time_source = TimeSource::WallClock;
            }
            if let Some(markers) = &run.markers {
                config.markers = parse_markers(markers)?;
            }
            let output_path = run.output_path(output, config.output.take(), "results.csv");
            config.output = Some(output_path.clone());
            config.validate()?;

            let solver = config.process_solver();

            info!(
                solver = %solver.executable().display(),
                jobs = ?config.job_counts,
                processors = ?config.processor_counts,
                repeats = config.repeat_count,
                "Starting sweep experiment"
            );

            let report = SweepDriver::new(config, &solver)
                .run()
                .await
                .context("sweep aborted")?;

            println!("\n=== Sweep Complete ===");
            println!("Results saved to: {}", output_path.display());
            print_report(&report, run.summary.as_deref())?;
        }

        Commands::Scaling {
            config,
            solver,
            instance,
            processors,
            repeats,
            run,
            output,
        } => {
            let mut config = match config {
                Some(path) => ScalingConfig::from_path(&path)
                    .with_context(|| format!("loading scaling config {}", path.display()))?,
                None => ScalingConfig::default(),
            };
            if let Some(solver) = solver {
                config.solver = solver;
            }
            if let Some(instance) = instance {
                config.instance_path = instance;
            }
            if let Some(processors) = processors {
                config.processor_counts = processors;
            }
            if let Some(repeats) = repeats {
                config.repeat_count = repeats;
            }
            if let Some(timeout) = run.timeout {
                config.solver_timeout_secs = timeout;
            }
            if run.wall_clock {
                config.time_source = TimeSource::WallClock;
            }
            if let Some(markers) = &run.markers {
                config.markers = parse_markers(markers)?;
            }
            let output_path =
                run.output_path(output, config.output.take(), "results_parallel.csv");
            config.output = Some(output_path.clone());
            config.validate()?;

            let solver = config.process_solver();
            let report = ScalingStudy::new(config, &solver)
                .run()
                .await
                .context("scalability study aborted")?;

            println!("\n=== Scalability Study Complete ===");
            println!("Results saved to: {}", output_path.display());
            println!("\n  {:>6} {:>12} {:>14}", "Procs", "Avg time", "Avg cost");
            for row in report.table.processor_rows() {
                println!(
                    "  {:>6} {:>12.3} {:>14.2}",
                    row.num_proc, row.avg_exec_time, row.avg_final_cost
                );
            }
            print_report(&report, run.summary.as_deref())?;
        }

        Commands::Heatmaps { input, out_dir } => {
            let table = ResultTable::from_csv(&input)
                .with_context(|| format!("reading results {}", input.display()))?;
            let written = write_heatmaps(&table, &out_dir)?;

            println!("\n=== Heatmap Grids ===");
            for path in &written {
                println!("  {}", path.display());
            }
        }
    }

    Ok(())
}

fn print_report(report: &SweepReport, summary_path: Option<&Path>) -> Result<()> {
    println!("\nSummary:");
    println!("  Cells attempted: {}", report.cells_attempted);
    println!("  Rows written: {}", report.rows_written);
    if !report.failures.is_empty() {
        println!("  Failed cells:");
        for failure in &report.failures {
            println!("    {} ({} trials)", failure.config, failure.attempted);
            for reason in &failure.reasons {
                println!("      {}", reason);
            }
        }
    }

    if let Some(path) = summary_path {
        report
            .summary()
            .save(path)
            .with_context(|| format!("writing summary {}", path.display()))?;
        println!("Summary saved to: {}", path.display());
    }
    Ok(())
}

fn parse_strategies(names: &[String]) -> Result<Vec<CoolingStrategy>> {
    names
        .iter()
        .map(|name| name.parse::<CoolingStrategy>().map_err(Into::into))
        .collect()
}

fn parse_markers(s: &str) -> Result<MarkerPreset> {
    match s.to_lowercase().as_str() {
        "sequential" => Ok(MarkerPreset::Sequential),
        "parallel" => Ok(MarkerPreset::Parallel),
        _ => bail!(
            "Unknown marker format: {}. Use a config file for custom patterns.",
            s
        ),
    }
}
