//! Heatmap artifacts for the external plotting step.
//!
//! One artifact per (cooling strategy, metric). Each is the pivot grid of a
//! cell-averaged table written as CSV: the first column is the processor
//! count (descending), followed by one column per job count. Cells with no
//! data are left empty.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::ResultTableError;
use crate::instance::CoolingStrategy;
use crate::results::{Metric, PivotGrid, ResultTable};

/// Artifact stem for a strategy and metric, e.g. `heatmap_Cauchy_k1`.
pub fn artifact_name(cooling: CoolingStrategy, metric: Metric) -> String {
    format!("heatmap_{}_{}", cooling, metric.label())
}

/// Write one pivot CSV per (strategy, metric) into `out_dir`.
///
/// Returns the paths written, ordered by strategy then metric.
pub fn write_heatmaps(
    table: &ResultTable,
    out_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, ResultTableError> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir).map_err(|source| ResultTableError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut per_metric = Vec::new();
    for metric in Metric::all() {
        per_metric.push((metric, table.pivot_by_cooling(metric)?));
    }

    let mut written = Vec::new();
    for cooling in CoolingStrategy::all() {
        for (metric, grids) in &per_metric {
            let Some(grid) = grids.get(&cooling) else {
                continue;
            };
            let path = out_dir.join(format!("{}.csv", artifact_name(cooling, *metric)));
            write_grid(grid, &path)?;
            info!(path = %path.display(), "Wrote heatmap grid");
            written.push(path);
        }
    }
    Ok(written)
}

fn write_grid(grid: &PivotGrid, path: &Path) -> Result<(), ResultTableError> {
    let file = File::create(path).map_err(|source| ResultTableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header = vec!["num_processors".to_string()];
    header.extend(grid.jobs.iter().map(|jobs| jobs.to_string()));
    writer.write_record(&header)?;

    for (processors, cells) in grid.processors.iter().zip(&grid.cells) {
        let mut record = vec![processors.to_string()];
        record.extend(
            cells
                .iter()
                .map(|cell| cell.map(|value| value.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush().map_err(|source| ResultTableError::Io {
        path: path.to_path_buf(),
        source,
    })
}
