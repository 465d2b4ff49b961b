//! Result tables for sweep and scaling runs.
//!
//! A table has a column schema fixed at creation and is append-only. Two
//! schemas exist:
//!
//! - [`Schema::CellAveraged`]: one row per (jobs, processors, cooling) cell
//! - [`Schema::ProcessorAveraged`]: one row per processor count, for
//!   scalability-vs-parallelism studies
//!
//! Both persist as CSV with the column names external plotting scripts expect.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregate::{mean, AggregateResult};
use crate::error::{ResultTableError, SchemaMismatchError};
use crate::instance::CoolingStrategy;

/// Column layout of a result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    CellAveraged,
    ProcessorAveraged,
}

impl Schema {
    /// CSV column names, in order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::CellAveraged => &[
                "num_jobs",
                "num_processors",
                "cooling_method",
                "k1",
                "execution_time",
            ],
            Self::ProcessorAveraged => &["num_proc", "avg_exec_time", "avg_final_cost"],
        }
    }

    fn from_header(header: &csv::StringRecord) -> Result<Self, SchemaMismatchError> {
        [Self::CellAveraged, Self::ProcessorAveraged]
            .into_iter()
            .find(|schema| header.iter().eq(schema.columns().iter().copied()))
            .ok_or_else(|| SchemaMismatchError::Header {
                header: header.iter().collect::<Vec<_>>().join(","),
            })
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CellAveraged => write!(f, "cell-averaged"),
            Self::ProcessorAveraged => write!(f, "processor-averaged"),
        }
    }
}

/// Averaged metrics for one sweep cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRow {
    #[serde(rename = "num_jobs")]
    pub job_count: usize,
    #[serde(rename = "num_processors")]
    pub processor_count: usize,
    #[serde(rename = "cooling_method")]
    pub cooling: CoolingStrategy,
    /// Mean final cost (K1)
    #[serde(rename = "k1")]
    pub cost: f64,
    /// Mean execution time in seconds
    #[serde(rename = "execution_time")]
    pub time: f64,
}

impl From<&AggregateResult> for CellRow {
    fn from(result: &AggregateResult) -> Self {
        Self {
            job_count: result.config.job_count,
            processor_count: result.config.processor_count,
            cooling: result.config.cooling,
            cost: result.mean_cost,
            time: result.mean_time,
        }
    }
}

/// Averaged metrics for one processor count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorRow {
    pub num_proc: usize,
    pub avg_exec_time: f64,
    pub avg_final_cost: f64,
}

impl From<&AggregateResult> for ProcessorRow {
    fn from(result: &AggregateResult) -> Self {
        Self {
            num_proc: result.config.processor_count,
            avg_exec_time: result.mean_time,
            avg_final_cost: result.mean_cost,
        }
    }
}

/// A row of either schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRow {
    Cell(CellRow),
    Processor(ProcessorRow),
}

impl ResultRow {
    pub fn schema(&self) -> Schema {
        match self {
            Self::Cell(_) => Schema::CellAveraged,
            Self::Processor(_) => Schema::ProcessorAveraged,
        }
    }

    fn write<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        match self {
            Self::Cell(row) => writer.serialize(row),
            Self::Processor(row) => writer.serialize(row),
        }
    }
}

impl From<CellRow> for ResultRow {
    fn from(row: CellRow) -> Self {
        Self::Cell(row)
    }
}

impl From<ProcessorRow> for ResultRow {
    fn from(row: ProcessorRow) -> Self {
        Self::Processor(row)
    }
}

/// Config dimension a cell-averaged table can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Jobs,
    Processors,
    Cooling,
}

/// Grouping key; dimensions not grouped on are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub cooling: Option<CoolingStrategy>,
    pub processor_count: Option<usize>,
    pub job_count: Option<usize>,
}

/// Mean metrics over all rows sharing a [`GroupKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRow {
    pub key: GroupKey,
    pub mean_cost: f64,
    pub mean_time: f64,
    /// Number of table rows folded into this group
    pub rows: usize,
}

/// Metric a pivot grid is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Cost,
    Time,
}

impl Metric {
    pub fn all() -> [Self; 2] {
        [Self::Time, Self::Cost]
    }

    /// Short name used in artifact file names.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cost => "k1",
            Self::Time => "time",
        }
    }

    fn pick(&self, row: &GroupedRow) -> f64 {
        match self {
            Self::Cost => row.mean_cost,
            Self::Time => row.mean_time,
        }
    }
}

/// A processors x jobs grid of one metric for one cooling strategy.
///
/// Rows are processor counts in descending order, columns job counts in
/// ascending order, so the grid reads like a heatmap with the origin at the
/// bottom left.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotGrid {
    pub processors: Vec<usize>,
    pub jobs: Vec<usize>,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotGrid {
    pub fn get(&self, processors: usize, jobs: usize) -> Option<f64> {
        let row = self.processors.iter().position(|&p| p == processors)?;
        let col = self.jobs.iter().position(|&j| j == jobs)?;
        self.cells[row][col]
    }
}

/// Append-only table of result rows with a fixed schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    schema: Schema,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Create an empty table.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Fails if the row's shape differs from the table schema.
    pub fn append(&mut self, row: impl Into<ResultRow>) -> Result<(), SchemaMismatchError> {
        let row = row.into();
        self.check(&row)?;
        self.rows.push(row);
        Ok(())
    }

    fn check(&self, row: &ResultRow) -> Result<(), SchemaMismatchError> {
        if row.schema() != self.schema {
            return Err(SchemaMismatchError::Row {
                expected: self.schema,
                found: row.schema(),
            });
        }
        Ok(())
    }

    /// Rows of a cell-averaged table.
    pub fn cell_rows(&self) -> impl Iterator<Item = &CellRow> {
        self.rows.iter().filter_map(|row| match row {
            ResultRow::Cell(row) => Some(row),
            ResultRow::Processor(_) => None,
        })
    }

    /// Rows of a processor-averaged table.
    pub fn processor_rows(&self) -> impl Iterator<Item = &ProcessorRow> {
        self.rows.iter().filter_map(|row| match row {
            ResultRow::Processor(row) => Some(row),
            ResultRow::Cell(_) => None,
        })
    }

    /// Save the table as CSV. The header is written even for an empty table.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<(), ResultTableError> {
        let mut writer = RowWriter::create(path, self.schema)?;
        for row in &self.rows {
            writer.write(row)?;
        }
        Ok(())
    }

    /// Load a table from CSV, detecting the schema from the header.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, ResultTableError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ResultTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = csv::Reader::from_reader(file);
        let schema = Schema::from_header(reader.headers()?)?;

        let mut table = Self::new(schema);
        match schema {
            Schema::CellAveraged => {
                for row in reader.deserialize::<CellRow>() {
                    table.rows.push(ResultRow::Cell(row?));
                }
            }
            Schema::ProcessorAveraged => {
                for row in reader.deserialize::<ProcessorRow>() {
                    table.rows.push(ResultRow::Processor(row?));
                }
            }
        }
        Ok(table)
    }

    fn require(&self, schema: Schema) -> Result<(), SchemaMismatchError> {
        if self.schema != schema {
            return Err(SchemaMismatchError::Row {
                expected: schema,
                found: self.schema,
            });
        }
        Ok(())
    }

    /// Group a cell-averaged table by the given dimensions.
    ///
    /// Rows colliding on the key are folded with the arithmetic mean, the same
    /// way trials are folded into a cell. Groups come back sorted by key.
    pub fn group_by(&self, dimensions: &[Dimension]) -> Result<Vec<GroupedRow>, SchemaMismatchError> {
        self.require(Schema::CellAveraged)?;

        let mut groups: BTreeMap<GroupKey, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for row in self.cell_rows() {
            let mut key = GroupKey::default();
            for dimension in dimensions {
                match dimension {
                    Dimension::Jobs => key.job_count = Some(row.job_count),
                    Dimension::Processors => key.processor_count = Some(row.processor_count),
                    Dimension::Cooling => key.cooling = Some(row.cooling),
                }
            }
            let (costs, times) = groups.entry(key).or_default();
            costs.push(row.cost);
            times.push(row.time);
        }

        Ok(groups
            .into_iter()
            .map(|(key, (costs, times))| GroupedRow {
                key,
                mean_cost: mean(&costs),
                mean_time: mean(&times),
                rows: costs.len(),
            })
            .collect())
    }

    /// One processors x jobs grid of `metric` per cooling strategy.
    pub fn pivot_by_cooling(
        &self,
        metric: Metric,
    ) -> Result<BTreeMap<CoolingStrategy, PivotGrid>, SchemaMismatchError> {
        let grouped = self.group_by(&[Dimension::Cooling, Dimension::Processors, Dimension::Jobs])?;

        let mut by_cooling: BTreeMap<CoolingStrategy, Vec<&GroupedRow>> = BTreeMap::new();
        for row in &grouped {
            if let Some(cooling) = row.key.cooling {
                by_cooling.entry(cooling).or_default().push(row);
            }
        }

        Ok(by_cooling
            .into_iter()
            .map(|(cooling, rows)| (cooling, build_grid(&rows, metric)))
            .collect())
    }

    /// Fold a cell-averaged table down to one row per processor count.
    pub fn scalability_curve(&self) -> Result<ResultTable, SchemaMismatchError> {
        let mut curve = ResultTable::new(Schema::ProcessorAveraged);
        for group in self.group_by(&[Dimension::Processors])? {
            if let Some(num_proc) = group.key.processor_count {
                curve.append(ProcessorRow {
                    num_proc,
                    avg_exec_time: group.mean_time,
                    avg_final_cost: group.mean_cost,
                })?;
            }
        }
        Ok(curve)
    }
}

fn build_grid(rows: &[&GroupedRow], metric: Metric) -> PivotGrid {
    let mut processors: Vec<usize> = rows.iter().filter_map(|r| r.key.processor_count).collect();
    processors.sort_unstable_by(|a, b| b.cmp(a));
    processors.dedup();

    let mut jobs: Vec<usize> = rows.iter().filter_map(|r| r.key.job_count).collect();
    jobs.sort_unstable();
    jobs.dedup();

    let mut cells = vec![vec![None; jobs.len()]; processors.len()];
    for row in rows {
        let (Some(p), Some(j)) = (row.key.processor_count, row.key.job_count) else {
            continue;
        };
        if let (Some(r), Some(c)) = (
            processors.iter().position(|&x| x == p),
            jobs.iter().position(|&x| x == j),
        ) {
            cells[r][c] = Some(metric.pick(row));
        }
    }

    PivotGrid {
        processors,
        jobs,
        cells,
    }
}

/// Streams rows to a CSV file, flushing after each one.
///
/// Used while a sweep is running so rows written before a crash survive.
pub struct RowWriter {
    schema: Schema,
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl RowWriter {
    /// Create (truncate) `path` and write the schema header.
    pub fn create(path: impl AsRef<Path>, schema: Schema) -> Result<Self, ResultTableError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| ResultTableError::Io {
            path: path.clone(),
            source,
        })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(schema.columns())?;

        let mut row_writer = Self {
            schema,
            path,
            writer,
        };
        row_writer.flush()?;
        Ok(row_writer)
    }

    /// Write one row and flush it to disk.
    pub fn write(&mut self, row: &ResultRow) -> Result<(), ResultTableError> {
        if row.schema() != self.schema {
            return Err(SchemaMismatchError::Row {
                expected: self.schema,
                found: row.schema(),
            }
            .into());
        }
        row.write(&mut self.writer)?;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), ResultTableError> {
        self.writer.flush().map_err(|source| ResultTableError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
