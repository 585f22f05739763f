use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use thiserror::Error;

use super::model::{ReadOutcome, RectangularTable, TableBuilder};
use crate::engine::{Engine, EngineValue};
use crate::error::{Cause, ImportError, Result};

/// Extension of the binary container that conversions produce.
pub const PERSISTED_EXTENSION: &str = "mat";

// ---------------------------------------------------------------------------
// Source formats
// ---------------------------------------------------------------------------

/// File formats the reader understands, keyed by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Xls,
    Csv,
    /// Binary numeric container, decoded by the engine.
    Mat,
    Parquet,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 5] = [
        SourceFormat::Xlsx,
        SourceFormat::Xls,
        SourceFormat::Csv,
        SourceFormat::Mat,
        SourceFormat::Parquet,
    ];

    /// Match a lower-cased extension without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "xlsx" => Some(SourceFormat::Xlsx),
            "xls" => Some(SourceFormat::Xls),
            "csv" => Some(SourceFormat::Csv),
            "mat" => Some(SourceFormat::Mat),
            "parquet" => Some(SourceFormat::Parquet),
            _ => None,
        }
    }

    /// Resolve from a path's extension. Content is never sniffed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = extension_of(path);
        Self::from_extension(&ext).ok_or_else(|| ImportError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: ext,
        })
    }

    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Xls => "xls",
            SourceFormat::Csv => "csv",
            SourceFormat::Mat => "mat",
            SourceFormat::Parquet => "parquet",
        }
    }

    pub fn needs_engine(self) -> bool {
        self == SourceFormat::Mat
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Cell-level parse failures.
#[derive(Error, Debug)]
pub enum CellError {
    #[error("data row {row}, column {col}: '{text}' is not a number")]
    NotNumeric { row: usize, col: usize, text: String },

    #[error("sheet '{sheet}', data row {row}, column {col}: unsupported cell {cell}")]
    Unsupported {
        sheet: String,
        row: usize,
        col: usize,
        cell: String,
    },
}

/// Empty text is a missing value.
fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        Some(f64::NAN)
    } else {
        text.parse::<f64>().ok()
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Reads source files into [`RectangularTable`]s.
///
/// The engine is only needed for `.mat` containers; without a ready engine
/// those fail with [`ImportError::EngineUnavailable`].
#[derive(Clone, Default)]
pub struct TabularReader {
    engine: Option<Arc<dyn Engine>>,
}

impl TabularReader {
    pub fn new(engine: Option<Arc<dyn Engine>>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> Option<&Arc<dyn Engine>> {
        self.engine.as_ref()
    }

    /// Load a file, dispatching on its extension.
    ///
    /// Supported formats:
    /// * `.xlsx` / `.xls` – every sheet, first row is a header
    /// * `.csv`           – one table, first row is a header
    /// * `.mat`           – every floating-point variable, via the engine
    /// * `.parquet`       – every numeric column of the file
    pub fn read(&self, path: &Path) -> Result<ReadOutcome> {
        let format = SourceFormat::from_path(path)?;
        debug!("reading {} as {:?}", path.display(), format);

        let tables = match format {
            SourceFormat::Csv => read_csv(path).map(|t| vec![t]),
            SourceFormat::Xlsx | SourceFormat::Xls => read_workbook(path),
            SourceFormat::Parquet => read_parquet(path).map(|t| vec![t]),
            SourceFormat::Mat => return self.read_container(path).map(ReadOutcome::from_tables),
        }
        .map_err(|source| ImportError::read(path, source))?;

        info!("read {} table(s) from {}", tables.len(), path.display());
        Ok(ReadOutcome::from_tables(tables))
    }

    fn read_container(&self, path: &Path) -> Result<Vec<RectangularTable>> {
        let engine = self
            .engine
            .as_ref()
            .filter(|e| e.is_ready())
            .ok_or(ImportError::EngineUnavailable {
                operation: "decode numeric containers",
            })?;

        let variables = engine
            .decode_numeric_container(path)
            .map_err(|source| ImportError::read(path, source))?;

        let mut tables = Vec::new();
        for (name, value) in variables {
            match value {
                EngineValue::Numeric(array) => match array.to_table() {
                    Ok(table) => tables.push(table),
                    Err(e) => warn!("skipping variable '{name}' in {}: {e}", path.display()),
                },
                EngineValue::Other { class } => {
                    debug!("skipping non-numeric variable '{name}' ({class})")
                }
            }
        }
        info!("read {} numeric variable(s) from {}", tables.len(), path.display());
        Ok(tables)
    }

    /// Size and table shapes of a source file.
    pub fn file_info(&self, path: &Path) -> Result<FileInfo> {
        let format = SourceFormat::from_path(path)?;
        let size_bytes = std::fs::metadata(path)
            .map_err(|e| ImportError::read(path, e))?
            .len();
        let shapes = self.read(path)?.shapes();
        Ok(FileInfo {
            path: path.to_path_buf(),
            format,
            size_mib: size_bytes as f64 / (1024.0 * 1024.0),
            shapes,
        })
    }
}

impl fmt::Debug for TabularReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularReader")
            .field("engine", &self.engine.as_ref().map(|e| e.is_ready()))
            .finish()
    }
}

/// Summary returned by [`TabularReader::file_info`].
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub size_mib: f64,
    /// `(rows, cols)` of each table, in read order.
    pub shapes: Vec<(usize, usize)>,
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "file:   {}", self.path.display())?;
        writeln!(f, "format: .{}", self.format.extension())?;
        writeln!(f, "size:   {:.3} MiB", self.size_mib)?;
        for (i, (rows, cols)) in self.shapes.iter().enumerate() {
            writeln!(f, "table {i}: {rows} rows x {cols} columns")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Header row gives the width; every following row must match it.
/// Empty cells become NaN.
fn read_csv(path: &Path) -> std::result::Result<RectangularTable, Cause> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let width = reader.headers()?.len();

    let mut builder = TableBuilder::new(width);
    let mut row = Vec::with_capacity(width);
    for (row_no, record) in reader.records().enumerate() {
        let record = record?;
        row.clear();
        for (col, text) in record.iter().enumerate() {
            let value = parse_number(text).ok_or_else(|| CellError::NotNumeric {
                row: row_no,
                col,
                text: text.to_string(),
            })?;
            row.push(value);
        }
        builder.push_row(&row)?;
    }
    Ok(builder.finish()?)
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// One table per non-empty sheet, in workbook order.
fn read_workbook(path: &Path) -> std::result::Result<Vec<RectangularTable>, Cause> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names();

    let mut tables = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook.worksheet_range(&name)?;
        if range.is_empty() {
            warn!("skipping empty sheet '{name}' in {}", path.display());
            continue;
        }

        let mut rows = range.rows();
        // First row holds column names.
        let width = rows.next().map_or(0, |header| header.len());
        let mut builder = TableBuilder::new(width);
        let mut values = Vec::with_capacity(width);
        for (row_no, cells) in rows.enumerate() {
            values.clear();
            for (col, cell) in cells.iter().enumerate() {
                let value = cell_value(cell).ok_or_else(|| CellError::Unsupported {
                    sheet: name.clone(),
                    row: row_no,
                    col,
                    cell: cell.to_string(),
                })?;
                values.push(value);
            }
            builder.push_row(&values)?;
        }
        tables.push(builder.finish()?);
    }
    Ok(tables)
}

fn cell_value(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => Some(dt.as_f64()),
        Data::String(s) => parse_number(s),
        Data::Empty => Some(f64::NAN),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Every numeric column becomes a table column, in schema order. Nulls
/// become NaN; non-numeric columns are skipped.
fn read_parquet(path: &Path) -> std::result::Result<RectangularTable, Cause> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let schema = builder.schema().clone();
    let numeric: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.data_type().is_numeric())
        .map(|(i, _)| i)
        .collect();
    for field in schema.fields().iter().filter(|f| !f.data_type().is_numeric()) {
        warn!(
            "skipping non-numeric column '{}' ({:?}) in {}",
            field.name(),
            field.data_type(),
            path.display()
        );
    }

    let mut builder_out = TableBuilder::new(numeric.len());
    let mut row = Vec::with_capacity(numeric.len());
    for batch in builder.build()? {
        let batch = batch?;
        let columns = numeric
            .iter()
            .map(|&i| cast(batch.column(i), &DataType::Float64))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let columns: Vec<_> = columns
            .iter()
            .map(|c| c.as_primitive::<Float64Type>())
            .collect();

        for r in 0..batch.num_rows() {
            row.clear();
            row.extend(columns.iter().map(|c| {
                if c.is_null(r) {
                    f64::NAN
                } else {
                    c.value(r)
                }
            }));
            builder_out.push_row(&row)?;
        }
    }
    Ok(builder_out.finish()?)
}

/// Read a file without an engine (`.mat` files fail with `EngineUnavailable`).
pub fn load_file(path: &Path) -> Result<ReadOutcome> {
    TabularReader::default().read(path)
}
