use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use super::loader::{SourceFormat, TabularReader, PERSISTED_EXTENSION};
use super::mapping::partition;
use super::model::{ChannelGroup, ColumnAssignment, ConversionResult, GroupData, GroupedRecord};
use crate::engine::{Engine, EngineValue, NumericArray};
use crate::error::{ImportError, Result};

/// Suffix appended to the input's base name by [`default_output_path`].
pub const OUTPUT_SUFFIX: &str = "_converted";

/// `D/<B>_converted.mat` for an input `D/<B>.<ext>`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{stem}{OUTPUT_SUFFIX}.{PERSISTED_EXTENSION}"))
}

// ---------------------------------------------------------------------------
// Record <-> engine variables
// ---------------------------------------------------------------------------

/// Named arrays for the engine: matrices transposed to column-major,
/// `noise` as a 1-D array.
pub fn record_to_variables(record: &GroupedRecord) -> BTreeMap<String, NumericArray> {
    record
        .iter()
        .map(|(group, data)| {
            let array = match data {
                GroupData::Matrix(table) => NumericArray::from_table(table),
                GroupData::Vector(values) => NumericArray::from_vector(values),
            };
            (group.as_str().to_string(), array)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Reads, partitions and persists recordings through an injected engine.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    reader: TabularReader,
}

impl Converter {
    pub fn new(engine: Option<Arc<dyn Engine>>) -> Self {
        Self {
            reader: TabularReader::new(engine),
        }
    }

    pub fn reader(&self) -> &TabularReader {
        &self.reader
    }

    fn ready_engine(&self, operation: &'static str) -> Result<&Arc<dyn Engine>> {
        self.reader
            .engine()
            .filter(|e| e.is_ready())
            .ok_or(ImportError::EngineUnavailable { operation })
    }

    /// Read `input`, split it per `assignment` and write the groups to `output`.
    ///
    /// Only the first table of a multi-table source is converted. A missing
    /// or empty assignment stores the whole table as `raw_data`. On failure
    /// nothing is left at `output`.
    pub fn convert(
        &self,
        input: &Path,
        output: &Path,
        assignment: Option<&ColumnAssignment>,
    ) -> Result<ConversionResult> {
        info!("converting {} -> {}", input.display(), output.display());

        let (table, dropped_tables) = self
            .reader
            .read(input)?
            .into_first()
            .ok_or_else(|| ImportError::read(input, "file contains no numeric table"))?;
        if dropped_tables > 0 {
            warn!(
                "{} holds {} tables; only the first is converted",
                input.display(),
                dropped_tables + 1
            );
        }

        let assignment = assignment.cloned().unwrap_or_default();
        let record = partition(&table, &assignment)?;
        debug!(
            "partitioned {}x{} table into {:?}",
            table.rows(),
            table.cols(),
            record.groups().collect::<Vec<_>>()
        );

        self.persist(output, &record)?;

        Ok(ConversionResult {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            assignment,
            table: Arc::new(table),
            record,
            dropped_tables,
        })
    }

    /// Write `record` to `output` through the engine.
    ///
    /// The engine writes a temporary file next to `output`, which is renamed
    /// into place only after the engine reports success.
    pub fn persist(&self, output: &Path, record: &GroupedRecord) -> Result<()> {
        let engine = self.ready_engine("persist converted data")?;
        let variables = record_to_variables(record);

        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = output
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{stem}."))
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| ImportError::write(output, e))?
            .into_temp_path();

        engine
            .encode_and_persist(&temp, &variables)
            .map_err(|e| ImportError::write(output, e))?;
        temp.persist(output)
            .map_err(|e| ImportError::write(output, e.error))?;

        info!(
            "wrote {} variable(s) to {}",
            variables.len(),
            output.display()
        );
        Ok(())
    }

    /// Read a persisted container back into a [`GroupedRecord`].
    ///
    /// Variables named after a group are restored (`noise` as a vector);
    /// anything else in the container is skipped.
    pub fn read_grouped(&self, path: &Path) -> Result<GroupedRecord> {
        let format = SourceFormat::from_path(path)?;
        if format != SourceFormat::Mat {
            return Err(ImportError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: format.extension().to_string(),
            });
        }
        let engine = self.ready_engine("decode numeric containers")?;
        let variables = engine
            .decode_numeric_container(path)
            .map_err(|e| ImportError::read(path, e))?;

        let mut record = GroupedRecord::new();
        for (name, value) in variables {
            let Ok(group) = name.parse::<ChannelGroup>() else {
                warn!("ignoring variable '{name}' in {}", path.display());
                continue;
            };
            let EngineValue::Numeric(array) = value else {
                warn!("ignoring non-numeric variable '{name}' in {}", path.display());
                continue;
            };
            let data = if group == ChannelGroup::Noise {
                if !array.is_vector() {
                    return Err(ImportError::read(
                        path,
                        format!("noise has dims {:?}, expected a vector", array.dims),
                    ));
                }
                GroupData::Vector(array.data)
            } else {
                GroupData::Matrix(array.to_table().map_err(|e| ImportError::read(path, e))?)
            };
            record.insert(group, data);
        }
        Ok(record)
    }
}
