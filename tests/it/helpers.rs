//! Test helpers: a JSON-backed engine double and table fixtures.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rust_xlsxwriter::Workbook;
use sensor_import::{Engine, EngineError, EngineValue, NumericArray, RectangularTable};

// ============================================================================
// FakeEngine
// ============================================================================

/// A render request the fake recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    TimeSeries { len: usize, sample_rate: f64, title: String },
    Spectrum { len: usize, sample_rate: f64, title: String },
    CloseAll,
}

/// Engine double that stores containers as JSON maps of [`EngineValue`].
///
/// `fail_writes` makes `encode_and_persist` write a partial file and then
/// fail, the way a crashing engine would. `fail_renders` rejects every plot.
#[derive(Debug, Default)]
pub struct FakeEngine {
    down: AtomicBool,
    fail_writes: AtomicBool,
    fail_renders: AtomicBool,
    pub rendered: Mutex<Vec<Rendered>>,
}

impl FakeEngine {
    pub fn ready() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stopped() -> Arc<Self> {
        let engine = Self::default();
        engine.down.store(true, Ordering::SeqCst);
        Arc::new(engine)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_renders(&self, fail: bool) {
        self.fail_renders.store(fail, Ordering::SeqCst);
    }

    fn check_render(&self, op: &'static str) -> Result<(), EngineError> {
        if self.fail_renders.load(Ordering::SeqCst) {
            return Err(EngineError::Rejected {
                op,
                message: "no display".to_string(),
            });
        }
        Ok(())
    }

    pub fn rendered(&self) -> Vec<Rendered> {
        self.rendered.lock().unwrap().clone()
    }

    /// Write a container the way the engine would, for read-side tests.
    pub fn write_container(path: &Path, variables: &BTreeMap<String, EngineValue>) {
        fs::write(path, serde_json::to_vec(variables).unwrap()).unwrap();
    }
}

impl Engine for FakeEngine {
    fn is_ready(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }

    fn decode_numeric_container(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<String, EngineValue>, EngineError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn encode_and_persist(
        &self,
        path: &Path,
        variables: &BTreeMap<String, NumericArray>,
    ) -> Result<(), EngineError> {
        let values: BTreeMap<String, EngineValue> = variables
            .iter()
            .map(|(name, array)| (name.clone(), EngineValue::Numeric(array.clone())))
            .collect();
        let bytes = serde_json::to_vec(&values)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            let mut file = fs::File::create(path)?;
            file.write_all(&bytes[..bytes.len() / 2])?;
            return Err(EngineError::Rejected {
                op: "persist",
                message: "disk full".to_string(),
            });
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn render_time_series(
        &self,
        values: &NumericArray,
        sample_rate: f64,
        title: &str,
    ) -> Result<(), EngineError> {
        self.check_render("render_time_series")?;
        self.rendered.lock().unwrap().push(Rendered::TimeSeries {
            len: values.len(),
            sample_rate,
            title: title.to_string(),
        });
        Ok(())
    }

    fn render_spectrum(
        &self,
        values: &NumericArray,
        sample_rate: f64,
        title: &str,
    ) -> Result<(), EngineError> {
        self.check_render("render_spectrum")?;
        self.rendered.lock().unwrap().push(Rendered::Spectrum {
            len: values.len(),
            sample_rate,
            title: title.to_string(),
        });
        Ok(())
    }

    fn close_all_rendered_views(&self) -> Result<(), EngineError> {
        self.rendered.lock().unwrap().push(Rendered::CloseAll);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// `rows x cols` table where cell (r, c) holds `r * 100 + c`.
pub fn indexed_table(rows: usize, cols: usize) -> RectangularTable {
    let data = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r * 100 + c) as f64))
        .collect();
    RectangularTable::new(rows, cols, data).unwrap()
}

/// Write `table` as CSV with a `c0,c1,...` header.
pub fn write_csv(dir: &Path, name: &str, table: &RectangularTable) -> PathBuf {
    let path = dir.join(name);
    let mut text = (0..table.cols())
        .map(|c| format!("c{c}"))
        .collect::<Vec<_>>()
        .join(",");
    text.push('\n');
    for row in table.iter_rows() {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        text.push_str(&cells.join(","));
        text.push('\n');
    }
    fs::write(&path, text).unwrap();
    path
}

/// Write an .xlsx workbook, one sheet per entry, in order. A sheet with rows
/// gets a `c0,c1,...` header row first; a sheet without rows stays empty.
pub fn write_workbook(dir: &Path, name: &str, sheets: &[(&str, Vec<Vec<f64>>)]) -> PathBuf {
    let path = dir.join(name);
    let mut workbook = Workbook::new();
    for (sheet_name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*sheet_name).unwrap();
        let Some(first) = rows.first() else {
            continue;
        };
        for col in 0..first.len() {
            sheet.write_string(0, col as u16, format!("c{col}")).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.write_number(r as u32 + 1, c as u16, *value).unwrap();
            }
        }
    }
    workbook.save(&path).unwrap();
    path
}

/// File names in `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
