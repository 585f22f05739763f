//! Boundary to the external numeric engine.
//!
//! The engine owns the binary container format and all plotting. The kernel
//! talks to it through the [`Engine`] capability, which is passed in
//! explicitly (`Arc<dyn Engine>`) and can be swapped for a test double.
//!
//! Arrays crossing the boundary are [`NumericArray`]s in the engine's native
//! column-major layout; [`NumericArray::from_table`] and
//! [`NumericArray::to_table`] do the transposition in both directions.

pub mod process;
pub mod startup;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::model::RectangularTable;

pub use process::ProcessEngine;
pub use startup::EngineStartup;

/// Errors reported by an engine adapter.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine is not running")]
    NotRunning,

    #[error("failed to launch engine '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine did not become ready within {0} s")]
    StartupTimeout(u64),

    #[error("engine pipe error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed engine message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("engine closed the connection")]
    Disconnected,

    #[error("engine rejected '{op}': {message}")]
    Rejected { op: &'static str, message: String },

    #[error("array with dims {dims:?} cannot hold {len} values")]
    Shape { dims: Vec<usize>, len: usize },
}

// ---------------------------------------------------------------------------
// NumericArray – column-major array at the engine boundary
// ---------------------------------------------------------------------------

/// A real-valued array in column-major order, as the engine stores it.
///
/// On the wire `data` keeps non-finite values: NaN is `null`, infinities are
/// the strings `"Inf"` and `"-Inf"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericArray {
    pub dims: Vec<usize>,
    #[serde(with = "elements")]
    pub data: Vec<f64>,
}

/// Element count for `dims`, or `None` if it overflows.
fn element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl NumericArray {
    /// Checked constructor: the product of `dims` must equal `data.len()`.
    pub fn new(dims: Vec<usize>, data: Vec<f64>) -> Result<Self, EngineError> {
        if element_count(&dims) != Some(data.len()) {
            return Err(EngineError::Shape {
                dims,
                len: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Transpose a row-major table into a `rows × cols` column-major array.
    pub fn from_table(table: &RectangularTable) -> Self {
        let (rows, cols) = table.shape();
        let mut data = Vec::with_capacity(rows * cols);
        for c in 0..cols {
            data.extend(table.iter_rows().map(|row| row[c]));
        }
        Self {
            dims: vec![rows, cols],
            data,
        }
    }

    /// One-dimensional array; layout is the same either way.
    pub fn from_vector(values: &[f64]) -> Self {
        Self {
            dims: vec![values.len()],
            data: values.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True for 1-D arrays and for `n × 1` / `1 × n` matrices.
    pub fn is_vector(&self) -> bool {
        match self.dims.as_slice() {
            [_] => true,
            [r, c] => *r == 1 || *c == 1,
            _ => false,
        }
    }

    /// Transpose back into a row-major table.
    ///
    /// A 1-D array becomes an `n × 1` table. The shape is taken from `dims`
    /// and checked against the element count; arrays of three or more
    /// dimensions are not tabular.
    pub fn to_table(&self) -> Result<RectangularTable, EngineError> {
        let (rows, cols) = match self.dims.as_slice() {
            [n] => (*n, 1),
            [r, c] => (*r, *c),
            _ => {
                return Err(EngineError::Shape {
                    dims: self.dims.clone(),
                    len: self.data.len(),
                })
            }
        };
        if rows.checked_mul(cols) != Some(self.data.len()) {
            return Err(EngineError::Shape {
                dims: self.dims.clone(),
                len: self.data.len(),
            });
        }
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            data.extend((0..cols).map(|c| self.data[c * rows + r]));
        }
        RectangularTable::new(rows, cols, data).map_err(|_| EngineError::Shape {
            dims: self.dims.clone(),
            len: self.data.len(),
        })
    }
}

/// Serde adapter for array elements. JSON has no NaN or infinity.
mod elements {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const POS_INF: &str = "Inf";
    const NEG_INF: &str = "-Inf";

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Element {
        Number(f64),
        Token(String),
    }

    fn encode(value: f64) -> Option<Element> {
        if value.is_nan() {
            None
        } else if value == f64::INFINITY {
            Some(Element::Token(POS_INF.to_string()))
        } else if value == f64::NEG_INFINITY {
            Some(Element::Token(NEG_INF.to_string()))
        } else {
            Some(Element::Number(value))
        }
    }

    pub fn serialize<S: Serializer>(data: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(data.iter().map(|&v| encode(v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<Option<Element>>::deserialize(deserializer)?
            .into_iter()
            .map(|element| match element {
                None => Ok(f64::NAN),
                Some(Element::Number(v)) => Ok(v),
                Some(Element::Token(t)) => match t.as_str() {
                    "NaN" => Ok(f64::NAN),
                    POS_INF => Ok(f64::INFINITY),
                    NEG_INF => Ok(f64::NEG_INFINITY),
                    other => Err(D::Error::custom(format!("unexpected array element '{other}'"))),
                },
            })
            .collect()
    }
}

/// One variable decoded from a numeric container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineValue {
    /// Floating-point array.
    Numeric(NumericArray),
    /// Anything else (strings, structs, integer classes); `class` is the
    /// engine's type name.
    Other { class: String },
}

// ---------------------------------------------------------------------------
// Engine capability
// ---------------------------------------------------------------------------

/// Operations the kernel needs from the numeric engine.
///
/// Callers check [`is_ready`](Engine::is_ready) first; the converter and
/// session report `EngineUnavailable` instead of calling a cold engine.
pub trait Engine: Send + Sync {
    fn is_ready(&self) -> bool;

    /// Load every variable of a binary container.
    fn decode_numeric_container(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<String, EngineValue>, EngineError>;

    /// Write named arrays as variables of a new container at `path`.
    fn encode_and_persist(
        &self,
        path: &Path,
        variables: &BTreeMap<String, NumericArray>,
    ) -> Result<(), EngineError>;

    fn render_time_series(
        &self,
        values: &NumericArray,
        sample_rate: f64,
        title: &str,
    ) -> Result<(), EngineError>;

    fn render_spectrum(
        &self,
        values: &NumericArray,
        sample_rate: f64,
        title: &str,
    ) -> Result<(), EngineError>;

    fn close_all_rendered_views(&self) -> Result<(), EngineError>;
}
