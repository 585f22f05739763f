//! Sensor recording importer.
//!
//! Reads multi-channel recordings (accelerometer, gyroscope, noise) from
//! spreadsheets, delimited text, Parquet and binary numeric containers,
//! assigns raw columns to semantic channel groups, and persists the grouped
//! arrays through an external numeric engine.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use sensor_import::{ColumnAssignment, TabularReader, partition};
//!
//! let table = TabularReader::default()
//!     .read(Path::new("imu.csv"))
//!     .unwrap()
//!     .into_first()
//!     .unwrap()
//!     .0;
//! let assignment = ColumnAssignment {
//!     acceleration: vec![0, 1, 2],
//!     gyroscope: vec![3, 4, 5],
//!     noise: vec![],
//! };
//! let record = partition(&table, &assignment).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod state;

pub use config::AppConfig;
pub use data::convert::{default_output_path, Converter};
pub use data::loader::{load_file, FileInfo, SourceFormat, TabularReader};
pub use data::mapping::{partition, validate};
pub use data::model::{
    ChannelGroup, ColumnAssignment, ConversionResult, GroupData, GroupedRecord, ReadOutcome,
    RectangularTable,
};
pub use engine::{Engine, EngineError, EngineStartup, EngineValue, NumericArray, ProcessEngine};
pub use error::{AssignmentError, ImportError, TableError};
pub use state::{render, PlotKind, Session};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
