/// Data layer: tables, reading, column mapping and conversion.
///
/// Architecture:
/// ```text
///  .xlsx / .xls / .csv / .parquet / .mat
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → ReadOutcome (one table or many)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  mapping  │  ColumnAssignment → GroupedRecord
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  convert  │  GroupedRecord → engine → <name>_converted.mat
///   └──────────┘
/// ```

pub mod convert;
pub mod loader;
pub mod mapping;
pub mod model;
