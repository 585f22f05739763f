use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AssignmentError, TableError};

// ---------------------------------------------------------------------------
// RectangularTable – the common in-memory form of every source file
// ---------------------------------------------------------------------------

/// A dense `rows × cols` table of `f64`, stored row-major.
///
/// The shape is fixed at construction: every row has exactly `cols` values
/// and `cols` is at least one. Tables are never mutated after they are
/// built, so a table can be shared between the preview, the mapper and any
/// plotting consumer without synchronisation.
#[derive(Debug, Clone, PartialEq)]
pub struct RectangularTable {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl RectangularTable {
    /// Build a table from row-major values.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, TableError> {
        if cols == 0 {
            return Err(TableError::NoColumns);
        }
        if data.len() != rows * cols {
            return Err(TableError::LengthMismatch {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a table from a list of rows. All rows must have the same width.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, TableError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut builder = TableBuilder::new(cols);
        for row in &rows {
            builder.push_row(row)?;
        }
        builder.finish()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row-major view of all values.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row < self.rows {
            let start = row * self.cols;
            Some(&self.data[start..start + self.cols])
        } else {
            None
        }
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.cols)
    }

    /// Copy one column out as a vector.
    pub fn column(&self, col: usize) -> Option<Vec<f64>> {
        if col >= self.cols {
            return None;
        }
        Some(self.iter_rows().map(|row| row[col]).collect())
    }

    /// New table made of the given columns, in the given order.
    pub fn select_columns(&self, columns: &[usize]) -> Result<RectangularTable, TableError> {
        if let Some(&index) = columns.iter().find(|&&c| c >= self.cols) {
            return Err(TableError::ColumnOutOfRange {
                index,
                cols: self.cols,
            });
        }
        let mut data = Vec::with_capacity(self.rows * columns.len());
        for row in self.iter_rows() {
            data.extend(columns.iter().map(|&c| row[c]));
        }
        RectangularTable::new(self.rows, columns.len(), data)
    }

    /// The first `n` rows (or fewer), for previews.
    pub fn head(&self, n: usize) -> RectangularTable {
        let rows = n.min(self.rows);
        RectangularTable {
            rows,
            cols: self.cols,
            data: self.data[..rows * self.cols].to_vec(),
        }
    }
}

/// Incremental row-by-row construction that rejects ragged input.
#[derive(Debug)]
pub struct TableBuilder {
    cols: usize,
    rows: usize,
    data: Vec<f64>,
}

impl TableBuilder {
    pub fn new(cols: usize) -> Self {
        Self {
            cols,
            rows: 0,
            data: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: &[f64]) -> Result<(), TableError> {
        if row.len() != self.cols {
            return Err(TableError::RaggedRow {
                row: self.rows,
                expected: self.cols,
                found: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<RectangularTable, TableError> {
        RectangularTable::new(self.rows, self.cols, self.data)
    }
}

// ---------------------------------------------------------------------------
// ChannelGroup – the closed set of semantic roles
// ---------------------------------------------------------------------------

/// Semantic role of a group of columns. Also the variable name used in the
/// persisted container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelGroup {
    Acceleration,
    Gyroscope,
    Noise,
    /// Columns left over after a partial assignment.
    OtherData,
    /// The whole table, when nothing was assigned.
    RawData,
}

impl ChannelGroup {
    /// Groups a user can assign columns to.
    pub const ASSIGNABLE: [ChannelGroup; 3] = [
        ChannelGroup::Acceleration,
        ChannelGroup::Gyroscope,
        ChannelGroup::Noise,
    ];

    pub const ALL: [ChannelGroup; 5] = [
        ChannelGroup::Acceleration,
        ChannelGroup::Gyroscope,
        ChannelGroup::Noise,
        ChannelGroup::OtherData,
        ChannelGroup::RawData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelGroup::Acceleration => "acceleration",
            ChannelGroup::Gyroscope => "gyroscope",
            ChannelGroup::Noise => "noise",
            ChannelGroup::OtherData => "other_data",
            ChannelGroup::RawData => "raw_data",
        }
    }

    /// Hardware channel limit for assignable groups.
    pub fn max_channels(self) -> Option<usize> {
        match self {
            ChannelGroup::Acceleration | ChannelGroup::Gyroscope => Some(3),
            ChannelGroup::Noise => Some(1),
            ChannelGroup::OtherData | ChannelGroup::RawData => None,
        }
    }

    pub fn is_assignable(self) -> bool {
        self.max_channels().is_some()
    }
}

impl fmt::Display for ChannelGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown group name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel group '{0}'")]
pub struct UnknownGroup(pub String);

impl FromStr for ChannelGroup {
    type Err = UnknownGroup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownGroup(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ColumnAssignment – user's column → group choice
// ---------------------------------------------------------------------------

/// Zero-based column indices per assignable group, in the user's order.
///
/// Deserializes from a mapping such as
/// `{ acceleration: [0, 1, 2], gyroscope: [3, 4, 5], noise: [6] }`;
/// missing groups default to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnAssignment {
    pub acceleration: Vec<usize>,
    pub gyroscope: Vec<usize>,
    pub noise: Vec<usize>,
}

impl ColumnAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indices for `group`; derived groups are always empty.
    pub fn indices(&self, group: ChannelGroup) -> &[usize] {
        match group {
            ChannelGroup::Acceleration => &self.acceleration,
            ChannelGroup::Gyroscope => &self.gyroscope,
            ChannelGroup::Noise => &self.noise,
            ChannelGroup::OtherData | ChannelGroup::RawData => &[],
        }
    }

    /// Replace the indices of an assignable group.
    pub fn set(&mut self, group: ChannelGroup, indices: Vec<usize>) -> Result<(), AssignmentError> {
        match group {
            ChannelGroup::Acceleration => self.acceleration = indices,
            ChannelGroup::Gyroscope => self.gyroscope = indices,
            ChannelGroup::Noise => self.noise = indices,
            other => return Err(AssignmentError::NotAssignable(other)),
        }
        Ok(())
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, group: ChannelGroup, indices: Vec<usize>) -> Result<Self, AssignmentError> {
        self.set(group, indices)?;
        Ok(self)
    }

    /// True when no column is assigned to any group.
    pub fn is_empty(&self) -> bool {
        ChannelGroup::ASSIGNABLE
            .iter()
            .all(|&g| self.indices(g).is_empty())
    }

    pub fn clear(&mut self) {
        self.acceleration.clear();
        self.gyroscope.clear();
        self.noise.clear();
    }
}

impl fmt::Display for ColumnAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in ChannelGroup::ASSIGNABLE.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let cols = self.indices(group);
            if cols.is_empty() {
                write!(f, "{group}: unmapped")?;
            } else {
                let list: Vec<String> = cols.iter().map(|c| format!("col {}", c + 1)).collect();
                write!(f, "{group}: {}", list.join(" "))?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GroupedRecord – result of partitioning a table
// ---------------------------------------------------------------------------

/// Data held by one group: a sub-table, or a single column for `noise`.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupData {
    Matrix(RectangularTable),
    Vector(Vec<f64>),
}

impl GroupData {
    /// `(rows, cols)`; a vector reports one column.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            GroupData::Matrix(t) => t.shape(),
            GroupData::Vector(v) => (v.len(), 1),
        }
    }

    pub fn width(&self) -> usize {
        self.shape().1
    }

    pub fn as_matrix(&self) -> Option<&RectangularTable> {
        match self {
            GroupData::Matrix(t) => Some(t),
            GroupData::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            GroupData::Vector(v) => Some(v),
            GroupData::Matrix(_) => None,
        }
    }
}

/// Group name → group data. A group that was not provided is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedRecord {
    groups: BTreeMap<ChannelGroup, GroupData>,
}

impl GroupedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, group: ChannelGroup, data: GroupData) {
        self.groups.insert(group, data);
    }

    pub fn get(&self, group: ChannelGroup) -> Option<&GroupData> {
        self.groups.get(&group)
    }

    pub fn contains(&self, group: ChannelGroup) -> bool {
        self.groups.contains_key(&group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = ChannelGroup> + '_ {
        self.groups.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelGroup, &GroupData)> {
        self.groups.iter().map(|(g, d)| (*g, d))
    }

    /// Sum of the widths of every group.
    pub fn total_columns(&self) -> usize {
        self.groups.values().map(GroupData::width).sum()
    }
}

// ---------------------------------------------------------------------------
// ReadOutcome – one table or many
// ---------------------------------------------------------------------------

/// What a read produces. A file holding exactly one table (one sheet, one
/// numeric variable) yields `Single`; anything else yields `Many`, which
/// may be empty.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Single(RectangularTable),
    Many(Vec<RectangularTable>),
}

impl ReadOutcome {
    /// Apply the single-vs-collection rule.
    pub fn from_tables(mut tables: Vec<RectangularTable>) -> Self {
        if tables.len() == 1 {
            ReadOutcome::Single(tables.remove(0))
        } else {
            ReadOutcome::Many(tables)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReadOutcome::Single(_) => 1,
            ReadOutcome::Many(tables) => tables.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Option<&RectangularTable> {
        match self {
            ReadOutcome::Single(t) => Some(t),
            ReadOutcome::Many(tables) => tables.first(),
        }
    }

    /// First table plus the number of tables discarded with it.
    pub fn into_first(self) -> Option<(RectangularTable, usize)> {
        match self {
            ReadOutcome::Single(t) => Some((t, 0)),
            ReadOutcome::Many(tables) => {
                let dropped = tables.len().saturating_sub(1);
                tables.into_iter().next().map(|t| (t, dropped))
            }
        }
    }

    pub fn into_tables(self) -> Vec<RectangularTable> {
        match self {
            ReadOutcome::Single(t) => vec![t],
            ReadOutcome::Many(tables) => tables,
        }
    }

    pub fn shapes(&self) -> Vec<(usize, usize)> {
        match self {
            ReadOutcome::Single(t) => vec![t.shape()],
            ReadOutcome::Many(tables) => tables.iter().map(RectangularTable::shape).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversionResult
// ---------------------------------------------------------------------------

/// A finished conversion, handed to the file list and to plotting.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub assignment: ColumnAssignment,
    /// The table the record was cut from.
    pub table: Arc<RectangularTable>,
    pub record: GroupedRecord,
    /// Tables beyond the first that the source held and were not converted.
    pub dropped_tables: usize,
}
