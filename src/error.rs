use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::ChannelGroup;
use crate::engine::EngineError;

/// Boxed underlying cause carried by [`ImportError::ReadFailure`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Kernel error kinds
// ---------------------------------------------------------------------------

/// Every failure the reader, converter and session report to callers.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("unsupported file format '.{extension}' ({path})")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to read '{path}': {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("invalid column assignment: {0}")]
    InvalidAssignment(#[from] AssignmentError),

    #[error("numeric engine is not running; cannot {operation}")]
    EngineUnavailable { operation: &'static str },

    #[error("failed to write '{path}': {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("no data mapped to {group} channel {channel}")]
    NothingSelected { group: ChannelGroup, channel: usize },

    #[error("failed to render '{title}': {source}")]
    RenderFailure {
        title: String,
        #[source]
        source: EngineError,
    },
}

impl ImportError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: impl Into<Cause>) -> Self {
        ImportError::ReadFailure {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: impl Into<Cause>) -> Self {
        ImportError::WriteFailure {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, ImportError>;

// ---------------------------------------------------------------------------
// Shape and assignment errors
// ---------------------------------------------------------------------------

/// Violations of the rectangular-table invariants, raised at construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("a table needs at least one column")]
    NoColumns,

    #[error("row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{rows}x{cols} table needs {} values, got {len}", .rows * .cols)]
    LengthMismatch { rows: usize, cols: usize, len: usize },

    #[error("column {index} is out of range (table has {cols} columns)")]
    ColumnOutOfRange { index: usize, cols: usize },
}

/// Reasons a [`ColumnAssignment`](crate::data::model::ColumnAssignment) is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("{group} accepts at most {max} columns, got {count}")]
    TooManyColumns {
        group: ChannelGroup,
        count: usize,
        max: usize,
    },

    #[error("column {index} is listed twice for {group}")]
    DuplicateColumn { group: ChannelGroup, index: usize },

    #[error("column {index} assigned to {group} is out of range (table has {cols} columns)")]
    OutOfRange {
        group: ChannelGroup,
        index: usize,
        cols: usize,
    },

    #[error("column {index} is assigned to both {first} and {second}")]
    SharedColumn {
        index: usize,
        first: ChannelGroup,
        second: ChannelGroup,
    },

    #[error("{0} is derived from the assignment and cannot be assigned directly")]
    NotAssignable(ChannelGroup),
}
