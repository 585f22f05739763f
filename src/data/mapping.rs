use std::collections::{BTreeMap, BTreeSet};

use super::model::{ChannelGroup, ColumnAssignment, GroupData, GroupedRecord, RectangularTable};
use crate::error::AssignmentError;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check an assignment against a table with `cols` columns.
///
/// Rejects:
/// * more indices than the group's channel limit
/// * an index listed twice within a group
/// * an index outside `0..cols`
/// * an index shared between two groups
pub fn validate(assignment: &ColumnAssignment, cols: usize) -> Result<(), AssignmentError> {
    let mut owner: BTreeMap<usize, ChannelGroup> = BTreeMap::new();

    for group in ChannelGroup::ASSIGNABLE {
        let indices = assignment.indices(group);
        if let Some(max) = group.max_channels() {
            if indices.len() > max {
                return Err(AssignmentError::TooManyColumns {
                    group,
                    count: indices.len(),
                    max,
                });
            }
        }

        let mut seen = BTreeSet::new();
        for &index in indices {
            if index >= cols {
                return Err(AssignmentError::OutOfRange { group, index, cols });
            }
            if !seen.insert(index) {
                return Err(AssignmentError::DuplicateColumn { group, index });
            }
            if let Some(&first) = owner.get(&index) {
                return Err(AssignmentError::SharedColumn {
                    index,
                    first,
                    second: group,
                });
            }
            owner.insert(index, group);
        }
    }
    Ok(())
}

/// Columns not used by any group, ascending.
pub fn unassigned_columns(assignment: &ColumnAssignment, cols: usize) -> Vec<usize> {
    let used: BTreeSet<usize> = ChannelGroup::ASSIGNABLE
        .iter()
        .flat_map(|&g| assignment.indices(g).iter().copied())
        .collect();
    (0..cols).filter(|c| !used.contains(c)).collect()
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// Split `table` into semantic groups.
///
/// * `acceleration` / `gyroscope`: the listed columns in assignment order,
///   omitted when nothing is listed.
/// * `noise`: the single listed column as a vector, omitted when empty.
/// * `other_data`: remaining columns in ascending order, only when at least
///   one column was assigned and at least one is left.
/// * `raw_data`: the whole table, only when nothing was assigned.
///
/// The input table is never modified.
pub fn partition(
    table: &RectangularTable,
    assignment: &ColumnAssignment,
) -> Result<GroupedRecord, AssignmentError> {
    validate(assignment, table.cols())?;

    let mut record = GroupedRecord::new();
    if assignment.is_empty() {
        record.insert(ChannelGroup::RawData, GroupData::Matrix(table.clone()));
        return Ok(record);
    }

    for group in [ChannelGroup::Acceleration, ChannelGroup::Gyroscope] {
        let indices = assignment.indices(group);
        if !indices.is_empty() {
            record.insert(group, GroupData::Matrix(select(table, group, indices)?));
        }
    }

    if let Some(&index) = assignment.noise.first() {
        let column = table.column(index).ok_or(AssignmentError::OutOfRange {
            group: ChannelGroup::Noise,
            index,
            cols: table.cols(),
        })?;
        record.insert(ChannelGroup::Noise, GroupData::Vector(column));
    }

    let rest = unassigned_columns(assignment, table.cols());
    if !rest.is_empty() {
        let other = select(table, ChannelGroup::OtherData, &rest)?;
        record.insert(ChannelGroup::OtherData, GroupData::Matrix(other));
    }

    Ok(record)
}

fn select(
    table: &RectangularTable,
    group: ChannelGroup,
    indices: &[usize],
) -> Result<RectangularTable, AssignmentError> {
    table
        .select_columns(indices)
        .map_err(|_| AssignmentError::OutOfRange {
            group,
            index: indices.iter().copied().max().unwrap_or_default(),
            cols: table.cols(),
        })
}
