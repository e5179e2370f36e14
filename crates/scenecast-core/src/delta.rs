//! Snapshot-to-snapshot differences.
//!
//! [`compute_diff`] expresses the transition `prev -> curr` as a
//! [`SnapshotDelta`]; [`apply_diff`] reconstructs `curr` from `prev` plus the
//! delta. The round-trip property is load-bearing for the dump format: for
//! every pair where `compute_diff` returns `Some`, applying the result to
//! `prev` must reproduce `curr` field-by-field (timestamp supplied by the
//! caller).
//!
//! Absent fields mean "unchanged". A `None` line content is a truncation
//! marker: discard everything at and beyond that index. Only the first
//! truncation marker in a delta is meaningful.

use serde::{Deserialize, Serialize};

use crate::snapshot::{Cursor, Snapshot};
use crate::text::Line;

/// A sparse line edit: index after shift, and the new content (`None`
/// truncates the line list at the index).
pub type LineEdit = (usize, Option<Line>);

/// The difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotDelta {
    /// Number of leading lines dropped relative to `prev`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<u64>,
    /// Sparse per-index edits after applying the shift.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<LineEdit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate: Option<bool>,
}

impl SnapshotDelta {
    /// Whether the delta carries no change at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shift.is_none()
            && self.lines.is_none()
            && self.cursor.is_none()
            && self.cols.is_none()
            && self.rows.is_none()
            && self.alternate.is_none()
    }

    /// Condensed description of what this delta changes.
    #[must_use]
    pub fn summary(&self) -> DeltaSummary {
        let changed_lines = self
            .lines
            .as_deref()
            .map(|edits| {
                edits
                    .iter()
                    .filter(|(_, content)| content.is_some())
                    .map(|(i, _)| *i)
                    .collect()
            })
            .unwrap_or_default();
        DeltaSummary {
            changed_lines,
            scrolled: self.shift.unwrap_or(0),
            cursor_moved: self.cursor.is_some(),
            truncated: self
                .lines
                .as_deref()
                .is_some_and(|edits| edits.iter().any(|(_, c)| c.is_none())),
        }
    }
}

/// What a delta changed, for consumers that want the shape of a transition
/// without replaying line contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeltaSummary {
    /// Post-shift indices whose content was rewritten.
    pub changed_lines: Vec<usize>,
    /// Leading lines scrolled out of addressability.
    pub scrolled: u64,
    /// Whether the cursor position or visibility changed.
    pub cursor_moved: bool,
    /// Whether trailing lines were discarded.
    pub truncated: bool,
}

/// Compute the delta from `prev` to `curr`.
///
/// Returns `None` when a delta cannot represent the transition and a keyframe
/// is required: `curr` lost offset tracking, or the offset moved backward.
#[must_use]
pub fn compute_diff(prev: &Snapshot, curr: &Snapshot) -> Option<SnapshotDelta> {
    let curr_offset = curr.lines_offset?;
    // Tracking loss on the previous side is treated as offset 0 for the shift
    // calculation only.
    let prev_offset = prev.lines_offset.unwrap_or(0);
    if curr_offset < prev_offset {
        return None;
    }
    let shift = curr_offset - prev_offset;
    let shift_idx = usize::try_from(shift).ok()?;

    let shifted_prev: &[Line] = if shift_idx >= prev.lines.len() {
        &[]
    } else {
        &prev.lines[shift_idx..]
    };

    let mut edits: Vec<LineEdit> = Vec::new();
    for (i, line) in curr.lines.iter().enumerate() {
        match shifted_prev.get(i) {
            Some(old) if old == line => {}
            _ => edits.push((i, Some(line.clone()))),
        }
    }
    if curr.lines.len() < shifted_prev.len() {
        edits.push((curr.lines.len(), None));
    }

    Some(SnapshotDelta {
        shift: (shift != 0).then_some(shift),
        lines: (!edits.is_empty()).then_some(edits),
        cursor: (prev.cursor != curr.cursor).then_some(curr.cursor),
        cols: (prev.cols != curr.cols).then_some(curr.cols),
        rows: (prev.rows != curr.rows).then_some(curr.rows),
        alternate: (prev.alternate != curr.alternate).then_some(curr.alternate),
    })
}

/// Apply a delta to a base snapshot, producing the follow-on snapshot with the
/// given timestamp.
#[must_use]
pub fn apply_diff(base: &Snapshot, delta: &SnapshotDelta, timestamp: u64) -> Snapshot {
    let shift = delta.shift.unwrap_or(0);
    let shift_idx = usize::try_from(shift).unwrap_or(usize::MAX);

    let mut lines: Vec<Line> = if shift_idx >= base.lines.len() {
        Vec::new()
    } else {
        base.lines[shift_idx..].to_vec()
    };

    if let Some(edits) = &delta.lines {
        for (index, content) in edits {
            match content {
                None => {
                    lines.truncate(*index);
                    break;
                }
                Some(line) => {
                    if *index >= lines.len() {
                        lines.resize(*index + 1, Line::empty());
                    }
                    lines[*index] = line.clone();
                }
            }
        }
    }

    Snapshot {
        lines,
        cursor: delta.cursor.unwrap_or(base.cursor),
        cols: delta.cols.unwrap_or(base.cols),
        rows: delta.rows.unwrap_or(base.rows),
        alternate: delta.alternate.unwrap_or(base.alternate),
        lines_offset: Some(base.lines_offset.unwrap_or(0) + shift),
        timestamp,
    }
}
