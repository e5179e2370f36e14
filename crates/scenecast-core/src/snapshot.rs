//! Point-in-time terminal captures.
//!
//! A [`Snapshot`] is an immutable value: screen content (including surviving
//! scrollback) as rich text lines, cursor position, dimensions, and the
//! absolute addressing of `lines[0]` in the virtual line buffer.
//!
//! # Invariants
//!
//! 1. `lines.len() <= rows + scrollback_limit` for the producing emulator.
//! 2. If `lines` is non-empty and the cursor is visible,
//!    `cursor.y <= lines.len() - 1`.
//! 3. Trailing blank lines are stripped only beyond the cursor line.
//! 4. `lines_offset` is monotonically non-decreasing across successive
//!    snapshots from one emulator, except when it becomes `None` (tracking
//!    loss), after which it resumes at 0.
//! 5. Equality for change detection ignores `timestamp`
//!    ([`Snapshot::same_content`]).

use serde::{Deserialize, Serialize};

use crate::text::Line;

/// Cursor position and visibility.
///
/// `x` is a 0-based column. `y` is measured from the **end** of the snapshot's
/// `lines`: 0 is the last line, 1 the second-to-last, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub x: usize,
    pub y: usize,
    pub visible: bool,
}

/// A structurally immutable capture of screen plus cursor plus scrollback
/// addressing at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Lines from oldest (scrollback) to newest, trailing blanks stripped.
    pub lines: Vec<Line>,
    pub cursor: Cursor,
    pub cols: u16,
    pub rows: u16,
    /// Whether the alternate screen buffer is active.
    pub alternate: bool,
    /// Absolute index of `lines[0]` in the virtual line buffer; `None` means
    /// tracking was lost and positions must not be compared with earlier
    /// snapshots.
    pub lines_offset: Option<u64>,
    /// Milliseconds since epoch at capture. Not part of the persisted payload
    /// (the dump frame envelope carries its own timestamp) and not part of
    /// content equality.
    #[serde(skip)]
    pub timestamp: u64,
}

impl Snapshot {
    /// Content equality: every field except `timestamp`.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.lines == other.lines
            && self.cursor == other.cursor
            && self.cols == other.cols
            && self.rows == other.rows
            && self.alternate == other.alternate
            && self.lines_offset == other.lines_offset
    }

    /// Absolute index of `lines[0]`, treating tracking loss as 0.
    ///
    /// Scenes use this base for positions after a tracking reset: the next
    /// tracked snapshot resumes its offset at 0, so positions stay comparable.
    #[must_use]
    pub fn lines_start(&self) -> u64 {
        self.lines_offset.unwrap_or(0)
    }

    /// Absolute index one past the last line.
    #[must_use]
    pub fn lines_end(&self) -> u64 {
        self.lines_start() + self.lines.len() as u64
    }

    /// Absolute index of the line the cursor is on, or `None` for an empty
    /// snapshot.
    #[must_use]
    pub fn cursor_line_index(&self) -> Option<u64> {
        if self.lines.is_empty() {
            return None;
        }
        let from_end = self.cursor.y.min(self.lines.len() - 1) as u64;
        Some(self.lines_end() - 1 - from_end)
    }

    /// The line at an absolute index, if it is within this snapshot.
    #[must_use]
    pub fn line_at(&self, absolute: u64) -> Option<&Line> {
        let start = self.lines_start();
        if absolute < start {
            return None;
        }
        self.lines.get(usize::try_from(absolute - start).ok()?)
    }

    /// Clone the lines in the absolute range `[start, end)`, clamped to what
    /// this snapshot holds.
    #[must_use]
    pub fn collect_lines(&self, start: u64, end: u64) -> Vec<Line> {
        let lo = start.max(self.lines_start());
        let hi = end.min(self.lines_end());
        if lo >= hi {
            return Vec::new();
        }
        let base = self.lines_start();
        let lo_idx = (lo - base) as usize;
        let hi_idx = (hi - base) as usize;
        self.lines[lo_idx..hi_idx].to_vec()
    }

    /// Plain-text rendering of all lines, one per row. Test helper and
    /// diagnostic formatting.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(Line::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
