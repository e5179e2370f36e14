//! Snapshot extraction with absolute scrollback addressing.
//!
//! The emulator's grid and scrollback are cell-level state; a [`Snapshot`]
//! wants rich text lines plus a stable `lines_offset`. [`CaptureState`] owns
//! the machinery between the two:
//!
//! - a cache of already-converted scrollback lines, reused across captures so
//!   steady output does not re-convert the whole history every time;
//! - a [`Marker`] on the newest scrollback line, re-placed after every
//!   capture. On the next capture the marker's surviving position reveals how
//!   many lines were trimmed in between: `previous_len - 1 - position`.
//!
//! When the marker is disposed (everything previously cached was evicted) the
//! trim count is unknowable; the capture reports `lines_offset = None`,
//! resets the cumulative count, and tracking resumes from 0 on the next
//! capture. Resizes reset tracking the same way. While the alternate screen
//! is active the normal buffer is frozen: the last offset is propagated
//! unchanged and no scrollback lines are emitted.

use scenecast_core::{Cursor, Line, Segment, Snapshot, StyledText};

use crate::emulator::{Cell, Emulator, Marker};

/// Scrollback-offset tracking state carried between captures.
#[derive(Debug, Default)]
pub struct CaptureState {
    /// Rich-line cache for the scrollback prefix `[0, cache.len())`.
    cache: Vec<Line>,
    cache_cols: u16,
    marker: Option<Marker>,
    prev_scrollback_len: usize,
    /// Cumulative trimmed-line count since tracking (re)started.
    trimmed: u64,
    /// Report `None` offset on the next normal-screen capture, then resume.
    lost: bool,
    started: bool,
}

impl CaptureState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare tracking lost (resize, or any external invalidation).
    pub fn invalidate(&mut self) {
        self.lost = true;
        self.marker = None;
        self.cache.clear();
        self.prev_scrollback_len = 0;
    }

    /// Build a snapshot of the emulator's current state.
    pub fn capture(&mut self, emu: &Emulator, timestamp: u64) -> Snapshot {
        if emu.is_alternate() {
            return self.capture_alternate(emu, timestamp);
        }

        let offset = self.resolve_offset(emu);
        self.refresh_cache(emu);

        let scrollback_len = emu.scrollback_len();
        let mut lines = self.cache.clone();
        for y in 0..emu.rows() {
            lines.push(cells_to_line(emu.row_cells(y)));
        }

        let (cursor_x, cursor_y) = emu.cursor();
        let cursor_rel = scrollback_len + usize::from(cursor_y);
        let snapshot = finish_lines(
            lines,
            cursor_rel,
            usize::from(cursor_x.min(emu.cols().saturating_sub(1))),
            emu.cursor_visible(),
            emu,
            offset,
            timestamp,
        );

        self.marker = emu.mark_scrollback_tail();
        self.prev_scrollback_len = scrollback_len;
        self.cache_cols = emu.cols();
        self.started = true;
        snapshot
    }

    /// Trim accounting per the marker protocol; updates `self.trimmed` and
    /// drops trimmed cache entries. Returns the offset for this capture.
    fn resolve_offset(&mut self, emu: &Emulator) -> Option<u64> {
        if self.lost {
            self.lost = false;
            self.trimmed = 0;
            self.cache.clear();
            self.marker = None;
            self.prev_scrollback_len = 0;
            return None;
        }
        if !self.started {
            return Some(0);
        }

        match self.marker {
            Some(marker) => match emu.marker_position(marker) {
                Some(position) => {
                    let trims = self
                        .prev_scrollback_len
                        .saturating_sub(1)
                        .saturating_sub(position);
                    self.trimmed += trims as u64;
                    self.cache.drain(..trims.min(self.cache.len()));
                    Some(self.trimmed)
                }
                None => {
                    // Everything previously cached was evicted; the trim
                    // count is unknowable.
                    self.trimmed = 0;
                    self.cache.clear();
                    None
                }
            },
            None => {
                if emu.scrollback_len() < emu.scrollback_limit() || emu.scrollback_len() == 0 {
                    // Nothing can have been evicted yet.
                    Some(self.trimmed)
                } else {
                    // Scrollback filled to capacity with no marker placed:
                    // evictions may have happened unobserved.
                    self.trimmed = 0;
                    self.cache.clear();
                    None
                }
            }
        }
    }

    /// Rebuild or extend the scrollback rich-line cache.
    fn refresh_cache(&mut self, emu: &Emulator) {
        let scrollback_len = emu.scrollback_len();
        if self.cache_cols != emu.cols() || scrollback_len < self.cache.len() {
            self.cache.clear();
        }
        for i in self.cache.len()..scrollback_len {
            if let Some(row) = emu.scrollback_row(i) {
                self.cache.push(cells_to_line(row));
            }
        }
    }

    fn capture_alternate(&mut self, emu: &Emulator, timestamp: u64) -> Snapshot {
        // Normal buffer is frozen: propagate the last offset, touch nothing.
        let offset = if self.lost { None } else { Some(self.trimmed) };
        let lines = (0..emu.rows())
            .map(|y| cells_to_line(emu.row_cells(y)))
            .collect();
        let (cursor_x, cursor_y) = emu.cursor();
        finish_lines(
            lines,
            usize::from(cursor_y),
            usize::from(cursor_x.min(emu.cols().saturating_sub(1))),
            emu.cursor_visible(),
            emu,
            offset,
            timestamp,
        )
    }
}

/// Strip trailing blanks (bounded by the cursor line), recompute the cursor's
/// end-relative position, and assemble the snapshot.
fn finish_lines(
    mut lines: Vec<Line>,
    cursor_rel: usize,
    cursor_x: usize,
    cursor_visible: bool,
    emu: &Emulator,
    offset: Option<u64>,
    timestamp: u64,
) -> Snapshot {
    let last_non_blank = lines.iter().rposition(|l| !l.is_blank());
    let content_end = last_non_blank.map_or(0, |i| i + 1);
    let cursor_end = if cursor_visible { cursor_rel + 1 } else { 0 };
    lines.truncate(content_end.max(cursor_end));

    let cursor_y = lines
        .len()
        .saturating_sub(1)
        .saturating_sub(cursor_rel.min(lines.len().saturating_sub(1)));

    Snapshot {
        lines,
        cursor: Cursor {
            x: cursor_x,
            y: cursor_y,
            visible: cursor_visible,
        },
        cols: emu.cols(),
        rows: emu.rows(),
        alternate: emu.is_alternate(),
        lines_offset: offset,
        timestamp,
    }
}

/// Convert one row of cells into a rich text line.
///
/// Adjacent cells with identical attributes group into one segment,
/// continuation cells are skipped, and trailing unstyled whitespace is
/// trimmed. A row whose every run is unstyled collapses to the plain-string
/// shorthand.
#[must_use]
pub fn cells_to_line(cells: &[Cell]) -> Line {
    // Trailing unstyled blanks never contribute; styled blanks (e.g. painted
    // backgrounds) do.
    let end = cells
        .iter()
        .rposition(|c| !(c.ch == ' ' && c.style.is_default()) && !c.is_continuation())
        .map_or(0, |i| i + 1);

    let mut segments: Vec<Segment> = Vec::new();
    let mut run = String::new();
    let mut run_style = None;

    for cell in &cells[..end] {
        if cell.is_continuation() {
            continue;
        }
        if run_style != Some(cell.style) {
            if let Some(style) = run_style {
                push_segment(&mut segments, run, style);
                run = String::new();
            }
            run_style = Some(cell.style);
        }
        run.push(cell.ch);
    }
    if let Some(style) = run_style {
        push_segment(&mut segments, run, style);
    }

    if segments.iter().all(|s| matches!(s, Segment::Plain(_))) {
        Line::Plain(segments.iter().map(Segment::text).collect())
    } else {
        Line::Rich(segments)
    }
}

fn push_segment(segments: &mut Vec<Segment>, text: String, style: scenecast_core::Style) {
    if style.is_default() {
        segments.push(Segment::Plain(text));
    } else {
        segments.push(Segment::Styled(StyledText { text, style }));
    }
}
