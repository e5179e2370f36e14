//! In-memory terminal emulator: grid, cursor, ANSI interpretation, and an
//! addressable scrollback buffer.
//!
//! # Invariants
//!
//! 1. **Cursor always in bounds**: `cursor_x <= cols`, `cursor_y < rows`.
//!    `cursor_x == cols` is the "pending wrap" state (DECAWM): the next
//!    printed character wraps to the start of the following line.
//! 2. **Grid always fully populated**: `grid.len() == cols * rows`.
//! 3. **Scrollback is append-only**: lines enter at the back and leave only
//!    at the front (capacity eviction) or via an explicit clear. Every line
//!    that ever entered scrollback has a stable absolute id; [`Marker`]s hold
//!    such ids and go stale ("disposed") once the line is evicted.
//! 4. **Attribute state is sticky**: SGR attributes apply to subsequent
//!    characters until reset.
//!
//! # Failure modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unrecognized CSI/OSC | Unknown sequence | Silently ignored |
//! | Scrollback overflow | Excessive output | Front-evicted, markers dispose |
//! | Cursor wrap past bottom | Output fills screen | Scroll, top line to scrollback |

use std::collections::VecDeque;

use scenecast_core::{Color, Style};
use unicode_width::UnicodeWidthChar;

/// Sentinel character for the continuation (right) cell of a wide character.
const WIDE_CONTINUATION: char = '\0';

/// A single grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
        }
    }
}

impl Cell {
    /// Whether this cell contributes nothing visible: a space with no
    /// attributes, or a wide-character continuation.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        (self.ch == ' ' && self.style.is_default()) || self.ch == WIDE_CONTINUATION
    }

    /// Whether this cell is the continuation half of a wide character.
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.ch == WIDE_CONTINUATION
    }
}

/// A position token anchored to a scrollback line.
///
/// Markers have weak-reference semantics: the emulator disposes them
/// unilaterally when the line they point at is evicted (or the scrollback is
/// cleared). Probe liveness with [`Emulator::marker_position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    line: u64,
}

/// Parser state for escape sequence interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Ground,
    Escape,
    Csi,
    Osc,
}

/// Terminal emulator with scrollback addressing.
///
/// # Example
///
/// ```
/// use scenecast_term::Emulator;
///
/// let mut emu = Emulator::new(80, 24, 100);
/// emu.feed(b"hello");
/// assert_eq!(emu.row_text(0), "hello");
/// assert_eq!(emu.cursor(), (5, 0));
/// ```
pub struct Emulator {
    cols: u16,
    rows: u16,
    grid: Vec<Cell>,
    cursor_x: u16,
    cursor_y: u16,
    cursor_visible: bool,
    current_style: Style,
    scrollback: VecDeque<Vec<Cell>>,
    scrollback_limit: usize,
    /// Absolute id of `scrollback[0]`; advances on every eviction or clear.
    evicted: u64,
    saved_cursor: Option<(u16, u16)>,
    // Scroll region (top, bottom), 0-indexed inclusive.
    scroll_top: u16,
    scroll_bottom: u16,
    parse_state: ParseState,
    csi_params: Vec<u16>,
    csi_private: bool,
    osc_data: Vec<u8>,
    alternate: bool,
    saved_grid: Option<Vec<Cell>>,
    saved_alt_cursor: Option<(u16, u16)>,
    title: String,
    origin_mode: bool,
    insert_mode: bool,
    autowrap: bool,
    tab_stops: Vec<bool>,
    utf8_buf: [u8; 4],
    utf8_len: u8,
    utf8_expected: u8,
}

impl Emulator {
    /// Create an emulator with the given dimensions and scrollback capacity.
    ///
    /// # Panics
    ///
    /// Panics if `cols` or `rows` is 0.
    #[must_use]
    pub fn new(cols: u16, rows: u16, scrollback_limit: usize) -> Self {
        assert!(cols > 0 && rows > 0, "terminal dimensions must be > 0");
        Self {
            cols,
            rows,
            grid: vec![Cell::default(); usize::from(cols) * usize::from(rows)],
            cursor_x: 0,
            cursor_y: 0,
            cursor_visible: true,
            current_style: Style::default(),
            scrollback: VecDeque::new(),
            scrollback_limit,
            evicted: 0,
            saved_cursor: None,
            scroll_top: 0,
            scroll_bottom: rows - 1,
            parse_state: ParseState::Ground,
            csi_params: Vec::new(),
            csi_private: false,
            osc_data: Vec::new(),
            alternate: false,
            saved_grid: None,
            saved_alt_cursor: None,
            title: String::new(),
            origin_mode: false,
            insert_mode: false,
            autowrap: true,
            tab_stops: Self::default_tab_stops(cols),
            utf8_buf: [0; 4],
            utf8_len: 0,
            utf8_expected: 0,
        }
    }

    fn default_tab_stops(cols: u16) -> Vec<bool> {
        (0..cols).map(|c| c > 0 && c % 8 == 0).collect()
    }

    // ── Dimensions & cursor ─────────────────────────────────────────

    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    /// Cursor position (x, y), 0-indexed. `x` may equal `cols` in the
    /// pending-wrap state.
    #[must_use]
    pub const fn cursor(&self) -> (u16, u16) {
        (self.cursor_x, self.cursor_y)
    }

    #[must_use]
    pub const fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    #[must_use]
    pub const fn is_alternate(&self) -> bool {
        self.alternate
    }

    /// Window title, as set via OSC 0/2.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    // ── Scrollback & markers ────────────────────────────────────────

    #[must_use]
    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    #[must_use]
    pub const fn scrollback_limit(&self) -> usize {
        self.scrollback_limit
    }

    /// Cells of a scrollback line by current index (0 = oldest surviving).
    #[must_use]
    pub fn scrollback_row(&self, index: usize) -> Option<&[Cell]> {
        self.scrollback.get(index).map(Vec::as_slice)
    }

    /// Place a marker on the newest scrollback line, if any.
    #[must_use]
    pub fn mark_scrollback_tail(&self) -> Option<Marker> {
        if self.scrollback.is_empty() {
            None
        } else {
            Some(Marker {
                line: self.evicted + self.scrollback.len() as u64 - 1,
            })
        }
    }

    /// Current index of a marker's line, or `None` if the marker is disposed
    /// (the line was evicted or the scrollback cleared).
    #[must_use]
    pub fn marker_position(&self, marker: Marker) -> Option<usize> {
        if marker.line < self.evicted {
            return None;
        }
        let index = usize::try_from(marker.line - self.evicted).ok()?;
        (index < self.scrollback.len()).then_some(index)
    }

    // ── Cell access ─────────────────────────────────────────────────

    /// Cells of a viewport row.
    ///
    /// # Panics
    ///
    /// Panics if `y >= rows`.
    #[must_use]
    pub fn row_cells(&self, y: u16) -> &[Cell] {
        assert!(y < self.rows);
        let start = self.idx(0, y);
        &self.grid[start..start + usize::from(self.cols)]
    }

    /// Text of a viewport row, trailing spaces trimmed. Test helper.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        if y >= self.rows {
            return String::new();
        }
        let s: String = self
            .row_cells(y)
            .iter()
            .filter(|c| !c.is_continuation())
            .map(|c| c.ch)
            .collect();
        s.trim_end().to_string()
    }

    /// All visible rows joined with newlines. Test helper.
    #[must_use]
    pub fn screen_text(&self) -> String {
        (0..self.rows)
            .map(|y| self.row_text(y))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ── Input ───────────────────────────────────────────────────────

    /// Feed raw bytes through the escape-sequence parser.
    pub fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            self.process_byte(byte);
        }
    }

    /// Resize the grid, preserving the overlapping top-left region.
    ///
    /// The scroll region resets to the full screen, tab stops are rebuilt,
    /// and the cursor clamps into bounds. Scrollback content is untouched;
    /// callers that track absolute offsets must treat a resize as a tracking
    /// reset (rows reflow differently in a real terminal).
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 || (cols == self.cols && rows == self.rows) {
            return;
        }
        let mut grid = vec![Cell::default(); usize::from(cols) * usize::from(rows)];
        let copy_cols = usize::from(cols.min(self.cols));
        for y in 0..usize::from(rows.min(self.rows)) {
            let src = y * usize::from(self.cols);
            let dst = y * usize::from(cols);
            grid[dst..dst + copy_cols].clone_from_slice(&self.grid[src..src + copy_cols]);
        }
        self.grid = grid;
        if self.saved_grid.is_some() {
            // The inactive buffer resizes too; its content is disposable.
            self.saved_grid =
                Some(vec![Cell::default(); usize::from(cols) * usize::from(rows)]);
        }
        self.cols = cols;
        self.rows = rows;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.cursor_x = self.cursor_x.min(cols - 1);
        self.cursor_y = self.cursor_y.min(rows - 1);
        self.saved_cursor = None;
        self.tab_stops = Self::default_tab_stops(cols);
    }

    // ── Internal ────────────────────────────────────────────────────

    fn idx(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.cols) + usize::from(x)
    }

    fn process_byte(&mut self, byte: u8) {
        match self.parse_state {
            ParseState::Ground => self.ground(byte),
            ParseState::Escape => self.escape(byte),
            ParseState::Csi => self.csi(byte),
            ParseState::Osc => self.osc(byte),
        }
    }

    fn ground(&mut self, byte: u8) {
        match byte {
            0x1b => self.parse_state = ParseState::Escape,
            b'\n' | 0x0b | 0x0c => self.linefeed(),
            b'\r' => self.cursor_x = 0,
            0x08 => self.cursor_x = self.cursor_x.saturating_sub(1).min(self.cols - 1),
            b'\t' => {
                let max_col = self.cols - 1;
                let mut col = self.cursor_x.min(max_col) + 1;
                while col < self.cols && !self.tab_stops[usize::from(col)] {
                    col += 1;
                }
                self.cursor_x = col.min(max_col);
            }
            0x07 => {} // bell
            0x20..=0x7e => self.put_char(byte as char),
            0xc2..=0xdf => self.utf8_lead(byte, 2),
            0xe0..=0xef => self.utf8_lead(byte, 3),
            0xf0..=0xf4 => self.utf8_lead(byte, 4),
            0x80..=0xbf if self.utf8_len > 0 => self.utf8_continuation(byte),
            _ => {
                self.utf8_len = 0;
                self.utf8_expected = 0;
            }
        }
    }

    fn utf8_lead(&mut self, byte: u8, expected: u8) {
        self.utf8_buf[0] = byte;
        self.utf8_len = 1;
        self.utf8_expected = expected;
    }

    fn utf8_continuation(&mut self, byte: u8) {
        let idx = usize::from(self.utf8_len);
        self.utf8_buf[idx] = byte;
        self.utf8_len += 1;
        if self.utf8_len == self.utf8_expected {
            let len = usize::from(self.utf8_len);
            let buf = self.utf8_buf;
            self.utf8_len = 0;
            self.utf8_expected = 0;
            if let Ok(decoded) = std::str::from_utf8(&buf[..len]) {
                for ch in decoded.chars() {
                    self.put_char(ch);
                }
            }
        }
    }

    fn escape(&mut self, byte: u8) {
        match byte {
            b'[' => {
                self.parse_state = ParseState::Csi;
                self.csi_params.clear();
                self.csi_private = false;
                return;
            }
            b']' => {
                self.parse_state = ParseState::Osc;
                self.osc_data.clear();
                return;
            }
            b'7' => self.saved_cursor = Some((self.cursor_x, self.cursor_y)),
            b'8' => {
                if let Some((x, y)) = self.saved_cursor {
                    self.cursor_x = x.min(self.cols - 1);
                    self.cursor_y = y.min(self.rows - 1);
                }
            }
            b'D' => self.linefeed(),
            b'E' => {
                self.cursor_x = 0;
                self.linefeed();
            }
            b'M' => {
                // Reverse index
                if self.cursor_y == self.scroll_top {
                    self.scroll_down(1);
                } else {
                    self.cursor_y = self.cursor_y.saturating_sub(1);
                }
            }
            b'H' => {
                let col = usize::from(self.cursor_x.min(self.cols - 1));
                self.tab_stops[col] = true;
            }
            b'c' => self.reset(),
            _ => {}
        }
        self.parse_state = ParseState::Ground;
    }

    fn csi(&mut self, byte: u8) {
        match byte {
            b'0'..=b'9' => {
                let digit = u16::from(byte - b'0');
                if let Some(last) = self.csi_params.last_mut() {
                    *last = last.saturating_mul(10).saturating_add(digit);
                } else {
                    self.csi_params.push(digit);
                }
            }
            b';' => {
                if self.csi_params.is_empty() {
                    self.csi_params.push(0);
                }
                self.csi_params.push(0);
            }
            b'?' => self.csi_private = true,
            b'>' | b'!' | b' ' | b'"' | b'\'' => {} // intermediates we ignore
            0x40..=0x7e => {
                self.dispatch_csi(byte);
                self.parse_state = ParseState::Ground;
            }
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn osc(&mut self, byte: u8) {
        match byte {
            0x07 | 0x1b => {
                // BEL or (simplified) ST terminates
                let data = String::from_utf8_lossy(&self.osc_data).to_string();
                if let Some(rest) = data.strip_prefix("0;").or_else(|| data.strip_prefix("2;")) {
                    self.title = rest.to_string();
                }
                self.parse_state = ParseState::Ground;
            }
            _ => self.osc_data.push(byte),
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8) {
        let params = std::mem::take(&mut self.csi_params);
        let private = self.csi_private;

        match final_byte {
            b'A' => {
                let n = param(&params, 0, 1);
                let top = if self.cursor_y >= self.scroll_top {
                    self.scroll_top
                } else {
                    0
                };
                self.cursor_y = self.cursor_y.saturating_sub(n).max(top);
                self.clear_pending_wrap();
            }
            b'B' => {
                let n = param(&params, 0, 1);
                let bottom = if self.cursor_y <= self.scroll_bottom {
                    self.scroll_bottom
                } else {
                    self.rows - 1
                };
                self.cursor_y = (self.cursor_y + n).min(bottom);
                self.clear_pending_wrap();
            }
            b'C' => {
                let n = param(&params, 0, 1);
                self.cursor_x = (self.cursor_x.min(self.cols - 1) + n).min(self.cols - 1);
            }
            b'D' => {
                let n = param(&params, 0, 1);
                self.cursor_x = self.cursor_x.min(self.cols - 1).saturating_sub(n);
            }
            b'E' => {
                let n = param(&params, 0, 1);
                self.cursor_y = (self.cursor_y + n).min(self.rows - 1);
                self.cursor_x = 0;
            }
            b'F' => {
                let n = param(&params, 0, 1);
                self.cursor_y = self.cursor_y.saturating_sub(n);
                self.cursor_x = 0;
            }
            b'G' => {
                let col = param(&params, 0, 1).saturating_sub(1);
                self.cursor_x = col.min(self.cols - 1);
            }
            b'H' | b'f' => {
                let row = param(&params, 0, 1).saturating_sub(1);
                let col = param(&params, 1, 1).saturating_sub(1);
                self.cursor_y = if self.origin_mode {
                    row.saturating_add(self.scroll_top).min(self.scroll_bottom)
                } else {
                    row.min(self.rows - 1)
                };
                self.cursor_x = col.min(self.cols - 1);
            }
            b'd' => {
                let row = param(&params, 0, 1).saturating_sub(1);
                self.cursor_y = if self.origin_mode {
                    row.saturating_add(self.scroll_top).min(self.scroll_bottom)
                } else {
                    row.min(self.rows - 1)
                };
            }
            b'J' => self.erase_display(param(&params, 0, 0)),
            b'K' => self.erase_line(param(&params, 0, 0)),
            b'L' => self.insert_lines(param(&params, 0, 1)),
            b'M' => self.delete_lines(param(&params, 0, 1)),
            b'S' => self.scroll_up(param(&params, 0, 1), true),
            b'T' => self.scroll_down(param(&params, 0, 1)),
            b'@' => self.insert_chars(param(&params, 0, 1)),
            b'P' => self.delete_chars(param(&params, 0, 1)),
            b'X' => self.erase_chars(param(&params, 0, 1)),
            b'm' => self.dispatch_sgr(&params),
            b'r' => {
                let top = param(&params, 0, 1).saturating_sub(1);
                let bottom = param(&params, 1, self.rows).saturating_sub(1);
                if top < bottom && bottom < self.rows {
                    self.scroll_top = top;
                    self.scroll_bottom = bottom;
                }
                self.cursor_x = 0;
                self.cursor_y = if self.origin_mode { self.scroll_top } else { 0 };
            }
            b'g' => {
                match param(&params, 0, 0) {
                    0 => {
                        let col = usize::from(self.cursor_x.min(self.cols - 1));
                        self.tab_stops[col] = false;
                    }
                    3 => self.tab_stops.fill(false),
                    _ => {}
                }
            }
            b'h' => self.set_modes(&params, private, true),
            b'l' => self.set_modes(&params, private, false),
            _ => {}
        }
    }

    fn set_modes(&mut self, params: &[u16], private: bool, enable: bool) {
        for &mode in params {
            match (private, mode) {
                (true, 6) => {
                    self.origin_mode = enable;
                    self.cursor_x = 0;
                    self.cursor_y = if enable { self.scroll_top } else { 0 };
                }
                (true, 7) => self.autowrap = enable,
                (true, 25) => self.cursor_visible = enable,
                (true, 47 | 1047 | 1049) => self.set_alternate(enable, mode == 1049),
                (false, 4) => self.insert_mode = enable,
                _ => {}
            }
        }
    }

    fn set_alternate(&mut self, enable: bool, save_cursor: bool) {
        if enable && !self.alternate {
            self.saved_grid = Some(std::mem::replace(
                &mut self.grid,
                vec![Cell::default(); usize::from(self.cols) * usize::from(self.rows)],
            ));
            if save_cursor {
                self.saved_alt_cursor = Some((self.cursor_x, self.cursor_y));
                self.cursor_x = 0;
                self.cursor_y = 0;
            }
            self.alternate = true;
        } else if !enable && self.alternate {
            if let Some(main) = self.saved_grid.take() {
                self.grid = main;
            }
            if save_cursor && let Some((x, y)) = self.saved_alt_cursor.take() {
                self.cursor_x = x.min(self.cols - 1);
                self.cursor_y = y.min(self.rows - 1);
            }
            self.alternate = false;
        }
    }

    fn dispatch_sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.current_style.reset();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => self.current_style.reset(),
                1 => self.current_style.bold = true,
                2 => self.current_style.dim = true,
                3 => self.current_style.italic = true,
                4 => self.current_style.underline = true,
                7 => self.current_style.inverse = true,
                9 => self.current_style.strikethrough = true,
                22 => {
                    self.current_style.bold = false;
                    self.current_style.dim = false;
                }
                23 => self.current_style.italic = false,
                24 => self.current_style.underline = false,
                27 => self.current_style.inverse = false,
                29 => self.current_style.strikethrough = false,
                30..=37 => self.current_style.fg = Some(Color::Indexed((params[i] - 30) as u8)),
                38 => {
                    if let Some(color) = parse_extended_color(params, &mut i) {
                        self.current_style.fg = Some(color);
                    }
                }
                39 => self.current_style.fg = None,
                40..=47 => self.current_style.bg = Some(Color::Indexed((params[i] - 40) as u8)),
                48 => {
                    if let Some(color) = parse_extended_color(params, &mut i) {
                        self.current_style.bg = Some(color);
                    }
                }
                49 => self.current_style.bg = None,
                53 => self.current_style.overline = true,
                55 => self.current_style.overline = false,
                90..=97 => {
                    self.current_style.fg = Some(Color::Indexed((params[i] - 90 + 8) as u8));
                }
                100..=107 => {
                    self.current_style.bg = Some(Color::Indexed((params[i] - 100 + 8) as u8));
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn put_char(&mut self, ch: char) {
        let char_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if char_width == 0 {
            return; // combining marks, ZWJ: skip
        }

        if self.cursor_x >= self.cols {
            if self.autowrap {
                self.cursor_x = 0;
                self.linefeed();
            } else {
                self.cursor_x = self.cols - 1;
            }
        }

        // Wide char at the last column wraps first.
        if char_width == 2 && self.cursor_x + 1 >= self.cols {
            if self.autowrap {
                let idx = self.idx(self.cursor_x, self.cursor_y);
                self.grid[idx] = Cell::default();
                self.cursor_x = 0;
                self.linefeed();
            } else {
                self.cursor_x = self.cols - 1;
            }
        }

        let idx = self.idx(self.cursor_x, self.cursor_y);

        if self.insert_mode {
            let row_start = self.idx(0, self.cursor_y);
            let w = usize::from(self.cols);
            let cx = usize::from(self.cursor_x);
            let row = &mut self.grid[row_start..row_start + w];
            row[cx..].rotate_right(char_width.min(w - cx));
        }

        // Overwriting a continuation orphans its lead.
        if self.grid[idx].is_continuation() && self.cursor_x > 0 {
            let lead = self.idx(self.cursor_x - 1, self.cursor_y);
            self.grid[lead] = Cell::default();
        }
        // A narrow char over a wide lead orphans its continuation.
        if char_width == 1
            && self.cursor_x + 1 < self.cols
            && self.grid[idx + 1].is_continuation()
        {
            self.grid[idx + 1] = Cell::default();
        }

        self.grid[idx] = Cell {
            ch,
            style: self.current_style,
        };
        if char_width == 2 && self.cursor_x + 1 < self.cols {
            self.grid[idx + 1] = Cell {
                ch: WIDE_CONTINUATION,
                style: self.current_style,
            };
        }

        let advance = char_width as u16;
        if self.autowrap {
            self.cursor_x += advance;
        } else {
            self.cursor_x = (self.cursor_x + advance).min(self.cols - 1);
        }
    }

    fn clear_pending_wrap(&mut self) {
        self.cursor_x = self.cursor_x.min(self.cols - 1);
    }

    fn linefeed(&mut self) {
        if self.cursor_y == self.scroll_bottom {
            self.scroll_up(1, true);
        } else if self.cursor_y < self.rows - 1 {
            self.cursor_y += 1;
        }
    }

    /// Scroll the region up by `n`, optionally pushing evicted top lines into
    /// scrollback. The alternate screen never feeds scrollback, and neither
    /// does a partial scroll region.
    fn scroll_up(&mut self, n: u16, into_scrollback: bool) {
        let feeds_scrollback =
            into_scrollback && !self.alternate && self.scroll_top == 0 && self.scrollback_limit > 0;
        for _ in 0..n {
            if feeds_scrollback {
                let start = self.idx(0, self.scroll_top);
                let line = self.grid[start..start + usize::from(self.cols)].to_vec();
                self.scrollback.push_back(line);
                while self.scrollback.len() > self.scrollback_limit {
                    self.scrollback.pop_front();
                    self.evicted += 1;
                }
            }
            let w = usize::from(self.cols);
            for row in self.scroll_top..self.scroll_bottom {
                let src = self.idx(0, row + 1);
                let dst = self.idx(0, row);
                let (left, right) = self.grid.split_at_mut(src);
                left[dst..dst + w].clone_from_slice(&right[..w]);
            }
            let blank = self.styled_blank();
            let bottom = self.idx(0, self.scroll_bottom);
            self.grid[bottom..bottom + w].fill(blank.clone());
        }
    }

    fn scroll_down(&mut self, n: u16) {
        let w = usize::from(self.cols);
        for _ in 0..n {
            for row in (self.scroll_top + 1..=self.scroll_bottom).rev() {
                let src = self.idx(0, row - 1);
                let dst = self.idx(0, row);
                let (left, right) = self.grid.split_at_mut(dst);
                right[..w].clone_from_slice(&left[src..src + w]);
            }
            let blank = self.styled_blank();
            let top = self.idx(0, self.scroll_top);
            self.grid[top..top + w].fill(blank.clone());
        }
    }

    /// A blank cell carrying the current SGR attributes: erase/edit operations
    /// fill with the current background.
    fn styled_blank(&self) -> Cell {
        Cell {
            ch: ' ',
            style: Style {
                bg: self.current_style.bg,
                ..Style::default()
            },
        }
    }

    fn fixup_wide_boundaries(&mut self, y: u16, start_col: u16, count: u16) {
        if count == 0 || start_col >= self.cols {
            return;
        }
        let row_start = self.idx(0, y);
        if start_col > 0 && self.grid[row_start + usize::from(start_col)].is_continuation() {
            self.grid[row_start + usize::from(start_col - 1)] = Cell::default();
        }
        let end_col = start_col.saturating_add(count);
        if end_col < self.cols && self.grid[row_start + usize::from(end_col)].is_continuation() {
            self.grid[row_start + usize::from(end_col)] = Cell::default();
        }
    }

    fn erase_display(&mut self, mode: u16) {
        self.clear_pending_wrap();
        let blank = self.styled_blank();
        match mode {
            0 => {
                let count = self.cols - self.cursor_x;
                self.fixup_wide_boundaries(self.cursor_y, self.cursor_x, count);
                let start = self.idx(self.cursor_x, self.cursor_y);
                self.grid[start..].fill(blank);
            }
            1 => {
                self.fixup_wide_boundaries(self.cursor_y, 0, self.cursor_x + 1);
                let end = self.idx(self.cursor_x, self.cursor_y) + 1;
                self.grid[..end].fill(blank);
            }
            2 | 3 => {
                self.grid.fill(blank);
                if mode == 3 {
                    self.clear_scrollback();
                }
            }
            _ => {}
        }
    }

    fn erase_line(&mut self, mode: u16) {
        self.clear_pending_wrap();
        let blank = self.styled_blank();
        let row_start = self.idx(0, self.cursor_y);
        match mode {
            0 => {
                let count = self.cols - self.cursor_x;
                self.fixup_wide_boundaries(self.cursor_y, self.cursor_x, count);
                let start = row_start + usize::from(self.cursor_x);
                self.grid[start..row_start + usize::from(self.cols)].fill(blank);
            }
            1 => {
                self.fixup_wide_boundaries(self.cursor_y, 0, self.cursor_x + 1);
                self.grid[row_start..=row_start + usize::from(self.cursor_x)].fill(blank);
            }
            2 => {
                self.grid[row_start..row_start + usize::from(self.cols)].fill(blank);
            }
            _ => {}
        }
    }

    fn insert_lines(&mut self, n: u16) {
        if self.cursor_y < self.scroll_top || self.cursor_y > self.scroll_bottom {
            return;
        }
        let w = usize::from(self.cols);
        let blank = self.styled_blank();
        for _ in 0..n {
            for row in (self.cursor_y + 1..=self.scroll_bottom).rev() {
                let src = self.idx(0, row - 1);
                let dst = self.idx(0, row);
                let (left, right) = self.grid.split_at_mut(dst);
                right[..w].clone_from_slice(&left[src..src + w]);
            }
            let start = self.idx(0, self.cursor_y);
            self.grid[start..start + w].fill(blank.clone());
        }
    }

    fn delete_lines(&mut self, n: u16) {
        if self.cursor_y < self.scroll_top || self.cursor_y > self.scroll_bottom {
            return;
        }
        let w = usize::from(self.cols);
        let blank = self.styled_blank();
        for _ in 0..n {
            for row in self.cursor_y..self.scroll_bottom {
                let src = self.idx(0, row + 1);
                let dst = self.idx(0, row);
                let (left, right) = self.grid.split_at_mut(src);
                left[dst..dst + w].clone_from_slice(&right[..w]);
            }
            let start = self.idx(0, self.scroll_bottom);
            self.grid[start..start + w].fill(blank.clone());
        }
    }

    fn insert_chars(&mut self, n: u16) {
        self.clear_pending_wrap();
        let n = n.min(self.cols - self.cursor_x);
        self.fixup_wide_boundaries(self.cursor_y, self.cursor_x, n);
        let w = usize::from(self.cols);
        let cx = usize::from(self.cursor_x);
        let count = usize::from(n);
        let blank = self.styled_blank();
        let row_start = self.idx(0, self.cursor_y);
        let row = &mut self.grid[row_start..row_start + w];
        row[cx..].rotate_right(count.min(w - cx));
        for cell in row.iter_mut().skip(cx).take(count.min(w - cx)) {
            *cell = blank.clone();
        }
        if cx + count < w && row[cx + count].is_continuation() {
            row[cx + count] = blank;
        }
    }

    fn delete_chars(&mut self, n: u16) {
        self.clear_pending_wrap();
        let n = n.min(self.cols - self.cursor_x);
        self.fixup_wide_boundaries(self.cursor_y, self.cursor_x, n);
        let w = usize::from(self.cols);
        let cx = usize::from(self.cursor_x);
        let count = usize::from(n);
        let blank = self.styled_blank();
        let row_start = self.idx(0, self.cursor_y);
        let row = &mut self.grid[row_start..row_start + w];
        row[cx..].rotate_left(count.min(w - cx));
        for cell in row.iter_mut().skip(w - count.min(w - cx)) {
            *cell = blank.clone();
        }
    }

    fn erase_chars(&mut self, n: u16) {
        self.clear_pending_wrap();
        let n = n.min(self.cols - self.cursor_x);
        self.fixup_wide_boundaries(self.cursor_y, self.cursor_x, n);
        let blank = self.styled_blank();
        let start = self.idx(self.cursor_x, self.cursor_y);
        self.grid[start..start + usize::from(n)].fill(blank);
    }

    fn clear_scrollback(&mut self) {
        self.evicted += self.scrollback.len() as u64;
        self.scrollback.clear();
    }

    fn reset(&mut self) {
        self.grid = vec![Cell::default(); usize::from(self.cols) * usize::from(self.rows)];
        self.cursor_x = 0;
        self.cursor_y = 0;
        self.cursor_visible = true;
        self.current_style = Style::default();
        self.clear_scrollback();
        self.saved_cursor = None;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        self.title.clear();
        self.alternate = false;
        self.saved_grid = None;
        self.saved_alt_cursor = None;
        self.origin_mode = false;
        self.insert_mode = false;
        self.autowrap = true;
        self.tab_stops = Self::default_tab_stops(self.cols);
        self.utf8_len = 0;
        self.utf8_expected = 0;
    }
}

fn param(params: &[u16], idx: usize, default: u16) -> u16 {
    params
        .get(idx)
        .copied()
        .filter(|&v| v > 0)
        .unwrap_or(default)
}

/// Parse extended color (`38;2;r;g;b` or `38;5;idx`), advancing `i` past the
/// consumed parameters.
fn parse_extended_color(params: &[u16], i: &mut usize) -> Option<Color> {
    match params.get(*i + 1)? {
        2 => {
            if *i + 4 < params.len() {
                let r = params[*i + 2] as u8;
                let g = params[*i + 3] as u8;
                let b = params[*i + 4] as u8;
                *i += 4;
                Some(Color::Rgb(r, g, b))
            } else {
                None
            }
        }
        5 => {
            if *i + 2 < params.len() {
                let idx = params[*i + 2];
                *i += 2;
                u8::try_from(idx).ok().map(Color::Indexed)
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_invariants(emu: &Emulator) {
        // cursor_x == cols is the pending-wrap state
        assert!(emu.cursor_x <= emu.cols);
        assert!(emu.cursor_y < emu.rows);
        assert_eq!(
            emu.grid.len(),
            usize::from(emu.cols) * usize::from(emu.rows)
        );
        assert!(emu.scroll_top <= emu.scroll_bottom);
        assert!(emu.scroll_bottom < emu.rows);
        assert!(emu.scrollback.len() <= emu.scrollback_limit);
    }

    // ---- Basics ----

    #[test]
    fn plain_text_output() {
        let mut emu = Emulator::new(80, 24, 100);
        emu.feed(b"Hello, World!");
        assert_eq!(emu.row_text(0), "Hello, World!");
        assert_eq!(emu.cursor(), (13, 0));
    }

    #[test]
    #[should_panic(expected = "dimensions must be > 0")]
    fn zero_dimensions_panic() {
        let _ = Emulator::new(0, 24, 0);
    }

    #[test]
    fn newline_and_carriage_return() {
        let mut emu = Emulator::new(80, 24, 100);
        emu.feed(b"one\r\ntwo\rT");
        assert_eq!(emu.row_text(0), "one");
        assert_eq!(emu.row_text(1), "Two");
    }

    #[test]
    fn auto_wrap_is_deferred() {
        let mut emu = Emulator::new(5, 3, 100);
        emu.feed(b"ABCDE");
        // Pending wrap: cursor logically past the edge, nothing wrapped yet.
        assert_eq!(emu.cursor(), (5, 0));
        emu.feed(b"F");
        assert_eq!(emu.row_text(0), "ABCDE");
        assert_eq!(emu.row_text(1), "F");
        assert_eq!(emu.cursor(), (1, 1));
    }

    #[test]
    fn tab_stops_every_eight() {
        let mut emu = Emulator::new(40, 4, 0);
        emu.feed(b"a\tb\tc");
        assert_eq!(emu.row_text(0), "a       b       c");
    }

    #[test]
    fn invariants_hold_for_varied_inputs() {
        let inputs: [&[u8]; 7] = [
            b"",
            b"Hello",
            b"ABCDE\r\nFGHIJ",
            b"\x1b[2J",
            b"\x1b[1;1H\x1b[2;2H",
            b"\x1b[?1049hAlt\x1b[?1049l",
            b"\x1b[31mred\x1b[0m\x1b[38;5;200mx\x1b[38;2;1;2;3my",
        ];
        for cols in 1..=6 {
            for rows in 1..=4 {
                for input in inputs {
                    let mut emu = Emulator::new(cols, rows, 3);
                    for chunk in input.chunks(3) {
                        emu.feed(chunk);
                        assert_invariants(&emu);
                    }
                }
            }
        }
    }

    // ---- Cursor addressing ----

    #[test]
    fn cursor_position_is_one_indexed() {
        let mut emu = Emulator::new(80, 24, 0);
        emu.feed(b"\x1b[4;6H");
        assert_eq!(emu.cursor(), (5, 3));
    }

    #[test]
    fn relative_cursor_moves_clamp() {
        let mut emu = Emulator::new(10, 5, 0);
        emu.feed(b"\x1b[99C");
        assert_eq!(emu.cursor(), (9, 0));
        emu.feed(b"\x1b[99B");
        assert_eq!(emu.cursor(), (9, 4));
        emu.feed(b"\x1b[99D\x1b[99A");
        assert_eq!(emu.cursor(), (0, 0));
    }

    #[test]
    fn cursor_visibility_modes() {
        let mut emu = Emulator::new(10, 5, 0);
        assert!(emu.cursor_visible());
        emu.feed(b"\x1b[?25l");
        assert!(!emu.cursor_visible());
        emu.feed(b"\x1b[?25h");
        assert!(emu.cursor_visible());
    }

    // ---- Scrollback & markers ----

    #[test]
    fn overflow_scrolls_into_scrollback() {
        let mut emu = Emulator::new(10, 3, 100);
        emu.feed(b"AAA\r\nBBB\r\nCCC\r\nDDD");
        assert_eq!(emu.row_text(0), "BBB");
        assert_eq!(emu.row_text(2), "DDD");
        assert_eq!(emu.scrollback_len(), 1);
        let row = emu.scrollback_row(0).unwrap();
        assert_eq!(row[0].ch, 'A');
    }

    #[test]
    fn scrollback_eviction_disposes_markers() {
        let mut emu = Emulator::new(10, 2, 2);
        emu.feed(b"a\r\nb\r\nc"); // a enters scrollback
        let marker = emu.mark_scrollback_tail().unwrap();
        assert_eq!(emu.marker_position(marker), Some(0));

        emu.feed(b"\r\nd"); // b enters scrollback
        assert_eq!(emu.marker_position(marker), Some(0));
        assert_eq!(emu.scrollback_len(), 2);

        emu.feed(b"\r\ne\r\nf"); // c, d enter; a, b evicted
        assert_eq!(emu.marker_position(marker), None);
    }

    #[test]
    fn marker_tracks_trimming() {
        let mut emu = Emulator::new(10, 2, 4);
        emu.feed(b"1\r\n2\r\n3\r\n4\r\n5\r\n6"); // 1..4 in scrollback (limit 4)
        assert_eq!(emu.scrollback_len(), 4);
        let marker = emu.mark_scrollback_tail().unwrap();
        assert_eq!(emu.marker_position(marker), Some(3));

        emu.feed(b"\r\n7\r\n8"); // two more lines pushed, two evicted
        assert_eq!(emu.marker_position(marker), Some(1));
    }

    #[test]
    fn clear_scrollback_disposes_markers() {
        let mut emu = Emulator::new(10, 2, 10);
        emu.feed(b"a\r\nb\r\nc");
        let marker = emu.mark_scrollback_tail().unwrap();
        emu.feed(b"\x1b[3J");
        assert_eq!(emu.scrollback_len(), 0);
        assert_eq!(emu.marker_position(marker), None);
    }

    #[test]
    fn empty_scrollback_has_no_tail_marker() {
        let emu = Emulator::new(10, 2, 10);
        assert_eq!(emu.mark_scrollback_tail(), None);
    }

    // ---- Alternate screen ----

    #[test]
    fn alternate_screen_swaps_and_restores() {
        let mut emu = Emulator::new(20, 4, 10);
        emu.feed(b"main content");
        emu.feed(b"\x1b[?1049h");
        assert!(emu.is_alternate());
        assert_eq!(emu.row_text(0), "");
        emu.feed(b"pager");
        assert_eq!(emu.row_text(0), "pager");

        emu.feed(b"\x1b[?1049l");
        assert!(!emu.is_alternate());
        assert_eq!(emu.row_text(0), "main content");
    }

    #[test]
    fn alternate_screen_does_not_feed_scrollback() {
        let mut emu = Emulator::new(10, 2, 10);
        emu.feed(b"\x1b[?1049h");
        emu.feed(b"a\r\nb\r\nc\r\nd");
        assert_eq!(emu.scrollback_len(), 0);
        emu.feed(b"\x1b[?1049l");
    }

    // ---- SGR ----

    #[test]
    fn sgr_colors_map_to_palette_and_rgb() {
        let mut emu = Emulator::new(20, 2, 0);
        emu.feed(b"\x1b[31;1mA\x1b[0m\x1b[38;5;200mB\x1b[48;2;9;8;7mC");
        let a = &emu.row_cells(0)[0];
        assert_eq!(a.style.fg, Some(Color::Indexed(1)));
        assert!(a.style.bold);
        let b = &emu.row_cells(0)[1];
        assert_eq!(b.style.fg, Some(Color::Indexed(200)));
        assert!(!b.style.bold);
        let c = &emu.row_cells(0)[2];
        assert_eq!(c.style.bg, Some(Color::Rgb(9, 8, 7)));
    }

    #[test]
    fn sgr_bright_colors_use_upper_palette() {
        let mut emu = Emulator::new(10, 2, 0);
        emu.feed(b"\x1b[92mG\x1b[103mY");
        assert_eq!(emu.row_cells(0)[0].style.fg, Some(Color::Indexed(10)));
        assert_eq!(emu.row_cells(0)[1].style.bg, Some(Color::Indexed(11)));
    }

    #[test]
    fn sgr_inverse_and_overline_toggle() {
        let mut emu = Emulator::new(10, 2, 0);
        emu.feed(b"\x1b[7;53mX\x1b[27;55mY");
        assert!(emu.row_cells(0)[0].style.inverse);
        assert!(emu.row_cells(0)[0].style.overline);
        assert!(!emu.row_cells(0)[1].style.inverse);
        assert!(!emu.row_cells(0)[1].style.overline);
    }

    // ---- Erase & edit ----

    #[test]
    fn erase_line_modes() {
        let mut emu = Emulator::new(10, 2, 0);
        emu.feed(b"ABCDEFGHIJ\x1b[1;5H\x1b[K");
        assert_eq!(emu.row_text(0), "ABCD");
        emu.feed(b"\x1b[2;1HKLMNO\x1b[2;3H\x1b[1K");
        assert_eq!(emu.row_text(1), "   NO");
    }

    #[test]
    fn erase_display_below() {
        let mut emu = Emulator::new(5, 3, 0);
        emu.feed(b"AAAAA\r\nBBBBB\r\nCCCCC\x1b[2;3H\x1b[J");
        assert_eq!(emu.row_text(0), "AAAAA");
        assert_eq!(emu.row_text(1), "BB");
        assert_eq!(emu.row_text(2), "");
    }

    #[test]
    fn insert_and_delete_chars() {
        let mut emu = Emulator::new(10, 1, 0);
        emu.feed(b"ABCDE\x1b[1;2H\x1b[2@");
        assert_eq!(emu.row_text(0), "A  BCDE");
        emu.feed(b"\x1b[1;1H\x1b[3P");
        assert_eq!(emu.row_text(0), "BCDE");
    }

    #[test]
    fn insert_and_delete_lines() {
        let mut emu = Emulator::new(5, 4, 0);
        emu.feed(b"a\r\nb\r\nc\r\nd\x1b[2;1H\x1b[L");
        assert_eq!(emu.screen_text(), "a\n\nb\nc");
        emu.feed(b"\x1b[2;1H\x1b[M");
        assert_eq!(emu.screen_text(), "a\nb\nc\n");
    }

    #[test]
    fn scroll_region_bounds_scrolling() {
        let mut emu = Emulator::new(5, 4, 100);
        emu.feed(b"a\r\nb\r\nc\r\nd");
        emu.feed(b"\x1b[2;3r\x1b[2;1H\x1b[S");
        assert_eq!(emu.screen_text(), "a\nc\n\nd");
        // Region scrolls never feed scrollback.
        assert_eq!(emu.scrollback_len(), 0);
    }

    // ---- Wide characters ----

    #[test]
    fn wide_char_occupies_two_cells() {
        let mut emu = Emulator::new(10, 2, 0);
        emu.feed("你a".as_bytes());
        assert_eq!(emu.row_cells(0)[0].ch, '你');
        assert!(emu.row_cells(0)[1].is_continuation());
        assert_eq!(emu.row_cells(0)[2].ch, 'a');
        assert_eq!(emu.cursor(), (3, 0));
    }

    #[test]
    fn wide_char_wraps_from_last_column() {
        let mut emu = Emulator::new(4, 2, 0);
        emu.feed("abc你".as_bytes());
        assert_eq!(emu.row_text(0), "abc");
        assert_eq!(emu.row_cells(1)[0].ch, '你');
    }

    #[test]
    fn narrow_overwrite_orphans_continuation() {
        let mut emu = Emulator::new(10, 1, 0);
        emu.feed("你".as_bytes());
        emu.feed(b"\x1b[1;1Hx");
        assert_eq!(emu.row_text(0), "x");
    }

    // ---- Modes & title ----

    #[test]
    fn osc_sets_title() {
        let mut emu = Emulator::new(10, 2, 0);
        emu.feed(b"\x1b]2;hello title\x07");
        assert_eq!(emu.title(), "hello title");
    }

    #[test]
    fn autowrap_disabled_clamps() {
        let mut emu = Emulator::new(4, 2, 0);
        emu.feed(b"\x1b[?7labcdef");
        assert_eq!(emu.row_text(0), "abcf");
        assert_eq!(emu.cursor(), (3, 0));
    }

    #[test]
    fn full_reset_clears_everything() {
        let mut emu = Emulator::new(10, 2, 10);
        emu.feed(b"\x1b[31ma\r\nb\r\nc\x1b]2;t\x07");
        emu.feed(b"\x1bc");
        assert_eq!(emu.screen_text(), "\n");
        assert_eq!(emu.scrollback_len(), 0);
        assert_eq!(emu.title(), "");
        assert_eq!(emu.cursor(), (0, 0));
    }

    // ---- Resize ----

    #[test]
    fn resize_preserves_overlap() {
        let mut emu = Emulator::new(10, 4, 10);
        emu.feed(b"abcdefgh\r\nsecond");
        emu.resize(4, 2);
        assert_eq!(emu.cols(), 4);
        assert_eq!(emu.rows(), 2);
        assert_eq!(emu.row_text(0), "abcd");
        assert_eq!(emu.row_text(1), "seco");
        assert_invariants(&emu);
    }

    #[test]
    fn resize_keeps_scrollback() {
        let mut emu = Emulator::new(10, 2, 10);
        emu.feed(b"a\r\nb\r\nc");
        let before = emu.scrollback_len();
        emu.resize(20, 5);
        assert_eq!(emu.scrollback_len(), before);
    }
}
