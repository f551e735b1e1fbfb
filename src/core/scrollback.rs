//! Scrollback buffer
//!
//! Owns the canonical lines received from the shell and a derived index of
//! virtual (word-wrapped) lines. Canonical lines are split only on newline;
//! virtual lines are what the presentation layer indexes by row.
//!
//! All mutation happens inside a `begin_write`/`end_write` bracket. The
//! virtual-line index is recomputed once per bracket (and on viewport width
//! changes); during the recompute the cursor is tracked by its canonical
//! coordinates so its identity survives arbitrary re-wrapping.
//!
//! Scrollback is unbounded: lines are appended for the life of the session
//! and never discarded. Screen-wide erase preserves that property by
//! scrolling a page and replaying the surviving part of the old screen
//! instead of deleting anything.

use tracing::debug;

use super::render::{RenderData, Section};
use crate::recognizer::{EraseKind, TerminalEvent};

/// Palette index drawn for text with no foreground gevent in effect.
pub const DEFAULT_FG: u8 = 7;
/// Palette index drawn behind text with no background gevent in effect.
pub const DEFAULT_BG: u8 = 0;

const TAB_WIDTH: usize = 8;

/// A virtual line: one screen row's worth of a canonical line.
///
/// The ordered list of these is rebuilt from scratch by [`Scrollback::wrap_lines`]
/// whenever the viewport width changes. vlines of a given canonical line are
/// contiguous, gapless, and in increasing `beg` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VLine {
    /// Index of the canonical line this slice belongs to
    pub line: usize,
    /// Offset into the canonical line where this slice begins
    pub beg: usize,
    /// Length of this slice
    pub len: usize,
}

/// A recorded color change, anchored to a canonical `(line, column)`.
///
/// The list of these is kept sorted by `(line, col)`; insertion scans
/// backward from the tail because new events land at or near the end of a
/// growing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gevent {
    /// Canonical line the change takes effect on
    pub line: usize,
    /// Column within the canonical line the change takes effect at
    pub col: usize,
    /// True for a foreground change, false for background
    pub foreground: bool,
    /// xterm-256 palette index
    pub color: u8,
}

/// Change notification raised during a write transaction, drained by the
/// presentation layer after `end_write`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Buffer contents changed; a redraw is in order
    Updated,
    /// The cursor landed on a new virtual row/column
    CursorMoved { row: usize, col: usize },
    /// The viewport should snap to the bottom of the buffer
    ScrollToBottom,
    /// ASCII BEL was received
    Bell,
    /// OSC 0/1/2 set a new window title
    TitleChanged(String),
}

/// The scrollback buffer.
pub struct Scrollback {
    /// Canonical lines, exactly as authored by the shell
    lines: Vec<Vec<char>>,
    /// Derived word-wrap index over `lines`
    vlines: Vec<VLine>,
    /// Color changes, sorted by canonical `(line, col)`
    gevents: Vec<Gevent>,
    /// Cursor row, indexing `vlines`
    cursor_vline: usize,
    /// Cursor column within the cursor's vline; `len` means "append here"
    cursor_col: usize,
    /// Saved canonical cursor position (CSI s / CSI u)
    saved_cursor: Option<(usize, usize)>,
    /// Viewport height in rows
    rows_visible: usize,
    /// Viewport width in columns; 0 means "not yet sized", i.e. no wrapping
    cols_visible: usize,
    /// Notifications raised since the last drain
    notices: Vec<Notice>,
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new()
    }
}

impl Scrollback {
    /// Create a buffer holding one empty canonical line and one empty vline.
    pub fn new() -> Self {
        Self {
            lines: vec![Vec::new()],
            vlines: vec![VLine {
                line: 0,
                beg: 0,
                len: 0,
            }],
            gevents: Vec::new(),
            cursor_vline: 0,
            cursor_col: 0,
            saved_cursor: None,
            rows_visible: 0,
            cols_visible: 0,
            notices: Vec::new(),
        }
    }

    /// Begin a write transaction. Pair with [`Scrollback::end_write`].
    ///
    /// Writes and events between the two calls are applied immediately to the
    /// canonical lines, but the vline index is only guaranteed consistent
    /// (and observers only notified) once the bracket closes.
    pub fn begin_write(&mut self) {}

    /// Close a write transaction: recompute the wrap index and notify.
    pub fn end_write(&mut self) {
        self.wrap_lines();
        self.notices.push(Notice::CursorMoved {
            row: self.cursor_vline,
            col: self.cursor_col,
        });
        self.notices.push(Notice::Updated);
    }

    /// Write one character at the cursor.
    ///
    /// Newline advances to the next canonical line, creating it when the
    /// cursor sits on the last one. Any other character overwrites the cell
    /// under the cursor if there is one (terminal type-over semantics), or
    /// appends a new cell otherwise.
    pub fn write(&mut self, c: char) {
        if c == '\n' {
            self.line_feed();
            return;
        }

        let v = self.vlines[self.cursor_vline];
        let abs = v.beg + self.cursor_col;

        if self.cursor_col < v.len {
            self.lines[v.line][abs] = c;
        } else {
            self.lines[v.line].insert(abs, c);
            self.vlines[self.cursor_vline].len += 1;
            self.resync_following_vlines(self.cursor_vline);
        }
        self.cursor_col += 1;
    }

    /// Advance the cursor to the next canonical line, creating it (plus an
    /// empty vline) when the cursor's line is the last one.
    pub fn line_feed(&mut self) {
        let v = self.vlines[self.cursor_vline];

        if v.line + 1 == self.lines.len() {
            self.lines.push(Vec::new());
            self.vlines.push(VLine {
                line: v.line + 1,
                beg: 0,
                len: 0,
            });
            self.cursor_vline = self.vlines.len() - 1;
        } else {
            let mut i = self.cursor_vline;
            while i < self.vlines.len() && self.vlines[i].line == v.line {
                i += 1;
            }
            self.cursor_vline = i.min(self.vlines.len() - 1);
        }
        self.cursor_col = 0;
    }

    /// Apply a recognized terminal event.
    ///
    /// Cursor visibility events are owned by the blink cursor and ignored
    /// here; the engine routes them before the buffer sees them.
    pub fn apply(&mut self, event: TerminalEvent) {
        match event {
            TerminalEvent::Bell => self.notices.push(Notice::Bell),
            TerminalEvent::Backspace => self.cursor_col = self.cursor_col.saturating_sub(1),
            TerminalEvent::CarriageReturn => self.cursor_col = 0,
            TerminalEvent::Delete => self.delete_chars(1),
            TerminalEvent::FormFeed => {
                self.line_feed();
                self.notices.push(Notice::ScrollToBottom);
            }
            TerminalEvent::HorizontalTab => self.horizontal_tab(),
            TerminalEvent::VerticalTab => self.line_feed(),
            TerminalEvent::MoveBy { rows, cols } => self.move_cursor_by(rows, cols),
            TerminalEvent::MoveTo { row, col } => self.move_cursor_to(row, col),
            TerminalEvent::SaveCursor => self.saved_cursor = Some(self.cursor_canonical()),
            TerminalEvent::RestoreCursor => {
                if let Some((line, col)) = self.saved_cursor {
                    self.seek_cursor(line, col);
                }
            }
            TerminalEvent::Erase(kind) => self.erase(kind),
            TerminalEvent::Scroll { pages } => self.scroll_pages(pages),
            TerminalEvent::Insert(n) => self.insert_blank(n),
            TerminalEvent::DeleteChars(n) => self.delete_chars(n),
            TerminalEvent::DeviceStatusReport => {
                debug!("device status report dropped; this core has no write-back channel");
            }
            TerminalEvent::SetColor {
                color,
                bright,
                foreground,
            } => self.set_color(color, bright, foreground),
            TerminalEvent::SetColor256 { index, foreground } => {
                self.set_color_256(index, foreground)
            }
            TerminalEvent::ResetColors => self.reset_colors(),
            TerminalEvent::ShowCursor | TerminalEvent::HideCursor => {}
            TerminalEvent::SetTitle(title) => self.notices.push(Notice::TitleChanged(title)),
        }
    }

    /// Insert `n` blank characters at the cursor, pushing the rest of the
    /// canonical line right. Later vlines of the same line keep their slices
    /// aligned by shifting their start offsets.
    pub fn insert_blank(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let v = self.vlines[self.cursor_vline];
        let abs = v.beg + self.cursor_col;

        self.lines[v.line].splice(abs..abs, std::iter::repeat(' ').take(n));
        self.vlines[self.cursor_vline].len += n;
        self.resync_following_vlines(self.cursor_vline);
    }

    /// Delete up to `n` characters at the cursor from the canonical line.
    pub fn delete_chars(&mut self, n: usize) {
        let v = self.vlines[self.cursor_vline];
        let abs = v.beg + self.cursor_col;
        let line = &mut self.lines[v.line];
        let count = n.min(line.len().saturating_sub(abs));
        if count == 0 {
            return;
        }

        line.drain(abs..abs + count);
        let within = count.min(v.len - self.cursor_col);
        self.vlines[self.cursor_vline].len -= within;
        self.resync_following_vlines(self.cursor_vline);
    }

    /// Advance the cursor to the next multiple-of-eight column, stepping over
    /// existing characters and padding with spaces past the end of the line.
    pub fn horizontal_tab(&mut self) {
        let v = self.vlines[self.cursor_vline];
        let stop = ((v.beg + self.cursor_col) / TAB_WIDTH + 1) * TAB_WIDTH;

        while self.vlines[self.cursor_vline].beg + self.cursor_col < stop {
            if self.cursor_col < self.vlines[self.cursor_vline].len {
                self.cursor_col += 1;
            } else {
                self.write(' ');
            }
        }
    }

    /// Erase a region. Line erase edits the canonical text directly; screen
    /// erase is non-destructive (see [`Scrollback::erase_screen`]).
    pub fn erase(&mut self, kind: EraseKind) {
        match kind {
            EraseKind::Line | EraseKind::LineBefore | EraseKind::LineAfter => {
                self.erase_line(kind)
            }
            EraseKind::Screen | EraseKind::ScreenBefore | EraseKind::ScreenAfter => {
                self.erase_screen(kind)
            }
        }
    }

    /// Direct erase edits only the last canonical line. A cursor anywhere
    /// else makes this a no-op, a limitation carried forward deliberately:
    /// generalizing it interacts unpredictably with wrap-driven scrollbar
    /// accounting.
    fn erase_line(&mut self, kind: EraseKind) {
        let v = self.vlines[self.cursor_vline];
        if v.line + 1 != self.lines.len() {
            debug!(line = v.line, "line erase away from the last canonical line is a no-op");
            return;
        }

        let abs = v.beg + self.cursor_col;
        match kind {
            EraseKind::Line => {
                self.lines[v.line].clear();
                self.rewrap_to(v.line, 0);
            }
            EraseKind::LineBefore => {
                self.lines[v.line].drain(..abs);
                self.rewrap_to(v.line, 0);
            }
            EraseKind::LineAfter => {
                self.lines[v.line].truncate(abs);
                self.rewrap_to(v.line, abs);
            }
            _ => {}
        }
    }

    /// Screen-wide erase without discarding history: scroll the viewport
    /// down by a full page, then replay the subset of the previously visible
    /// vlines that the erase type says should survive. Shell-issued "clear
    /// screen" therefore never loses scrollback.
    fn erase_screen(&mut self, kind: EraseKind) {
        let rows = self.rows_visible.max(1);
        let first = self.vlines.len().saturating_sub(rows);
        let window: Vec<Vec<char>> = self.vlines[first..]
            .iter()
            .map(|v| self.lines[v.line][v.beg..v.beg + v.len].to_vec())
            .collect();
        let cur_row = self
            .cursor_vline
            .saturating_sub(first)
            .min(window.len() - 1);
        let cur_col = self.cursor_col;

        self.scroll_pages(1);

        match kind {
            EraseKind::Screen => {
                // Everything blanked: the fresh page is the erased screen.
            }
            EraseKind::ScreenAfter => {
                // Content above the cursor and the prefix of its own line
                // survive; everything below stays blank.
                for row in window.iter().take(cur_row) {
                    for &ch in row {
                        self.write(ch);
                    }
                    self.line_feed();
                }
                for &ch in window[cur_row].iter().take(cur_col) {
                    self.write(ch);
                }
            }
            EraseKind::ScreenBefore => {
                // Lines above the cursor are blanked; the cursor line keeps
                // its tail, with spaces replayed up to the cursor column so
                // the column survives; lines below are replayed verbatim.
                for _ in 0..cur_row {
                    self.line_feed();
                }
                let keep_line = self.lines.len() - 1;
                for _ in 0..cur_col {
                    self.write(' ');
                }
                for &ch in window[cur_row].iter().skip(cur_col) {
                    self.write(ch);
                }
                for row in window.iter().skip(cur_row + 1) {
                    self.line_feed();
                    for &ch in row {
                        self.write(ch);
                    }
                }
                self.seek_cursor(keep_line, cur_col);
            }
            _ => {}
        }
    }

    /// Scroll by whole pages: each page appends one viewport's worth of
    /// newlines, pushing existing content up and off the visible area.
    ///
    /// Negative page counts (revealing history) are accepted but not
    /// implemented; the viewport's read window never moves backward here.
    pub fn scroll_pages(&mut self, pages: i32) {
        if pages <= 0 {
            debug!(pages, "ignoring non-positive scroll request");
            return;
        }

        self.cursor_vline = self.vlines.len() - 1;
        self.cursor_col = self.vlines[self.cursor_vline].len;

        let count = pages as usize * self.rows_visible.max(1);
        for _ in 0..count {
            self.line_feed();
        }
        self.notices.push(Notice::ScrollToBottom);
    }

    /// Record an 8-color selection at the cursor. `color` 0-7 picks from the
    /// base palette (offset by 8 when bright); 9 returns to the default.
    pub fn set_color(&mut self, color: u8, bright: bool, foreground: bool) {
        let index = match color {
            9 => {
                if foreground {
                    DEFAULT_FG
                } else {
                    DEFAULT_BG
                }
            }
            c => (c % 8) + if bright { 8 } else { 0 },
        };
        self.push_gevent(foreground, index);
    }

    /// Record an xterm-256 palette selection at the cursor.
    pub fn set_color_256(&mut self, index: u8, foreground: bool) {
        self.push_gevent(foreground, index);
    }

    /// Return both planes to the default palette entries.
    pub fn reset_colors(&mut self) {
        self.push_gevent(true, DEFAULT_FG);
        self.push_gevent(false, DEFAULT_BG);
    }

    /// Insert a gevent at the cursor's canonical position, keeping the list
    /// sorted by `(line, col)`. Scans backward from the tail; a same-plane
    /// event already anchored at this position is replaced in place.
    fn push_gevent(&mut self, foreground: bool, color: u8) {
        let (line, col) = self.cursor_canonical();

        let mut i = self.gevents.len();
        while i > 0 && (self.gevents[i - 1].line, self.gevents[i - 1].col) > (line, col) {
            i -= 1;
        }

        let mut j = i;
        while j > 0 && (self.gevents[j - 1].line, self.gevents[j - 1].col) == (line, col) {
            if self.gevents[j - 1].foreground == foreground {
                self.gevents[j - 1].color = color;
                return;
            }
            j -= 1;
        }

        self.gevents.insert(
            i,
            Gevent {
                line,
                col,
                foreground,
                color,
            },
        );
    }

    /// Move the cursor within the visible window. Row 0 is the top of the
    /// viewport, not the top of the buffer; a negative component leaves that
    /// axis unchanged. The result is clamped to valid vline/column ranges.
    pub fn move_cursor_to(&mut self, row: i32, col: i32) {
        if row >= 0 {
            let target = self.first_visible_vline() + row as usize;
            self.cursor_vline = target.min(self.vlines.len() - 1);
            self.cursor_col = self.cursor_col.min(self.vlines[self.cursor_vline].len);
        }
        if col >= 0 {
            self.cursor_col = (col as usize).min(self.vlines[self.cursor_vline].len);
        }
    }

    /// Move the cursor by a row/column delta, clamped to valid ranges.
    pub fn move_cursor_by(&mut self, rows: i32, cols: i32) {
        let row = self.cursor_vline as i64 + rows as i64;
        self.cursor_vline = row.clamp(0, self.vlines.len() as i64 - 1) as usize;

        let len = self.vlines[self.cursor_vline].len as i64;
        let col = self.cursor_col as i64 + cols as i64;
        self.cursor_col = col.clamp(0, len) as usize;
    }

    /// Must be called when the viewport is resized. Caches the visible row
    /// and column counts (needed by scrolling and screen erase) and re-wraps.
    pub fn set_viewport(&mut self, rows: usize, cols: usize) {
        self.rows_visible = rows;
        self.cols_visible = cols;
        self.wrap_lines();
        self.notices.push(Notice::CursorMoved {
            row: self.cursor_vline,
            col: self.cursor_col,
        });
        self.notices.push(Notice::Updated);
    }

    /// Rebuild the vline index from the canonical lines.
    ///
    /// The cursor is converted to canonical coordinates first and reassigned
    /// to whichever new vline covers that canonical column, so its identity
    /// survives the rebuild.
    pub fn wrap_lines(&mut self) {
        let (cline, ccol) = self.cursor_canonical();
        self.rewrap_to(cline, ccol);
    }

    fn rewrap_to(&mut self, cline: usize, ccol: usize) {
        let width = if self.cols_visible == 0 {
            usize::MAX
        } else {
            self.cols_visible
        };

        self.vlines.clear();
        let mut target = None;
        let mut cline_last = (0, 0);

        for (i, line) in self.lines.iter().enumerate() {
            let mut beg = 0;
            loop {
                let len = width.min(line.len() - beg);
                let is_last = beg + len == line.len();
                self.vlines.push(VLine { line: i, beg, len });

                if i == cline {
                    cline_last = (self.vlines.len() - 1, len);
                    let covers = ccol >= beg && (ccol < beg + len || (is_last && ccol <= beg + len));
                    if covers && target.is_none() {
                        target = Some((self.vlines.len() - 1, ccol - beg));
                    }
                }

                if is_last {
                    break;
                }
                beg += len;
            }
        }

        // A cursor whose character was deleted clamps to the end of its line.
        let (cv, cc) = target.unwrap_or(cline_last);
        self.cursor_vline = cv;
        self.cursor_col = cc;
    }

    /// The character at the given virtual row and column, or a space if the
    /// cell is empty or out of range. Used to draw the cell under the cursor.
    pub fn char_at(&self, row: usize, col: usize) -> char {
        let Some(v) = self.vlines.get(row) else {
            return ' ';
        };
        if col >= v.len {
            return ' ';
        }
        self.lines[v.line][v.beg + col]
    }

    /// The text of the given virtual line, empty if out of range.
    pub fn line(&self, index: usize) -> String {
        match self.vlines.get(index) {
            Some(v) => self.lines[v.line][v.beg..v.beg + v.len].iter().collect(),
            None => String::new(),
        }
    }

    /// The virtual lines intersecting a pixel-space viewport span.
    pub fn visible_lines(&self, y_top: usize, y_bottom: usize, line_height: usize) -> Vec<String> {
        if line_height == 0 {
            return Vec::new();
        }
        let min = y_top / line_height;
        let max = y_bottom / line_height;

        (min..max.min(self.vlines.len()))
            .map(|i| self.line(i))
            .collect()
    }

    /// Number of virtual lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.vlines.len()
    }

    /// Cursor position as `(virtual row, column)`.
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_vline, self.cursor_col)
    }

    /// Viewport size as `(rows, cols)`.
    pub fn viewport(&self) -> (usize, usize) {
        (self.rows_visible, self.cols_visible)
    }

    /// The wrap index. Exact only between write transactions.
    pub fn vlines(&self) -> &[VLine] {
        &self.vlines
    }

    /// The recorded color changes, sorted by `(line, col)`.
    pub fn gevents(&self) -> &[Gevent] {
        &self.gevents
    }

    /// Drain the notifications raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Extract drawable runs for the virtual line range `[top, bottom)`.
    ///
    /// Walks the canonical text and the gevent list together, splitting each
    /// vline wherever a color change falls inside its span. The result is a
    /// finite traversal; request a fresh one after any buffer mutation.
    pub fn render_sections(&self, top: usize, bottom: usize) -> RenderData {
        let bottom = bottom.min(self.vlines.len());
        if top >= bottom {
            return RenderData::new(Vec::new());
        }

        let mut fg = DEFAULT_FG;
        let mut bg = DEFAULT_BG;
        let mut gi = 0;

        // Colors in effect at the first visible character
        let start = (self.vlines[top].line, self.vlines[top].beg);
        while let Some(g) = self.gevents.get(gi) {
            if (g.line, g.col) >= start {
                break;
            }
            if g.foreground {
                fg = g.color;
            } else {
                bg = g.color;
            }
            gi += 1;
        }

        let mut sections = Vec::new();
        for (offset, v) in self.vlines[top..bottom].iter().enumerate() {
            let row = top + offset;
            let line = &self.lines[v.line];
            let end = v.beg + v.len;
            let mut seg = v.beg;

            // Events anchored between vlines only update the active colors
            while let Some(g) = self.gevents.get(gi) {
                if (g.line, g.col) >= (v.line, v.beg) {
                    break;
                }
                if g.foreground {
                    fg = g.color;
                } else {
                    bg = g.color;
                }
                gi += 1;
            }

            while let Some(g) = self.gevents.get(gi).copied() {
                if g.line != v.line || g.col >= end {
                    break;
                }
                if g.col > seg {
                    sections.push(Section {
                        line: row,
                        text: line[seg..g.col].iter().collect(),
                        foreground: fg,
                        background: bg,
                    });
                    seg = g.col;
                }
                if g.foreground {
                    fg = g.color;
                } else {
                    bg = g.color;
                }
                gi += 1;
            }

            sections.push(Section {
                line: row,
                text: line[seg..end].iter().collect(),
                foreground: fg,
                background: bg,
            });
        }

        RenderData::new(sections)
    }

    /// Index of the vline at the top of the visible window. The window is
    /// the last `rows_visible` vlines of the buffer.
    fn first_visible_vline(&self) -> usize {
        self.vlines.len().saturating_sub(self.rows_visible.max(1))
    }

    /// Cursor position in canonical coordinates: `(line, absolute column)`.
    fn cursor_canonical(&self) -> (usize, usize) {
        let v = self.vlines[self.cursor_vline];
        (v.line, v.beg + self.cursor_col)
    }

    /// Place the cursor at a canonical position, clamped to valid ranges.
    fn seek_cursor(&mut self, cline: usize, ccol: usize) {
        let cline = cline.min(self.lines.len() - 1);
        let ccol = ccol.min(self.lines[cline].len());

        for (i, v) in self.vlines.iter().enumerate() {
            if v.line != cline || ccol < v.beg || ccol > v.beg + v.len {
                continue;
            }
            let is_last = v.beg + v.len == self.lines[cline].len();
            if ccol < v.beg + v.len || is_last {
                self.cursor_vline = i;
                self.cursor_col = ccol - v.beg;
                return;
            }
        }
    }

    /// Re-chain the vlines after `from` that belong to the same canonical
    /// line, keeping the wrap index consistent after an in-line insert or
    /// delete without a full re-wrap. Each following slice starts where the
    /// previous one ends, and `beg + len` is clamped to the line's current
    /// length so a delete that spans a wrap boundary cannot leave a slice
    /// claiming cells the line no longer has.
    fn resync_following_vlines(&mut self, from: usize) {
        let cline = self.vlines[from].line;
        let line_len = self.lines[cline].len();
        let mut end = self.vlines[from].beg + self.vlines[from].len;

        for v in self.vlines[from + 1..].iter_mut() {
            if v.line != cline {
                break;
            }
            v.beg = end.min(line_len);
            v.len = v.len.min(line_len - v.beg);
            end = v.beg + v.len;
        }
    }
}
