//! Terminal engine
//!
//! [`Terminal`] owns the scrollback buffer, the blink cursor, and the window
//! title, and drives them from raw shell output. [`Terminal::process`] is the
//! single entry point for bytes decoded from the pty: it brackets the whole
//! chunk in one write transaction, routes recognized escape sequences, and
//! writes everything else as literal text.
//!
//! Cursor visibility sequences never reach the buffer; they belong to the
//! blink cursor and are routed to it here.

use std::time::Instant;

use tracing::trace;

use crate::core::{BlinkTimings, Cursor, CursorGlyph, Notice, RenderData, Scrollback};
use crate::recognizer::{recognize, TerminalEvent};

/// The text-stream engine: scrollback, cursor, and title under one roof.
pub struct Terminal {
    buffer: Scrollback,
    cursor: Cursor,
    title: String,
}

impl Terminal {
    /// Create an engine sized to a viewport of `rows` by `cols`.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_timings(rows, cols, BlinkTimings::default())
    }

    pub fn with_timings(rows: usize, cols: usize, timings: BlinkTimings) -> Self {
        let mut buffer = Scrollback::new();
        buffer.set_viewport(rows, cols);
        buffer.take_notices();

        Self {
            buffer,
            cursor: Cursor::new(timings, Instant::now()),
            title: String::new(),
        }
    }

    /// Feed a chunk of decoded shell output through the engine.
    ///
    /// Escape sequences and control characters are recognized and applied;
    /// every other character is written at the cursor. The chunk is applied
    /// as one write transaction, so the wrap index is recomputed once and the
    /// returned notices describe the net effect.
    pub fn process(&mut self, input: &str) -> Vec<Notice> {
        let now = Instant::now();
        let chars: Vec<char> = input.chars().collect();

        self.buffer.begin_write();
        let mut at = 0;
        while at < chars.len() {
            match recognize(&chars, at) {
                Some(recognized) => {
                    for event in recognized.events {
                        trace!(?event, "recognized");
                        self.route(event, now);
                    }
                    at = recognized.next;
                }
                None => {
                    self.buffer.write(chars[at]);
                    at += 1;
                }
            }
        }
        self.buffer.end_write();

        let notices = self.buffer.take_notices();
        for notice in &notices {
            match notice {
                Notice::CursorMoved { row, col } => self.cursor.move_to(*row, *col, now),
                Notice::TitleChanged(title) => self.title = title.clone(),
                _ => {}
            }
        }
        notices
    }

    /// Cursor visibility is the blink cursor's concern; everything else is
    /// the buffer's.
    fn route(&mut self, event: TerminalEvent, now: Instant) {
        match event {
            TerminalEvent::ShowCursor => self.cursor.show(now),
            TerminalEvent::HideCursor => self.cursor.hide(now, None),
            other => self.buffer.apply(other),
        }
    }

    /// Resize the viewport. Re-wraps the buffer and re-anchors the cursor.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Vec<Notice> {
        let now = Instant::now();
        self.buffer.set_viewport(rows, cols);

        let notices = self.buffer.take_notices();
        for notice in &notices {
            if let Notice::CursorMoved { row, col } = notice {
                self.cursor.move_to(*row, *col, now);
            }
        }
        notices
    }

    /// Advance the blink state machine. Returns true when the cursor cell
    /// needs repainting.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.cursor.tick(now)
    }

    /// Drawable runs for the virtual line range `[top, bottom)`.
    pub fn render_sections(&self, top: usize, bottom: usize) -> RenderData {
        self.buffer.render_sections(top, bottom)
    }

    /// The cursor cell to paint, if the cursor is currently drawn.
    pub fn cursor_glyph(&self) -> Option<CursorGlyph> {
        self.cursor.glyph(&self.buffer)
    }

    pub fn buffer(&self) -> &Scrollback {
        &self.buffer
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// The most recent OSC-set window title; empty until one arrives.
    pub fn title(&self) -> &str {
        &self.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_text_lands_in_the_buffer() {
        let mut term = Terminal::new(24, 80);
        let notices = term.process("hello\nworld");

        assert_eq!(term.buffer().line(0), "hello");
        assert_eq!(term.buffer().line(1), "world");
        assert!(notices.contains(&Notice::Updated));
        assert!(notices.contains(&Notice::CursorMoved { row: 1, col: 5 }));
    }

    #[test]
    fn sgr_red_text_produces_colored_sections() {
        let mut term = Terminal::new(24, 80);
        term.process("plain \x1b[31mred\x1b[0m done");

        assert_eq!(term.buffer().line(0), "plain red done");

        let mut rd = term.render_sections(0, 1);
        assert!(rd.next_line());

        let first = rd.next_section().unwrap();
        assert_eq!(first.text, "plain ");
        assert_eq!(first.foreground, 7);

        let second = rd.next_section().unwrap();
        assert_eq!(second.text, "red");
        assert_eq!(second.foreground, 1);

        let third = rd.next_section().unwrap();
        assert_eq!(third.text, " done");
        assert_eq!(third.foreground, 7);
    }

    #[test]
    fn carriage_return_overwrites_in_place() {
        let mut term = Terminal::new(24, 80);
        term.process("12345\rab");

        assert_eq!(term.buffer().line(0), "ab345");
        assert_eq!(term.buffer().cursor(), (0, 2));
    }

    #[test]
    fn osc_title_updates_the_engine() {
        let mut term = Terminal::new(24, 80);
        let notices = term.process("\x1b]0;my shell\x07text");

        assert_eq!(term.title(), "my shell");
        assert_eq!(term.buffer().line(0), "text");
        assert!(notices.contains(&Notice::TitleChanged("my shell".to_string())));
    }

    #[test]
    fn bell_is_surfaced_not_echoed() {
        let mut term = Terminal::new(24, 80);
        let notices = term.process("a\x07b");

        assert_eq!(term.buffer().line(0), "ab");
        assert!(notices.contains(&Notice::Bell));
    }

    #[test]
    fn malformed_sequences_are_swallowed() {
        let mut term = Terminal::new(24, 80);
        term.process("a\x1b[12;xb");

        // The bad CSI (terminated by 'x') is consumed without echo
        assert_eq!(term.buffer().line(0), "ab");
    }

    #[test]
    fn visibility_sequences_drive_the_cursor() {
        let mut term = Terminal::new(24, 80);
        assert!(term.cursor().is_drawn());

        term.process("\x1b[?25l");
        assert!(!term.cursor().is_drawn());
        assert!(term.cursor_glyph().is_none());

        term.process("\x1b[?25h");
        assert!(term.cursor().is_drawn());
    }

    #[test]
    fn cursor_mirrors_buffer_position() {
        let mut term = Terminal::new(24, 80);
        term.process("abc");

        assert_eq!(term.cursor().row(), 0);
        assert_eq!(term.cursor().col(), 3);

        term.process("\x1b[1G");
        assert_eq!(term.cursor().col(), 0);
    }

    #[test]
    fn resize_rewraps_and_moves_the_cursor() {
        let mut term = Terminal::new(24, 80);
        term.process("abcdefgh");

        let notices = term.resize(24, 4);
        assert_eq!(term.buffer().line_count(), 2);
        assert_eq!(term.buffer().line(1), "efgh");
        assert!(notices.contains(&Notice::CursorMoved { row: 1, col: 4 }));
        assert_eq!(term.cursor().row(), 1);
    }

    #[test]
    fn addressed_write_after_cross_wrap_delete() {
        let mut term = Terminal::new(24, 4);
        term.process("abcdefgh");

        // Delete across the wrap boundary, then write at an address on the
        // now-empty second row, all in one chunk
        term.process("\x1b[1;3H\x1b[6P\x1b[2;4Hx");

        assert_eq!(term.buffer().line(0), "abx");
        assert_eq!(term.buffer().line_count(), 1);
    }

    #[test]
    fn clear_screen_after_cross_wrap_delete() {
        let mut term = Terminal::new(24, 4);
        term.process("abcdefgh");

        // The erase replay reads the visible window right after the delete
        // shrank the canonical line
        term.process("\x1b[1;3H\x1b[6P\x1b[2J");

        assert_eq!(term.buffer().line(0), "ab");
        assert!(term.buffer().line_count() >= 2);
    }

    #[test]
    fn insert_then_addressed_write_in_one_chunk() {
        let mut term = Terminal::new(24, 4);
        term.process("abcdefgh");
        term.process("\x1b[1;3H\x1b[2@\x1b[2;1Hy");

        assert_eq!(term.buffer().line(0), "ab  ");
        assert_eq!(term.buffer().line(1), "cdyf");
        assert_eq!(term.buffer().line(2), "gh");
    }

    #[test]
    fn cursor_glyph_inverts_the_cell() {
        let mut term = Terminal::new(24, 80);
        term.process("hi\x1b[1G");

        let glyph = term.cursor_glyph().unwrap();
        assert_eq!(glyph.ch, 'h');
    }
}
