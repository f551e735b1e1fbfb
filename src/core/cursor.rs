//! Blink cursor state machine
//!
//! The cursor alternates between a drawn and an undrawn phase on a timer the
//! caller owns: [`Cursor::next_deadline`] says when the next transition is
//! due and [`Cursor::tick`] performs it. There is no background thread; the
//! embedding event loop arms a single-shot timer for the deadline and calls
//! `tick` when it fires.
//!
//! Any cursor movement forces the drawn phase and pushes the next transition
//! out by the pause interval, so the cursor never blinks away mid-edit.

use std::time::{Duration, Instant};

use super::scrollback::{Scrollback, DEFAULT_BG, DEFAULT_FG};

/// How long each blink phase lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkTimings {
    /// Drawn phase duration
    pub on: Duration,
    /// Undrawn phase duration
    pub off: Duration,
    /// Hold time after a movement before blinking resumes
    pub pause: Duration,
}

impl Default for BlinkTimings {
    fn default() -> Self {
        Self {
            on: Duration::from_millis(600),
            off: Duration::from_millis(400),
            pause: Duration::from_millis(800),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    On,
    Off,
    Hidden,
}

/// What to draw for the cursor cell: the character under it with the
/// foreground and background palette indices swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorGlyph {
    pub ch: char,
    pub foreground: u8,
    pub background: u8,
}

/// Blinking cursor position and phase.
#[derive(Debug, Clone)]
pub struct Cursor {
    row: usize,
    col: usize,
    phase: Phase,
    timings: BlinkTimings,
    deadline: Option<Instant>,
}

impl Cursor {
    pub fn new(timings: BlinkTimings, now: Instant) -> Self {
        Self {
            row: 0,
            col: 0,
            phase: Phase::On,
            timings,
            deadline: Some(now + timings.on),
        }
    }

    /// Virtual row the cursor sits on.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Column within the row.
    pub fn col(&self) -> usize {
        self.col
    }

    /// True while the cursor should be painted.
    pub fn is_drawn(&self) -> bool {
        self.phase == Phase::On
    }

    /// When the next phase transition is due, if one is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Advance the state machine if a deadline has passed. Returns true when
    /// the drawn state changed and the cursor cell needs repainting.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        match self.phase {
            Phase::On => {
                self.phase = Phase::Off;
                self.deadline = Some(now + self.timings.off);
                true
            }
            Phase::Off => {
                self.phase = Phase::On;
                self.deadline = Some(now + self.timings.on);
                true
            }
            // A hide with a duration expires back into the drawn phase.
            Phase::Hidden => {
                self.phase = Phase::On;
                self.deadline = Some(now + self.timings.on);
                true
            }
        }
    }

    /// Move the cursor. Forces the drawn phase and holds it for the pause
    /// interval, unless the cursor is hidden.
    pub fn move_to(&mut self, row: usize, col: usize, now: Instant) {
        self.row = row;
        self.col = col;
        if self.phase != Phase::Hidden {
            self.phase = Phase::On;
            self.deadline = Some(now + self.timings.pause);
        }
    }

    /// Stop drawing the cursor. With a duration the cursor reappears on its
    /// own once the duration elapses; without one it stays hidden until
    /// [`show`](Self::show).
    pub fn hide(&mut self, now: Instant, duration: Option<Duration>) {
        self.phase = Phase::Hidden;
        self.deadline = duration.map(|d| now + d);
    }

    /// Resume drawing and blinking.
    pub fn show(&mut self, now: Instant) {
        self.phase = Phase::On;
        self.deadline = Some(now + self.timings.on);
    }

    /// The cell to paint for the cursor, or None while it is not drawn.
    /// The glyph inverts the default colors so the cursor reads as a block.
    pub fn glyph(&self, buffer: &Scrollback) -> Option<CursorGlyph> {
        if !self.is_drawn() {
            return None;
        }
        Some(CursorGlyph {
            ch: buffer.char_at(self.row, self.col),
            foreground: DEFAULT_BG,
            background: DEFAULT_FG,
        })
    }
}
