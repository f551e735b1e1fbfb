//! wrapterm: the text-stream engine of a terminal emulator
//!
//! Turns the raw byte stream produced by a child shell into a structured,
//! word-wrapped, color-annotated scrollback buffer plus cursor state, while
//! recognizing a practical subset of ANSI/VT100 control sequences.
//!
//! - `recognizer`: escape-sequence recognition (pure, stateless)
//! - `core`: scrollback buffer, virtual-line index, blink cursor, render runs
//! - `terminal`: the engine tying recognizer and buffer together
//! - `shell`: PTY-backed shell transport (Unix)
//!
//! Window rendering, font metrics, and key-to-byte translation live outside
//! this crate; the outbound surface is the render data extractor and the
//! change notifications drained from [`terminal::Terminal::process`].

pub mod config;
pub mod core;
pub mod recognizer;
pub mod shell;
pub mod terminal;

pub use crate::core::{Notice, RenderData, Scrollback, Section};
pub use crate::recognizer::{recognize, EraseKind, TerminalEvent};
pub use crate::terminal::Terminal;
