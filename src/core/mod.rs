//! Terminal core
//!
//! Platform-independent buffer state. This module contains:
//! - The scrollback buffer: canonical lines, the derived virtual-line index,
//!   and the graphics-event list
//! - The blink cursor state machine
//! - Render run extraction for the presentation layer
//!
//! The core is deterministic: given the same sequence of writes and events it
//! always produces the same buffer state.

mod cursor;
mod render;
mod scrollback;

pub use cursor::{BlinkTimings, Cursor, CursorGlyph};
pub use render::{RenderData, Section};
pub use scrollback::{Gevent, Notice, Scrollback, VLine, DEFAULT_BG, DEFAULT_FG};
