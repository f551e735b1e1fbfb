//! Escape sequence recognition
//!
//! Decides whether a control character or escape sequence begins at a given
//! position in a decoded character stream, and if so, which terminal events
//! it stands for. Recognition is a pure function of the input slice; all
//! interpretation happens in the scrollback buffer.

mod events;
mod scan;

pub use events::{EraseKind, TerminalEvent};
pub use scan::{recognize, Recognized};
