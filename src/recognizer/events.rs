//! Terminal events produced by the recognizer
//!
//! Each event is the decoded meaning of one control character or escape
//! sequence. Events carry canonical-agnostic arguments only; how they touch
//! the scrollback buffer is decided by the buffer itself.

use serde::{Deserialize, Serialize};

/// The six erase variants of CSI `J` (display) and CSI `K` (line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EraseKind {
    /// Erase the whole current line (CSI 2K)
    Line,
    /// Erase from the start of the line to the cursor (CSI 1K)
    LineBefore,
    /// Erase from the cursor to the end of the line (CSI 0K)
    LineAfter,
    /// Erase the whole visible screen (CSI 2J)
    Screen,
    /// Erase from the top of the screen to the cursor (CSI 1J)
    ScreenBefore,
    /// Erase from the cursor to the bottom of the screen (CSI 0J)
    ScreenAfter,
}

/// A decoded control character or escape sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalEvent {
    /// ASCII BEL
    Bell,
    /// ASCII BS
    Backspace,
    /// ASCII CR
    CarriageReturn,
    /// ASCII DEL: remove the character under the cursor
    Delete,
    /// ASCII FF: advance a line and snap the viewport to the bottom
    FormFeed,
    /// ASCII HT: advance the cursor to the next tab stop
    HorizontalTab,
    /// ASCII VT: treated as a line advance
    VerticalTab,

    /// Cursor-relative movement (CSI A/B/C/D). Positive rows move down.
    MoveBy { rows: i32, cols: i32 },
    /// Absolute cursor movement within the visible window (CSI G/H/f).
    /// A negative component leaves that axis unchanged.
    MoveTo { row: i32, col: i32 },
    /// CSI s
    SaveCursor,
    /// CSI u
    RestoreCursor,

    /// CSI J / CSI K
    Erase(EraseKind),
    /// CSI S (positive) / CSI T (negative), in visible-page units
    Scroll { pages: i32 },
    /// CSI @: insert blank characters at the cursor
    Insert(usize),
    /// CSI P: delete characters at the cursor
    DeleteChars(usize),

    /// CSI n. No write-back channel exists in this core, so the event is
    /// surfaced for logging only
    DeviceStatusReport,

    /// SGR 30-39 / 40-49: 8-color palette selection. `color` is 0-7 for the
    /// base palette or 9 for "return to default".
    SetColor {
        color: u8,
        bright: bool,
        foreground: bool,
    },
    /// SGR 38;5;N / 48;5;N: xterm-256 palette selection
    SetColor256 { index: u8, foreground: bool },
    /// SGR 0
    ResetColors,

    /// DEC private ?25h
    ShowCursor,
    /// DEC private ?25l
    HideCursor,

    /// OSC 0/1/2
    SetTitle(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_round_trip() {
        let ev = TerminalEvent::SetColor {
            color: 1,
            bright: true,
            foreground: true,
        };

        let json = serde_json::to_string(&ev).unwrap();
        let restored: TerminalEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(ev, restored);
    }
}
