//! Sequence scanning
//!
//! [`recognize`] looks at one position of a decoded character stream and
//! reports whether a control character or escape sequence begins there. It
//! holds no state between calls: everything it needs is in the slice.
//!
//! Grammar handled:
//! - a small set of single control characters (BEL, BS, HT, VT, FF, CR, DEL)
//! - CSI: `ESC '['`, parameter characters in `0x30-0x3F`, final in `0x40-0x7E`
//! - OSC: `ESC ']'`, numeric command id, `';'`, string payload, BEL or ST
//!
//! Line feed is deliberately absent: the scrollback buffer's write path owns
//! newline handling, so `\n` flows through as a literal character.
//!
//! Malformed sequences are consumed and logged, never echoed. If an embedded
//! escape introducer shows up where parameter or final bytes were expected,
//! the sub-parser bails without consuming so the other grammar gets a try.

use tracing::debug;

use super::events::{EraseKind, TerminalEvent};

const ESC: char = '\u{1b}';

/// Outcome of a successful recognition: the decoded events (possibly empty
/// for a malformed-but-consumed sequence) and the index of the first
/// character after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognized {
    pub events: Vec<TerminalEvent>,
    pub next: usize,
}

impl Recognized {
    fn one(event: TerminalEvent, next: usize) -> Self {
        Self {
            events: vec![event],
            next,
        }
    }

    fn none(next: usize) -> Self {
        Self {
            events: Vec::new(),
            next,
        }
    }
}

/// Try to recognize a control character or escape sequence starting at `at`.
///
/// Returns `None` when the character at `at` is an ordinary printable
/// character (including `\n`), letting the caller write it into the buffer.
pub fn recognize(input: &[char], at: usize) -> Option<Recognized> {
    let c = *input.get(at)?;

    let event = match c {
        '\u{07}' => TerminalEvent::Bell,
        '\u{08}' => TerminalEvent::Backspace,
        '\u{09}' => TerminalEvent::HorizontalTab,
        '\u{0b}' => TerminalEvent::VerticalTab,
        '\u{0c}' => TerminalEvent::FormFeed,
        '\r' => TerminalEvent::CarriageReturn,
        '\u{7f}' => TerminalEvent::Delete,
        ESC => return Some(recognize_escape(input, at)),
        _ => return None,
    };

    Some(Recognized::one(event, at + 1))
}

/// Recognize an escape sequence, falling back from CSI to OSC.
fn recognize_escape(input: &[char], at: usize) -> Recognized {
    if let Some(r) = try_csi(input, at) {
        return r;
    }
    if let Some(r) = try_osc(input, at) {
        return r;
    }

    // Neither grammar completed. Advance past the introducer so the caller
    // cannot get stuck, but never echo the escape itself.
    match input.get(at + 1) {
        Some('[') | Some(']') => {
            debug!(index = at, "dropping unrecognized escape introducer");
            Recognized::none(at + 2)
        }
        Some(c) => {
            debug!(index = at, following = %c, "dropping bare escape");
            Recognized::none(at + 1)
        }
        None => Recognized::none(at + 1),
    }
}

/// Parse a CSI sequence at `at`.
///
/// Returns `None` if the introducer is not `ESC [` or an embedded escape is
/// found where parameter/final bytes were expected.
fn try_csi(input: &[char], at: usize) -> Option<Recognized> {
    if input.get(at + 1) != Some(&'[') {
        return None;
    }

    let mut i = at + 2;
    let mut params: Vec<u32> = Vec::new();
    let mut current: u32 = 0;
    let mut has_digit = false;
    let mut private = false;

    loop {
        let c = match input.get(i) {
            Some(&c) => c,
            None => {
                debug!(index = at, "unterminated CSI sequence");
                return Some(Recognized::none(input.len()));
            }
        };

        match c {
            ESC => return None,
            '0'..='9' => {
                current = current
                    .saturating_mul(10)
                    .saturating_add(c as u32 - '0' as u32);
                has_digit = true;
            }
            ';' | ':' => {
                params.push(current);
                current = 0;
                has_digit = false;
            }
            '?' | '<' | '=' | '>' => {
                private = c == '?';
            }
            '\u{40}'..='\u{7e}' => {
                if has_digit || !params.is_empty() {
                    params.push(current);
                }
                return Some(dispatch_csi(at, &params, private, c, i + 1));
            }
            _ => {
                debug!(index = at, byte = %c, "malformed CSI parameter");
                return Some(Recognized::none(i + 1));
            }
        }
        i += 1;
    }
}

/// Map a complete CSI sequence to terminal events.
fn dispatch_csi(
    at: usize,
    params: &[u32],
    private: bool,
    final_byte: char,
    next: usize,
) -> Recognized {
    // Count-style parameters default to 1; an explicit 0 also means 1.
    let count = |idx: usize| -> i32 {
        params
            .get(idx)
            .copied()
            .filter(|&v| v > 0)
            .map(|v| v.min(i32::MAX as u32) as i32)
            .unwrap_or(1)
    };

    if private {
        let events = match (final_byte, params.first()) {
            ('h', Some(25)) => vec![TerminalEvent::ShowCursor],
            ('l', Some(25)) => vec![TerminalEvent::HideCursor],
            _ => {
                debug!(index = at, %final_byte, ?params, "unrecognized DEC private sequence");
                Vec::new()
            }
        };
        return Recognized { events, next };
    }

    let events = match final_byte {
        'A' => vec![TerminalEvent::MoveBy {
            rows: -count(0),
            cols: 0,
        }],
        'B' => vec![TerminalEvent::MoveBy {
            rows: count(0),
            cols: 0,
        }],
        'C' => vec![TerminalEvent::MoveBy {
            rows: 0,
            cols: count(0),
        }],
        'D' => vec![TerminalEvent::MoveBy {
            rows: 0,
            cols: -count(0),
        }],
        'E' => vec![
            TerminalEvent::MoveBy {
                rows: count(0),
                cols: 0,
            },
            TerminalEvent::CarriageReturn,
        ],
        'F' => vec![
            TerminalEvent::MoveBy {
                rows: -count(0),
                cols: 0,
            },
            TerminalEvent::CarriageReturn,
        ],
        'G' => vec![TerminalEvent::MoveTo {
            row: -1,
            col: (count(0) - 1).max(0),
        }],
        'H' | 'f' => vec![TerminalEvent::MoveTo {
            row: (count(0) - 1).max(0),
            col: (count(1) - 1).max(0),
        }],
        'J' => match params.first().copied().unwrap_or(0) {
            0 => vec![TerminalEvent::Erase(EraseKind::ScreenAfter)],
            1 => vec![TerminalEvent::Erase(EraseKind::ScreenBefore)],
            2 => vec![TerminalEvent::Erase(EraseKind::Screen)],
            other => {
                debug!(index = at, mode = other, "unrecognized erase-in-display mode");
                Vec::new()
            }
        },
        'K' => match params.first().copied().unwrap_or(0) {
            0 => vec![TerminalEvent::Erase(EraseKind::LineAfter)],
            1 => vec![TerminalEvent::Erase(EraseKind::LineBefore)],
            2 => vec![TerminalEvent::Erase(EraseKind::Line)],
            other => {
                debug!(index = at, mode = other, "unrecognized erase-in-line mode");
                Vec::new()
            }
        },
        'S' => vec![TerminalEvent::Scroll { pages: count(0) }],
        'T' => vec![TerminalEvent::Scroll { pages: -count(0) }],
        '@' => vec![TerminalEvent::Insert(count(0) as usize)],
        'P' => vec![TerminalEvent::DeleteChars(count(0) as usize)],
        's' => vec![TerminalEvent::SaveCursor],
        'u' => vec![TerminalEvent::RestoreCursor],
        'n' => vec![TerminalEvent::DeviceStatusReport],
        'm' => decode_sgr(params),
        other => {
            debug!(index = at, final_byte = %other, ?params, "unrecognized CSI final byte");
            Vec::new()
        }
    };

    Recognized { events, next }
}

/// Interpret a Select-Graphic-Rendition argument list.
///
/// `0` resets colors, `1` marks subsequent 8-color selections as bright,
/// `30-39`/`40-49` select 8-color fore/background, and `38;5;N`/`48;5;N`
/// select a 256-color palette index. Anything else is ignored.
fn decode_sgr(params: &[u32]) -> Vec<TerminalEvent> {
    if params.is_empty() {
        return vec![TerminalEvent::ResetColors];
    }

    let mut events = Vec::new();
    let mut bright = false;
    let mut i = 0;

    while i < params.len() {
        match params[i] {
            0 => events.push(TerminalEvent::ResetColors),
            1 => bright = true,
            38 | 48 if params.get(i + 1) == Some(&5) && i + 2 < params.len() => {
                events.push(TerminalEvent::SetColor256 {
                    index: params[i + 2].min(255) as u8,
                    foreground: params[i] == 38,
                });
                i += 2;
            }
            p @ 30..=39 if p != 38 => events.push(TerminalEvent::SetColor {
                color: (p - 30) as u8,
                bright,
                foreground: true,
            }),
            p @ 40..=49 if p != 48 => events.push(TerminalEvent::SetColor {
                color: (p - 40) as u8,
                bright,
                foreground: false,
            }),
            _ => {}
        }
        i += 1;
    }

    events
}

/// Parse an OSC sequence at `at`.
///
/// Returns `None` if the introducer is not `ESC ]` or an embedded escape
/// interrupts the payload without forming a string terminator.
fn try_osc(input: &[char], at: usize) -> Option<Recognized> {
    if input.get(at + 1) != Some(&']') {
        return None;
    }

    let mut i = at + 2;
    let mut command: u32 = 0;
    let mut has_command = false;

    while let Some(c) = input.get(i).filter(|c| c.is_ascii_digit()) {
        command = command
            .saturating_mul(10)
            .saturating_add(*c as u32 - '0' as u32);
        has_command = true;
        i += 1;
    }

    match input.get(i) {
        Some(';') => i += 1,
        Some(&ESC) => return None,
        Some(c) => {
            debug!(index = at, byte = %c, "malformed OSC command");
            return Some(Recognized::none(i + 1));
        }
        None => {
            debug!(index = at, "unterminated OSC sequence");
            return Some(Recognized::none(input.len()));
        }
    }

    let start = i;
    let (end, next) = loop {
        match input.get(i) {
            Some('\u{07}') => break (i, i + 1),
            Some(&ESC) => {
                if input.get(i + 1) == Some(&'\\') {
                    break (i, i + 2);
                }
                return None;
            }
            Some(_) => i += 1,
            None => {
                debug!(index = at, "unterminated OSC sequence");
                return Some(Recognized::none(input.len()));
            }
        }
    };

    let events = if has_command && command <= 2 {
        let payload: String = input[start..end].iter().collect();
        vec![TerminalEvent::SetTitle(payload)]
    } else {
        debug!(index = at, command, "unrecognized OSC command");
        Vec::new()
    };

    Some(Recognized { events, next })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn events(s: &str) -> Vec<TerminalEvent> {
        let input = chars(s);
        let r = recognize(&input, 0).expect("expected recognition");
        assert_eq!(r.next, input.len(), "sequence should be fully consumed");
        r.events
    }

    #[test]
    fn printable_is_not_recognized() {
        assert!(recognize(&chars("abc"), 0).is_none());
        assert!(recognize(&chars("x"), 0).is_none());
    }

    #[test]
    fn newline_flows_through_as_literal() {
        assert!(recognize(&chars("\n"), 0).is_none());
    }

    #[test]
    fn single_controls() {
        assert_eq!(events("\u{07}"), vec![TerminalEvent::Bell]);
        assert_eq!(events("\u{08}"), vec![TerminalEvent::Backspace]);
        assert_eq!(events("\t"), vec![TerminalEvent::HorizontalTab]);
        assert_eq!(events("\r"), vec![TerminalEvent::CarriageReturn]);
        assert_eq!(events("\u{0c}"), vec![TerminalEvent::FormFeed]);
        assert_eq!(events("\u{7f}"), vec![TerminalEvent::Delete]);
    }

    #[test]
    fn cursor_moves_default_to_one() {
        assert_eq!(
            events("\u{1b}[A"),
            vec![TerminalEvent::MoveBy { rows: -1, cols: 0 }]
        );
        assert_eq!(
            events("\u{1b}[3C"),
            vec![TerminalEvent::MoveBy { rows: 0, cols: 3 }]
        );
    }

    #[test]
    fn cursor_next_line_moves_and_returns() {
        assert_eq!(
            events("\u{1b}[2E"),
            vec![
                TerminalEvent::MoveBy { rows: 2, cols: 0 },
                TerminalEvent::CarriageReturn
            ]
        );
    }

    #[test]
    fn cursor_position_is_one_indexed_and_clamped() {
        assert_eq!(
            events("\u{1b}[10;20H"),
            vec![TerminalEvent::MoveTo { row: 9, col: 19 }]
        );
        // Defaults are 1;1, i.e. home
        assert_eq!(
            events("\u{1b}[H"),
            vec![TerminalEvent::MoveTo { row: 0, col: 0 }]
        );
        // Explicit zero behaves like 1
        assert_eq!(
            events("\u{1b}[0;0f"),
            vec![TerminalEvent::MoveTo { row: 0, col: 0 }]
        );
    }

    #[test]
    fn column_absolute_leaves_row_alone() {
        assert_eq!(
            events("\u{1b}[5G"),
            vec![TerminalEvent::MoveTo { row: -1, col: 4 }]
        );
    }

    #[test]
    fn erase_modes() {
        assert_eq!(
            events("\u{1b}[K"),
            vec![TerminalEvent::Erase(EraseKind::LineAfter)]
        );
        assert_eq!(
            events("\u{1b}[1K"),
            vec![TerminalEvent::Erase(EraseKind::LineBefore)]
        );
        assert_eq!(
            events("\u{1b}[2J"),
            vec![TerminalEvent::Erase(EraseKind::Screen)]
        );
        assert_eq!(
            events("\u{1b}[0J"),
            vec![TerminalEvent::Erase(EraseKind::ScreenAfter)]
        );
    }

    #[test]
    fn scroll_pages() {
        assert_eq!(events("\u{1b}[2S"), vec![TerminalEvent::Scroll { pages: 2 }]);
        assert_eq!(events("\u{1b}[T"), vec![TerminalEvent::Scroll { pages: -1 }]);
    }

    #[test]
    fn insert_delete_save_restore() {
        assert_eq!(events("\u{1b}[4@"), vec![TerminalEvent::Insert(4)]);
        assert_eq!(events("\u{1b}[2P"), vec![TerminalEvent::DeleteChars(2)]);
        assert_eq!(events("\u{1b}[s"), vec![TerminalEvent::SaveCursor]);
        assert_eq!(events("\u{1b}[u"), vec![TerminalEvent::RestoreCursor]);
        assert_eq!(events("\u{1b}[6n"), vec![TerminalEvent::DeviceStatusReport]);
    }

    #[test]
    fn sgr_simple_foreground() {
        assert_eq!(
            events("\u{1b}[31m"),
            vec![TerminalEvent::SetColor {
                color: 1,
                bright: false,
                foreground: true
            }]
        );
    }

    #[test]
    fn sgr_bright_applies_to_later_colors() {
        assert_eq!(
            events("\u{1b}[1;32m"),
            vec![TerminalEvent::SetColor {
                color: 2,
                bright: true,
                foreground: true
            }]
        );
    }

    #[test]
    fn sgr_reset_and_background() {
        assert_eq!(
            events("\u{1b}[0;44m"),
            vec![
                TerminalEvent::ResetColors,
                TerminalEvent::SetColor {
                    color: 4,
                    bright: false,
                    foreground: false
                }
            ]
        );
        assert_eq!(events("\u{1b}[m"), vec![TerminalEvent::ResetColors]);
    }

    #[test]
    fn sgr_256_color_triple() {
        assert_eq!(
            events("\u{1b}[38;5;196m"),
            vec![TerminalEvent::SetColor256 {
                index: 196,
                foreground: true
            }]
        );
        assert_eq!(
            events("\u{1b}[48;5;17m"),
            vec![TerminalEvent::SetColor256 {
                index: 17,
                foreground: false
            }]
        );
    }

    #[test]
    fn sgr_unknown_arguments_are_ignored() {
        assert_eq!(
            events("\u{1b}[4;31m"),
            vec![TerminalEvent::SetColor {
                color: 1,
                bright: false,
                foreground: true
            }]
        );
    }

    #[test]
    fn dec_cursor_visibility() {
        assert_eq!(events("\u{1b}[?25h"), vec![TerminalEvent::ShowCursor]);
        assert_eq!(events("\u{1b}[?25l"), vec![TerminalEvent::HideCursor]);
        assert_eq!(events("\u{1b}[?1049h"), vec![]);
    }

    #[test]
    fn osc_title_with_bel() {
        assert_eq!(
            events("\u{1b}]0;hello world\u{07}"),
            vec![TerminalEvent::SetTitle("hello world".to_string())]
        );
    }

    #[test]
    fn osc_title_with_st() {
        assert_eq!(
            events("\u{1b}]2;title\u{1b}\\"),
            vec![TerminalEvent::SetTitle("title".to_string())]
        );
    }

    #[test]
    fn osc_unknown_command_is_consumed_silently() {
        assert_eq!(events("\u{1b}]52;c;aGk=\u{07}"), vec![]);
    }

    #[test]
    fn unknown_csi_final_is_consumed() {
        let input = chars("\u{1b}[3zX");
        let r = recognize(&input, 0).unwrap();
        assert!(r.events.is_empty());
        assert_eq!(r.next, 4);
        // The following character is left for the caller
        assert!(recognize(&input, r.next).is_none());
    }

    #[test]
    fn unterminated_csi_consumes_remainder() {
        let input = chars("\u{1b}[12;3");
        let r = recognize(&input, 0).unwrap();
        assert!(r.events.is_empty());
        assert_eq!(r.next, input.len());
    }

    #[test]
    fn embedded_introducer_falls_back_without_sticking() {
        // An OSC introducer interrupts what looked like CSI parameters. The
        // recognizer must advance past the CSI introducer so the caller can
        // eventually re-enter at the embedded sequence.
        let input = chars("\u{1b}[12\u{1b}]0;t\u{07}");
        let r = recognize(&input, 0).unwrap();
        assert!(r.events.is_empty());
        assert_eq!(r.next, 2);

        let r2 = recognize(&input, 4).unwrap();
        assert_eq!(r2.events, vec![TerminalEvent::SetTitle("t".to_string())]);
    }

    #[test]
    fn recognition_is_position_independent() {
        let input = chars("ab\u{1b}[31mc");
        assert!(recognize(&input, 0).is_none());
        let r = recognize(&input, 2).unwrap();
        assert_eq!(r.next, 7);
        assert_eq!(r.events.len(), 1);
    }
}
