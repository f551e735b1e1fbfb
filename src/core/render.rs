//! Render run extraction
//!
//! [`RenderData`] carries the drawable output of
//! [`Scrollback::render_sections`](super::Scrollback::render_sections): an
//! ordered list of contiguous same-color text runs, traversed line by line
//! so a presentation layer can draw without knowing about pixels.
//!
//! ```
//! # use wrapterm::Scrollback;
//! # let sb = Scrollback::new();
//! let mut rd = sb.render_sections(0, sb.line_count());
//! while rd.next_line() {
//!     while let Some(section) = rd.next_section() {
//!         // draw section.text in section.foreground on section.background
//!     }
//! }
//! ```
//!
//! The traversal is finite and not restartable; request a fresh extraction
//! after the buffer changes.

/// A same-color run of text within one virtual line.
///
/// A line is split into multiple sections wherever its colors change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Virtual row index of the line this run occurs on
    pub line: usize,
    /// Text content of the run
    pub text: String,
    /// Foreground palette index
    pub foreground: u8,
    /// Background palette index
    pub background: u8,
}

/// Two-level traversal over extracted sections.
#[derive(Debug)]
pub struct RenderData {
    sections: Vec<Section>,
    current_line: Option<usize>,
    cursor: usize,
}

impl RenderData {
    pub(crate) fn new(sections: Vec<Section>) -> Self {
        Self {
            sections,
            current_line: None,
            cursor: 0,
        }
    }

    /// Advance to the next line that has sections. Returns false when the
    /// traversal is exhausted.
    pub fn next_line(&mut self) -> bool {
        match self.current_line {
            None => {
                if self.sections.is_empty() {
                    return false;
                }
                self.current_line = Some(self.sections[0].line);
                true
            }
            Some(line) => {
                while self
                    .sections
                    .get(self.cursor)
                    .is_some_and(|s| s.line == line)
                {
                    self.cursor += 1;
                }
                match self.sections.get(self.cursor) {
                    Some(s) => {
                        self.current_line = Some(s.line);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// The next section on the current line, if any. Only meaningful after
    /// `next_line` returned true.
    pub fn next_section(&mut self) -> Option<&Section> {
        let line = self.current_line?;
        let section = self.sections.get(self.cursor)?;
        if section.line != line {
            return None;
        }
        self.cursor += 1;
        Some(&self.sections[self.cursor - 1])
    }

    /// Total number of sections across all lines.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// True when the extraction produced no sections at all.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(line: usize, text: &str) -> Section {
        Section {
            line,
            text: text.to_string(),
            foreground: 7,
            background: 0,
        }
    }

    fn drain(mut rd: RenderData) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        while rd.next_line() {
            while let Some(s) = rd.next_section() {
                out.push((s.line, s.text.clone()));
            }
        }
        out
    }

    #[test]
    fn empty_render_data_has_no_lines() {
        let mut rd = RenderData::new(Vec::new());
        assert!(rd.is_empty());
        assert!(!rd.next_line());
        assert!(rd.next_section().is_none());
    }

    #[test]
    fn single_line_single_section() {
        let rd = RenderData::new(vec![section(0, "hello")]);
        assert_eq!(drain(rd), vec![(0, "hello".to_string())]);
    }

    #[test]
    fn sections_group_by_line() {
        let rd = RenderData::new(vec![
            section(0, "a"),
            section(0, "b"),
            section(1, "c"),
            section(3, "d"),
        ]);
        assert_eq!(
            drain(rd),
            vec![
                (0, "a".to_string()),
                (0, "b".to_string()),
                (1, "c".to_string()),
                (3, "d".to_string()),
            ]
        );
    }

    #[test]
    fn next_section_stops_at_line_boundary() {
        let mut rd = RenderData::new(vec![section(0, "a"), section(1, "b")]);
        assert!(rd.next_line());
        assert!(rd.next_section().is_some());
        assert!(rd.next_section().is_none());
        assert!(rd.next_line());
        assert_eq!(rd.next_section().unwrap().text, "b");
        assert!(!rd.next_line());
    }
}
