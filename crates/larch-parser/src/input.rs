use crate::block::{classify, BlockKeyword, LineKind};
use crate::lines::{comment_closer, LineScanner};

pub const PRIMARY_PROMPT: &str = "larch> ";
pub const CONTINUATION_PROMPT: &str = ".....> ";

/// A dequeued chunk of source text ready for parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub text: String,
    pub filename: String,
    pub first_line: usize,
    pub complete: bool,
}

/// Accumulates source text, possibly a line at a time, and reports when
/// it forms a complete unit: no open string, bracket, continuation or
/// block, and at least one real statement.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    lines: Vec<String>,
    filename: String,
    first_line: usize,
    lineno: usize,
    scanner: LineScanner,
    logical: String,
    blocks: Vec<(BlockKeyword, usize)>,
    has_statement: bool,
}

impl Default for InputBuffer {
    fn default() -> Self {
        InputBuffer::new()
    }
}

impl InputBuffer {
    pub fn new() -> Self {
        InputBuffer {
            lines: Vec::new(),
            filename: "<stdin>".to_string(),
            first_line: 1,
            lineno: 0,
            scanner: LineScanner::default(),
            logical: String::new(),
            blocks: Vec::new(),
            has_statement: false,
        }
    }

    /// Queue text. `lineno` is the number of the line *before* `text`, so
    /// the first line of `text` becomes `lineno + 1`; `None` continues
    /// from the previous input.
    pub fn put(&mut self, text: &str, filename: Option<&str>, lineno: Option<usize>) {
        if let Some(filename) = filename {
            self.filename = filename.to_string();
        }
        if let Some(lineno) = lineno {
            self.lineno = lineno;
        }
        for physical in text.lines() {
            self.lineno += 1;
            if self.lines.is_empty() {
                self.first_line = self.lineno;
            }
            self.lines.push(physical.to_string());

            if !self.logical.is_empty() {
                self.logical.push('\n');
            }
            self.logical.push_str(physical);
            if self.scanner.feed(physical) {
                let logical = std::mem::take(&mut self.logical);
                self.track(&logical, self.lineno);
            }
        }
    }

    fn track(&mut self, text: &str, line: usize) {
        let trimmed = text.trim();
        if trimmed.is_empty() || (trimmed.starts_with('#') && comment_closer(trimmed).is_none())
        {
            return;
        }
        self.has_statement = true;
        match classify(trimmed) {
            LineKind::Open { keyword, rest, .. } => {
                self.blocks.push((keyword, line));
                if !rest.is_empty() {
                    self.track(rest, line);
                }
            }
            LineKind::Branch { rest, .. } => {
                if !rest.is_empty() {
                    self.track(rest, line);
                }
            }
            // A mismatched or stray closer still ends the innermost block so
            // the unit completes and the parser can report the mistake.
            LineKind::Close(_) => {
                self.blocks.pop();
            }
            LineKind::MissingColon(_) | LineKind::Simple => {}
        }
    }

    pub fn is_complete(&self) -> bool {
        self.has_statement && self.blocks.is_empty() && self.scanner.is_clean()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Only blank lines and comments are pending.
    pub fn is_blank(&self) -> bool {
        !self.has_statement && self.blocks.is_empty() && self.scanner.is_clean()
    }

    /// Blocks still waiting for their closing keyword, innermost last.
    pub fn open_blocks(&self) -> &[(BlockKeyword, usize)] {
        &self.blocks
    }

    pub fn next_prompt(&self) -> &'static str {
        if self.lines.is_empty() {
            PRIMARY_PROMPT
        } else {
            CONTINUATION_PROMPT
        }
    }

    /// Dequeue everything buffered so far.
    pub fn run(&mut self) -> Option<SourceUnit> {
        if self.lines.is_empty() {
            return None;
        }
        let complete = self.is_complete();
        let unit = SourceUnit {
            text: self.lines.join("\n"),
            filename: self.filename.clone(),
            first_line: self.first_line,
            complete,
        };
        self.reset_pending();
        Some(unit)
    }

    /// Drop any pending text, e.g. after a keyboard interrupt.
    pub fn clear(&mut self) {
        self.reset_pending();
    }

    fn reset_pending(&mut self) {
        self.lines.clear();
        self.logical.clear();
        self.scanner.reset();
        self.blocks.clear();
        self.has_statement = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_statement_is_complete() {
        let mut input = InputBuffer::new();
        input.put("x = 3", None, Some(0));
        assert!(input.is_complete());
        let unit = input.run().unwrap();
        assert_eq!(unit.text, "x = 3");
        assert_eq!(unit.first_line, 1);
        assert!(unit.complete);
        assert!(input.run().is_none());
    }

    #[test]
    fn test_block_needs_closer() {
        let mut input = InputBuffer::new();
        input.put("for i in range(3):", None, None);
        assert!(!input.is_complete());
        assert_eq!(input.next_prompt(), CONTINUATION_PROMPT);
        input.put("    print(i)", None, None);
        assert!(!input.is_complete());
        input.put("endfor", None, None);
        assert!(input.is_complete());
        assert_eq!(input.run().unwrap().text.lines().count(), 3);
        assert_eq!(input.next_prompt(), PRIMARY_PROMPT);
    }

    #[test]
    fn test_nested_inline_openers() {
        let mut input = InputBuffer::new();
        input.put("for i in x: if i: print(i)", None, None);
        assert_eq!(input.open_blocks().len(), 2);
        input.put("endif", None, None);
        assert!(!input.is_complete());
        input.put("#endfor", None, None);
        assert!(input.is_complete());
    }

    #[test]
    fn test_open_brackets_and_strings() {
        let mut input = InputBuffer::new();
        input.put("x = [1,", None, None);
        assert!(!input.is_complete());
        input.put("2]", None, None);
        assert!(input.is_complete());

        let mut input = InputBuffer::new();
        input.put("s = '''one", None, None);
        input.put("if x:", None, None);
        assert!(!input.is_complete());
        input.put("'''", None, None);
        assert!(input.is_complete());
    }

    #[test]
    fn test_blank_and_comment_lines_never_complete() {
        let mut input = InputBuffer::new();
        input.put("", None, None);
        input.put("# just a comment", None, None);
        assert!(!input.is_complete());
        assert!(input.is_blank());
        input.put("y = 1", None, None);
        assert!(input.is_complete());
        assert!(!input.is_blank());
        let unit = input.run().unwrap();
        assert_eq!(unit.first_line, 1);
    }

    #[test]
    fn test_stray_closer_completes() {
        let mut input = InputBuffer::new();
        input.put("endif", None, None);
        assert!(input.is_complete());
    }

    #[test]
    fn test_incomplete_run_reports_state() {
        let mut input = InputBuffer::new();
        input.put("if x:", Some("script.lar"), Some(9));
        let unit = input.run().unwrap();
        assert!(!unit.complete);
        assert_eq!(unit.filename, "script.lar");
        assert_eq!(unit.first_line, 10);
    }
}
