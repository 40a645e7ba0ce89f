//! Physical-to-logical line joining.
//!
//! A logical line continues while a string or bracket is open, or while a
//! physical line ends in a backslash.

use crate::lexer::is_name_char;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineScanner {
    quote: Option<(char, bool)>,
    depth: usize,
    continued: bool,
}

impl LineScanner {
    /// Feed one physical line; returns true when the logical line it
    /// belongs to is complete.
    pub fn feed(&mut self, line: &str) -> bool {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        self.continued = false;
        while i < chars.len() {
            let c = chars[i];
            if let Some((quote, triple)) = self.quote {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == quote {
                    if !triple {
                        self.quote = None;
                    } else if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote)
                    {
                        self.quote = None;
                        i += 2;
                    }
                }
                i += 1;
                continue;
            }
            match c {
                '#' => break,
                '\'' | '"' => {
                    let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                    self.quote = Some((c, triple));
                    if triple {
                        i += 2;
                    }
                }
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }

        // A single-quoted string cannot span lines; let the lexer report it.
        if matches!(self.quote, Some((_, false))) {
            self.quote = None;
        }
        if self.quote.is_none() {
            self.continued = strip_comment(line).trim_end().ends_with('\\');
        }
        self.is_clean()
    }

    pub fn is_clean(&self) -> bool {
        self.quote.is_none() && self.depth == 0 && !self.continued
    }

    pub fn reset(&mut self) {
        *self = LineScanner::default();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    pub text: String,
    pub line: usize,
    pub source: String,
}

/// Split source text into logical lines, dropping blank and comment-only
/// lines. A `#endif`-style comment is kept as its closing keyword.
pub fn split_logical_lines(text: &str, first_line: usize) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut scanner = LineScanner::default();
    let mut pending = String::new();
    let mut start = first_line;

    for (offset, physical) in text.lines().enumerate() {
        if pending.is_empty() {
            start = first_line + offset;
        } else {
            pending.push('\n');
        }
        pending.push_str(physical);
        if scanner.feed(physical) {
            push_logical(&mut out, std::mem::take(&mut pending), start);
        }
    }
    if !pending.trim().is_empty() {
        push_logical(&mut out, pending, start);
    }
    out
}

fn push_logical(out: &mut Vec<LogicalLine>, text: String, line: usize) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let source = text.lines().next().unwrap_or("").trim_end().to_string();
    if trimmed.starts_with('#') {
        if let Some(closer) = comment_closer(trimmed) {
            out.push(LogicalLine {
                text: closer,
                line,
                source,
            });
        }
        return;
    }
    out.push(LogicalLine {
        text: trimmed.to_string(),
        line,
        source,
    });
}

/// `#endif` and friends close blocks just like `endif`.
pub fn comment_closer(trimmed: &str) -> Option<String> {
    let rest = trimmed.strip_prefix("#end")?;
    let word = leading_word(rest);
    if matches!(word, "if" | "for" | "while" | "def" | "try") {
        Some(format!("end{}", word))
    } else {
        None
    }
}

pub fn leading_word(text: &str) -> &str {
    let end = text
        .char_indices()
        .find(|(_, c)| !is_name_char(*c))
        .map_or(text.len(), |(i, _)| i);
    &text[..end]
}

/// Text up to a `#` that is not inside a string.
pub fn strip_comment(text: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '#' => return &text[..i],
            _ => {}
        }
    }
    text
}

/// Byte offset of the first `:` outside brackets, strings and comments.
pub fn find_header_colon(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '#' => return None,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_brackets_and_strings() {
        let mut scanner = LineScanner::default();
        assert!(!scanner.feed("x = [1,"));
        assert!(scanner.feed(" 2]"));

        let mut scanner = LineScanner::default();
        assert!(!scanner.feed("s = '''start"));
        assert!(!scanner.feed("middle ( still string"));
        assert!(scanner.feed("end'''"));

        let mut scanner = LineScanner::default();
        assert!(!scanner.feed("y = 1 + \\"));
        assert!(scanner.feed("  2"));

        let mut scanner = LineScanner::default();
        assert!(scanner.feed("z = '(' # unbalanced ( in comment"));
    }

    #[test]
    fn test_split_logical_lines() {
        let text = "a = 1\n\n# note\nb = (2,\n     3)\n#endif\nc = 4";
        let lines = split_logical_lines(text, 10);
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a = 1", "b = (2,\n     3)", "endif", "c = 4"]);
        let numbers: Vec<_> = lines.iter().map(|l| l.line).collect();
        assert_eq!(numbers, vec![10, 13, 15, 16]);
        assert_eq!(lines[1].source, "b = (2,");
    }

    #[test]
    fn test_find_header_colon() {
        assert_eq!(find_header_colon("if x:"), Some(4));
        assert_eq!(find_header_colon("for k in {1: 2}: pass"), Some(15));
        assert_eq!(find_header_colon("if s == ':':"), Some(11));
        assert_eq!(find_header_colon("if x  # comment: no"), None);
    }

    #[test]
    fn test_strip_comment_respects_strings() {
        assert_eq!(strip_comment("x = '#' # real"), "x = '#' ");
        assert_eq!(strip_comment("no comment"), "no comment");
    }
}
