use crate::error::{ParseError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub col: usize,
}

// Longest first so that `**=` wins over `**` and `*`.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "**", "//", "==", "!=", "<=", ">=", "<<", ">>", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", "+", "-", "*", "/", "%", "<", ">", "=", "(", ")", "[",
    "]", "{", "}", ",", ":", ".", "~", "&", "|", "^", ";",
];

pub const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else",
    "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "not",
    "or", "pass", "raise", "return", "try", "while", "with", "yield", "endif", "endfor",
    "endwhile", "enddef", "endtry",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

pub fn is_name_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

pub fn is_name_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    text: &'a str,
}

/// Tokenize one logical line. Newlines inside brackets and escaped line
/// ends are whitespace; comments run to the end of their physical line.
pub fn tokenize(text: &str, line: usize) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        chars: text.chars().collect(),
        pos: 0,
        line,
        text,
    };
    lexer.run()
}

impl<'a> Lexer<'a> {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line).with_source(self.text.lines().next().unwrap_or(""))
    }

    fn run(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek(0) {
            let col = self.pos;
            match c {
                ' ' | '\t' | '\r' | '\n' | '\x0c' => self.pos += 1,
                '\\' => match self.peek(1) {
                    Some('\n') => self.pos += 2,
                    Some('\r') if self.peek(2) == Some('\n') => self.pos += 3,
                    None => self.pos += 1,
                    _ => return Err(self.error("unexpected character after line continuation")),
                },
                '#' => {
                    while let Some(c) = self.peek(0) {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                '\'' | '"' => {
                    let s = self.string(false)?;
                    tokens.push(Token { tok: Tok::Str(s), col });
                }
                'r' | 'R' | 'b' | 'B' | 'u' | 'U'
                    if matches!(self.peek(1), Some('\'') | Some('"')) =>
                {
                    let raw = matches!(c, 'r' | 'R');
                    self.pos += 1;
                    let s = self.string(raw)?;
                    tokens.push(Token { tok: Tok::Str(s), col });
                }
                c if c.is_ascii_digit() => {
                    let tok = self.number()?;
                    tokens.push(Token { tok, col });
                }
                '.' if self.peek(1).map_or(false, |c| c.is_ascii_digit()) => {
                    let tok = self.number()?;
                    tokens.push(Token { tok, col });
                }
                c if is_name_start(c) => {
                    let start = self.pos;
                    while self.peek(0).map_or(false, is_name_char) {
                        self.pos += 1;
                    }
                    let name: String = self.chars[start..self.pos].iter().collect();
                    tokens.push(Token {
                        tok: Tok::Name(name),
                        col,
                    });
                }
                _ => {
                    let op = OPERATORS.iter().find(|op| {
                        op.chars()
                            .enumerate()
                            .all(|(i, oc)| self.peek(i) == Some(oc))
                    });
                    match op {
                        Some(op) => {
                            self.pos += op.chars().count();
                            tokens.push(Token {
                                tok: Tok::Op(op),
                                col,
                            });
                        }
                        None => {
                            return Err(self.error(format!("invalid character '{}'", c)));
                        }
                    }
                }
            }
        }
        Ok(tokens)
    }

    fn string(&mut self, raw: bool) -> Result<String> {
        let quote = self.peek(0).unwrap_or('\'');
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut out = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(self.error("unterminated string literal"));
            };
            if c == quote {
                if !triple {
                    self.pos += 1;
                    return Ok(out);
                }
                if self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                    self.pos += 3;
                    return Ok(out);
                }
            }
            if c == '\n' && !triple {
                return Err(self.error("unterminated string literal"));
            }
            if c == '\\' {
                let next = self.peek(1);
                if raw {
                    out.push('\\');
                    if let Some(next) = next {
                        out.push(next);
                    }
                    self.pos += 2;
                    continue;
                }
                self.pos += 2;
                match next {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some('\n') => {}
                    Some('x') => {
                        let hex: String = (0..2).filter_map(|i| self.peek(i)).collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(ch) if hex.len() == 2 => {
                                out.push(ch);
                                self.pos += 2;
                            }
                            _ => return Err(self.error("invalid \\x escape")),
                        }
                    }
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => return Err(self.error("unterminated string literal")),
                }
                continue;
            }
            out.push(c);
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<Tok> {
        let start = self.pos;
        if self.peek(0) == Some('0') && matches!(self.peek(1), Some('x') | Some('X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek(0).map_or(false, |c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[digits_start..self.pos].iter().collect();
            return i64::from_str_radix(&digits, 16)
                .map(Tok::Int)
                .map_err(|_| self.error("invalid hexadecimal literal"));
        }

        let mut is_float = false;
        while self.peek(0).map_or(false, |c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek(0) == Some('.') && !self.peek(1).map_or(false, is_name_start) {
            is_float = true;
            self.pos += 1;
            while self.peek(0).map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), Some('e') | Some('E')) {
            let sign = usize::from(matches!(self.peek(1), Some('+') | Some('-')));
            if self.peek(1 + sign).map_or(false, |c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                while self.peek(0).map_or(false, |c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        if matches!(self.peek(0), Some('j') | Some('J')) {
            return Err(self.error("complex literals are not supported"));
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.error(format!("invalid number '{}'", text)))
        } else {
            match text.parse::<i64>() {
                Ok(n) => Ok(Tok::Int(n)),
                Err(_) => text
                    .parse::<f64>()
                    .map(Tok::Float)
                    .map_err(|_| self.error(format!("invalid number '{}'", text))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(text: &str) -> Vec<Tok> {
        tokenize(text, 1).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(toks("42"), vec![Tok::Int(42)]);
        assert_eq!(toks("3.5"), vec![Tok::Float(3.5)]);
        assert_eq!(toks(".5"), vec![Tok::Float(0.5)]);
        assert_eq!(toks("1e3"), vec![Tok::Float(1000.0)]);
        assert_eq!(toks("0x1f"), vec![Tok::Int(31)]);
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            toks("a **= 2"),
            vec![Tok::Name("a".into()), Tok::Op("**="), Tok::Int(2)]
        );
        assert_eq!(
            toks("x//y"),
            vec![Tok::Name("x".into()), Tok::Op("//"), Tok::Name("y".into())]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(toks(r#"'a\tb'"#), vec![Tok::Str("a\tb".into())]);
        assert_eq!(toks(r#"r'a\tb'"#), vec![Tok::Str("a\\tb".into())]);
        assert_eq!(
            toks("\"\"\"two\nlines\"\"\""),
            vec![Tok::Str("two\nlines".into())]
        );
    }

    #[test]
    fn test_comments_and_continuations() {
        assert_eq!(
            toks("x = 1 + \\\n 2  # trailing"),
            vec![
                Tok::Name("x".into()),
                Tok::Op("="),
                Tok::Int(1),
                Tok::Op("+"),
                Tok::Int(2)
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("'abc", 7).unwrap_err();
        assert_eq!(err.line, 7);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_invalid_character() {
        assert!(tokenize("x = $", 1).is_err());
    }
}
