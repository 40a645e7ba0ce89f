use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (line {line})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub source_line: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
            source_line: String::new(),
        }
    }

    /// Attach the offending source text unless some is already recorded.
    pub fn with_source(mut self, source: &str) -> Self {
        if self.source_line.is_empty() {
            self.source_line = source.to_string();
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
