use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub source: String,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File {}, line {}", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackFrame {
    pub procedure: String,
    pub file: String,
    pub line: usize,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in procedure {}() defined in {}, line {}",
            self.procedure, self.file, self.line
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LarchError {
    #[error("{message}")]
    Syntax { message: String },

    #[error("{message}")]
    Name { message: String },

    #[error("{message}")]
    Lookup { message: String },

    #[error("{message}")]
    Attribute { message: String },

    #[error("{message}")]
    Type { message: String },

    #[error("{message}")]
    Argument { message: String },

    #[error("{message}")]
    Value { message: String },

    #[error("{message}")]
    Index { message: String },

    #[error("{key}")]
    Key { key: String },

    #[error("{message}")]
    ZeroDivision { message: String },

    #[error("{message}")]
    Assertion { message: String },

    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("{message}")]
    Import { message: String },

    #[error("a group named '{name}' already exists")]
    NameCollision { name: String },

    #[error("{message}")]
    Runtime { message: String },

    #[error("interrupted")]
    Interrupted,

    #[error("{error}")]
    Located {
        error: Box<LarchError>,
        location: SourceLocation,
        stack: Vec<StackFrame>,
        causes: Vec<String>,
    },
}

impl LarchError {
    pub fn syntax(message: impl Into<String>) -> Self {
        LarchError::Syntax {
            message: message.into(),
        }
    }

    pub fn undefined(name: &str) -> Self {
        LarchError::Name {
            message: format!("name '{}' is not defined", name),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        LarchError::Type {
            message: message.into(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        LarchError::Argument {
            message: message.into(),
        }
    }

    pub fn value(message: impl Into<String>) -> Self {
        LarchError::Value {
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        LarchError::Runtime {
            message: message.into(),
        }
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        LarchError::Lookup {
            message: message.into(),
        }
    }

    pub fn attribute(message: impl Into<String>) -> Self {
        LarchError::Attribute {
            message: message.into(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        LarchError::Index {
            message: message.into(),
        }
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        LarchError::ZeroDivision {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<String>, err: impl fmt::Display) -> Self {
        LarchError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Build an error from a kind name as written in `raise Kind(msg)`.
    /// Unknown kinds become runtime errors carrying the kind in the text.
    pub fn from_kind(kind: &str, message: String) -> Self {
        match kind {
            "SyntaxError" => LarchError::Syntax { message },
            "NameError" => LarchError::Name { message },
            "LookupError" => LarchError::Lookup { message },
            "AttributeError" => LarchError::Attribute { message },
            "TypeError" => LarchError::Type { message },
            "ArgumentError" => LarchError::Argument { message },
            "ValueError" => LarchError::Value { message },
            "IndexError" => LarchError::Index { message },
            "KeyError" => LarchError::Key { key: message },
            "ZeroDivisionError" => LarchError::ZeroDivision { message },
            "AssertionError" => LarchError::Assertion { message },
            "IOError" | "OSError" => LarchError::Io {
                path: String::new(),
                message,
            },
            "ImportError" => LarchError::Import { message },
            "RuntimeError" | "Exception" => LarchError::Runtime { message },
            other => LarchError::Runtime {
                message: format!("{}: {}", other, message),
            },
        }
    }

    /// The error with any location wrapper removed.
    pub fn inner(&self) -> &LarchError {
        match self {
            LarchError::Located { error, .. } => error.inner(),
            other => other,
        }
    }

    pub fn into_inner(self) -> LarchError {
        match self {
            LarchError::Located { error, .. } => error.into_inner(),
            other => other,
        }
    }

    /// Kind name as matched by `except` clauses.
    pub fn kind(&self) -> &'static str {
        match self.inner() {
            LarchError::Syntax { .. } => "SyntaxError",
            LarchError::Name { .. } => "NameError",
            LarchError::Lookup { .. } => "LookupError",
            LarchError::Attribute { .. } => "AttributeError",
            LarchError::Type { .. } => "TypeError",
            LarchError::Argument { .. } => "ArgumentError",
            LarchError::Value { .. } => "ValueError",
            LarchError::Index { .. } => "IndexError",
            LarchError::Key { .. } => "KeyError",
            LarchError::ZeroDivision { .. } => "ZeroDivisionError",
            LarchError::Assertion { .. } => "AssertionError",
            LarchError::Io { .. } => "IOError",
            LarchError::Import { .. } => "ImportError",
            LarchError::NameCollision { .. } => "NameCollisionError",
            LarchError::Runtime { .. } => "RuntimeError",
            LarchError::Interrupted => "KeyboardInterrupt",
            LarchError::Located { .. } => "RuntimeError",
        }
    }

    /// Whether an `except` clause naming `name` handles this error.
    pub fn matches_kind(&self, name: &str) -> bool {
        let kind = self.kind();
        if kind == name || name == "Exception" {
            return true;
        }
        matches!(
            (name, kind),
            ("LookupError", "NameError")
                | ("LookupError", "IndexError")
                | ("LookupError", "KeyError")
                | ("ValueError", "NameCollisionError")
                | ("TypeError", "ArgumentError")
                | ("ArithmeticError", "ZeroDivisionError")
                | ("OSError", "IOError")
        )
    }

    /// Cancellation is never handled by `try`.
    pub fn is_catchable(&self) -> bool {
        !matches!(self.inner(), LarchError::Interrupted)
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            LarchError::Located { location, .. } => Some(location),
            _ => None,
        }
    }

    pub fn stack(&self) -> &[StackFrame] {
        match self {
            LarchError::Located { stack, .. } => stack,
            _ => &[],
        }
    }

    /// Host functions the error passed through, innermost first.
    pub fn causes(&self) -> &[String] {
        match self {
            LarchError::Located { causes, .. } => causes,
            _ => &[],
        }
    }

    /// Attach the location of the innermost failing statement. Errors that
    /// already carry a location keep it.
    pub fn with_location(self, location: SourceLocation) -> Self {
        match self {
            LarchError::Located {
                error,
                location: existing,
                stack,
                causes,
            } if existing.line == 0 && existing.file.is_empty() => LarchError::Located {
                error,
                location,
                stack,
                causes,
            },
            located @ LarchError::Located { .. } => located,
            error => LarchError::Located {
                error: Box::new(error),
                location,
                stack: Vec::new(),
                causes: Vec::new(),
            },
        }
    }

    /// Record that the error was raised while calling host function `name`.
    pub fn with_cause(self, name: &str) -> Self {
        let cause = format!("{}()", name);
        match self {
            LarchError::Located {
                error,
                location,
                stack,
                mut causes,
            } => {
                causes.push(cause);
                LarchError::Located {
                    error,
                    location,
                    stack,
                    causes,
                }
            }
            error => LarchError::Located {
                error: Box::new(error),
                location: SourceLocation::default(),
                stack: Vec::new(),
                causes: vec![cause],
            },
        }
    }

    pub fn with_stack_frame(self, frame: StackFrame) -> Self {
        match self {
            LarchError::Located {
                error,
                location,
                mut stack,
                causes,
            } => {
                let location = if location.line == 0 && location.file.is_empty() {
                    SourceLocation {
                        file: frame.file.clone(),
                        line: frame.line,
                        source: String::new(),
                    }
                } else {
                    location
                };
                stack.push(frame);
                LarchError::Located {
                    error,
                    location,
                    stack,
                    causes,
                }
            }
            error => LarchError::Located {
                error: Box::new(error),
                location: SourceLocation {
                    file: frame.file.clone(),
                    line: frame.line,
                    source: String::new(),
                },
                stack: vec![frame],
                causes: Vec::new(),
            },
        }
    }

    /// Flatten into the record kept in the interpreter's error list.
    pub fn to_record(&self) -> ErrorRecord {
        let location = self.location();
        ErrorRecord {
            kind: self.kind().to_string(),
            message: self.inner().to_string(),
            filename: location.map(|l| l.file.clone()).unwrap_or_default(),
            lineno: location.map(|l| l.line).unwrap_or(0),
            source_line: location.map(|l| l.source.clone()).unwrap_or_default(),
            stack: self.stack().to_vec(),
            causes: self.causes().to_vec(),
        }
    }
}

/// One reported failure: what went wrong and where.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub kind: String,
    pub message: String,
    pub filename: String,
    pub lineno: usize,
    pub source_line: String,
    pub stack: Vec<StackFrame>,
    /// Host functions the error was raised through, innermost first.
    pub causes: Vec<String>,
}

impl ErrorRecord {
    /// Multi-line text in the classic traceback layout.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.filename.is_empty() || self.lineno > 0 {
            out.push_str(&format!("   File {}, line {}\n", self.filename, self.lineno));
        }
        if !self.source_line.trim().is_empty() {
            out.push_str(&format!("     {}\n", self.source_line.trim()));
        }
        for frame in &self.stack {
            out.push_str(&format!("   {}\n", frame));
        }
        for cause in &self.causes {
            out.push_str(&format!("   raised in {}\n", cause));
        }
        out.push_str(&format!("{}: {}", self.kind, self.message));
        out
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"kind\": {:?}}}", self.kind))
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<larch_parser::ParseError> for LarchError {
    fn from(err: larch_parser::ParseError) -> Self {
        LarchError::Syntax {
            message: err.message,
        }
    }
}

pub type Result<T> = std::result::Result<T, LarchError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn location(line: usize) -> SourceLocation {
        SourceLocation {
            file: "<stdin>".into(),
            line,
            source: "x = 1/0".into(),
        }
    }

    #[test]
    fn test_kind_and_matching() {
        let err = LarchError::zero_division("division by zero");
        assert_eq!(err.kind(), "ZeroDivisionError");
        assert!(err.matches_kind("ZeroDivisionError"));
        assert!(err.matches_kind("Exception"));
        assert!(!err.matches_kind("NameError"));

        let err = LarchError::undefined("q");
        assert!(err.matches_kind("LookupError"));
        assert_eq!(err.to_string(), "name 'q' is not defined");
    }

    #[test]
    fn test_interrupt_is_not_catchable() {
        assert!(!LarchError::Interrupted.is_catchable());
        let located = LarchError::Interrupted.with_location(location(1));
        assert!(!located.is_catchable());
        assert!(LarchError::runtime("x").is_catchable());
    }

    #[test]
    fn test_innermost_location_wins() {
        let err = LarchError::zero_division("division by zero")
            .with_location(location(3))
            .with_location(location(9));
        assert_eq!(err.location().map(|l| l.line), Some(3));
        assert_eq!(err.kind(), "ZeroDivisionError");
    }

    #[test]
    fn test_record_and_render() {
        let err = LarchError::zero_division("division by zero")
            .with_location(location(2))
            .with_stack_frame(StackFrame {
                procedure: "f".into(),
                file: "lib.lar".into(),
                line: 1,
            });
        let record = err.to_record();
        assert_eq!(record.lineno, 2);
        assert_eq!(record.stack.len(), 1);
        let text = record.render();
        assert!(text.contains("File <stdin>, line 2"));
        assert!(text.contains("in procedure f()"));
        assert!(text.ends_with("ZeroDivisionError: division by zero"));
        assert!(record.to_json().contains("\"lineno\":2"));
    }

    #[test]
    fn test_cause_chain_survives_location() {
        let err = LarchError::value("math domain error")
            .with_cause("sqrt")
            .with_cause("eval")
            .with_location(location(4));
        assert_eq!(err.kind(), "ValueError");
        assert_eq!(err.to_string(), "math domain error");
        assert_eq!(err.location().map(|l| l.line), Some(4));

        let record = err.to_record();
        assert_eq!(record.causes, vec!["sqrt()".to_string(), "eval()".to_string()]);
        let text = record.render();
        assert!(text.contains("raised in sqrt()\n   raised in eval()"));
        assert!(text.ends_with("ValueError: math domain error"));
    }

    #[test]
    fn test_from_kind() {
        assert_eq!(
            LarchError::from_kind("ValueError", "bad".into()).kind(),
            "ValueError"
        );
        assert_eq!(
            LarchError::from_kind("NameError", "q".into()),
            LarchError::Name { message: "q".into() }
        );
        let custom = LarchError::from_kind("MyError", "oops".into());
        assert_eq!(custom.kind(), "RuntimeError");
        assert_eq!(custom.to_string(), "MyError: oops");
    }
}
