use std::cell::RefCell;
use std::io::{self, Write as _};
use std::rc::Rc;

use colored::{Color, Colorize};

/// Output sink for `print`, `show` and error reports.
pub trait Writer {
    fn write_styled(&mut self, text: &str, color: Option<Color>, bold: bool);

    fn write(&mut self, text: &str) {
        self.write_styled(text, None, false);
    }

    fn flush(&mut self) {}
}

/// Writes to stdout, honoring color hints when enabled.
#[derive(Debug, Clone)]
pub struct StdWriter {
    use_color: bool,
}

impl StdWriter {
    pub fn new(use_color: bool) -> Self {
        StdWriter { use_color }
    }
}

impl Default for StdWriter {
    fn default() -> Self {
        StdWriter::new(true)
    }
}

impl Writer for StdWriter {
    fn write_styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let mut stdout = io::stdout().lock();
        let result = if self.use_color && (color.is_some() || bold) {
            let mut styled = text.normal();
            if let Some(color) = color {
                styled = styled.color(color);
            }
            if bold {
                styled = styled.bold();
            }
            write!(stdout, "{}", styled)
        } else {
            stdout.write_all(text.as_bytes())
        };
        if let Err(err) = result {
            tracing::warn!("failed to write output: {}", err);
        }
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }
}

/// Collects output in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureWriter {
    buffer: Rc<RefCell<String>>,
}

impl CaptureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }

    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buffer.borrow_mut())
    }
}

impl Writer for CaptureWriter {
    fn write_styled(&mut self, text: &str, _color: Option<Color>, _bold: bool) {
        self.buffer.borrow_mut().push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_clones_share_buffer() {
        let capture = CaptureWriter::new();
        let mut sink = capture.clone();
        sink.write("a");
        sink.write_styled("b\n", Some(Color::Red), true);
        assert_eq!(capture.contents(), "ab\n");
        assert_eq!(capture.take(), "ab\n");
        assert!(capture.contents().is_empty());
    }
}
