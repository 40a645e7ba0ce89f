use std::fs;
use std::path::Path;

use colored::Color;
use larch_core::{
    ErrorRecord, Interrupt, LarchError, StdWriter, SymbolTable, Value, Writer,
};
use larch_parser::InputBuffer;
use tracing::{debug, warn};

use crate::config::LarchConfig;
use crate::eval::{syntax_error, Evaluator};
use crate::plugins::{self, PluginRegistration};

/// The embedding surface: feeds text through the input buffer, executes
/// complete units and keeps the errors they raise instead of returning
/// them.
pub struct Interpreter {
    evaluator: Evaluator,
    input: InputBuffer,
    errors: Vec<ErrorRecord>,
    config: LarchConfig,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter configured from the user's larch directory.
    pub fn new() -> Self {
        Self::with_config(LarchConfig::load())
    }

    pub fn with_config(config: LarchConfig) -> Self {
        let writer = Box::new(StdWriter::new(config.use_color));
        Self::from_parts(config, writer)
    }

    /// Default configuration, writing to `writer`.
    pub fn with_writer(writer: Box<dyn Writer>) -> Self {
        Self::from_parts(LarchConfig::default(), writer)
    }

    pub fn from_parts(config: LarchConfig, writer: Box<dyn Writer>) -> Self {
        let mut evaluator = Evaluator::with_writer(writer);
        if !config.modules_path.is_empty() {
            evaluator
                .symtable_mut()
                .prepend_module_path(&config.modules_path);
        }
        Interpreter {
            evaluator,
            input: InputBuffer::new(),
            errors: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &LarchConfig {
        &self.config
    }

    pub fn symtable(&self) -> &SymbolTable {
        self.evaluator.symtable()
    }

    pub fn symtable_mut(&mut self) -> &mut SymbolTable {
        self.evaluator.symtable_mut()
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// Handle for stopping a running evaluation from another thread.
    pub fn interrupt_handle(&self) -> Interrupt {
        self.evaluator.interrupt_handle()
    }

    /// Evaluate text as if typed at the prompt.
    pub fn eval(&mut self, text: &str) -> Option<Value> {
        self.eval_with(text, None, 0)
    }

    /// Queue `text` and run it once it forms a complete unit. Returns the
    /// value of a final expression statement; `None` while input is still
    /// pending or when the unit failed (the error is recorded).
    pub fn eval_with(&mut self, text: &str, filename: Option<&str>, lineno: usize) -> Option<Value> {
        let lineno = self.input.is_empty().then_some(lineno);
        self.input.put(text, filename, lineno);
        if self.input.is_blank() {
            self.input.clear();
            return None;
        }
        if !self.input.is_complete() {
            return None;
        }
        let unit = self.input.run()?;

        self.evaluator.interrupt_handle().reset();
        match self
            .evaluator
            .exec_unit(&unit.text, &unit.filename, unit.first_line)
        {
            Ok(value) => Some(value),
            Err(err) => {
                self.record(err);
                None
            }
        }
    }

    fn record(&mut self, err: LarchError) {
        let record = err.to_record();
        debug!(kind = %record.kind, file = %record.filename, line = record.lineno, "recorded error");
        self.errors.push(record);
    }

    /// Run a script file as one unit. Returns whether it finished without
    /// error.
    pub fn runfile(&mut self, path: &Path) -> bool {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                self.record(LarchError::io(path.display().to_string(), e));
                return false;
            }
        };
        self.input.clear();
        self.evaluator.interrupt_handle().reset();
        let filename = path.display().to_string();
        match self.evaluator.exec_unit(&text, &filename, 1) {
            Ok(_) => true,
            Err(err) => {
                self.record(err);
                false
            }
        }
    }

    /// Run the startup scripts that exist, in order. A failing script is
    /// logged and does not stop the ones after it. Returns how many ran
    /// cleanly.
    pub fn run_init_scripts(&mut self) -> usize {
        let mut succeeded = 0;
        for script in self.config.init_scripts() {
            if !script.is_file() {
                continue;
            }
            debug!(script = %script.display(), "running init script");
            let before = self.errors.len();
            if self.runfile(&script) {
                succeeded += 1;
            } else if let Some(record) = self.errors.get(before) {
                warn!(script = %script.display(), error = %record.message, "init script failed");
            }
        }
        succeeded
    }

    pub fn add_plugin(&mut self, plugin: PluginRegistration) -> larch_core::Result<()> {
        plugins::register(self.evaluator.symtable_mut(), plugin)
    }

    /// Run a registrar and bind what it returns.
    pub fn register_plugin<F>(&mut self, registrar: F) -> larch_core::Result<()>
    where
        F: FnOnce() -> PluginRegistration,
    {
        self.add_plugin(registrar())
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// The most recent error, if any.
    pub fn get_error(&self) -> Option<&ErrorRecord> {
        self.errors.last()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn take_errors(&mut self) -> Vec<ErrorRecord> {
        std::mem::take(&mut self.errors)
    }

    /// Write pending errors in the error style, one per file and line,
    /// then clear them.
    pub fn show_errors(&mut self) {
        let mut shown: Vec<(String, usize)> = Vec::new();
        for record in std::mem::take(&mut self.errors) {
            let key = (record.filename.clone(), record.lineno);
            if shown.contains(&key) {
                continue;
            }
            shown.push(key);
            let text = format!("{}\n", record.render());
            self.evaluator
                .writer_mut()
                .write_styled(&text, Some(Color::Red), false);
        }
    }

    pub fn writer_mut(&mut self) -> &mut dyn Writer {
        self.evaluator.writer_mut()
    }

    /// Replace the output sink, returning the previous one.
    pub fn set_writer(&mut self, writer: Box<dyn Writer>) -> Box<dyn Writer> {
        self.evaluator.set_writer(writer)
    }

    /// Run `f` with output going to `writer`, restoring the previous sink
    /// afterwards.
    pub fn scoped_writer<R>(&mut self, writer: Box<dyn Writer>, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.set_writer(writer);
        let result = f(self);
        self.set_writer(previous);
        result
    }

    pub fn is_complete(&self) -> bool {
        self.input.is_complete()
    }

    pub fn next_prompt(&self) -> &'static str {
        self.input.next_prompt()
    }

    /// Text is buffered waiting for the rest of a unit.
    pub fn has_pending_input(&self) -> bool {
        !self.input.is_empty()
    }

    /// Drop buffered, unfinished input.
    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    /// Parse without executing. Syntax errors carry `filename` and the
    /// offending line.
    pub fn check(&self, text: &str, filename: &str) -> larch_core::Result<()> {
        let commands = self.symtable().valid_commands();
        larch_parser::parse_unit(text, 1, &commands)
            .map(|_| ())
            .map_err(|e| syntax_error(e, filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larch_core::CaptureWriter;
    use pretty_assertions::assert_eq;

    fn interpreter() -> (Interpreter, CaptureWriter) {
        let out = CaptureWriter::new();
        (Interpreter::with_writer(Box::new(out.clone())), out)
    }

    #[test]
    fn test_incremental_input() {
        let (mut larch, out) = interpreter();
        assert_eq!(larch.eval("for i in range(2):"), None);
        assert!(!larch.is_complete());
        assert_eq!(larch.next_prompt(), larch_parser::CONTINUATION_PROMPT);
        larch.eval("  print(i)");
        assert_eq!(out.contents(), "");
        larch.eval("endfor");
        assert_eq!(out.take(), "0\n1\n");
        assert_eq!(larch.next_prompt(), larch_parser::PRIMARY_PROMPT);
    }

    #[test]
    fn test_blank_input_is_dropped() {
        let (mut larch, _) = interpreter();
        assert_eq!(larch.eval("# nothing here"), None);
        assert_eq!(larch.next_prompt(), larch_parser::PRIMARY_PROMPT);
        assert_eq!(larch.eval("1 + 1"), Some(Value::Int(2)));
    }

    #[test]
    fn test_errors_are_recorded_not_raised() {
        let (mut larch, _) = interpreter();
        assert_eq!(larch.eval("a = 1\nb = a / 0\nc = 3"), None);
        assert_eq!(larch.errors().len(), 1);
        let record = larch.get_error().unwrap();
        assert_eq!(record.kind, "ZeroDivisionError");
        assert_eq!(record.lineno, 2);
        assert_eq!(record.source_line, "b = a / 0");
        assert!(larch.symtable().lookup("c").is_none());

        assert_eq!(larch.eval("a"), Some(Value::Int(1)));
        assert_eq!(larch.take_errors().len(), 1);
        assert!(!larch.has_errors());
    }

    #[test]
    fn test_show_errors_dedups_and_clears() {
        let (mut larch, out) = interpreter();
        larch.eval_with("undefined_a", Some("script.lar"), 0);
        larch.eval_with("undefined_b", Some("script.lar"), 0);
        larch.show_errors();
        let text = out.take();
        assert_eq!(text.matches("NameError").count(), 1, "{}", text);
        assert!(!larch.has_errors());
    }

    #[test]
    fn test_line_offset_for_embedded_text() {
        let (mut larch, _) = interpreter();
        larch.eval_with("x = 1\ny = nope", Some("cell"), 10);
        let record = larch.get_error().unwrap();
        assert_eq!((record.filename.as_str(), record.lineno), ("cell", 12));
    }

    #[test]
    fn test_scoped_writer_restores_sink() {
        let (mut larch, out) = interpreter();
        let inner = CaptureWriter::new();
        larch.scoped_writer(Box::new(inner.clone()), |larch| {
            larch.eval("print('inside')");
        });
        larch.eval("print('outside')");
        assert_eq!(inner.take(), "inside\n");
        assert_eq!(out.take(), "outside\n");
    }

    #[test]
    fn test_check_parses_only() {
        let (mut larch, _) = interpreter();
        assert!(larch.check("x = 1", "<check>").is_ok());
        assert!(larch.check("if x:\n  y = 1\n", "<check>").is_err());
        larch.eval("");
        assert!(larch.symtable().lookup("x").is_none());
    }

    #[test]
    fn test_check_reports_location() {
        let (larch, _) = interpreter();
        let record = larch
            .check("a = 1\nb = 2\nc = (3 +\n", "scan.lar")
            .unwrap_err()
            .to_record();
        assert_eq!(record.kind, "SyntaxError");
        assert_eq!(record.filename, "scan.lar");
        assert_eq!(record.lineno, 3);
        assert!(record.source_line.contains("c = (3 +"));

        let record = larch.check("a = 1\nendif", "scan.lar").unwrap_err().to_record();
        assert_eq!(record.lineno, 2);
        assert_eq!(record.filename, "scan.lar");
    }
}
