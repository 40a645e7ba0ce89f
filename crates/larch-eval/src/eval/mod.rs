mod assignment;
mod expr;
mod functions;
pub(crate) mod ops;
mod stmt;

use std::fs;
use std::path::Path;

use larch_core::{
    Host, Interrupt, Kwargs, LarchError, NativeFunction, Result, SourceLocation, StdWriter,
    SymbolTable, Value, Writer,
};
use larch_parser::{ParseError, Stmt, StmtKind};
use tracing::debug;

pub(crate) use stmt::Flow;

/// Procedure nesting allowed before a call fails.
pub const MAX_CALL_DEPTH: usize = 200;

pub struct Evaluator {
    pub(crate) symtable: SymbolTable,
    pub(crate) writer: Box<dyn Writer>,
    pub(crate) interrupt: Interrupt,
    pub(crate) current_file: String,
    pub(crate) call_depth: usize,
    pub(crate) handling: Vec<LarchError>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_writer(Box::new(StdWriter::default()))
    }

    pub fn with_writer(writer: Box<dyn Writer>) -> Self {
        let mut evaluator = Self {
            symtable: SymbolTable::new(),
            writer,
            interrupt: Interrupt::new(),
            current_file: "<stdin>".to_string(),
            call_depth: 0,
            handling: Vec::new(),
        };
        evaluator.register_builtins();
        evaluator
    }

    pub fn symtable(&self) -> &SymbolTable {
        &self.symtable
    }

    pub fn symtable_mut(&mut self) -> &mut SymbolTable {
        &mut self.symtable
    }

    /// Replace the output sink, returning the previous one.
    pub fn set_writer(&mut self, writer: Box<dyn Writer>) -> Box<dyn Writer> {
        std::mem::replace(&mut self.writer, writer)
    }

    pub fn writer_mut(&mut self) -> &mut dyn Writer {
        self.writer.as_mut()
    }

    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn current_file(&self) -> &str {
        &self.current_file
    }

    pub fn register_native(&mut self, func: NativeFunction) {
        let builtin = self.symtable.builtin().clone();
        builtin
            .borrow_mut()
            .insert(func.name.clone(), Value::from(func));
    }

    pub fn register_math(&mut self, name: &str, value: Value) {
        let math = self.symtable.math().clone();
        math.borrow_mut().insert(name, value);
    }

    fn register_builtins(&mut self) {
        crate::natives::register_all(self);
    }

    /// Parse and execute one unit of source. The value of a final
    /// expression statement is returned; the first error aborts the rest
    /// of the unit.
    pub fn exec_unit(&mut self, text: &str, filename: &str, first_line: usize) -> Result<Value> {
        let commands = self.symtable.valid_commands();
        let stmts = larch_parser::parse_unit(text, first_line, &commands)
            .map_err(|e| syntax_error(e, filename))?;
        debug!(file = filename, line = first_line, statements = stmts.len(), "executing unit");

        let previous = std::mem::replace(&mut self.current_file, filename.to_string());
        let result = self.exec_top(&stmts);
        self.current_file = previous;
        result
    }

    fn exec_top(&mut self, stmts: &[Stmt]) -> Result<Value> {
        let mut last = Value::None;
        for stmt in stmts {
            last = Value::None;
            if let StmtKind::Expr(expr) = &stmt.kind {
                self.interrupt.check()?;
                last = self.eval_expr(expr).map_err(|e| self.locate(e, stmt))?;
                continue;
            }
            let misplaced = match self.exec_stmt(stmt)? {
                Flow::Normal => continue,
                Flow::Break => "'break' outside loop",
                Flow::Continue => "'continue' not properly in loop",
                Flow::Return(_) => "'return' outside procedure",
            };
            return Err(self.locate(LarchError::syntax(misplaced), stmt));
        }
        Ok(last)
    }

    pub(crate) fn locate(&self, err: LarchError, stmt: &Stmt) -> LarchError {
        err.with_location(SourceLocation {
            file: self.current_file.clone(),
            line: stmt.line,
            source: stmt.source.clone(),
        })
    }

    pub fn run_path(&mut self, path: &Path) -> Result<Value> {
        let text = fs::read_to_string(path)
            .map_err(|e| LarchError::io(path.display().to_string(), e))?;
        debug!(path = %path.display(), "running file");
        self.exec_unit(&text, &path.display().to_string(), 1)
    }
}

pub(crate) fn syntax_error(err: ParseError, filename: &str) -> LarchError {
    let location = SourceLocation {
        file: filename.to_string(),
        line: err.line,
        source: err.source_line.clone(),
    };
    LarchError::from(err).with_location(location)
}

impl Host for Evaluator {
    fn symtable(&mut self) -> &mut SymbolTable {
        &mut self.symtable
    }

    fn writer(&mut self) -> &mut dyn Writer {
        self.writer.as_mut()
    }

    fn call(&mut self, func: &Value, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        self.call_value(func, args, kwargs)
    }

    fn eval_text(&mut self, text: &str, filename: &str) -> Result<Value> {
        self.exec_unit(text, filename, 1)
    }

    fn run_file(&mut self, path: &Path) -> Result<Value> {
        self.run_path(path)
    }
}
