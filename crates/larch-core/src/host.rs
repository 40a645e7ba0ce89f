use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{LarchError, Result};
use crate::symtable::SymbolTable;
use crate::value::{Kwargs, Value};
use crate::writer::Writer;

/// The interpreter services a native function may use.
pub trait Host {
    fn symtable(&mut self) -> &mut SymbolTable;

    fn writer(&mut self) -> &mut dyn Writer;

    /// Call any callable value with the normal argument protocol.
    fn call(&mut self, func: &Value, args: Vec<Value>, kwargs: Kwargs) -> Result<Value>;

    /// Execute source text in the current context and return the value of
    /// its final expression statement.
    fn eval_text(&mut self, text: &str, filename: &str) -> Result<Value>;

    fn run_file(&mut self, path: &Path) -> Result<Value>;
}

/// A cancellation flag shared with whoever may need to stop a running
/// evaluation (a signal handler, another thread).
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with `Interrupted` once the flag has been raised.
    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            Err(LarchError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Host with a symbol table and a capture writer but no evaluator.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct NullHost {
    pub symtable: SymbolTable,
    pub out: crate::writer::CaptureWriter,
}

#[cfg(test)]
impl Host for NullHost {
    fn symtable(&mut self) -> &mut SymbolTable {
        &mut self.symtable
    }

    fn writer(&mut self) -> &mut dyn Writer {
        &mut self.out
    }

    fn call(&mut self, func: &Value, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        match func {
            Value::NativeFunction(f) => f.clone().call(self, args, kwargs),
            other => Err(LarchError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn eval_text(&mut self, _text: &str, _filename: &str) -> Result<Value> {
        Err(LarchError::runtime("no evaluator"))
    }

    fn run_file(&mut self, path: &Path) -> Result<Value> {
        Err(LarchError::io(path.display().to_string(), "no evaluator"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_flag_is_shared() {
        let flag = Interrupt::new();
        let handle = flag.clone();
        assert!(flag.check().is_ok());
        handle.trigger();
        assert!(matches!(flag.check(), Err(LarchError::Interrupted)));
        flag.reset();
        assert!(!handle.is_set());
    }
}
