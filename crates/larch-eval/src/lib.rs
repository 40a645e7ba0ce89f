pub mod config;
pub mod eval;
mod interpreter;
mod natives;
pub mod plugins;

pub use config::LarchConfig;
pub use eval::{Evaluator, MAX_CALL_DEPTH};
pub use interpreter::Interpreter;
pub use plugins::PluginRegistration;

pub use larch_core::{
    CaptureWriter, ErrorRecord, Group, GroupRef, Interrupt, Kwargs, LarchError, NativeFunction,
    StdWriter, SymbolCallback, SymbolTable, Value, Writer,
};
