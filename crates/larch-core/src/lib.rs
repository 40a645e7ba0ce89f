pub mod error;
pub mod host;
pub mod symtable;
pub mod value;
pub mod writer;

pub use error::{ErrorRecord, LarchError, Result, SourceLocation, StackFrame};
pub use host::{Host, Interrupt};
pub use symtable::{Frame, SymbolCallback, SymbolTable};
pub use value::{
    array_from_values, check_arity, check_hashable, format_float, percent_format, sequence_len, Group, GroupRef,
    Kwargs, NativeFn, NativeFunction, Procedure, Value, MAX_SEQUENCE_LEN,
};
pub use writer::{CaptureWriter, StdWriter, Writer};
