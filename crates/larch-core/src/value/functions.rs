use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use larch_parser::{FunctionDef, Param, Stmt};

use super::{GroupRef, Value};
use crate::error::{LarchError, Result};
use crate::host::Host;

pub type Kwargs = IndexMap<String, Value>;
pub type NativeFn = Rc<dyn Fn(&mut dyn Host, Vec<Value>, Kwargs) -> Result<Value>>;

pub struct NativeFunction {
    pub name: String,
    pub doc: Option<String>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish()
    }
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut dyn Host, Vec<Value>, Kwargs) -> Result<Value> + 'static,
    {
        NativeFunction {
            name: name.into(),
            doc: None,
            func: Rc::new(f),
        }
    }

    /// A function that never needs the interpreter.
    pub fn pure<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>, Kwargs) -> Result<Value> + 'static,
    {
        NativeFunction::new(name, move |_host, args, kwargs| f(args, kwargs))
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn call(&self, host: &mut dyn Host, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        (self.func)(host, args, kwargs)
    }
}

/// Check a native's positional argument count.
pub fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() >= min && args.len() <= max {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {}", min)
    } else if args.len() < min {
        format!("at least {}", min)
    } else {
        format!("at most {}", max)
    };
    let noun = if min == max && min == 1 { "argument" } else { "arguments" };
    Err(LarchError::argument(format!(
        "{}() takes {} {} ({} given)",
        name,
        expected,
        noun,
        args.len()
    )))
}

/// A user-defined procedure: its parsed definition plus the group that
/// was current when `def` ran.
pub struct Procedure {
    pub name: String,
    pub def: Rc<FunctionDef>,
    pub defining: GroupRef,
    pub filename: String,
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("line", &self.def.line)
            .finish()
    }
}

impl Procedure {
    pub fn new(def: Rc<FunctionDef>, defining: GroupRef, filename: impl Into<String>) -> Self {
        Procedure {
            name: def.name.clone(),
            def,
            defining,
            filename: filename.into(),
        }
    }

    pub fn params(&self) -> &[Param] {
        &self.def.params
    }

    pub fn body(&self) -> &[Stmt] {
        &self.def.body
    }

    pub fn doc(&self) -> Option<&str> {
        self.def.doc.as_deref()
    }

    pub fn line(&self) -> usize {
        self.def.line
    }

    /// `name(a, b, *args, k=1, **kws)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.def.params.iter().map(|p| p.to_string()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}
