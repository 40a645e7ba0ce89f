use std::rc::Rc;

use indexmap::IndexMap;

use larch_core::{
    Frame, Group, GroupRef, Kwargs, LarchError, Procedure, Result, StackFrame, Value,
};
use larch_parser::ParamKind;
use tracing::debug;

use super::{Evaluator, Flow, MAX_CALL_DEPTH};

impl Evaluator {
    pub fn call_value(&mut self, func: &Value, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        match func {
            Value::NativeFunction(f) => {
                let f = Rc::clone(f);
                f.call(self, args, kwargs).map_err(|e| e.with_cause(&f.name))
            }
            Value::Procedure(p) => self.call_procedure(&Rc::clone(p), args, kwargs),
            other => Err(LarchError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn call_procedure(
        &mut self,
        proc: &Rc<Procedure>,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Value> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(LarchError::runtime(format!(
                "maximum recursion depth exceeded in {}()",
                proc.name
            )));
        }

        let local = Group::new(proc.name.clone());
        self.bind_parameters(proc, &local, args, kwargs)?;

        debug!(procedure = %proc.name, depth = self.call_depth, "call");
        self.symtable.push_frame(Frame {
            local,
            defining: proc.defining.clone(),
        });
        self.call_depth += 1;
        let caller_file = std::mem::replace(&mut self.current_file, proc.filename.clone());

        let result = self.exec_block(proc.body());

        self.current_file = caller_file;
        self.call_depth -= 1;
        self.symtable.pop_frame();
        debug!(procedure = %proc.name, ok = result.is_ok(), "return");

        let frame = || StackFrame {
            procedure: proc.name.clone(),
            file: proc.filename.clone(),
            line: proc.line(),
        };
        match result {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(Flow::Normal) => Ok(Value::None),
            Ok(Flow::Break | Flow::Continue) => {
                Err(LarchError::syntax("'break' or 'continue' outside loop").with_stack_frame(frame()))
            }
            Err(err) => Err(err.with_stack_frame(frame())),
        }
    }

    /// Bind call arguments into `local`. Missing parameters take their
    /// default, evaluated now, in the caller's scope.
    fn bind_parameters(
        &mut self,
        proc: &Procedure,
        local: &GroupRef,
        args: Vec<Value>,
        mut kwargs: Kwargs,
    ) -> Result<()> {
        let name = &proc.name;
        let params = proc.params();
        let positional: Vec<&str> = params
            .iter()
            .take_while(|p| p.kind == ParamKind::Positional)
            .map(|p| p.name.as_str())
            .collect();
        let var_args = params.iter().find(|p| p.kind == ParamKind::VarArgs);
        let var_kwargs = params.iter().find(|p| p.kind == ParamKind::VarKwargs);

        let mut bound: IndexMap<String, Value> = IndexMap::new();
        let mut args = args.into_iter();
        for param in &positional {
            match args.next() {
                Some(value) => {
                    bound.insert(param.to_string(), value);
                }
                None => break,
            }
        }
        let mut extra: Vec<Value> = args.collect();
        if !extra.is_empty() && var_args.is_none() {
            return Err(LarchError::argument(format!(
                "{}() got too many arguments: takes at most {} positional, {} given",
                name,
                positional.len(),
                positional.len() + extra.len()
            )));
        }

        let keyword_names: Vec<&str> = params
            .iter()
            .filter(|p| p.kind == ParamKind::Positional)
            .map(|p| p.name.as_str())
            .collect();
        let mut extra_kwargs = IndexMap::new();
        for (key, value) in kwargs.drain(..) {
            if keyword_names.contains(&key.as_str()) {
                if bound.contains_key(&key) {
                    return Err(LarchError::argument(format!(
                        "{}() got multiple values for argument '{}'",
                        name, key
                    )));
                }
                bound.insert(key, value);
            } else if var_kwargs.is_some() {
                extra_kwargs.insert(Value::from(key), value);
            } else {
                return Err(LarchError::argument(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    name, key
                )));
            }
        }

        for param in params {
            let value = match param.kind {
                ParamKind::Positional => match bound.shift_remove(&param.name) {
                    Some(value) => value,
                    None => match &param.default {
                        Some(default) => self.eval_expr(default)?,
                        None => {
                            return Err(LarchError::argument(format!(
                                "{}() missing required argument '{}'",
                                name, param.name
                            )))
                        }
                    },
                },
                ParamKind::VarArgs => Value::tuple(std::mem::take(&mut extra)),
                ParamKind::VarKwargs => Value::dict(std::mem::take(&mut extra_kwargs)),
            };
            local.borrow_mut().insert(param.name.clone(), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larch_core::CaptureWriter;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> Result<(Evaluator, String)> {
        let out = CaptureWriter::new();
        let mut ev = Evaluator::with_writer(Box::new(out.clone()));
        ev.exec_unit(src, "<test>", 1)?;
        Ok((ev, out.take()))
    }

    #[test]
    fn test_varargs_and_kwargs() {
        let src = "def f(a, b=2, *rest, **opts):\n  print(a, b, rest, opts)\nenddef\nf(1)\nf(1, 3, 4, 5, k='v')";
        let (_, out) = run(src).unwrap();
        assert_eq!(out, "1 2 () {}\n1 3 (4, 5) {'k': 'v'}\n");
    }

    #[test]
    fn test_binding_errors() {
        let def = "def f(a, b=1):\n  return a\nenddef\n";
        for (call, expected) in [
            ("f()", "missing required argument 'a'"),
            ("f(1, 2, 3)", "too many arguments"),
            ("f(1, a=2)", "multiple values for argument 'a'"),
            ("f(1, c=2)", "unexpected keyword argument 'c'"),
        ] {
            let err = match run(&format!("{}{}", def, call)) {
                Err(err) => err,
                Ok(_) => panic!("{} should fail", call),
            };
            assert_eq!(err.kind(), "ArgumentError");
            assert!(err.inner().to_string().contains(expected), "{}", err);
        }
    }

    #[test]
    fn test_defaults_evaluated_per_call_in_caller_scope() {
        let src = "n = 1\ndef f(x=n):\n  return x\nenddef\na = f()\nn = 5\nb = f()";
        let (ev, _) = run(src).unwrap();
        assert_eq!(ev.symtable.lookup("a"), Some(Value::Int(1)));
        assert_eq!(ev.symtable.lookup("b"), Some(Value::Int(5)));
    }

    #[test]
    fn test_fresh_local_group_per_call() {
        let src = "def count():\n  try:\n    hits += 1\n  except NameError:\n    hits = 1\n  endtry\n  return hits\nenddef\na = count()\nb = count()";
        let (ev, _) = run(src).unwrap();
        assert_eq!(ev.symtable.lookup("b"), Some(Value::Int(1)));
        assert_eq!(ev.symtable.lookup("hits"), None);
    }

    #[test]
    fn test_recursion_and_depth_limit() {
        let src = "def fact(n):\n  if n <= 1:\n    return 1\n  endif\n  return n * fact(n - 1)\nenddef\nr = fact(10)";
        let (ev, _) = run(src).unwrap();
        assert_eq!(ev.symtable.lookup("r"), Some(Value::Int(3628800)));

        // Deep recursion needs more stack than the default test thread has.
        let depth = std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(|| {
                let err = run("def loop(n):\n  return loop(n + 1)\nenddef\nloop(0)")
                    .err()
                    .unwrap();
                assert!(err.inner().to_string().contains("maximum recursion depth"));
                err.stack().len()
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(depth, MAX_CALL_DEPTH);
    }

    #[test]
    fn test_error_carries_stack_frame() {
        let src = "def bad():\n  return 1/0\nenddef\nbad()";
        let err = run(src).err().unwrap();
        assert_eq!(err.kind(), "ZeroDivisionError");
        assert_eq!(err.location().map(|l| l.line), Some(2));
        assert_eq!(err.stack()[0].procedure, "bad");
    }

    #[test]
    fn test_procedure_sees_later_changes_to_defining_group() {
        let src = "def get():\n  return setting\nenddef\nsetting = 'late'\nv = get()";
        let (ev, _) = run(src).unwrap();
        assert_eq!(ev.symtable.lookup("v"), Some(Value::from("late")));
    }
}
