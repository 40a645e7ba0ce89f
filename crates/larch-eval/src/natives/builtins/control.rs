use std::path::Path;

use larch_core::{check_arity, Host, Kwargs, LarchError, Result, Value};

fn text_option(kwargs: &Kwargs, name: &str, default: &str) -> Result<String> {
    match kwargs.get(name) {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(value) => Ok(value.as_str()?.to_string()),
    }
}

pub fn print(host: &mut dyn Host, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    let sep = text_option(&kwargs, "sep", " ")?;
    let end = text_option(&kwargs, "end", "\n")?;
    let mut line = args
        .iter()
        .map(Value::to_display_string)
        .collect::<Vec<_>>()
        .join(&sep);
    line.push_str(&end);
    host.writer().write(&line);
    Ok(Value::None)
}

/// Evaluate text as its own unit and return its final expression value.
pub fn eval(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("eval", &args, 1, 1)?;
    let text = args[0].as_str()?.to_string();
    host.eval_text(&text, "<eval>")
}

pub fn run(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("run", &args, 1, 1)?;
    let filename = args[0].as_str()?;
    let path = Path::new(filename);
    if !path.is_file() {
        return Err(LarchError::io(filename, "file not found"));
    }
    host.run_file(path)?;
    Ok(Value::None)
}

#[cfg(test)]
mod tests {
    use crate::eval::Evaluator;
    use larch_core::{CaptureWriter, Value};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn evaluator() -> (Evaluator, CaptureWriter) {
        let out = CaptureWriter::new();
        (Evaluator::with_writer(Box::new(out.clone())), out)
    }

    #[test]
    fn test_print_separators() {
        let (mut ev, out) = evaluator();
        ev.exec_unit("print(1, 'a', [2.0])\nprint('x', 'y', sep='-', end='!')", "<test>", 1)
            .unwrap();
        assert_eq!(out.take(), "1 a [2.0]\nx-y!");
    }

    #[test]
    fn test_eval_builtin_returns_value_and_shares_scope() {
        let (mut ev, _) = evaluator();
        ev.exec_unit("v = eval('q = 2\\nq * 21')", "<test>", 1).unwrap();
        assert_eq!(ev.symtable().lookup("v"), Some(Value::Int(42)));
        assert_eq!(ev.symtable().lookup("q"), Some(Value::Int(2)));
    }

    #[test]
    fn test_eval_builtin_syntax_error_is_catchable() {
        let (mut ev, out) = evaluator();
        ev.exec_unit(
            "try:\n  eval('x = (')\nexcept SyntaxError:\n  print('caught')\nendtry",
            "<test>",
            1,
        )
        .unwrap();
        assert_eq!(out.take(), "caught\n");
    }

    #[test]
    fn test_run_executes_in_current_context() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("setup.lar");
        fs::write(&script, "loaded = base + 1\n").unwrap();

        let (mut ev, _) = evaluator();
        let src = format!("base = 10\nrun('{}')", script.display());
        ev.exec_unit(&src, "<test>", 1).unwrap();
        assert_eq!(ev.symtable().lookup("loaded"), Some(Value::Int(11)));

        let err = ev.exec_unit("run('no/such/file.lar')", "<test>", 1).unwrap_err();
        assert_eq!(err.kind(), "IOError");
    }
}
