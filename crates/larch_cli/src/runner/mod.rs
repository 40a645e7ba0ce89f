mod repl;

pub use repl::repl;

use std::fs;
use std::path::{Path, PathBuf};

use ariadne::{Color, Label, Report, ReportKind, Source};
use larch_core::{ErrorRecord, LarchError, Result, Value};
use larch_eval::Interpreter;

/// A fresh interpreter, with startup scripts run unless `init` is off.
pub(crate) fn interpreter(init: bool) -> Interpreter {
    let mut larch = Interpreter::new();
    if init {
        larch.run_init_scripts();
        report_errors(&larch.take_errors());
    }
    larch
}

pub fn run_scripts(scripts: Vec<PathBuf>, init: bool) -> Result<()> {
    let scripts = expand_globs(scripts)?;
    if scripts.is_empty() {
        eprintln!("No scripts found");
        return Ok(());
    }

    let mut larch = interpreter(init);
    let mut failed = 0;
    for path in &scripts {
        if !larch.runfile(path) {
            failed += 1;
            report_errors(&larch.take_errors());
        }
    }
    if failed > 0 {
        return Err(LarchError::runtime(format!(
            "{} of {} script(s) failed",
            failed,
            scripts.len()
        )));
    }
    Ok(())
}

pub fn run_inline(code: &str, init: bool) -> Result<()> {
    let mut larch = interpreter(init);
    larch.eval_with(code, Some("<inline>"), 0);
    if larch.has_pending_input() {
        return Err(LarchError::syntax("incomplete input: a block is not closed"));
    }
    let errors = larch.take_errors();
    if errors.is_empty() {
        return Ok(());
    }
    report_errors(&errors);
    Err(LarchError::runtime("inline code failed"))
}

pub fn check_scripts(scripts: Vec<PathBuf>) -> Result<()> {
    let scripts = expand_globs(scripts)?;
    if scripts.is_empty() {
        eprintln!("No scripts found");
        return Ok(());
    }

    let larch = Interpreter::new();
    let mut failed = 0;
    for path in &scripts {
        let name = path.display().to_string();
        let outcome = fs::read_to_string(path)
            .map_err(|e| LarchError::io(name.clone(), e))
            .and_then(|text| larch.check(&text, &name));
        if let Err(e) = outcome {
            failed += 1;
            report_errors(&[e.to_record()]);
        }
    }

    if failed == 0 {
        eprintln!("All {} script(s) OK", scripts.len());
        Ok(())
    } else {
        Err(LarchError::runtime(format!("{} script(s) have errors", failed)))
    }
}

pub fn eval_text(text: &str, json: bool, init: bool) -> Result<()> {
    let mut larch = interpreter(init);
    let value = larch.eval_with(text, Some("<eval>"), 0);
    let errors = larch.take_errors();

    if json {
        let output = serde_json::json!({
            "result": value.as_ref().filter(|v| !v.is_none()).map(Value::repr),
            "errors": errors,
        });
        println!("{}", output);
    } else {
        if let Some(value) = value.filter(|v| !v.is_none()) {
            println!("{}", value.repr());
        }
        report_errors(&errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LarchError::runtime("evaluation failed"))
    }
}

fn expand_globs(patterns: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut result = vec![];

    for pattern in patterns {
        let pattern_str = pattern.to_string_lossy();

        if pattern_str.contains('*') || pattern_str.contains('?') {
            let entries = glob::glob(&pattern_str)
                .map_err(|e| LarchError::value(format!("bad glob pattern: {}", e)))?;
            for entry in entries {
                match entry {
                    Ok(path) => result.push(path),
                    Err(e) => return Err(LarchError::io(pattern_str.to_string(), e)),
                }
            }
        } else {
            result.push(pattern);
        }
    }

    Ok(result)
}

/// Source text the record points into: the file when it can be read,
/// otherwise the recorded line placed at its line number.
fn source_for(record: &ErrorRecord) -> String {
    if let Ok(text) = fs::read_to_string(Path::new(&record.filename)) {
        if text.lines().count() >= record.lineno {
            return text;
        }
    }
    let padding = "\n".repeat(record.lineno.saturating_sub(1));
    format!("{}{}", padding, record.source_line)
}

/// Character range of line `lineno` without surrounding whitespace.
fn line_span(text: &str, lineno: usize) -> std::ops::Range<usize> {
    let mut offset = 0;
    for (i, line) in text.split('\n').enumerate() {
        let width = line.chars().count();
        if i + 1 == lineno {
            let start = offset + (width - line.trim_start().chars().count());
            return start..(offset + line.trim_end().chars().count()).max(start);
        }
        offset += width + 1;
    }
    offset..offset
}

pub(crate) fn report_errors(errors: &[ErrorRecord]) {
    for record in errors {
        if record.lineno == 0 || record.filename.is_empty() {
            eprintln!("{}", record.render());
            continue;
        }
        let source = source_for(record);
        let span = line_span(&source, record.lineno);
        let id = record.filename.as_str();

        let mut report = Report::build(ReportKind::Error, id, span.start)
            .with_code(&record.kind)
            .with_message(&record.message)
            .with_label(
                Label::new((id, span))
                    .with_message(&record.message)
                    .with_color(Color::Red),
            );
        for frame in &record.stack {
            report = report.with_note(frame.to_string());
        }
        for cause in &record.causes {
            report = report.with_note(format!("raised in {}", cause));
        }
        if report.finish().eprint((id, Source::from(source))).is_err() {
            eprintln!("{}", record.render());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_span_skips_indentation() {
        let text = "a = 1\n    b = oops  \nc = 3";
        let span = line_span(text, 2);
        assert_eq!(&text[span], "b = oops");
    }

    #[test]
    fn test_source_for_missing_file_places_line() {
        let record = ErrorRecord {
            kind: "NameError".into(),
            message: "name 'q' is not defined".into(),
            filename: "<stdin>".into(),
            lineno: 3,
            source_line: "y = q".into(),
            stack: vec![],
            causes: vec![],
        };
        let source = source_for(&record);
        assert_eq!(source, "\n\ny = q");
        assert_eq!(&source[line_span(&source, 3)], "y = q");
    }

    #[test]
    fn test_expand_globs_passes_plain_paths() {
        let paths = expand_globs(vec![PathBuf::from("script.lar")]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("script.lar")]);
    }
}
