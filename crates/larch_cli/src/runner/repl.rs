use larch_core::{Interrupt, LarchError, Result};
use larch_eval::Interpreter;
use larch_parser::InputBuffer;

use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, EditMode, Editor, Helper};

use super::{interpreter, report_errors};

#[derive(Clone)]
pub struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = String;
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {}

/// Whether a physical line leaves a string, bracket or backslash
/// continuation open. Open blocks are not counted: each line of a block
/// is handed to the interpreter, which then asks for more with the
/// continuation prompt.
fn line_is_open(line: &str) -> bool {
    let mut input = InputBuffer::new();
    input.put(line, None, None);
    !input.is_complete() && !input.is_blank() && input.open_blocks().is_empty()
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if line_is_open(ctx.input()) {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

impl Helper for ReplHelper {}

/// Route Ctrl-C during evaluation to the interpreter so the running unit
/// stops instead of the process. At the prompt rustyline sees the key
/// itself.
fn install_interrupt_handler(interrupt: Interrupt) {
    if let Err(e) = ctrlc::set_handler(move || interrupt.trigger()) {
        tracing::warn!(error = %e, "cannot install Ctrl-C handler");
    }
}

pub fn repl(init: bool) -> Result<()> {
    println!("Larch interactive shell (Ctrl+D to quit)");
    println!();

    let mut larch = interpreter(init);
    install_interrupt_handler(larch.interrupt_handle());

    let config = Config::builder()
        .auto_add_history(true)
        .max_history_size(larch.config().history_size)
        .map_err(|e| LarchError::runtime(format!("bad history size: {}", e)))?
        .tab_stop(4)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut rl: Editor<ReplHelper, DefaultHistory> = Editor::with_config(config)
        .map_err(|e| LarchError::runtime(format!("Failed to create REPL: {}", e)))?;
    rl.set_helper(Some(ReplHelper));

    let history = larch.config().history_path();
    if let Some(path) = &history {
        // A missing history file is normal on first use.
        let _ = rl.load_history(path);
    }

    loop {
        match rl.readline(larch.next_prompt()) {
            Ok(line) => execute_line(&mut larch, &line),
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                larch.clear_input();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = rl.save_history(path) {
            tracing::warn!(path = %path.display(), error = %e, "cannot save history");
        }
    }
    println!();
    Ok(())
}

fn execute_line(larch: &mut Interpreter, line: &str) {
    if let Some(value) = larch.eval_with(line, Some("<stdin>"), 0) {
        if !value.is_none() {
            println!("{}", value.repr());
        }
    }
    report_errors(&larch.take_errors());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_line_detection() {
        assert!(line_is_open("x = [1,"));
        assert!(line_is_open("s = '''doc"));
        assert!(!line_is_open("x = 1"));
        assert!(!line_is_open("for i in range(3):"));
        assert!(!line_is_open(""));
    }
}
