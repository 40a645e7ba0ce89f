mod args;
mod runner;

use std::thread;

use clap::Parser;
use larch_core::{LarchError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use args::{Cli, Commands};

/// Deeply recursive Larch procedures need far more than the default
/// main-thread stack.
const INTERPRETER_STACK: usize = 256 * 1024 * 1024;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("LARCH_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn dispatch(cli: Cli) -> Result<()> {
    let init = !cli.no_init;
    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Run { scripts, exec } => match exec {
            Some(code) => runner::run_inline(&code, init),
            None => runner::run_scripts(scripts, init),
        },
        Commands::Check { scripts } => runner::check_scripts(scripts),
        Commands::Eval { text, json } => runner::eval_text(&text, json, init),
        Commands::Repl => runner::repl(init),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let worker = thread::Builder::new()
        .name("larch".into())
        .stack_size(INTERPRETER_STACK)
        .spawn(move || dispatch(cli));

    let result = match worker {
        Ok(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(LarchError::runtime("interpreter thread panicked"))),
        Err(e) => Err(LarchError::runtime(format!(
            "cannot start interpreter thread: {}",
            e
        ))),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
