use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "larch")]
#[command(author, version, about = "Larch data-analysis language interpreter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, global = true, help = "Skip the site and user startup scripts")]
    pub no_init: bool,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run one or more Larch scripts")]
    Run {
        #[arg(required_unless_present = "exec", num_args = 1..)]
        scripts: Vec<PathBuf>,

        #[arg(
            short = 'e',
            long = "exec",
            help = "Execute inline code instead of files"
        )]
        exec: Option<String>,
    },

    #[command(about = "Check scripts for syntax errors without running them")]
    Check {
        #[arg(required = true, num_args = 1..)]
        scripts: Vec<PathBuf>,
    },

    #[command(about = "Evaluate Larch text and print the final value")]
    Eval {
        #[arg(help = "Text to evaluate")]
        text: String,

        #[arg(long, help = "Print the result and errors as JSON")]
        json: bool,
    },

    #[command(about = "Start an interactive session (the default)")]
    Repl,
}
