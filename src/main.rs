//! `oscript` — run O-script source files, or drop into a REPL.

use clap::Parser as ClapParser;
use oscript::config::InterpreterConfig;
use oscript::error::OscriptError;
use oscript::interpreter::Interpreter;
use oscript::parser::parse;
use oscript::repl::Repl;
use std::path::PathBuf;
use std::process::ExitCode;

/// A small OOP language where every object remembers its own history.
#[derive(ClapParser, Debug)]
#[command(name = "oscript", version, about)]
struct Cli {
    /// Path to a .os file to run. Omit (or pass --repl) to start the REPL.
    file: Option<PathBuf>,

    /// Write the execution trace as JSON to this path.
    #[arg(long, value_name = "PATH")]
    trace: Option<PathBuf>,

    /// Force interactive REPL mode even when a file is given.
    #[arg(long)]
    repl: bool,

    /// Log filter level (trace/debug/info/warn/error). RUST_LOG overrides this.
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level.clone()),
    )
    .init();

    if cli.repl || cli.file.is_none() {
        let mut repl = Repl::new(cli.trace.clone());
        repl.run();
        return ExitCode::from(0);
    }

    let path = cli.file.as_ref().expect("checked above");
    match run_file(path, cli.trace.as_deref()) {
        Ok(()) => ExitCode::from(0),
        Err(RunFailure::Language(e)) => {
            eprintln!("{}", e);
            ExitCode::from(65)
        }
        Err(RunFailure::Internal(message)) => {
            eprintln!("Internal error: {}", message);
            ExitCode::from(70)
        }
    }
}

enum RunFailure {
    Language(OscriptError),
    Internal(String),
}

fn run_file(path: &std::path::Path, trace_path: Option<&std::path::Path>) -> Result<(), RunFailure> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| RunFailure::Internal(format!("reading '{}': {}", path.display(), e)))?;

    let mut interpreter = Interpreter::new(InterpreterConfig::default());
    let run_result = parse(&source).and_then(|statements| interpreter.interpret(&statements));

    // The trace is never rolled back on error: whatever was emitted before
    // a failure is still written if the caller asked for it.
    if let Some(trace_path) = trace_path {
        let json = interpreter
            .trace
            .to_json()
            .map_err(|e| RunFailure::Internal(format!("serializing trace: {}", e)))?;
        std::fs::write(trace_path, json)
            .map_err(|e| RunFailure::Internal(format!("writing trace to '{}': {}", trace_path.display(), e)))?;
    }

    run_result.map_err(RunFailure::Language)
}
