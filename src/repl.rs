//! Line-oriented REPL.
//!
//! One `Interpreter` lives for the whole session — instance ids, the step
//! counter, and every object's history persist across lines, matching the
//! reference implementation's REPL. A line that fails to scan/parse/run
//! prints its error to stderr and the session continues; incomplete
//! multi-line statements are not supported, so each line must be a
//! complete, self-terminated statement or block.

use crate::config::InterpreterConfig;
use crate::interpreter::Interpreter;
use crate::parser::parse;
use std::io::{self, Write};
use std::path::PathBuf;

pub struct Repl {
    interpreter: Interpreter,
    trace_path: Option<PathBuf>,
}

impl Repl {
    pub fn new(trace_path: Option<PathBuf>) -> Self {
        Repl {
            interpreter: Interpreter::new(InterpreterConfig::default()),
            trace_path,
        }
    }

    pub fn run(&mut self) {
        println!("O-script REPL. End each statement with ';'. :help for commands, :quit to exit.");
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            print!("o> ");
            if io::stdout().flush().is_err() {
                break;
            }
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(_) => break,
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(command) = trimmed.strip_prefix(':') {
                if self.handle_command(command) {
                    break;
                }
                continue;
            }
            self.eval_line(trimmed);
        }
        if let Some(path) = &self.trace_path {
            self.dump_trace(path);
        }
        println!();
    }

    fn eval_line(&mut self, line: &str) {
        match parse(line) {
            Ok(statements) => {
                if let Err(err) = self.interpreter.interpret(&statements) {
                    eprintln!("{}", err);
                }
            }
            Err(err) => eprintln!("{}", err),
        }
    }

    /// Returns `true` when the session should end.
    fn handle_command(&mut self, command: &str) -> bool {
        let mut parts = command.splitn(2, char::is_whitespace);
        match parts.next().unwrap_or("") {
            "quit" | "exit" => return true,
            "help" => {
                println!(":help              show this message");
                println!(":quit, :exit       end the session");
                println!(":trace <path>      write the accumulated trace as JSON to <path>");
                println!(":reset             discard history and start a fresh interpreter");
            }
            "trace" => match parts.next().map(str::trim) {
                Some(path) if !path.is_empty() => self.dump_trace(std::path::Path::new(path)),
                _ => eprintln!("usage: :trace <path>"),
            },
            "reset" => {
                self.interpreter = Interpreter::new(InterpreterConfig::default());
                println!("interpreter reset.");
            }
            other => eprintln!("Unknown command: :{}", other),
        }
        false
    }

    fn dump_trace(&self, path: &std::path::Path) {
        match self.interpreter.trace.to_json() {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    eprintln!("failed to write trace to '{}': {}", path.display(), e);
                }
            }
            Err(e) => eprintln!("failed to serialize trace: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_line_persists_state_across_lines() {
        let mut repl = Repl::new(None);
        repl.eval_line("class Counter { fun init(v) { this.value = v; } }");
        repl.eval_line("var c = new Counter(0);");
        repl.eval_line("c.value = 5;");
        let value = repl
            .interpreter
            .globals
            .borrow()
            .get("c", 1)
            .unwrap();
        match value {
            crate::value::Value::Instance(inst) => {
                assert!(matches!(
                    inst.borrow().get_field("value"),
                    Some(crate::value::Value::Number(n)) if n == 5.0
                ));
            }
            _ => panic!("expected instance"),
        }
    }

    #[test]
    fn reset_command_clears_interpreter_state() {
        let mut repl = Repl::new(None);
        repl.eval_line("var x = 1;");
        assert!(!repl.handle_command("reset"));
        assert!(repl.interpreter.globals.borrow().get("x", 1).is_err());
    }

    #[test]
    fn quit_command_ends_session() {
        let mut repl = Repl::new(None);
        assert!(repl.handle_command("quit"));
    }
}
