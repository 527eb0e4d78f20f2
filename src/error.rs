//! Error types for O-script.
//!
//! Three kinds of error can end a run: a malformed token (scan), a grammar
//! violation (parse), or a runtime fault (undefined name, wrong type, bad
//! arity, ...). Each carries a source line where one is available.

use thiserror::Error;

/// A single O-script error, with a source line when one is known.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OscriptError {
    #[error("[line {line}] Scan error: {message}")]
    Scan { message: String, line: usize },

    #[error("[line {line}] Parse error at '{lexeme}': {message}")]
    Parse {
        message: String,
        lexeme: String,
        line: usize,
    },

    #[error("[line {line}] Runtime error: {message}")]
    Runtime { message: String, line: usize },
}

impl OscriptError {
    pub fn scan(message: impl Into<String>, line: usize) -> Self {
        OscriptError::Scan {
            message: message.into(),
            line,
        }
    }

    pub fn parse(message: impl Into<String>, lexeme: impl Into<String>, line: usize) -> Self {
        OscriptError::Parse {
            message: message.into(),
            lexeme: lexeme.into(),
            line,
        }
    }

    pub fn runtime(message: impl Into<String>, line: usize) -> Self {
        OscriptError::Runtime {
            message: message.into(),
            line,
        }
    }

    /// The source line this error occurred at, if any.
    pub fn line(&self) -> usize {
        match self {
            OscriptError::Scan { line, .. }
            | OscriptError::Parse { line, .. }
            | OscriptError::Runtime { line, .. } => *line,
        }
    }

    /// Exit code the CLI should use for this error, per spec: 65.
    pub fn exit_code(&self) -> i32 {
        65
    }
}

/// Either an O-script error or a `return` unwind in flight. Evaluator
/// internals propagate this with `?`; call sites catch `Control::Return`
/// and turn everything else into a plain `OscriptError` result.
#[derive(Debug, Clone)]
pub enum Control {
    Error(OscriptError),
    Return(crate::value::Value),
}

impl From<OscriptError> for Control {
    fn from(e: OscriptError) -> Self {
        Control::Error(e)
    }
}

pub type OResult<T> = Result<T, Control>;
