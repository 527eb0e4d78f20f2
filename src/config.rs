//! Interpreter configuration.

/// Tunables that change how the history engine behaves without changing
/// what a program computes. `max_history` is the only one a running
/// program can observe (via how far `undo()` can reach); everything else
/// only affects diagnostics.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Maximum number of past patches retained per instance. `None` means
    /// unbounded, matching the language's documented default.
    pub max_history: Option<usize>,
    /// Initial capacity hint for the trace's event buffer.
    pub trace_capacity_hint: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_history: None,
            trace_capacity_hint: 256,
        }
    }
}
