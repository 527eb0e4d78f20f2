//! The structured event trace.
//!
//! Every history-engine operation on every instance appends one
//! `TraceEvent` here, in the order it happened. The trace is owned by the
//! `Interpreter`, not a process-global, and is serialized to JSON on
//! request (`--trace PATH` or the REPL's `:trace` command).

use serde::Serialize;
use std::collections::HashMap;

/// A `{field: serialized-value}` snapshot of an object's field map at the
/// moment an event was recorded.
pub type FieldsAfter = HashMap<String, String>;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TraceEvent {
    #[serde(rename = "new")]
    New {
        object: String,
        step: u64,
        line: Option<usize>,
        fields_after: FieldsAfter,
    },
    #[serde(rename = "set")]
    Set {
        object: String,
        field: String,
        old: String,
        new: String,
        step: u64,
        line: Option<usize>,
        fields_after: FieldsAfter,
    },
    #[serde(rename = "undo")]
    Undo {
        object: String,
        field: String,
        old: String,
        new: String,
        rewinds_step: u64,
        step: u64,
        line: Option<usize>,
        fields_after: FieldsAfter,
    },
    #[serde(rename = "redo")]
    Redo {
        object: String,
        field: String,
        old: String,
        new: String,
        reapplies_step: u64,
        step: u64,
        line: Option<usize>,
        fields_after: FieldsAfter,
    },
    #[serde(rename = "checkpoint")]
    Checkpoint {
        object: String,
        name: String,
        step: u64,
        line: Option<usize>,
        fields_after: FieldsAfter,
    },
    #[serde(rename = "rollback")]
    Rollback {
        object: String,
        name: String,
        step: u64,
        line: Option<usize>,
        fields_after: FieldsAfter,
    },
}

/// Holds the ordered sequence of events emitted during one interpreter
/// session, ready to render as a JSON array sorted by step.
#[derive(Default)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub fn new() -> Self {
        Trace { events: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Trace {
            events: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, event: TraceEvent) {
        log::trace!("trace event recorded: {:?}", event);
        self.events.push(event);
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
