//! The per-object history engine.
//!
//! Every field write on an `Instance` is recorded as a `Patch` before it is
//! applied. `undo`/`redo` walk that patch stack; `checkpoint`/`rollback`
//! snapshot and restore the whole field map as a single patch, so one
//! `undo` after a `rollback` un-does the entire rollback in one step.

use crate::error::{Control, OscriptError};
use crate::value::{Class, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// Marks a patch whose `old`/`new` are whole-field-map snapshots rather
/// than a single field's before/after value. Used only by `rollback`.
const SNAPSHOT_FIELD: &str = "__snapshot__";

/// A field's value at a point in a patch, including "the field did not
/// exist yet" (O-script's `_UNDEFINED` sentinel — never user-visible).
#[derive(Clone)]
pub enum PatchData {
    Undefined,
    Value(Value),
    Snapshot(HashMap<String, Value>),
}

impl PatchData {
    fn serialize(&self) -> String {
        match self {
            PatchData::Undefined => "<undefined>".to_string(),
            PatchData::Value(v) => v.serialize(),
            PatchData::Snapshot(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{:?}:{}", k, v.serialize()))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
        }
    }
}

/// One recorded mutation: the field touched, its value before and after,
/// the global step it happened at, and the source line (rollback/new carry
/// no single line, so this is optional at the instance level too).
#[derive(Clone)]
pub struct Patch {
    pub field: String,
    pub old: PatchData,
    pub new: PatchData,
    pub step: u64,
    pub line: Option<usize>,
}

pub struct Instance {
    pub class: Rc<Class>,
    pub id: u64,
    pub fields: HashMap<String, Value>,
    past: Vec<Patch>,
    future: Vec<Patch>,
    checkpoints: HashMap<String, HashMap<String, Value>>,
    max_history: Option<usize>,
}

/// What happened during a history-engine operation, for the interpreter to
/// fold into a `TraceEvent`.
pub enum HistoryOutcome {
    Set {
        field: String,
        old: String,
        new: String,
        step: u64,
    },
    /// `step` is filled in by the interpreter once it knows the operation
    /// actually did something (an empty past stack allocates no step).
    Undo {
        field: String,
        old: String,
        new: String,
        rewinds_step: u64,
        step: u64,
    },
    /// `step` is filled in by the interpreter, as for `Undo`.
    Redo {
        field: String,
        old: String,
        new: String,
        reapplies_step: u64,
        step: u64,
    },
    Checkpoint {
        name: String,
        step: u64,
    },
    Rollback {
        name: String,
        step: u64,
    },
}

impl HistoryOutcome {
    /// Backfills the caller-allocated step onto an `Undo`/`Redo` outcome
    /// built before a step number was known to be needed.
    pub fn with_step(mut self, step: u64) -> Self {
        match &mut self {
            HistoryOutcome::Undo { step: s, .. } | HistoryOutcome::Redo { step: s, .. } => *s = step,
            _ => {}
        }
        self
    }
}

impl Instance {
    pub fn new(class: Rc<Class>, id: u64, max_history: Option<usize>) -> Self {
        Instance {
            class,
            id,
            fields: HashMap::new(),
            past: Vec::new(),
            future: Vec::new(),
            checkpoints: HashMap::new(),
            max_history,
        }
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    pub fn set_field(
        &mut self,
        field: &str,
        value: Value,
        step: u64,
        line: usize,
    ) -> HistoryOutcome {
        let old = match self.fields.get(field) {
            Some(v) => PatchData::Value(v.clone()),
            None => PatchData::Undefined,
        };
        let old_serialized = old.serialize();
        let new_serialized = value.serialize();
        self.past.push(Patch {
            field: field.to_string(),
            old,
            new: PatchData::Value(value.clone()),
            step,
            line: Some(line),
        });
        self.future.clear();
        self.fields.insert(field.to_string(), value);
        self.trim_past();
        HistoryOutcome::Set {
            field: field.to_string(),
            old: old_serialized,
            new: new_serialized,
            step,
        }
    }

    /// `None` when the past stack is empty: a no-op, per spec (no event,
    /// no step consumed by the caller's record path).
    pub fn undo(&mut self) -> Option<HistoryOutcome> {
        let patch = self.past.pop()?;
        self.apply_reverse(&patch);
        let rewinds_step = patch.step;
        let field = patch.field.clone();
        let old = patch.new.serialize();
        let new = patch.old.serialize();
        self.future.push(patch);
        Some(HistoryOutcome::Undo {
            field,
            old,
            new,
            rewinds_step,
            step: 0,
        })
    }

    /// `None` when the future stack is empty: a no-op, per spec.
    pub fn redo(&mut self) -> Option<HistoryOutcome> {
        let patch = self.future.pop()?;
        self.apply_forward(&patch);
        let reapplies_step = patch.step;
        let field = patch.field.clone();
        let old = patch.old.serialize();
        let new = patch.new.serialize();
        self.past.push(patch);
        self.trim_past();
        Some(HistoryOutcome::Redo {
            field,
            old,
            new,
            reapplies_step,
            step: 0,
        })
    }

    pub fn checkpoint(&mut self, name: &str, step: u64) -> HistoryOutcome {
        self.checkpoints.insert(name.to_string(), self.fields.clone());
        HistoryOutcome::Checkpoint {
            name: name.to_string(),
            step,
        }
    }

    pub fn rollback(&mut self, name: &str, step: u64, line: usize) -> Result<HistoryOutcome, Control> {
        let target = self
            .checkpoints
            .get(name)
            .cloned()
            .ok_or_else(|| OscriptError::runtime(format!("No checkpoint named '{}'.", name), line))?;
        let old_snapshot = self.fields.clone();
        self.past.push(Patch {
            field: SNAPSHOT_FIELD.to_string(),
            old: PatchData::Snapshot(old_snapshot),
            new: PatchData::Snapshot(target.clone()),
            step,
            line: Some(line),
        });
        self.future.clear();
        self.fields = target;
        self.trim_past();
        Ok(HistoryOutcome::Rollback {
            name: name.to_string(),
            step,
        })
    }

    pub fn history(&self) -> Value {
        let entries: Vec<Value> = self
            .past
            .iter()
            .map(|p| {
                Value::Map(Rc::new(vec![
                    ("field".to_string(), Value::String(p.field.clone())),
                    ("old".to_string(), Value::String(p.old.serialize())),
                    ("new".to_string(), Value::String(p.new.serialize())),
                    ("step".to_string(), Value::Number(p.step as f64)),
                    (
                        "line".to_string(),
                        p.line.map(|l| Value::Number(l as f64)).unwrap_or(Value::Nil),
                    ),
                ]))
            })
            .collect();
        Value::List(Rc::new(entries))
    }

    pub fn checkpoints(&self) -> Value {
        let mut names: Vec<&String> = self.checkpoints.keys().collect();
        names.sort();
        Value::List(Rc::new(
            names.into_iter().map(|n| Value::String(n.clone())).collect(),
        ))
    }

    pub fn fields_snapshot(&self) -> HashMap<String, Value> {
        self.fields.clone()
    }

    fn apply_reverse(&mut self, patch: &Patch) {
        match &patch.old {
            PatchData::Snapshot(map) => self.fields = map.clone(),
            PatchData::Undefined => {
                self.fields.remove(&patch.field);
            }
            PatchData::Value(v) => {
                self.fields.insert(patch.field.clone(), v.clone());
            }
        }
    }

    fn apply_forward(&mut self, patch: &Patch) {
        match &patch.new {
            PatchData::Snapshot(map) => self.fields = map.clone(),
            PatchData::Undefined => {
                self.fields.remove(&patch.field);
            }
            PatchData::Value(v) => {
                self.fields.insert(patch.field.clone(), v.clone());
            }
        }
    }

    fn trim_past(&mut self) {
        if let Some(max) = self.max_history {
            while self.past.len() > max {
                self.past.remove(0);
            }
        }
    }
}
