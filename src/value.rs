//! Runtime values.
//!
//! `Value` is the single dynamically-typed value every O-script expression
//! evaluates to. Classes, functions and instances are reference types:
//! cloning a `Value` never deep-copies the class/function body or an
//! instance's field map, it clones an `Rc` handle to the same one.

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::error::{Control, OResult, OscriptError};
use crate::instance::Instance;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type NativeFn = fn(&mut crate::interpreter::Interpreter, &[Value], usize) -> OResult<Value>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Class(Rc<Class>),
    Function(Rc<Function>),
    Native(Rc<NativeFunction>),
    Instance(Rc<RefCell<Instance>>),
    /// A time-travel method (`undo`, `checkpoint`, ...) bound to the
    /// instance it was looked up on.
    BoundBuiltin(Rc<RefCell<Instance>>, BuiltinMethod),
    /// Produced only by built-in methods such as `history()`; there is no
    /// source-level list literal.
    List(Rc<Vec<Value>>),
    /// Produced only by built-in methods such as `history()`'s per-entry
    /// records; there is no source-level map literal.
    Map(Rc<Vec<(String, Value)>>),
}

impl Value {
    /// Only `nil` and `false` are falsy; every other value, including `0`
    /// and `""`, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Class(_) => "class",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Instance(_) => "instance",
            Value::BoundBuiltin(_, _) => "function",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// The detailed tag `type(v)` reports: plain names for primitives,
    /// `class(Name)`/`instance(Name)` for the two reference types whose
    /// name matters, `native_function` for built-ins and bound time-travel
    /// methods (e.g. `c.undo`) alike, vs. `function` for user-defined/
    /// user-method values.
    pub fn type_of(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::String(_) => "string".to_string(),
            Value::Class(c) => format!("class({})", c.name),
            Value::Instance(i) => format!("instance({})", i.borrow().class.name),
            Value::Function(_) => "function".to_string(),
            Value::Native(_) | Value::BoundBuiltin(_, _) => "native_function".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Map(_) => "map".to_string(),
        }
    }

    /// `==`/`!=` semantics: numbers/strings/bools/nil compare structurally,
    /// everything else (class, function, instance) compares by identity.
    pub fn is_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::BoundBuiltin(a, m1), Value::BoundBuiltin(b, m2)) => {
                Rc::ptr_eq(a, b) && m1 == m2
            }
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The textual form `print`, `str(...)`, and trace `fields_after` use.
    pub fn serialize(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Class(c) => format!("<class {}>", c.name),
            Value::Function(f) => format!("<fn {}>", f.declaration.name.lexeme),
            Value::Native(n) => format!("<native fn {}>", n.name),
            Value::Instance(i) => {
                let inst = i.borrow();
                format!("<{}#{}>", inst.class.name, inst.id)
            }
            Value::BoundBuiltin(_, m) => format!("<native fn {}>", m.name()),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| json_fragment(v)).collect();
                format!("[{}]", parts.join(","))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{:?}:{}", k, json_fragment(v)))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
        }
    }
}

/// Renders a value the way it appears nested inside a serialized list/map,
/// matching `json.dumps` compact-separator output: strings get quoted.
fn json_fragment(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        other => other.serialize(),
    }
}

/// Formats a number the way O-script's serializer does: integral values
/// print without a decimal point, everything else prints as-is.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

/// A user-defined function or bound method: its declaration plus the
/// environment it closed over.
pub struct Function {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Binds `this` to `instance`, producing the method value actually
    /// invoked by `instance.method(...)`.
    pub fn bind(self: &Rc<Self>, instance: Value) -> Function {
        let env = Environment::with_enclosing(Rc::clone(&self.closure));
        env.borrow_mut().define("this", instance);
        Function {
            declaration: Rc::clone(&self.declaration),
            closure: env,
            is_initializer: self.is_initializer,
        }
    }
}

/// A native (Rust-implemented) global function such as `clock` or `len`.
pub struct NativeFunction {
    pub name: String,
    pub arity: Option<usize>,
    pub func: NativeFn,
}

/// A class: a name and a table of method declarations, each bound lazily
/// to an instance when looked up via `Instance::get`.
pub struct Class {
    pub name: String,
    pub methods: HashMap<String, Rc<FunctionDecl>>,
    /// The environment the class was declared in; methods close over it.
    pub closure: Rc<RefCell<Environment>>,
}

impl Class {
    pub fn find_method(&self, name: &str) -> Option<Rc<FunctionDecl>> {
        self.methods.get(name).cloned()
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map(|m| m.params.len()).unwrap_or(0)
    }
}

/// The virtual time-travel methods every instance exposes in addition to
/// its declared fields and methods, resolved only after both of those miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMethod {
    Undo,
    Redo,
    History,
    Checkpoint,
    Rollback,
    Checkpoints,
    Id,
}

impl BuiltinMethod {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinMethod::Undo => "undo",
            BuiltinMethod::Redo => "redo",
            BuiltinMethod::History => "history",
            BuiltinMethod::Checkpoint => "checkpoint",
            BuiltinMethod::Rollback => "rollback",
            BuiltinMethod::Checkpoints => "checkpoints",
            BuiltinMethod::Id => "id",
        }
    }

    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "undo" => BuiltinMethod::Undo,
            "redo" => BuiltinMethod::Redo,
            "history" => BuiltinMethod::History,
            "checkpoint" => BuiltinMethod::Checkpoint,
            "rollback" => BuiltinMethod::Rollback,
            "checkpoints" => BuiltinMethod::Checkpoints,
            "id" => BuiltinMethod::Id,
            _ => return None,
        })
    }

    pub fn arity(self) -> usize {
        match self {
            BuiltinMethod::Checkpoint | BuiltinMethod::Rollback => 1,
            _ => 0,
        }
    }
}

pub fn check_number(value: &Value, line: usize) -> Result<f64, Control> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(OscriptError::runtime("Operand must be a number.", line).into()),
    }
}
