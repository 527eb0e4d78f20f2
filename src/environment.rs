//! Lexical scope chain.
//!
//! Each `Environment` is one block/function/method scope. Lookups walk the
//! `enclosing` chain outward to globals; `define` always creates a binding
//! in the current scope, `assign` requires the name already exist somewhere
//! on the chain.

use crate::error::{Control, OscriptError};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new_global() -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: None,
        }))
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }))
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value, Control> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        if let Some(parent) = &self.enclosing {
            return parent.borrow().get(name, line);
        }
        Err(OscriptError::runtime(format!("Undefined variable '{}'.", name), line).into())
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<(), Control> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            return Ok(());
        }
        if let Some(parent) = &self.enclosing {
            return parent.borrow_mut().assign(name, value, line);
        }
        Err(OscriptError::runtime(format!("Undefined variable '{}'.", name), line).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_walks_enclosing_chain() {
        let global = Environment::new_global();
        global.borrow_mut().define("x", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&global));
        assert!(matches!(inner.borrow().get("x", 1), Ok(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn assign_requires_existing_binding() {
        let global = Environment::new_global();
        let err = global.borrow_mut().assign("missing", Value::Nil, 1);
        assert!(err.is_err());
    }

    #[test]
    fn assign_updates_in_defining_scope() {
        let global = Environment::new_global();
        global.borrow_mut().define("x", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&global));
        inner.borrow_mut().assign("x", Value::Number(2.0), 1).unwrap();
        assert!(matches!(global.borrow().get("x", 1), Ok(Value::Number(n)) if n == 2.0));
    }
}
