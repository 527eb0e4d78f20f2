//! Native global functions: `clock`, `str`, `type`, `len`, `input`, `assert`.
//!
//! Each is installed into the global environment at interpreter
//! construction time, matching how user-defined top-level functions are
//! resolved — there is no separate built-in lookup path.

use crate::environment::Environment;
use crate::error::{OResult, OscriptError};
use crate::value::{NativeFunction, Value};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn install(globals: &Rc<RefCell<Environment>>) {
    define_native(globals, "clock", Some(0), native_clock);
    define_native(globals, "str", Some(1), native_str);
    define_native(globals, "type", Some(1), native_type);
    define_native(globals, "len", Some(1), native_len);
    define_native(globals, "input", None, native_input);
    define_native(globals, "assert", None, native_assert);
}

fn define_native(
    globals: &Rc<RefCell<Environment>>,
    name: &str,
    arity: Option<usize>,
    func: crate::value::NativeFn,
) {
    let native = NativeFunction {
        name: name.to_string(),
        arity,
        func,
    };
    globals
        .borrow_mut()
        .define(name, Value::Native(Rc::new(native)));
}

fn native_clock(_interp: &mut crate::interpreter::Interpreter, _args: &[Value], _line: usize) -> OResult<Value> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(Value::Number(secs))
}

fn native_str(_interp: &mut crate::interpreter::Interpreter, args: &[Value], _line: usize) -> OResult<Value> {
    Ok(Value::String(args[0].serialize()))
}

fn native_type(_interp: &mut crate::interpreter::Interpreter, args: &[Value], _line: usize) -> OResult<Value> {
    Ok(Value::String(args[0].type_of()))
}

fn native_len(_interp: &mut crate::interpreter::Interpreter, args: &[Value], line: usize) -> OResult<Value> {
    match &args[0] {
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
        Value::List(items) => Ok(Value::Number(items.len() as f64)),
        Value::Map(entries) => Ok(Value::Number(entries.len() as f64)),
        other => {
            log::warn!("len() called on unsupported type '{}' at line {}", other.type_name(), line);
            Err(OscriptError::runtime("len(x) only works on strings, lists, and dicts.", line).into())
        }
    }
}

fn native_input(_interp: &mut crate::interpreter::Interpreter, args: &[Value], line: usize) -> OResult<Value> {
    if args.len() > 1 {
        return Err(OscriptError::runtime(
            format!("Expected 0 or 1 arguments but got {}.", args.len()),
            line,
        )
        .into());
    }
    if let Some(prompt) = args.first() {
        print!("{}", prompt.serialize());
        io::stdout().flush().ok();
    }
    let mut line_in = String::new();
    io::stdin()
        .read_line(&mut line_in)
        .map_err(|e| OscriptError::runtime(format!("Failed to read input: {}", e), line))?;
    if line_in.ends_with('\n') {
        line_in.pop();
        if line_in.ends_with('\r') {
            line_in.pop();
        }
    }
    Ok(Value::String(line_in))
}

fn native_assert(_interp: &mut crate::interpreter::Interpreter, args: &[Value], line: usize) -> OResult<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(OscriptError::runtime(
            format!("Expected 1 or 2 arguments but got {}.", args.len()),
            line,
        )
        .into());
    }
    if !args[0].is_truthy() {
        let message = args
            .get(1)
            .map(|v| v.serialize())
            .unwrap_or_else(|| "Assertion failed.".to_string());
        log::warn!("assertion failed at line {}: {}", line, message);
        return Err(OscriptError::runtime(message, line).into());
    }
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpreterConfig;
    use crate::interpreter::Interpreter;
    use crate::parser::parse;

    fn eval_one(src: &str) -> Value {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let stmts = parse(&format!("var __r = {};", src)).unwrap();
        interp.interpret(&stmts).unwrap();
        interp.globals.borrow().get("__r", 1).unwrap()
    }

    #[test]
    fn type_reports_number_and_string() {
        assert!(matches!(eval_one("type(1)"), Value::String(s) if s == "number"));
        assert!(matches!(eval_one("type(\"x\")"), Value::String(s) if s == "string"));
    }

    #[test]
    fn type_reports_class_and_instance_with_name() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let stmts = parse(
            "class Point { fun init() {} } var k = type(Point); var p = type(new Point());",
        )
        .unwrap();
        interp.interpret(&stmts).unwrap();
        assert!(matches!(interp.globals.borrow().get("k", 1).unwrap(), Value::String(s) if s == "class(Point)"));
        assert!(matches!(interp.globals.borrow().get("p", 1).unwrap(), Value::String(s) if s == "instance(Point)"));
    }

    #[test]
    fn type_reports_native_function_for_bound_builtin_method() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let stmts = parse(
            "class Point { fun init() {} } var p = new Point(); var t = type(p.undo);",
        )
        .unwrap();
        interp.interpret(&stmts).unwrap();
        assert!(matches!(interp.globals.borrow().get("t", 1).unwrap(), Value::String(s) if s == "native_function"));
    }

    #[test]
    fn len_of_string_counts_chars() {
        assert!(matches!(eval_one("len(\"abc\")"), Value::Number(n) if n == 3.0));
    }

    #[test]
    fn str_formats_nil_and_bool() {
        assert!(matches!(eval_one("str(nil)"), Value::String(s) if s == "nil"));
        assert!(matches!(eval_one("str(true)"), Value::String(s) if s == "true"));
    }

    #[test]
    fn assert_false_raises_runtime_error() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let stmts = parse("assert(false, \"boom\");").unwrap();
        let err = interp.interpret(&stmts).unwrap_err();
        assert!(matches!(err, OscriptError::Runtime { .. }));
    }
}
