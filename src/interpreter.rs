//! The tree-walking evaluator.
//!
//! Holds the global/lexical scope chain, the monotonic step counter, the
//! object-id counter, and the session's event trace. One `Interpreter`
//! lives for the whole process in file mode, or for the whole session in
//! the REPL, so state (and undo/redo history) persists across statements.

use crate::ast::{Expr, FunctionDecl, LiteralValue, Stmt};
use crate::config::InterpreterConfig;
use crate::environment::Environment;
use crate::error::{Control, OResult, OscriptError};
use crate::instance::{HistoryOutcome, Instance};
use crate::stdlib;
use crate::token::{Token, TokenKind};
use crate::trace::{Trace, TraceEvent};
use crate::value::{check_number, BuiltinMethod, Class, Function, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    step: u64,
    next_obj_id: u64,
    pub trace: Trace,
    pub config: InterpreterConfig,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        log::debug!("constructing interpreter, max_history={:?}", config.max_history);
        let globals = Environment::new_global();
        stdlib::install(&globals);
        let trace = Trace::with_capacity(config.trace_capacity_hint);
        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            step: 0,
            next_obj_id: 1,
            trace,
            config,
        }
    }

    pub fn next_step(&mut self) -> u64 {
        self.step += 1;
        self.step
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_obj_id;
        self.next_obj_id += 1;
        id
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), OscriptError> {
        for stmt in statements {
            if let Err(control) = self.execute(stmt) {
                return Err(match control {
                    Control::Error(e) => e,
                    Control::Return(_) => {
                        OscriptError::runtime("'return' outside of a function.", 0)
                    }
                });
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> OResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                println!("{}", value.serialize());
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::Block(statements) => {
                let inner = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, inner)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute(branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
            Stmt::Function(decl) => {
                let function = Function {
                    declaration: Rc::clone(decl),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                };
                self.environment
                    .borrow_mut()
                    .define(decl.name.lexeme.clone(), Value::Function(Rc::new(function)));
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Err(Control::Return(value))
            }
            Stmt::Class { name, methods } => {
                let mut table: HashMap<String, Rc<FunctionDecl>> = HashMap::new();
                for method in methods {
                    table.insert(method.name.lexeme.clone(), Rc::clone(method));
                }
                let class = Rc::new(Class {
                    name: name.lexeme.clone(),
                    methods: table,
                    closure: Rc::clone(&self.environment),
                });
                self.environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), Value::Class(class));
                Ok(())
            }
        }
    }

    /// Runs `statements` with `self.environment` temporarily swapped to
    /// `env`, restoring the previous environment whether or not execution
    /// succeeds — the tree-walking equivalent of a try/finally block.
    fn execute_block(&mut self, statements: &[Stmt], env: Rc<RefCell<Environment>>) -> OResult<()> {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = (|| {
            for stmt in statements {
                self.execute(stmt)?;
            }
            Ok(())
        })();
        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> OResult<Value> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::String(s) => Value::String(s.clone()),
            }),
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),
            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),
            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right),
            Expr::Variable(name) => self.environment.borrow().get(&name.lexeme, name.line),
            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.environment
                    .borrow_mut()
                    .assign(&name.lexeme, value.clone(), name.line)?;
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),
            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;
                self.get_property(object, name)
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;
                let value = self.evaluate(value)?;
                self.set_property(object, name, value)
            }
            Expr::This(token) => self.environment.borrow().get(&token.lexeme, token.line),
            Expr::New {
                class_name,
                arguments,
            } => self.evaluate_new(class_name, arguments),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> OResult<Value> {
        let value = self.evaluate(right)?;
        match operator.kind {
            TokenKind::Minus => Ok(Value::Number(-check_number(&value, operator.line)?)),
            TokenKind::Bang => Ok(Value::Bool(!value.is_truthy())),
            _ => unreachable!("parser only emits Minus/Bang as unary operators"),
        }
    }

    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> OResult<Value> {
        let left = self.evaluate(left)?;
        if operator.kind == TokenKind::Or {
            if left.is_truthy() {
                return Ok(left);
            }
        } else if !left.is_truthy() {
            return Ok(left);
        }
        self.evaluate(right)
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> OResult<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        let line = operator.line;
        match operator.kind {
            TokenKind::Plus => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                _ => Err(OscriptError::runtime(
                    "Operands must be two numbers or two strings.",
                    line,
                )
                .into()),
            },
            TokenKind::Minus => {
                Ok(Value::Number(check_number(&left, line)? - check_number(&right, line)?))
            }
            TokenKind::Star => {
                Ok(Value::Number(check_number(&left, line)? * check_number(&right, line)?))
            }
            TokenKind::Slash => {
                let divisor = check_number(&right, line)?;
                if divisor == 0.0 {
                    return Err(OscriptError::runtime("Division by zero.", line).into());
                }
                Ok(Value::Number(check_number(&left, line)? / divisor))
            }
            TokenKind::Greater => {
                Ok(Value::Bool(check_number(&left, line)? > check_number(&right, line)?))
            }
            TokenKind::GreaterEqual => {
                Ok(Value::Bool(check_number(&left, line)? >= check_number(&right, line)?))
            }
            TokenKind::Less => {
                Ok(Value::Bool(check_number(&left, line)? < check_number(&right, line)?))
            }
            TokenKind::LessEqual => {
                Ok(Value::Bool(check_number(&left, line)? <= check_number(&right, line)?))
            }
            TokenKind::BangEqual => Ok(Value::Bool(!left.is_equal(&right))),
            TokenKind::EqualEqual => Ok(Value::Bool(left.is_equal(&right))),
            _ => unreachable!("parser only emits arithmetic/comparison tokens as binary operators"),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> OResult<Value> {
        let callee_value = self.evaluate(callee)?;
        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate(arg)?);
        }
        match callee_value {
            Value::Function(f) => self.call_function(&f, args, paren.line),
            Value::Native(n) => {
                if let Some(arity) = n.arity {
                    if args.len() != arity {
                        return Err(OscriptError::runtime(
                            format!("Expected {} arguments but got {}.", arity, args.len()),
                            paren.line,
                        )
                        .into());
                    }
                }
                (n.func)(self, &args, paren.line)
            }
            Value::BoundBuiltin(instance, method) => {
                self.call_builtin_method(instance, method, &args, paren.line)
            }
            _ => Err(OscriptError::runtime("Can only call functions and classes.", paren.line).into()),
        }
    }

    pub fn call_function(&mut self, f: &Rc<Function>, args: Vec<Value>, line: usize) -> OResult<Value> {
        if args.len() != f.arity() {
            return Err(OscriptError::runtime(
                format!("Expected {} arguments but got {}.", f.arity(), args.len()),
                line,
            )
            .into());
        }
        let env = Environment::with_enclosing(Rc::clone(&f.closure));
        for (param, arg) in f.declaration.params.iter().zip(args.into_iter()) {
            env.borrow_mut().define(param.lexeme.clone(), arg);
        }
        match self.execute_block(&f.declaration.body, env) {
            Ok(()) => {
                if f.is_initializer {
                    f.closure.borrow().get("this", line)
                } else {
                    Ok(Value::Nil)
                }
            }
            Err(Control::Return(value)) => {
                if f.is_initializer {
                    f.closure.borrow().get("this", line)
                } else {
                    Ok(value)
                }
            }
            Err(err) => Err(err),
        }
    }

    fn evaluate_new(&mut self, class_name: &Token, arguments: &[Expr]) -> OResult<Value> {
        let callee = self.environment.borrow().get(&class_name.lexeme, class_name.line)?;
        let class = match callee {
            Value::Class(class) => class,
            _ => {
                return Err(OscriptError::runtime(
                    format!("'{}' is not a class.", class_name.lexeme),
                    class_name.line,
                )
                .into())
            }
        };
        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate(arg)?);
        }
        if args.len() != class.arity() {
            return Err(OscriptError::runtime(
                format!("Expected {} arguments but got {}.", class.arity(), args.len()),
                class_name.line,
            )
            .into());
        }
        let id = self.next_id();
        log::debug!("allocating {}#{}", class.name, id);
        let instance = Rc::new(RefCell::new(Instance::new(
            Rc::clone(&class),
            id,
            self.config.max_history,
        )));
        let step = self.next_step();
        let object = format!("{}#{}", class.name, id);
        self.trace.record(TraceEvent::New {
            object,
            step,
            line: None,
            fields_after: HashMap::new(),
        });
        if let Some(init) = class.find_method("init") {
            let bound = bind_method(&init, &class, Value::Instance(Rc::clone(&instance)), true);
            self.call_function(&Rc::new(bound), args, class_name.line)?;
        }
        Ok(Value::Instance(instance))
    }

    fn get_property(&mut self, object: Value, name: &Token) -> OResult<Value> {
        let instance = match object {
            Value::Instance(inst) => inst,
            _ => {
                return Err(
                    OscriptError::runtime("Only instances have properties.", name.line).into(),
                )
            }
        };
        {
            let inst_ref = instance.borrow();
            if let Some(value) = inst_ref.get_field(&name.lexeme) {
                return Ok(value);
            }
            if let Some(decl) = inst_ref.class.find_method(&name.lexeme) {
                let class = Rc::clone(&inst_ref.class);
                drop(inst_ref);
                let bound = bind_method(&decl, &class, Value::Instance(Rc::clone(&instance)), decl.name.lexeme == "init");
                return Ok(Value::Function(Rc::new(bound)));
            }
        }
        // Virtual time-travel surface, resolved only once neither a real
        // field nor a real method matched.
        if let Some(method) = BuiltinMethod::lookup(&name.lexeme) {
            return Ok(Value::BoundBuiltin(instance, method));
        }
        Err(OscriptError::runtime(
            format!("Undefined property '{}'.", name.lexeme),
            name.line,
        )
        .into())
    }

    fn set_property(&mut self, object: Value, name: &Token, value: Value) -> OResult<Value> {
        let instance = match object {
            Value::Instance(inst) => inst,
            _ => return Err(OscriptError::runtime("Only instances have fields.", name.line).into()),
        };
        let step = self.next_step();
        let outcome = instance
            .borrow_mut()
            .set_field(&name.lexeme, value.clone(), step, name.line);
        log::trace!(
            "set {}.{} at step {}",
            object_label(&instance),
            name.lexeme,
            step
        );
        self.record_instance_event(&instance, outcome, Some(name.line));
        Ok(value)
    }

    fn call_builtin_method(
        &mut self,
        instance: Rc<RefCell<Instance>>,
        method: BuiltinMethod,
        args: &[Value],
        line: usize,
    ) -> OResult<Value> {
        if args.len() != method.arity() {
            return Err(OscriptError::runtime(
                format!("Expected {} arguments but got {}.", method.arity(), args.len()),
                line,
            )
            .into());
        }
        match method {
            BuiltinMethod::Undo => {
                // Empty past is a documented no-op: no step allocated, no
                // trace event, just nil.
                if let Some(outcome) = instance.borrow_mut().undo() {
                    let step = self.next_step();
                    log::trace!("undo on {} at step {}", object_label(&instance), step);
                    self.record_instance_event(&instance, outcome.with_step(step), Some(line));
                }
                Ok(Value::Nil)
            }
            BuiltinMethod::Redo => {
                // Empty future is a documented no-op, same as undo above.
                if let Some(outcome) = instance.borrow_mut().redo() {
                    let step = self.next_step();
                    log::trace!("redo on {} at step {}", object_label(&instance), step);
                    self.record_instance_event(&instance, outcome.with_step(step), Some(line));
                }
                Ok(Value::Nil)
            }
            BuiltinMethod::History => Ok(instance.borrow().history()),
            BuiltinMethod::Checkpoints => Ok(instance.borrow().checkpoints()),
            BuiltinMethod::Id => Ok(Value::Number(instance.borrow().id as f64)),
            BuiltinMethod::Checkpoint => {
                let name = label_to_string(&args[0]);
                let step = self.next_step();
                let outcome = instance.borrow_mut().checkpoint(&name, step);
                log::trace!("checkpoint '{}' on {} at step {}", name, object_label(&instance), step);
                self.record_instance_event(&instance, outcome, Some(line));
                Ok(Value::Nil)
            }
            BuiltinMethod::Rollback => {
                let name = label_to_string(&args[0]);
                let step = self.next_step();
                let outcome = instance.borrow_mut().rollback(&name, step, line)?;
                log::trace!("rollback '{}' on {} at step {}", name, object_label(&instance), step);
                self.record_instance_event(&instance, outcome, Some(line));
                Ok(Value::Nil)
            }
        }
    }

    fn record_instance_event(
        &mut self,
        instance: &Rc<RefCell<Instance>>,
        outcome: HistoryOutcome,
        line: Option<usize>,
    ) {
        let inst = instance.borrow();
        let object = format!("{}#{}", inst.class.name, inst.id);
        let fields_after: HashMap<String, String> = inst
            .fields_snapshot()
            .into_iter()
            .map(|(k, v)| (k, v.serialize()))
            .collect();
        drop(inst);
        let event = match outcome {
            HistoryOutcome::Set {
                field,
                old,
                new,
                step,
            } => TraceEvent::Set {
                object,
                field,
                old,
                new,
                step,
                line,
                fields_after,
            },
            HistoryOutcome::Undo {
                field,
                old,
                new,
                rewinds_step,
                step,
            } => TraceEvent::Undo {
                object,
                field,
                old,
                new,
                rewinds_step,
                step,
                line,
                fields_after,
            },
            HistoryOutcome::Redo {
                field,
                old,
                new,
                reapplies_step,
                step,
            } => TraceEvent::Redo {
                object,
                field,
                old,
                new,
                reapplies_step,
                step,
                line,
                fields_after,
            },
            HistoryOutcome::Checkpoint { name, step } => TraceEvent::Checkpoint {
                object,
                name,
                step,
                line,
                fields_after,
            },
            HistoryOutcome::Rollback { name, step } => TraceEvent::Rollback {
                object,
                name,
                step,
                line,
                fields_after,
            },
        };
        self.trace.record(event);
    }
}

fn object_label(instance: &Rc<RefCell<Instance>>) -> String {
    let inst = instance.borrow();
    format!("{}#{}", inst.class.name, inst.id)
}

fn bind_method(decl: &Rc<FunctionDecl>, class: &Rc<Class>, this: Value, is_initializer: bool) -> Function {
    let env = Environment::with_enclosing(Rc::clone(&class.closure));
    env.borrow_mut().define("this", this);
    Function {
        declaration: Rc::clone(decl),
        closure: env,
        is_initializer,
    }
}

/// `checkpoint`/`rollback` accept any value as a label: a string is used
/// as-is, anything else is coerced through the value serializer (§4.4).
fn label_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.serialize(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(src: &str) -> Interpreter {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let stmts = parse(src).unwrap();
        interp.interpret(&stmts).unwrap();
        interp
    }

    #[test]
    fn field_write_then_undo_round_trips() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let stmts = parse(
            "class Counter { fun init(v) { this.value = v; } } var c = new Counter(0); c.value = 5; c.undo();",
        )
        .unwrap();
        interp.interpret(&stmts).unwrap();
        let value = interp.globals.borrow().get("c", 1).unwrap();
        match value {
            Value::Instance(inst) => {
                assert!(matches!(inst.borrow().get_field("value"), Some(Value::Number(n)) if n == 0.0));
            }
            _ => panic!("expected instance"),
        }
    }

    #[test]
    fn checkpoint_and_rollback_are_one_undo_step() {
        let interp = run(
            "class Box { fun init(v) { this.value = v; } }\n\
             var b = new Box(1);\n\
             b.checkpoint(\"c\");\n\
             b.value = 2;\n\
             b.rollback(\"c\");\n\
             b.undo();",
        );
        let value = interp.globals.borrow().get("b", 1).unwrap();
        match value {
            Value::Instance(inst) => {
                assert!(matches!(inst.borrow().get_field("value"), Some(Value::Number(n)) if n == 2.0));
            }
            _ => panic!("expected instance"),
        }
    }

    #[test]
    fn checkpoint_and_rollback_coerce_non_string_labels() {
        let interp = run(
            "class Box { fun init(v) { this.value = v; } }\n\
             var b = new Box(1);\n\
             b.checkpoint(5);\n\
             b.value = 2;\n\
             b.rollback(5);",
        );
        let value = interp.globals.borrow().get("b", 1).unwrap();
        match value {
            Value::Instance(inst) => {
                assert!(matches!(inst.borrow().get_field("value"), Some(Value::Number(n)) if n == 1.0));
            }
            _ => panic!("expected instance"),
        }
    }

    #[test]
    fn first_instance_id_is_one() {
        let interp = run("class C { fun init() {} } var c = new C();");
        let value = interp.globals.borrow().get("c", 1).unwrap();
        match value {
            Value::Instance(inst) => assert_eq!(inst.borrow().id, 1),
            _ => panic!("expected instance"),
        }
    }

    #[test]
    fn division_by_zero_is_runtime_error() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let stmts = parse("var x = 1 / 0;").unwrap();
        assert!(interp.interpret(&stmts).is_err());
    }

    #[test]
    fn undefined_variable_is_runtime_error() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let stmts = parse("print missing;").unwrap();
        assert!(interp.interpret(&stmts).is_err());
    }

    #[test]
    fn method_return_value_flows_to_caller() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let stmts = parse(
            "class Box { fun init(v) { this.value = v; } fun get() { return this.value; } } var b = new Box(7); var r = b.get();",
        )
        .unwrap();
        interp.interpret(&stmts).unwrap();
        let r = interp.globals.borrow().get("r", 1).unwrap();
        assert!(matches!(r, Value::Number(n) if n == 7.0));
    }
}
