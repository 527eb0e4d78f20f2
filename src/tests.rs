//! End-to-end scenarios and cross-cutting invariants, run against the
//! public `parse` + `Interpreter` surface rather than any one module's
//! internals.

#[cfg(test)]
mod end_to_end {
    use crate::config::InterpreterConfig;
    use crate::interpreter::Interpreter;
    use crate::parser::parse;
    use crate::value::Value;

    fn run(src: &str) -> Interpreter {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let statements = parse(src).expect("source should parse");
        interp.interpret(&statements).expect("source should run");
        interp
    }

    fn field_of(interp: &Interpreter, var: &str, field: &str) -> Option<Value> {
        match interp.globals.borrow().get(var, 1).unwrap() {
            Value::Instance(inst) => inst.borrow().get_field(field),
            _ => panic!("'{}' is not an instance", var),
        }
    }

    /// Scenario A: one undo rewinds the most recent write.
    #[test]
    fn scenario_a_single_undo_rewinds_last_write() {
        let interp = run(
            "class C { fun init(v) { this.x = v; } }\n\
             var c = new C(0);\n\
             c.x = 1;\n\
             c.x = 2;\n\
             c.undo();",
        );
        assert!(matches!(field_of(&interp, "c", "x"), Some(Value::Number(n)) if n == 1.0));
        assert_eq!(interp.trace.events().len(), 5); // new, set, set, set, undo
    }

    /// Scenario B: two undos then one redo reapplies the first undone step.
    #[test]
    fn scenario_b_redo_reapplies_first_undone_step() {
        let interp = run(
            "class C { fun init(v) { this.x = v; } }\n\
             var c = new C(0);\n\
             c.x = 1;\n\
             c.x = 2;\n\
             c.undo();\n\
             c.undo();\n\
             c.redo();",
        );
        assert!(matches!(field_of(&interp, "c", "x"), Some(Value::Number(n)) if n == 0.0));
    }

    /// Scenario C: rollback restores a checkpoint atomically, including
    /// removing a field that did not exist at checkpoint time; a single
    /// undo afterward restores both the removed field and the later write.
    #[test]
    fn scenario_c_rollback_removes_field_added_after_checkpoint() {
        let interp = run(
            "class P { fun init() {} }\n\
             var p = new P();\n\
             p.a = 1;\n\
             p.checkpoint(\"s\");\n\
             p.a = 2;\n\
             p.b = 9;\n\
             p.rollback(\"s\");",
        );
        assert!(matches!(field_of(&interp, "p", "a"), Some(Value::Number(n)) if n == 1.0));
        assert!(field_of(&interp, "p", "b").is_none());
    }

    #[test]
    fn scenario_c_continued_single_undo_restores_both_fields() {
        let interp = run(
            "class P { fun init() {} }\n\
             var p = new P();\n\
             p.a = 1;\n\
             p.checkpoint(\"s\");\n\
             p.a = 2;\n\
             p.b = 9;\n\
             p.rollback(\"s\");\n\
             p.undo();",
        );
        assert!(matches!(field_of(&interp, "p", "a"), Some(Value::Number(n)) if n == 2.0));
        assert!(matches!(field_of(&interp, "p", "b"), Some(Value::Number(n)) if n == 9.0));
    }

    /// Scenario D: undoing an increment restores the pre-increment value.
    #[test]
    fn scenario_d_undo_after_method_mutation() {
        let interp = run(
            "class Counter { fun init(v) { this.value = v; } fun inc() { this.value = this.value + 1; } }\n\
             var c = new Counter(0);\n\
             c.inc();\n\
             c.undo();",
        );
        assert!(matches!(field_of(&interp, "c", "value"), Some(Value::Number(n)) if n == 0.0));
    }

    /// Scenario E: division by zero is a runtime error.
    #[test]
    fn scenario_e_division_by_zero_is_runtime_error() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let statements = parse("print 1/0;").unwrap();
        let err = interp.interpret(&statements).unwrap_err();
        assert!(matches!(err, crate::error::OscriptError::Runtime { .. }));
    }

    /// Scenario F: rolling back to an unknown checkpoint is a runtime
    /// error, but the trace up to that point (the `new` event) survives.
    #[test]
    fn scenario_f_unknown_checkpoint_keeps_prior_trace() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let statements = parse(
            "class C { fun init(v) { this.x = v; } }\n\
             var c = new C(0);\n\
             c.rollback(\"nope\");",
        )
        .unwrap();
        let err = interp.interpret(&statements).unwrap_err();
        assert!(matches!(err, crate::error::OscriptError::Runtime { .. }));
        assert!(err.to_string().contains("No checkpoint named 'nope'"));
        assert_eq!(interp.trace.events().len(), 2); // new, set(x) from init
    }

    #[test]
    fn builtins_are_shadowed_by_user_fields_and_methods() {
        let interp = run(
            "class C { fun init() { this.id = 42; } }\n\
             var c = new C();",
        );
        assert!(matches!(field_of(&interp, "c", "id"), Some(Value::Number(n)) if n == 42.0));
    }

    #[test]
    fn instance_identity_is_stable_and_unique() {
        let interp = run(
            "class C { fun init() {} }\n\
             var a = new C();\n\
             var b = new C();\n\
             var ida = a.id();\n\
             var idb = b.id();",
        );
        // `id` is shadowed by nothing here, so it resolves to the
        // zero-arg built-in, returned as a call.
        let ida = interp.globals.borrow().get("ida", 1).unwrap();
        let idb = interp.globals.borrow().get("idb", 1).unwrap();
        match (ida, idb) {
            (Value::Number(a), Value::Number(b)) => assert_ne!(a, b),
            other => panic!("expected two numbers, got {:?}", other),
        }
    }
}

#[cfg(test)]
mod trace_invariants {
    use crate::config::InterpreterConfig;
    use crate::interpreter::Interpreter;
    use crate::parser::parse;
    use crate::trace::TraceEvent;
    use crate::value::Value;

    fn event_step(event: &TraceEvent) -> u64 {
        match event {
            TraceEvent::New { step, .. }
            | TraceEvent::Set { step, .. }
            | TraceEvent::Undo { step, .. }
            | TraceEvent::Redo { step, .. }
            | TraceEvent::Checkpoint { step, .. }
            | TraceEvent::Rollback { step, .. } => *step,
        }
    }

    /// Testable property 4: step numbers strictly increase across the
    /// whole trace, regardless of how many objects or operation kinds
    /// interleave.
    #[test]
    fn steps_strictly_increase_across_interleaved_objects() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let statements = parse(
            "class C { fun init(v) { this.x = v; } }\n\
             var a = new C(0);\n\
             var b = new C(0);\n\
             a.x = 1;\n\
             b.x = 1;\n\
             a.undo();\n\
             b.checkpoint(\"k\");\n\
             a.redo();\n\
             b.rollback(\"k\");",
        )
        .unwrap();
        interp.interpret(&statements).unwrap();
        let steps: Vec<u64> = interp.trace.events().iter().map(event_step).collect();
        for pair in steps.windows(2) {
            assert!(pair[1] > pair[0], "steps not strictly increasing: {:?}", steps);
        }
    }

    /// Testable property 5: a `set` after a nonempty future clears it — a
    /// `redo` after that new set is a no-op (field keeps the later value).
    #[test]
    fn set_after_undo_clears_future_stack() {
        let mut interp = Interpreter::new(InterpreterConfig::default());
        let statements = parse(
            "class C { fun init(v) { this.x = v; } }\n\
             var c = new C(0);\n\
             c.x = 1;\n\
             c.undo();\n\
             c.x = 9;\n\
             c.redo();\n\
             var r = c.x;",
        )
        .unwrap();
        interp.interpret(&statements).unwrap();
        let r = interp.globals.borrow().get("r", 1).unwrap();
        assert!(matches!(r, Value::Number(n) if n == 9.0));
    }
}

#[cfg(test)]
mod property_tests {
    use crate::instance::Instance;
    use crate::value::{Class, Value};
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn test_class() -> Rc<Class> {
        Rc::new(Class {
            name: "Prop".to_string(),
            methods: HashMap::new(),
            closure: crate::environment::Environment::new_global(),
        })
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(f64),
        Undo,
        Redo,
    }

    fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(
            prop_oneof![
                any::<i16>().prop_map(|n| Op::Set(n as f64)),
                Just(Op::Undo),
                Just(Op::Redo),
            ],
            0..40,
        )
    }

    proptest! {
        /// Testable property 1/2: undo/redo are perfect inverses of `set`
        /// regardless of interleaving — replaying the same op sequence
        /// against a fresh instance always reaches the same field state.
        #[test]
        fn undo_redo_are_consistent_with_direct_replay(ops in arb_ops()) {
            let mut step = 0u64;
            let mut model: Option<f64> = None;
            let mut model_stack: Vec<Option<f64>> = Vec::new();
            let mut redo_stack: Vec<Option<f64>> = Vec::new();

            let mut inst = Instance::new(test_class(), 1, None);

            for op in ops {
                step += 1;
                match op {
                    Op::Set(n) => {
                        model_stack.push(model);
                        redo_stack.clear();
                        model = Some(n);
                        inst.set_field("x", Value::Number(n), step, 1);
                    }
                    Op::Undo => {
                        if let Some(prev) = model_stack.pop() {
                            redo_stack.push(model);
                            model = prev;
                            prop_assert!(inst.undo().is_some());
                        } else {
                            prop_assert!(inst.undo().is_none());
                        }
                    }
                    Op::Redo => {
                        if let Some(next) = redo_stack.pop() {
                            model_stack.push(model);
                            model = next;
                            prop_assert!(inst.redo().is_some());
                        } else {
                            prop_assert!(inst.redo().is_none());
                        }
                    }
                }
            }

            let actual = match inst.get_field("x") {
                Some(Value::Number(n)) => Some(n),
                None => None,
                other => panic!("unexpected field value: {:?}", other),
            };
            prop_assert_eq!(actual, model);
        }
    }
}
