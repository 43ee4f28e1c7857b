//! Standard native functions registered into each interpreter's global
//! environment before program execution.
//!
//! Natives follow the same contract hosts use for their own bindings: a
//! const-bound `FunctionValue` whose implementation receives the evaluated
//! arguments and the execution context. Argument errors are reported through
//! the script log stream and yield null; they do not abort execution.

use std::rc::Rc;

use crate::interpreter::{EnvRef, ExecutionContext, FunctionBody, FunctionValue, Value};
use crate::logging::LogSink;

/// Registers the standard builtin set: `console.*`, `math.*` and `Array.*`.
pub fn register_builtins(env: &EnvRef, logs: &LogSink) {
    register_console_builtins(env, logs);
    register_math_builtins(env);
    register_array_builtins(env, logs);
}

/// Binds a native function as a const global. Hosts can use this directly to
/// inject their own bindings.
pub fn define_native(
    env: &EnvRef,
    name: &str,
    space_cost_bytes: i64,
    time_complexity_additional_score: i64,
    native: impl Fn(&[Value], &ExecutionContext) -> Value + 'static,
) {
    let function = FunctionValue {
        name: name.to_string(),
        parameters: Vec::new(),
        body: FunctionBody::Native(Rc::new(native)),
        space_cost_bytes,
        time_complexity_additional_score,
    };
    env.borrow_mut()
        .define(name.to_string(), Value::Function(Rc::new(function)), true);
}

fn join_debug_strings(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_debug_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn register_console_builtins(env: &EnvRef, logs: &LogSink) {
    let sink = logs.clone();
    define_native(env, "console.log", 0, 0, move |args, _| {
        if !args.is_empty() {
            sink.info(join_debug_strings(args));
        }
        Value::Null
    });

    let sink = logs.clone();
    define_native(env, "console.warn", 0, 0, move |args, _| {
        if !args.is_empty() {
            sink.warning(join_debug_strings(args));
        }
        Value::Null
    });

    let sink = logs.clone();
    define_native(env, "console.error", 0, 0, move |args, _| {
        if !args.is_empty() {
            sink.error(join_debug_strings(args));
        }
        Value::Null
    });
}

fn register_math_builtins(env: &EnvRef) {
    define_native(env, "math.pow", 0, 0, |args, _| {
        let base = args.first().map(Value::as_number).unwrap_or(0.0);
        let exponent = args.get(1).map(Value::as_number).unwrap_or(0.0);
        Value::Number(base.powf(exponent))
    });
}

fn register_array_builtins(env: &EnvRef, logs: &LogSink) {
    let sink = logs.clone();
    define_native(env, "Array.push_back", 0, 0, move |args, _| {
        let Some(Value::Array(values)) = args.first() else {
            sink.error("Runtime error: Array.push_back requires an array as first argument");
            return Value::Null;
        };
        let Some(value) = args.get(1) else {
            sink.error("Runtime error: Array.push_back requires a value argument");
            return Value::Null;
        };
        values.borrow_mut().push(value.clone());
        Value::Null
    });

    let sink = logs.clone();
    define_native(env, "Array.push_front", 0, 0, move |args, _| {
        let Some(Value::Array(values)) = args.first() else {
            sink.error("Runtime error: Array.push_front requires an array as first argument");
            return Value::Null;
        };
        let Some(value) = args.get(1) else {
            sink.error("Runtime error: Array.push_front requires a value argument");
            return Value::Null;
        };
        values.borrow_mut().insert(0, value.clone());
        Value::Null
    });

    let sink = logs.clone();
    define_native(env, "Array.pop_back", 0, 0, move |args, _| {
        let Some(Value::Array(values)) = args.first() else {
            sink.error("Runtime error: Array.pop_back requires an array as first argument");
            return Value::Null;
        };
        let popped = values.borrow_mut().pop();
        match popped {
            Some(value) => value,
            None => {
                sink.error("Runtime error: Array.pop_back called on an empty array");
                Value::Null
            }
        }
    });

    let sink = logs.clone();
    define_native(env, "Array.pop_front", 0, 0, move |args, _| {
        let Some(Value::Array(values)) = args.first() else {
            sink.error("Runtime error: Array.pop_front requires an array as first argument");
            return Value::Null;
        };
        let mut values = values.borrow_mut();
        if values.is_empty() {
            drop(values);
            sink.error("Runtime error: Array.pop_front called on an empty array");
            return Value::Null;
        }
        values.remove(0)
    });

    let sink = logs.clone();
    define_native(env, "Array.length", 0, 0, move |args, _| {
        let Some(Value::Array(values)) = args.first() else {
            sink.error("Runtime error: Array.length requires an array as first argument");
            return Value::Null;
        };
        Value::Number(values.borrow().len() as f64)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Environment;
    use crate::logging::LogSeverity;

    fn setup() -> (EnvRef, LogSink) {
        let env = Environment::new();
        let logs = LogSink::new();
        register_builtins(&env, &logs);
        (env, logs)
    }

    fn call(env: &EnvRef, name: &str, args: &[Value]) -> Value {
        let Some(Value::Function(function)) = Environment::lookup(env, name) else {
            panic!("builtin {name} not registered");
        };
        let FunctionBody::Native(native) = &function.body else {
            panic!("builtin {name} is not native");
        };
        native(args, &ExecutionContext::default())
    }

    #[test]
    fn registers_the_standard_set_as_const_functions() {
        let (env, _) = setup();
        for name in [
            "console.log",
            "console.warn",
            "console.error",
            "math.pow",
            "Array.push_back",
            "Array.push_front",
            "Array.pop_back",
            "Array.pop_front",
            "Array.length",
        ] {
            assert!(
                matches!(Environment::lookup(&env, name), Some(Value::Function(_))),
                "missing builtin {name}"
            );
        }
        // Builtins are const: assignment over them must fail.
        assert!(!Environment::assign(&env, "console.log", Value::Null));
    }

    #[test]
    fn console_log_joins_debug_renderings() {
        let (env, logs) = setup();
        let array = Value::array(vec![Value::Number(1.0), Value::Number(2.0)]);
        call(
            &env,
            "console.log",
            &[Value::String("hi".to_string()), Value::Number(3.0), array],
        );

        let entries = logs.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, LogSeverity::Info);
        assert_eq!(entries[0].message, "\"hi\", 3, [1, 2]");
    }

    #[test]
    fn console_severities_map_to_log_levels() {
        let (env, logs) = setup();
        call(&env, "console.warn", &[Value::Number(1.0)]);
        call(&env, "console.error", &[Value::Number(2.0)]);

        let entries = logs.entries();
        assert_eq!(entries[0].severity, LogSeverity::Warning);
        assert_eq!(entries[1].severity, LogSeverity::Error);
    }

    #[test]
    fn console_log_without_arguments_is_silent() {
        let (env, logs) = setup();
        call(&env, "console.log", &[]);
        assert!(logs.entries().is_empty());
    }

    #[test]
    fn math_pow_coerces_arguments() {
        let (env, _) = setup();
        assert_eq!(
            call(&env, "math.pow", &[Value::Number(2.0), Value::Number(10.0)]),
            Value::Number(1024.0)
        );
        assert_eq!(
            call(&env, "math.pow", &[Value::String("x".to_string())]),
            Value::Number(1.0)
        );
    }

    #[test]
    fn push_and_pop_mutate_the_shared_array() {
        let (env, _) = setup();
        let array = Value::array(vec![Value::Number(2.0)]);

        call(&env, "Array.push_back", &[array.clone(), Value::Number(3.0)]);
        call(&env, "Array.push_front", &[array.clone(), Value::Number(1.0)]);
        assert_eq!(array.to_debug_string(), "[1, 2, 3]");

        let back = call(&env, "Array.pop_back", &[array.clone()]);
        let front = call(&env, "Array.pop_front", &[array.clone()]);
        assert_eq!(back, Value::Number(3.0));
        assert_eq!(front, Value::Number(1.0));
        assert_eq!(array.to_debug_string(), "[2]");
    }

    #[test]
    fn length_of_empty_array_is_zero() {
        let (env, logs) = setup();
        let array = Value::array(Vec::new());
        assert_eq!(call(&env, "Array.length", &[array]), Value::Number(0.0));
        assert!(logs.entries().is_empty());
    }

    #[test]
    fn pop_from_empty_array_logs_and_returns_null() {
        let (env, logs) = setup();
        let array = Value::array(Vec::new());
        assert_eq!(call(&env, "Array.pop_back", &[array.clone()]), Value::Null);
        assert_eq!(call(&env, "Array.pop_front", &[array]), Value::Null);
        assert!(logs.contains("pop_back called on an empty array"));
        assert!(logs.contains("pop_front called on an empty array"));
    }

    #[test]
    fn array_builtins_reject_non_array_receivers() {
        let (env, logs) = setup();
        assert_eq!(
            call(&env, "Array.push_back", &[Value::Number(1.0), Value::Null]),
            Value::Null
        );
        assert!(logs.contains("requires an array as first argument"));
    }
}
