//! Tree-walking interpreter.
//!
//! Evaluates the AST against a chain of lexical environments while keeping a
//! per-run resource ledger: statement/expression/call counters, a byte-level
//! space accountant with a peak watermark, a call-stack depth guard and a
//! while-iteration cap. Runtime errors never become Rust errors — every error
//! site logs a message to the script log stream and raises the sticky abort
//! flag, after which all evaluation short-circuits to Null until the next
//! `execute_program`.

use std::rc::Rc;
use std::time::Instant;

use crate::ast::{
    ArrowBody, AssignOp, BinaryOp, Expression, Program, Statement, UnaryOp,
};
use crate::logging::LogSink;
use crate::token::TokenKind;

pub mod env;
pub mod event_loop;
pub mod value;

pub use env::{Binding, EnvRef, Environment};
pub use event_loop::EventLoop;
pub use value::{FunctionBody, FunctionValue, NativeFn, ObjectMap, Value, format_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Normal,
    /// The global environment is snapshotted before and restored after, so
    /// resource metrics can be measured without permanent binding changes.
    PreAnalysis,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionContext {
    pub mode: ExecutionMode,
}

/// Runtime watchdog knobs. The defaults mirror the engine limits this language
/// grew up with; hosts running trusted scripts may raise them.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeLimits {
    pub max_call_depth: u32,
    pub max_while_iterations: u32,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            max_while_iterations: 128,
        }
    }
}

/// Control-flow marker for statement execution.
pub enum ExecResult {
    Continue,
    Return(Value),
}

pub struct Interpreter {
    global_env: EnvRef,
    logs: LogSink,
    limits: RuntimeLimits,
    event_loop: EventLoop,

    call_stack_depth: u32,
    abort_execution: bool,

    execution_count: u64,
    expression_evaluation_count: u64,
    function_call_count: u64,
    accumulated_time_complexity_score: i64,

    current_space_bytes: i64,
    peak_space_bytes: i64,
}

impl Interpreter {
    pub fn new(logs: LogSink) -> Self {
        Self::with_limits(logs, RuntimeLimits::default())
    }

    pub fn with_limits(logs: LogSink, limits: RuntimeLimits) -> Self {
        Self {
            global_env: Environment::new(),
            logs,
            limits,
            event_loop: EventLoop::new(),
            call_stack_depth: 0,
            abort_execution: false,
            execution_count: 0,
            expression_evaluation_count: 0,
            function_call_count: 0,
            accumulated_time_complexity_score: 0,
            current_space_bytes: 0,
            peak_space_bytes: 0,
        }
    }

    pub fn global_env(&self) -> &EnvRef {
        &self.global_env
    }

    pub fn logs(&self) -> &LogSink {
        &self.logs
    }

    pub fn aborted(&self) -> bool {
        self.abort_execution
    }

    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    pub fn expression_evaluation_count(&self) -> u64 {
        self.expression_evaluation_count
    }

    pub fn function_call_count(&self) -> u64 {
        self.function_call_count
    }

    pub fn accumulated_time_complexity_score(&self) -> i64 {
        self.accumulated_time_complexity_score
    }

    pub fn current_space_bytes(&self) -> i64 {
        self.current_space_bytes
    }

    pub fn peak_space_bytes(&self) -> i64 {
        self.peak_space_bytes
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    pub fn event_loop_mut(&mut self) -> &mut EventLoop {
        &mut self.event_loop
    }

    /// Runs every elapsed scheduled callback. Driven by the host tick.
    pub fn tick_event_loop(&mut self, ctx: &ExecutionContext) {
        let due = self.event_loop.take_due(Instant::now());
        for task in due {
            self.call_function(&task.callback, task.arguments, ctx);
        }
    }

    pub fn reset_space_tracking(&mut self) {
        self.current_space_bytes = 0;
        self.peak_space_bytes = 0;
        self.call_stack_depth = 0;
        self.execution_count = 0;
        self.expression_evaluation_count = 0;
        self.function_call_count = 0;
        self.accumulated_time_complexity_score = 0;
    }

    /// Deep-clones the global environment. The runner takes a snapshot before
    /// a PreAnalysis run and hands it back to `restore_globals` afterwards;
    /// the copy is per-frame, so shared Array/Object interiors stay aliased.
    pub fn snapshot_globals(&self) -> EnvRef {
        Environment::deep_clone(&self.global_env)
    }

    pub fn restore_globals(&mut self, snapshot: EnvRef) {
        self.global_env = snapshot;
    }

    /// Executes top-level statements against the global environment. Resets
    /// the resource ledger and clears the abort flag first; a top-level
    /// `return` stops execution.
    pub fn execute_program(&mut self, program: &Program, ctx: &ExecutionContext) {
        self.reset_space_tracking();
        self.abort_execution = false;

        let global_env = Rc::clone(&self.global_env);
        for statement in &program.statements {
            if self.abort_execution {
                break;
            }
            if let ExecResult::Return(_) = self.execute_statement(statement, &global_env, ctx) {
                break;
            }
        }
    }

    /// Looks up `name` in the global environment and calls it.
    pub fn call_function_by_name(
        &mut self,
        name: &str,
        args: Vec<Value>,
        ctx: &ExecutionContext,
    ) -> Value {
        match Environment::lookup(&self.global_env, name) {
            Some(Value::Function(function)) => self.call_function(&function, args, ctx),
            Some(other) => self.runtime_error(format!(
                "'{name}' is not a function, it is a {}",
                other.type_name()
            )),
            None => self.runtime_error(format!("Function '{name}' is not defined")),
        }
    }

    pub fn call_function(
        &mut self,
        function: &Rc<FunctionValue>,
        args: Vec<Value>,
        ctx: &ExecutionContext,
    ) -> Value {
        if self.call_stack_depth >= self.limits.max_call_depth {
            return self.runtime_error(format!(
                "Call stack overflow: maximum call stack depth ({}) exceeded in function '{}'",
                self.limits.max_call_depth, function.name
            ));
        }

        self.call_stack_depth += 1;
        if function.space_cost_bytes > 0 {
            self.add_space_bytes(function.space_cost_bytes);
        }
        self.function_call_count += 1;

        let result = match &function.body {
            FunctionBody::Native(native) => {
                let native = Rc::clone(native);
                let value = native(&args, ctx);
                self.accumulated_time_complexity_score +=
                    function.time_complexity_additional_score;
                value
            }
            FunctionBody::Script { body, closure } => {
                let body = Rc::clone(body);
                let closure = Rc::clone(closure);
                self.call_script_function(function, &body, closure, args, ctx)
            }
        };

        if function.space_cost_bytes > 0 {
            self.add_space_bytes(-function.space_cost_bytes);
        }
        self.call_stack_depth -= 1;
        result
    }

    fn call_script_function(
        &mut self,
        function: &Rc<FunctionValue>,
        body: &Statement,
        closure: EnvRef,
        args: Vec<Value>,
        ctx: &ExecutionContext,
    ) -> Value {
        let Statement::Block(statements) = body else {
            return self.runtime_error(format!(
                "Function '{}' body is not a block statement",
                function.name
            ));
        };

        let func_env = Environment::with_parent(closure);
        {
            let mut frame = func_env.borrow_mut();
            for (index, parameter) in function.parameters.iter().enumerate() {
                // Missing positional arguments bind to null.
                let argument = args.get(index).cloned().unwrap_or(Value::Null);
                frame.define(parameter.clone(), argument, false);
            }
        }

        match self.execute_block(statements, &func_env, ctx) {
            ExecResult::Return(value) => value,
            ExecResult::Continue => Value::Null,
        }
    }

    // === statements ===

    fn execute_block(
        &mut self,
        statements: &[Statement],
        env: &EnvRef,
        ctx: &ExecutionContext,
    ) -> ExecResult {
        for statement in statements {
            let result = self.execute_statement(statement, env, ctx);
            if self.abort_execution {
                return result;
            }
            if let ExecResult::Return(value) = result {
                return ExecResult::Return(value);
            }
        }
        ExecResult::Continue
    }

    fn execute_statement(
        &mut self,
        statement: &Statement,
        env: &EnvRef,
        ctx: &ExecutionContext,
    ) -> ExecResult {
        if self.abort_execution {
            return ExecResult::Continue;
        }
        self.execution_count += 1;

        match statement {
            // Imports are resolved at the host level before execution.
            Statement::Import { .. } => ExecResult::Continue,

            Statement::Block(statements) => {
                let child = Environment::with_parent(Rc::clone(env));
                self.execute_block(statements, &child, ctx)
            }

            Statement::VarDecl {
                is_const,
                name,
                initializer,
            } => {
                let init_value = match initializer {
                    Some(expression) => self.evaluate_expression(expression, env, ctx),
                    None => Value::Null,
                };
                let size = init_value.estimated_size_bytes();
                // Redefinition in the same frame is ignored so that cached
                // programs can be re-executed against a seeded global env.
                env.borrow_mut().define(name.clone(), init_value, *is_const);
                self.add_space_bytes(size);
                ExecResult::Continue
            }

            Statement::FuncDecl {
                name,
                parameters,
                body,
            } => {
                let function = FunctionValue {
                    name: name.clone(),
                    parameters: parameters.clone(),
                    body: FunctionBody::Script {
                        body: Rc::clone(body),
                        closure: Rc::clone(env),
                    },
                    space_cost_bytes: 0,
                    time_complexity_additional_score: 0,
                };
                env.borrow_mut()
                    .define(name.clone(), Value::Function(Rc::new(function)), true);
                ExecResult::Continue
            }

            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                // Only a Bool true takes the then branch; any other value is
                // treated as false.
                let condition_value = self.evaluate_expression(condition, env, ctx);
                if condition_value.as_bool() {
                    self.execute_statement(then_branch, env, ctx)
                } else if let Some(else_branch) = else_branch {
                    self.execute_statement(else_branch, env, ctx)
                } else {
                    ExecResult::Continue
                }
            }

            Statement::Switch { scrutinee, cases } => {
                let switch_value = self.evaluate_expression(scrutinee, env, ctx);
                if self.abort_execution {
                    return ExecResult::Continue;
                }

                let mut matched = false;
                for case in cases {
                    match &case.value {
                        // `default` runs only when nothing matched before it.
                        None => {
                            if !matched {
                                for statement in &case.body {
                                    let result = self.execute_statement(statement, env, ctx);
                                    if matches!(result, ExecResult::Return(_))
                                        || self.abort_execution
                                    {
                                        return result;
                                    }
                                }
                            }
                            break;
                        }
                        Some(value_expression) => {
                            let case_value =
                                self.evaluate_expression(value_expression, env, ctx);
                            if self.abort_execution {
                                break;
                            }
                            // After the first match every following case body
                            // runs as well: there is no break keyword.
                            if matched || switch_case_equal(&switch_value, &case_value) {
                                matched = true;
                                for statement in &case.body {
                                    let result = self.execute_statement(statement, env, ctx);
                                    if matches!(result, ExecResult::Return(_))
                                        || self.abort_execution
                                    {
                                        return result;
                                    }
                                }
                            }
                        }
                    }
                }
                ExecResult::Continue
            }

            Statement::While { condition, body } => {
                let loop_env = Environment::with_parent(Rc::clone(env));
                let max_iterations = self.limits.max_while_iterations;
                let mut iteration: u32 = 0;

                loop {
                    if self.abort_execution {
                        break;
                    }
                    // Checked before the condition so the cap is exact.
                    if iteration >= max_iterations {
                        self.runtime_error(format!(
                            "while loop exceeded maximum iterations ({max_iterations}); \
                             loop stopped to prevent an infinite loop"
                        ));
                        break;
                    }

                    match condition {
                        Some(condition) => {
                            let value = self.evaluate_expression(condition, &loop_env, ctx);
                            if self.abort_execution {
                                break;
                            }
                            if !value.as_bool() {
                                break;
                            }
                        }
                        // A while without a condition would loop forever;
                        // terminate immediately instead.
                        None => break,
                    }

                    let result = self.execute_statement(body, &loop_env, ctx);
                    if self.abort_execution {
                        break;
                    }
                    if let ExecResult::Return(value) = result {
                        return ExecResult::Return(value);
                    }

                    iteration += 1;
                }
                ExecResult::Continue
            }

            Statement::For {
                init,
                condition,
                increment,
                body,
            } => {
                let loop_env = Environment::with_parent(Rc::clone(env));

                if let Some(init) = init {
                    if let ExecResult::Return(value) =
                        self.execute_statement(init, &loop_env, ctx)
                    {
                        return ExecResult::Return(value);
                    }
                }

                loop {
                    if self.abort_execution {
                        break;
                    }
                    if let Some(condition) = condition {
                        let value = self.evaluate_expression(condition, &loop_env, ctx);
                        if !value.as_bool() {
                            break;
                        }
                    }

                    let result = self.execute_statement(body, &loop_env, ctx);
                    if let ExecResult::Return(value) = result {
                        return ExecResult::Return(value);
                    }

                    if let Some(increment) = increment {
                        self.evaluate_expression(increment, &loop_env, ctx);
                    }
                }
                ExecResult::Continue
            }

            Statement::Return(value) => {
                let value = match value {
                    Some(expression) => self.evaluate_expression(expression, env, ctx),
                    None => Value::Null,
                };
                ExecResult::Return(value)
            }

            Statement::Expr(expression) => {
                self.evaluate_expression(expression, env, ctx);
                ExecResult::Continue
            }
        }
    }

    // === expressions ===

    fn evaluate_expression(
        &mut self,
        expression: &Expression,
        env: &EnvRef,
        ctx: &ExecutionContext,
    ) -> Value {
        if self.abort_execution {
            return Value::Null;
        }
        self.expression_evaluation_count += 1;

        match expression {
            Expression::Literal(token) => match token.kind {
                TokenKind::Number => Value::Number(token.lexeme.parse().unwrap_or(0.0)),
                TokenKind::String => Value::String(token.lexeme.clone()),
                TokenKind::True => Value::Bool(true),
                TokenKind::False => Value::Bool(false),
                _ => Value::Null,
            },

            Expression::Identifier(name) => match Environment::lookup(env, name) {
                Some(value) => value,
                None => self.runtime_error(format!("Undefined identifier '{name}'")),
            },

            Expression::Binary { op, left, right } => {
                let left_value = self.evaluate_expression(left, env, ctx);

                // Short-circuit: the right side is skipped when the left
                // side's bool cast already decides the result.
                match op {
                    BinaryOp::And => {
                        if !left_value.as_bool() {
                            return Value::Bool(false);
                        }
                        let right_value = self.evaluate_expression(right, env, ctx);
                        return Value::Bool(right_value.as_bool());
                    }
                    BinaryOp::Or => {
                        if left_value.as_bool() {
                            return Value::Bool(true);
                        }
                        let right_value = self.evaluate_expression(right, env, ctx);
                        return Value::Bool(right_value.as_bool());
                    }
                    _ => {}
                }

                let right_value = self.evaluate_expression(right, env, ctx);
                match op {
                    BinaryOp::Add => {
                        Value::Number(left_value.as_number() + right_value.as_number())
                    }
                    BinaryOp::Sub => {
                        Value::Number(left_value.as_number() - right_value.as_number())
                    }
                    BinaryOp::Mul => {
                        Value::Number(left_value.as_number() * right_value.as_number())
                    }
                    BinaryOp::Div => {
                        Value::Number(left_value.as_number() / right_value.as_number())
                    }
                    BinaryOp::Mod => {
                        Value::Number(left_value.as_number() % right_value.as_number())
                    }
                    BinaryOp::Equal => Value::Bool(left_value == right_value),
                    BinaryOp::NotEqual => Value::Bool(left_value != right_value),
                    BinaryOp::Less => {
                        Value::Bool(left_value.as_number() < right_value.as_number())
                    }
                    BinaryOp::LessEqual => {
                        Value::Bool(left_value.as_number() <= right_value.as_number())
                    }
                    BinaryOp::Greater => {
                        Value::Bool(left_value.as_number() > right_value.as_number())
                    }
                    BinaryOp::GreaterEqual => {
                        Value::Bool(left_value.as_number() >= right_value.as_number())
                    }
                    BinaryOp::And | BinaryOp::Or => Value::Null,
                }
            }

            Expression::Unary { op, operand } => match op {
                UnaryOp::Negate => {
                    let value = self.evaluate_expression(operand, env, ctx);
                    match value {
                        Value::Number(number) => Value::Number(-number),
                        _ => Value::Number(0.0),
                    }
                }
                UnaryOp::Not => {
                    let value = self.evaluate_expression(operand, env, ctx);
                    Value::Bool(!value.as_bool())
                }
                UnaryOp::PreIncrement | UnaryOp::PreDecrement => {
                    let Expression::Identifier(name) = &**operand else {
                        return self.runtime_error(
                            "Pre-increment/decrement can only be applied to identifiers",
                        );
                    };
                    let Some(current) = Environment::lookup(env, name) else {
                        return self.runtime_error(format!("Undefined variable '{name}'"));
                    };
                    let Value::Number(number) = current else {
                        return self.runtime_error(
                            "Pre-increment/decrement can only be applied to numbers",
                        );
                    };
                    let delta = if *op == UnaryOp::PreIncrement { 1.0 } else { -1.0 };
                    let new_value = Value::Number(number + delta);
                    if !Environment::assign(env, name, new_value.clone()) {
                        return self
                            .runtime_error(format!("Cannot assign to constant variable '{name}'"));
                    }
                    new_value
                }
            },

            Expression::Assignment {
                op,
                target,
                index,
                member,
                value,
            } => self.evaluate_assignment(*op, target, index.as_deref(), member.as_deref(), value, env, ctx),

            Expression::Call {
                callee,
                arguments,
                this_value,
            } => self.evaluate_call(callee, arguments, this_value.as_deref(), env, ctx),

            Expression::MemberAccess { target, member } => {
                let target_value = self.evaluate_expression(target, env, ctx);
                if self.abort_execution {
                    return Value::Null;
                }
                let Value::Object(map) = target_value else {
                    return self.runtime_error(format!(
                        "Cannot access member '{member}' on a non-object value"
                    ));
                };
                let found = map.borrow().get(member).cloned();
                match found {
                    Some(value) => value,
                    None => {
                        self.runtime_error(format!("Property '{member}' not found in object"))
                    }
                }
            }

            Expression::Grouping(inner) => self.evaluate_expression(inner, env, ctx),

            Expression::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    let value = self.evaluate_expression(element, env, ctx);
                    if self.abort_execution {
                        return Value::Null;
                    }
                    self.add_space_bytes(value.estimated_size_bytes());
                    values.push(value);
                }
                Value::array(values)
            }

            Expression::ObjectLiteral(properties) => {
                let mut map = ObjectMap::new();
                for (key, value_expression) in properties {
                    let value = self.evaluate_expression(value_expression, env, ctx);
                    if self.abort_execution {
                        return Value::Null;
                    }
                    self.add_space_bytes(value.estimated_size_bytes());
                    map.set(key.clone(), value);
                }
                Value::object(map)
            }

            Expression::Index { target, index } => {
                let target_value = self.evaluate_expression(target, env, ctx);
                if self.abort_execution {
                    return Value::Null;
                }
                let index_value = self.evaluate_expression(index, env, ctx);
                if self.abort_execution {
                    return Value::Null;
                }

                match target_value {
                    Value::Array(values) => {
                        let Value::Number(number) = index_value else {
                            return self.runtime_error("Array index must be a number");
                        };
                        let len = values.borrow().len();
                        let idx = number as i64;
                        if idx < 0 || idx as usize >= len {
                            return self.runtime_error(format!(
                                "Array index out of bounds (index: {idx}, size: {len})"
                            ));
                        }
                        values.borrow()[idx as usize].clone()
                    }
                    Value::Object(map) => {
                        let Value::String(key) = index_value else {
                            return self.runtime_error("Object index must be a string");
                        };
                        let found = map.borrow().get(&key).cloned();
                        match found {
                            Some(value) => value,
                            None => self.runtime_error(format!(
                                "Property '{key}' not found in object"
                            )),
                        }
                    }
                    _ => self.runtime_error("Cannot index a non-array and non-object value"),
                }
            }

            Expression::ArrowFunction { parameters, body } => {
                let body_block = match body {
                    ArrowBody::Block(block) => Rc::clone(block),
                    // A single-expression body becomes `{ return expr; }`.
                    ArrowBody::Expression(expression) => Rc::new(Statement::Block(vec![
                        Statement::Return(Some((**expression).clone())),
                    ])),
                };
                Value::Function(Rc::new(FunctionValue {
                    name: "<anonymous>".to_string(),
                    parameters: parameters.clone(),
                    body: FunctionBody::Script {
                        body: body_block,
                        closure: Rc::clone(env),
                    },
                    space_cost_bytes: 0,
                    time_complexity_additional_score: 0,
                }))
            }

            Expression::Postfix {
                operand,
                is_increment,
            } => {
                let Expression::Identifier(name) = &**operand else {
                    return self.runtime_error(
                        "Post-increment/decrement can only be applied to identifiers",
                    );
                };
                let Some(current) = Environment::lookup(env, name) else {
                    return self.runtime_error(format!("Undefined variable '{name}'"));
                };
                let Value::Number(number) = current else {
                    return self.runtime_error(
                        "Post-increment/decrement can only be applied to numbers",
                    );
                };
                let delta = if *is_increment { 1.0 } else { -1.0 };
                if !Environment::assign(env, name, Value::Number(number + delta)) {
                    return self
                        .runtime_error(format!("Cannot assign to constant variable '{name}'"));
                }
                // The old value is returned.
                Value::Number(number)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_assignment(
        &mut self,
        op: AssignOp,
        target: &str,
        index: Option<&Expression>,
        member: Option<&str>,
        value: &Expression,
        env: &EnvRef,
        ctx: &ExecutionContext,
    ) -> Value {
        // The right-hand side always evaluates first.
        let right_value = self.evaluate_expression(value, env, ctx);
        if self.abort_execution {
            return Value::Null;
        }

        // obj.property = value
        if let Some(member) = member {
            let Some(current) = Environment::lookup(env, target) else {
                return self.runtime_error(format!("Undefined variable '{target}'"));
            };
            let Value::Object(map) = current else {
                return self.runtime_error(format!(
                    "Cannot assign to member of non-object variable '{target}'"
                ));
            };
            map.borrow_mut().set(member.to_string(), right_value.clone());
            return right_value;
        }

        // arr[index] = value / obj["key"] = value
        if let Some(index_expression) = index {
            let Some(current) = Environment::lookup(env, target) else {
                return self.runtime_error(format!("Undefined variable '{target}'"));
            };
            let index_value = self.evaluate_expression(index_expression, env, ctx);
            if self.abort_execution {
                return Value::Null;
            }

            return match current {
                Value::Array(values) => {
                    let Value::Number(number) = index_value else {
                        return self.runtime_error("Array index must be a number");
                    };
                    let len = values.borrow().len();
                    let idx = number as i64;
                    if idx < 0 || idx as usize >= len {
                        return self.runtime_error(format!(
                            "Array index out of bounds (index: {idx}, size: {len})"
                        ));
                    }
                    values.borrow_mut()[idx as usize] = right_value.clone();
                    right_value
                }
                Value::Object(map) => {
                    let Value::String(key) = index_value else {
                        return self.runtime_error("Object index must be a string");
                    };
                    map.borrow_mut().set(key, right_value.clone());
                    right_value
                }
                _ => self.runtime_error(format!(
                    "Cannot index non-array and non-object variable '{target}'"
                )),
            };
        }

        // Compound assignment reads the current value first.
        if op != AssignOp::Assign {
            let Some(current) = Environment::lookup(env, target) else {
                return self.runtime_error(format!("Undefined variable '{target}'"));
            };
            let left = current.as_number();
            let right = right_value.as_number();
            let number = match op {
                AssignOp::Add => left + right,
                AssignOp::Sub => left - right,
                AssignOp::Mul => left * right,
                AssignOp::Div => {
                    if right.abs() < 1e-8 {
                        return self.runtime_error("Division by zero");
                    }
                    left / right
                }
                AssignOp::Mod => left % right,
                AssignOp::Assign => right,
            };
            let result = Value::Number(number);
            if !Environment::assign(env, target, result.clone()) {
                return self
                    .runtime_error(format!("Cannot assign to constant variable '{target}'"));
            }
            return result;
        }

        if !Environment::assign(env, target, right_value.clone()) {
            return self.runtime_error(format!(
                "Cannot assign to undefined or constant variable '{target}'"
            ));
        }
        right_value
    }

    fn evaluate_call(
        &mut self,
        callee: &str,
        arguments: &[Expression],
        this_value: Option<&Expression>,
        env: &EnvRef,
        ctx: &ExecutionContext,
    ) -> Value {
        let mut callee_name = callee.to_string();
        let mut args: Vec<Value> = Vec::new();

        let mut resolved = Environment::lookup(env, &callee_name);

        // When the name does not resolve to a function and the call has a
        // receiver, an array receiver re-routes to the Array.* builtins with
        // itself prepended as the first argument.
        if !matches!(resolved, Some(Value::Function(_)))
            && let Some(this_expression) = this_value
        {
            let this_val = self.evaluate_expression(this_expression, env, ctx);
            if self.abort_execution {
                return Value::Null;
            }
            if matches!(this_val, Value::Array(_)) {
                if let Some(dot) = callee_name.find('.') {
                    callee_name = format!("Array.{}", &callee_name[dot + 1..]);
                }
                args.push(this_val);
                resolved = Environment::lookup(env, &callee_name);
            }
        }

        for argument in arguments {
            args.push(self.evaluate_expression(argument, env, ctx));
            if self.abort_execution {
                return Value::Null;
            }
        }

        if !matches!(resolved, Some(Value::Function(_))) {
            resolved = Environment::lookup(env, &callee_name);
        }

        match resolved {
            Some(Value::Function(function)) => self.call_function(&function, args, ctx),
            Some(other) => self.runtime_error(format!(
                "'{callee_name}' is not a function, it is a {}",
                other.type_name()
            )),
            None => self.runtime_error(format!("Undefined function '{callee_name}'")),
        }
    }

    // === resource accounting and abort protocol ===

    fn add_space_bytes(&mut self, delta: i64) {
        self.current_space_bytes += delta;
        if self.current_space_bytes < 0 {
            self.current_space_bytes = 0;
        }
        if self.current_space_bytes > self.peak_space_bytes {
            self.peak_space_bytes = self.current_space_bytes;
        }
    }

    /// Logs a runtime error and raises the sticky abort flag. Always returns
    /// Null so error sites can `return self.runtime_error(...)`.
    fn runtime_error(&mut self, message: impl Into<String>) -> Value {
        self.logs
            .error(format!("Runtime error: {}", message.into()));
        self.abort_execution = true;
        Value::Null
    }
}

/// Case-label comparison: same-typed primitives only, with a deliberate 1e-4
/// tolerance for numbers.
fn switch_case_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => (left - right).abs() <= 1e-4,
        (Value::String(left), Value::String(right)) => left == right,
        (Value::Bool(left), Value::Bool(right)) => left == right,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}
