//! Static complexity analysis.
//!
//! A pre-execution AST walk producing a heuristic score from statement count,
//! maximum nested `for` depth and call count. The runner later folds in the
//! dynamic counters and any per-call score contributions declared by native
//! functions.

use std::fmt;
use std::time::Instant;

use crate::ast::{Expression, Program, Statement};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplexityReport {
    /// Heuristic score from the static walk (plus native contributions once
    /// the runner has executed the program).
    pub static_complexity_score: i64,
    /// Statements actually executed at runtime.
    pub dynamic_execution_count: u64,
    pub statement_count: u32,
    pub max_loop_depth: u32,
    /// Static call-site count before execution; overwritten with the dynamic
    /// call count once the runner has executed the program.
    pub function_call_count: u64,
    pub expression_evaluation_count: u64,
    pub analysis_time_seconds: f64,
    pub execution_time_seconds: f64,
}

impl fmt::Display for ComplexityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Complexity[Static:{}, Dynamic:{}, Statements:{}, MaxLoopDepth:{}, FuncCalls:{}, \
             ExprEvals:{}, AnalysisTime:{:.3}s, ExecTime:{:.3}s]",
            self.static_complexity_score,
            self.dynamic_execution_count,
            self.statement_count,
            self.max_loop_depth,
            self.function_call_count,
            self.expression_evaluation_count,
            self.analysis_time_seconds,
            self.execution_time_seconds,
        )
    }
}

/// Walks the program and computes the pre-execution complexity score.
pub fn analyze_program(program: &Program) -> ComplexityReport {
    let start = Instant::now();
    let mut report = ComplexityReport::default();

    for statement in &program.statements {
        analyze_statement(statement, 0, &mut report);
    }

    report.analysis_time_seconds = start.elapsed().as_secs_f64();
    report.static_complexity_score = (f64::from(report.statement_count)
        + f64::from(report.max_loop_depth) * 5.0
        + report.function_call_count as f64 * 0.5) as i64;
    report
}

fn analyze_statement(statement: &Statement, current_depth: u32, report: &mut ComplexityReport) -> i64 {
    report.statement_count += 1;
    let mut complexity = 1;

    match statement {
        Statement::Block(statements) => {
            for statement in statements {
                complexity += analyze_statement(statement, current_depth, report);
            }
        }

        Statement::VarDecl { initializer, .. } => {
            if let Some(initializer) = initializer {
                complexity += analyze_expression(initializer, report);
            }
        }

        Statement::FuncDecl { body, .. } => {
            if let Statement::Block(statements) = &**body {
                for statement in statements {
                    complexity += analyze_statement(statement, current_depth, report);
                }
            }
        }

        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            complexity += analyze_expression(condition, report);
            complexity += analyze_statement(then_branch, current_depth, report);
            if let Some(else_branch) = else_branch {
                complexity += analyze_statement(else_branch, current_depth, report);
            }
        }

        Statement::For {
            init,
            condition,
            increment,
            body,
        } => {
            let loop_depth = current_depth + 1;
            report.max_loop_depth = report.max_loop_depth.max(loop_depth);
            // Loops dominate the runtime cost estimate.
            complexity += 50;

            if let Some(init) = init {
                complexity += analyze_statement(init, current_depth, report);
            }
            if let Some(condition) = condition {
                complexity += analyze_expression(condition, report);
            }
            if let Some(increment) = increment {
                complexity += analyze_expression(increment, report);
            }
            complexity += analyze_statement(body, loop_depth, report);
        }

        Statement::Return(value) => {
            if let Some(value) = value {
                complexity += analyze_expression(value, report);
            }
        }

        Statement::Expr(expression) => {
            complexity += analyze_expression(expression, report);
        }

        // Imports carry no runtime cost of their own; while/switch statements
        // count themselves but their bodies are not descended into.
        Statement::Import { .. } | Statement::While { .. } | Statement::Switch { .. } => {}
    }

    complexity
}

fn analyze_expression(expression: &Expression, report: &mut ComplexityReport) -> i64 {
    let mut complexity = 1;

    match expression {
        Expression::Binary { left, right, .. } => {
            complexity += analyze_expression(left, report);
            complexity += analyze_expression(right, report);
        }

        Expression::Unary { operand, .. } => {
            complexity += analyze_expression(operand, report);
        }

        Expression::Call { arguments, .. } => {
            report.function_call_count += 1;
            complexity += 5;
            for argument in arguments {
                complexity += analyze_expression(argument, report);
            }
        }

        Expression::Assignment { value, .. } => {
            complexity += analyze_expression(value, report);
        }

        Expression::Grouping(inner) => {
            complexity += analyze_expression(inner, report);
        }

        // Everything else is base cost 1.
        _ => {}
    }

    complexity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;
    use indoc::indoc;

    fn analyze(source: &str) -> ComplexityReport {
        let program = parse_tokens(tokenize(source)).expect("parse failed");
        analyze_program(&program)
    }

    #[test]
    fn counts_statements_and_loop_depth_for_simple_loop() {
        let report = analyze(indoc! {r#"
            spell main() {
                let s = 0;
                for (let i = 0; i < 10; i = i + 1) {
                    s = s + i;
                }
                return s;
            }
        "#});

        // spell, let, for, for-init, block, inner assign, return.
        assert_eq!(report.statement_count, 7);
        assert_eq!(report.max_loop_depth, 1);
        assert_eq!(report.function_call_count, 0);
        assert_eq!(
            report.static_complexity_score,
            i64::from(report.statement_count) + 5
        );
    }

    #[test]
    fn nested_for_loops_increase_depth() {
        let report = analyze(indoc! {r#"
            spell main() {
                for (let i = 0; i < 3; i = i + 1) {
                    for (let j = 0; j < 3; j = j + 1) {
                        let t = i * j;
                    }
                }
                return 0;
            }
        "#});
        assert_eq!(report.max_loop_depth, 2);
    }

    #[test]
    fn sibling_loops_do_not_stack_depth() {
        let report = analyze(indoc! {r#"
            spell main() {
                for (let i = 0; i < 3; i = i + 1) { let a = i; }
                for (let j = 0; j < 3; j = j + 1) { let b = j; }
                return 0;
            }
        "#});
        assert_eq!(report.max_loop_depth, 1);
    }

    #[test]
    fn calls_are_counted_including_arguments() {
        let report = analyze(indoc! {r#"
            spell fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            spell main() {
                return fib(8);
            }
        "#});
        assert_eq!(report.function_call_count, 3);
        // Half a point per call, truncated.
        assert_eq!(
            report.static_complexity_score,
            i64::from(report.statement_count) + 1
        );
    }

    #[test]
    fn score_formula_combines_all_three_inputs() {
        let report = analyze(indoc! {r#"
            spell work() { return 1; }
            spell main() {
                for (let i = 0; i < 2; i = i + 1) {
                    work();
                }
                return 0;
            }
        "#});
        let expected = i64::from(report.statement_count) as f64
            + f64::from(report.max_loop_depth) * 5.0
            + report.function_call_count as f64 * 0.5;
        assert_eq!(report.static_complexity_score, expected as i64);
        assert!(report.analysis_time_seconds >= 0.0);
    }

    #[test]
    fn empty_program_scores_zero() {
        let report = analyze("");
        assert_eq!(report.statement_count, 0);
        assert_eq!(report.static_complexity_score, 0);
        assert_eq!(report.max_loop_depth, 0);
    }
}
