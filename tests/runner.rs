//! Cache, import and PreAnalysis behavior of the script host, exercised
//! against real script files in temporary directories.

use std::fs;
use std::path::Path;

use anyhow::Result;
use indoc::indoc;
use tempfile::TempDir;

use magicscript::interpreter::{ExecutionContext, ExecutionMode, Value};
use magicscript::runner::{ScriptError, ScriptHost};

fn write_script(root: &Path, name: &str, source: &str) {
    if let Some(parent) = root.join(name).parent() {
        fs::create_dir_all(parent).expect("create script directory");
    }
    fs::write(root.join(name), source).expect("write script");
}

fn host_with(scripts: &[(&str, &str)]) -> (TempDir, ScriptHost) {
    let dir = tempfile::tempdir().expect("create temp dir");
    for (name, source) in scripts {
        write_script(dir.path(), name, source);
    }
    let host = ScriptHost::new(dir.path().to_path_buf());
    (dir, host)
}

const SUM_LOOP: &str = indoc! {r#"
    spell main() {
        let s = 0;
        for (let i = 0; i < 10; i = i + 1) {
            s = s + i;
        }
        return s;
    }
"#};

#[test]
fn cold_run_reports_metrics_and_fills_caches() -> Result<()> {
    let (_dir, mut host) = host_with(&[("sum.ms", SUM_LOOP)]);

    let report = host.run_script_file("sum.ms", "main", &ExecutionContext::default())?;

    assert_eq!(report.return_value, Value::Number(45.0));
    assert!(!report.aborted);
    assert_eq!(report.complexity.max_loop_depth, 1);
    assert_eq!(report.complexity.function_call_count, 1);
    assert!(report.complexity.dynamic_execution_count > 10);
    assert!(report.complexity.static_complexity_score > 0);
    assert!(report.complexity.execution_time_seconds >= 0.0);
    assert!(report.peak_space_bytes > 0);

    assert!(host.cached_complexity("sum.ms").is_some());
    assert_eq!(host.cached_peak_space("sum.ms"), Some(report.peak_space_bytes));
    Ok(())
}

#[test]
fn warm_run_uses_cached_program_and_interpreter() -> Result<()> {
    let (dir, mut host) = host_with(&[("sum.ms", SUM_LOOP)]);
    let ctx = ExecutionContext::default();

    let first = host.run_script_file("sum.ms", "main", &ctx)?;

    // Rewriting the file behind the host's back is invisible: source, program
    // and interpreter are all cached per path.
    write_script(dir.path(), "sum.ms", "spell main() { return 7; }");
    let second = host.run_script_file("sum.ms", "main", &ctx)?;

    assert_eq!(first.return_value, Value::Number(45.0));
    assert_eq!(second.return_value, Value::Number(45.0));
    Ok(())
}

#[test]
fn save_source_invalidates_compiled_caches() -> Result<()> {
    let (_dir, mut host) = host_with(&[("sum.ms", SUM_LOOP)]);
    let ctx = ExecutionContext::default();

    let first = host.run_script_file("sum.ms", "main", &ctx)?;
    assert_eq!(first.return_value, Value::Number(45.0));

    host.save_source("sum.ms", "spell main() { return 7; }")?;
    let second = host.run_script_file("sum.ms", "main", &ctx)?;
    assert_eq!(second.return_value, Value::Number(7.0));
    Ok(())
}

#[test]
fn missing_script_is_reported() {
    let (_dir, mut host) = host_with(&[("other.ms", SUM_LOOP)]);
    let error = host
        .run_script_file("missing.ms", "main", &ExecutionContext::default())
        .expect_err("expected missing script error");
    assert!(matches!(error, ScriptError::NotFound { .. }));
}

#[test]
fn missing_entry_function_is_reported() {
    let (_dir, mut host) = host_with(&[("lib.ms", "spell helper() { return 1; }")]);
    let error = host
        .run_script_file("lib.ms", "main", &ExecutionContext::default())
        .expect_err("expected missing entry error");
    assert!(matches!(error, ScriptError::MissingEntry { .. }));
    assert!(host.logs().contains("entry function 'main' is not defined"));
}

#[test]
fn non_function_entry_is_reported() {
    let (_dir, mut host) = host_with(&[("lib.ms", "let main = 1;")]);
    let error = host
        .run_script_file("lib.ms", "main", &ExecutionContext::default())
        .expect_err("expected entry-not-callable error");
    assert!(matches!(error, ScriptError::EntryNotCallable { .. }));
}

#[test]
fn lex_errors_are_logged_with_location() {
    let (_dir, mut host) = host_with(&[("bad.ms", "let s = \"unterminated")]);
    let error = host
        .run_script_file("bad.ms", "main", &ExecutionContext::default())
        .expect_err("expected lex error");
    assert!(matches!(error, ScriptError::Lex { .. }));
    assert!(host.logs().contains("Unterminated string literal"));
    assert!(host.logs().contains("bad.ms(1:9)"));
}

#[test]
fn parse_errors_are_logged_per_message() {
    let (_dir, mut host) = host_with(&[("bad.ms", "let x 1;")]);
    let error = host
        .run_script_file("bad.ms", "main", &ExecutionContext::default())
        .expect_err("expected parse error");
    assert!(matches!(error, ScriptError::Parse { .. }));
    assert!(host.logs().contains("[Syntax Error]"));
}

#[test]
fn imports_execute_in_their_own_interpreter() -> Result<()> {
    let (_dir, mut host) = host_with(&[
        (
            "main.ms",
            indoc! {r#"
                import "util.ms";
                spell main() { return 1; }
            "#},
        ),
        (
            "util.ms",
            indoc! {r#"
                console.log("util loaded");
                spell util_helper() { return 2; }
            "#},
        ),
    ]);

    let report = host.run_script_file("main.ms", "main", &ExecutionContext::default())?;
    assert_eq!(report.return_value, Value::Number(1.0));
    // The imported file's top-level code ran...
    assert!(host.logs().contains("util loaded"));
    // ...against its own interpreter: its declarations are callable there,
    // not from the importer.
    assert!(host.interpreter("util.ms").is_some());
    Ok(())
}

#[test]
fn imported_declarations_do_not_leak_into_the_importer() -> Result<()> {
    let (_dir, mut host) = host_with(&[
        (
            "main.ms",
            indoc! {r#"
                import "util.ms";
                spell main() { return util_helper(); }
            "#},
        ),
        ("util.ms", "spell util_helper() { return 2; }"),
    ]);

    let report = host.run_script_file("main.ms", "main", &ExecutionContext::default())?;
    assert!(report.aborted);
    assert!(host.logs().contains("Undefined function 'util_helper'"));
    Ok(())
}

#[test]
fn cyclic_imports_are_rejected_before_execution() {
    let (_dir, mut host) = host_with(&[
        (
            "a.ms",
            indoc! {r#"
                import "b.ms";
                console.log("a executed");
                spell main() { return 1; }
            "#},
        ),
        (
            "b.ms",
            indoc! {r#"
                import "a.ms";
                console.log("b executed");
            "#},
        ),
    ]);

    let error = host
        .run_script_file("a.ms", "main", &ExecutionContext::default())
        .expect_err("expected cyclic import error");
    assert!(matches!(error, ScriptError::CyclicImport { .. }));
    assert!(host.logs().contains("Cyclic import detected"));
    // Neither program in the cycle executed.
    assert!(!host.logs().contains("a executed"));
    assert!(!host.logs().contains("b executed"));
}

#[test]
fn diamond_imports_are_not_cycles() -> Result<()> {
    let (_dir, mut host) = host_with(&[
        (
            "top.ms",
            indoc! {r#"
                import "left.ms";
                import "right.ms";
                spell main() { return 1; }
            "#},
        ),
        ("left.ms", "import \"base.ms\";"),
        ("right.ms", "import \"base.ms\";"),
        ("base.ms", "console.log(\"base executed\");"),
    ]);

    let report = host.run_script_file("top.ms", "main", &ExecutionContext::default())?;
    assert_eq!(report.return_value, Value::Number(1.0));
    assert!(host.logs().contains("base executed"));
    Ok(())
}

#[test]
fn nested_import_paths_resolve_relative_to_the_root() -> Result<()> {
    let (_dir, mut host) = host_with(&[
        (
            "main.ms",
            indoc! {r#"
                import "lib/util.ms";
                spell main() { return 3; }
            "#},
        ),
        ("lib/util.ms", "console.log(\"nested loaded\");"),
    ]);

    let report = host.run_script_file("main.ms", "main", &ExecutionContext::default())?;
    assert_eq!(report.return_value, Value::Number(3.0));
    assert!(host.logs().contains("nested loaded"));
    Ok(())
}

#[test]
fn pre_analysis_runs_are_idempotent() -> Result<()> {
    let (_dir, mut host) = host_with(&[(
        "stateful.ms",
        indoc! {r#"
            let g = 0;
            spell main() {
                g = g + 1;
                let tmp = [1, 2, 3];
                return g;
            }
        "#},
    )]);
    let ctx = ExecutionContext {
        mode: ExecutionMode::PreAnalysis,
    };

    let first = host.run_script_file("stateful.ms", "main", &ctx)?;
    let second = host.run_script_file("stateful.ms", "main", &ctx)?;

    assert_eq!(first.return_value, Value::Number(1.0));
    assert_eq!(second.return_value, Value::Number(1.0));
    assert_eq!(first.peak_space_bytes, second.peak_space_bytes);
    assert_eq!(
        first.complexity.dynamic_execution_count,
        second.complexity.dynamic_execution_count
    );
    Ok(())
}

#[test]
fn pre_analysis_does_not_leak_mutations_into_normal_runs() -> Result<()> {
    let (_dir, mut host) = host_with(&[(
        "stateful.ms",
        indoc! {r#"
            let g = 0;
            spell main() {
                g = g + 1;
                return g;
            }
        "#},
    )]);

    let pre = ExecutionContext {
        mode: ExecutionMode::PreAnalysis,
    };
    host.run_script_file("stateful.ms", "main", &pre)?;

    // The warm normal run re-executes the program (re-seeding globals) and
    // starts from the same initial state.
    let normal = host.run_script_file("stateful.ms", "main", &ExecutionContext::default())?;
    assert_eq!(normal.return_value, Value::Number(1.0));
    Ok(())
}

#[test]
fn custom_builtin_registrars_apply_to_every_interpreter() -> Result<()> {
    let (_dir, mut host) = host_with(&[(
        "script.ms",
        "spell main() { return host_answer(); }",
    )]);

    host.add_builtin_registrar(|env, logs| {
        let logs = logs.clone();
        magicscript::builtins::define_native(env, "host_answer", 0, 0, move |_, _| {
            logs.info("host_answer called");
            magicscript::interpreter::Value::Number(42.0)
        });
    });

    let report = host.run_script_file("script.ms", "main", &ExecutionContext::default())?;
    assert_eq!(report.return_value, Value::Number(42.0));
    assert!(host.logs().contains("host_answer called"));
    Ok(())
}

#[test]
fn runtime_abort_is_reported_not_an_error() -> Result<()> {
    let (_dir, mut host) = host_with(&[(
        "loop.ms",
        indoc! {r#"
            spell main() {
                while (true) {}
                return 1;
            }
        "#},
    )]);

    let report = host.run_script_file("loop.ms", "main", &ExecutionContext::default())?;
    assert!(report.aborted);
    assert_eq!(report.return_value, Value::Null);
    assert!(host.logs().contains("maximum iterations"));
    Ok(())
}

#[test]
fn clear_script_cache_forces_recompilation() -> Result<()> {
    let (dir, mut host) = host_with(&[("sum.ms", SUM_LOOP)]);
    let ctx = ExecutionContext::default();

    host.run_script_file("sum.ms", "main", &ctx)?;
    write_script(dir.path(), "sum.ms", "spell main() { return 9; }");

    // Clearing compiled caches alone is not enough: the source cache still
    // holds the old text. Saving through the host refreshes both.
    host.clear_script_cache("sum.ms");
    host.save_source("sum.ms", "spell main() { return 9; }")?;
    let report = host.run_script_file("sum.ms", "main", &ctx)?;
    assert_eq!(report.return_value, Value::Number(9.0));
    Ok(())
}
