//! Script host: file loading, per-path program and interpreter caches, import
//! resolution and run orchestration.
//!
//! A `ScriptHost` owns one cache universe keyed by relative script path. The
//! cold path runs lex → parse → static analysis → builtin registration →
//! import resolution → program execution → entry invocation; the warm path
//! re-executes the cached program against its cached interpreter (re-seeding
//! globals) and invokes the entry function again. Either way the host records
//! timing, counters and peak space into a `RunReport`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use thiserror::Error;

use crate::analysis::{self, ComplexityReport};
use crate::ast::{Program, Statement};
use crate::builtins::register_builtins;
use crate::interpreter::{
    EnvRef, Environment, ExecutionContext, ExecutionMode, Interpreter, RuntimeLimits, Value,
};
use crate::lexer;
use crate::logging::LogSink;
use crate::parser;
use crate::token::{Token, TokenKind};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script not found: {path}")]
    NotFound { path: String },
    #[error("failed to read script {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("lex error in {path}")]
    Lex { path: String },
    #[error("parse error in {path}")]
    Parse { path: String },
    #[error("cyclic import detected: {path}")]
    CyclicImport { path: String },
    #[error("entry function '{name}' is not defined in {path}")]
    MissingEntry { name: String, path: String },
    #[error("entry '{name}' in {path} is not a function")]
    EntryNotCallable { name: String, path: String },
}

/// Host file-I/O boundary. The default implementation resolves relative paths
/// under a root directory; embedders may supply archives, databases, etc.
pub trait SourceLoader {
    fn load_source(&self, relative_path: &str) -> Result<String, ScriptError>;
    fn save_source(&self, relative_path: &str, text: &str) -> Result<(), ScriptError>;
}

pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceLoader for DirectoryLoader {
    fn load_source(&self, relative_path: &str) -> Result<String, ScriptError> {
        let full_path = self.root.join(relative_path);
        if !full_path.exists() {
            return Err(ScriptError::NotFound {
                path: relative_path.to_string(),
            });
        }
        std::fs::read_to_string(&full_path).map_err(|source| ScriptError::Io {
            path: relative_path.to_string(),
            source,
        })
    }

    fn save_source(&self, relative_path: &str, text: &str) -> Result<(), ScriptError> {
        let full_path = self.root.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ScriptError::Io {
                path: relative_path.to_string(),
                source,
            })?;
        }
        std::fs::write(&full_path, text).map_err(|source| ScriptError::Io {
            path: relative_path.to_string(),
            source,
        })
    }
}

/// Caller-visible result of one `run_script_file` invocation.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub return_value: Value,
    pub complexity: ComplexityReport,
    pub peak_space_bytes: i64,
    /// True when a runtime error aborted execution; details are in the log
    /// stream.
    pub aborted: bool,
}

type BuiltinRegistrar = Box<dyn Fn(&EnvRef, &LogSink)>;

pub struct ScriptHost {
    loader: Box<dyn SourceLoader>,
    logs: LogSink,
    limits: RuntimeLimits,
    registrars: Vec<BuiltinRegistrar>,

    source_cache: HashMap<String, String>,
    program_cache: HashMap<String, Rc<Program>>,
    interpreters: HashMap<String, Interpreter>,
    complexity_cache: HashMap<String, ComplexityReport>,
    peak_space_cache: HashMap<String, i64>,
}

impl ScriptHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_loader(Box::new(DirectoryLoader::new(root)))
    }

    pub fn with_loader(loader: Box<dyn SourceLoader>) -> Self {
        Self {
            loader,
            logs: LogSink::new(),
            limits: RuntimeLimits::default(),
            registrars: Vec::new(),
            source_cache: HashMap::new(),
            program_cache: HashMap::new(),
            interpreters: HashMap::new(),
            complexity_cache: HashMap::new(),
            peak_space_cache: HashMap::new(),
        }
    }

    pub fn set_limits(&mut self, limits: RuntimeLimits) {
        self.limits = limits;
    }

    pub fn logs(&self) -> &LogSink {
        &self.logs
    }

    /// Adds a registrar run against every newly created interpreter's global
    /// environment, after the standard builtins.
    pub fn add_builtin_registrar(&mut self, registrar: impl Fn(&EnvRef, &LogSink) + 'static) {
        self.registrars.push(Box::new(registrar));
    }

    pub fn cached_complexity(&self, relative_path: &str) -> Option<&ComplexityReport> {
        self.complexity_cache.get(relative_path)
    }

    pub fn cached_peak_space(&self, relative_path: &str) -> Option<i64> {
        self.peak_space_cache.get(relative_path).copied()
    }

    pub fn interpreter(&self, relative_path: &str) -> Option<&Interpreter> {
        self.interpreters.get(relative_path)
    }

    /// Drops the compiled caches for one path; the source cache is kept.
    pub fn clear_script_cache(&mut self, relative_path: &str) {
        self.program_cache.remove(relative_path);
        self.interpreters.remove(relative_path);
        self.complexity_cache.remove(relative_path);
        self.peak_space_cache.remove(relative_path);
    }

    /// Writes a script through the loader and invalidates its compiled caches
    /// so the next run recompiles.
    pub fn save_source(&mut self, relative_path: &str, text: &str) -> Result<(), ScriptError> {
        self.loader.save_source(relative_path, text)?;
        self.source_cache
            .insert(relative_path.to_string(), text.to_string());
        self.clear_script_cache(relative_path);
        Ok(())
    }

    /// Ticks every cached interpreter's event loop.
    pub fn tick_event_loops(&mut self) {
        let ctx = ExecutionContext::default();
        for interpreter in self.interpreters.values_mut() {
            interpreter.tick_event_loop(&ctx);
        }
    }

    /// Convenience wrapper: runs the conventional `main` entry in Normal mode.
    pub fn run_script(&mut self, relative_path: &str) -> Result<RunReport, ScriptError> {
        self.run_script_file(relative_path, "main", &ExecutionContext::default())
    }

    /// Runs `entry` (zero arguments) from the script at `relative_path`,
    /// compiling and resolving imports if the caches are cold.
    pub fn run_script_file(
        &mut self,
        relative_path: &str,
        entry: &str,
        ctx: &ExecutionContext,
    ) -> Result<RunReport, ScriptError> {
        let total_start = Instant::now();
        let source = self.load_source_cached(relative_path)?;

        let report = if self.program_cache.contains_key(relative_path)
            && self.interpreters.contains_key(relative_path)
        {
            self.run_cached(relative_path, entry, ctx)?
        } else {
            self.run_cold(relative_path, &source, entry, ctx)?
        };

        tracing::debug!(
            target: "magicscript",
            "{relative_path}: {entry}() took {:.3}s total",
            total_start.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    fn run_cold(
        &mut self,
        relative_path: &str,
        source: &str,
        entry: &str,
        ctx: &ExecutionContext,
    ) -> Result<RunReport, ScriptError> {
        let tokens = self.lex_source(relative_path, source)?;
        let program = self.parse_source(relative_path, tokens)?;

        let mut complexity = analysis::analyze_program(&program);

        self.ensure_interpreter(relative_path);
        self.resolve_imports(&program, ctx)?;

        let interpreter = self
            .interpreters
            .get_mut(relative_path)
            .expect("interpreter was just ensured");
        // PreAnalysis: snapshot before running, restore after the entry call,
        // so repeated executions observe the same initial state.
        let snapshot = (ctx.mode == ExecutionMode::PreAnalysis)
            .then(|| interpreter.snapshot_globals());
        interpreter.execute_program(&program, ctx);

        let entry_result = self.call_entry(relative_path, entry, ctx);

        let interpreter = self
            .interpreters
            .get_mut(relative_path)
            .expect("interpreter was just ensured");
        if let Some(snapshot) = snapshot {
            interpreter.restore_globals(snapshot);
        }
        let (return_value, execution_time) = entry_result?;

        let interpreter = &self.interpreters[relative_path];
        complexity.static_complexity_score += interpreter.accumulated_time_complexity_score();
        complexity.dynamic_execution_count = interpreter.execution_count();
        complexity.expression_evaluation_count = interpreter.expression_evaluation_count();
        complexity.function_call_count = interpreter.function_call_count();
        complexity.execution_time_seconds = execution_time;
        let peak_space_bytes = interpreter.peak_space_bytes();
        let aborted = interpreter.aborted();

        self.complexity_cache
            .insert(relative_path.to_string(), complexity.clone());
        self.peak_space_cache
            .insert(relative_path.to_string(), peak_space_bytes);

        tracing::info!(
            target: "magicscript",
            "{relative_path}: {entry}() finished. Return: {}, PeakSpace: {peak_space_bytes} bytes, {complexity}",
            return_value.to_debug_string()
        );

        Ok(RunReport {
            return_value,
            complexity,
            peak_space_bytes,
            aborted,
        })
    }

    fn run_cached(
        &mut self,
        relative_path: &str,
        entry: &str,
        ctx: &ExecutionContext,
    ) -> Result<RunReport, ScriptError> {
        let program = self
            .program_cache
            .get(relative_path)
            .cloned()
            .expect("cached program checked by caller");

        let interpreter = self
            .interpreters
            .get_mut(relative_path)
            .expect("cached interpreter checked by caller");
        let snapshot = (ctx.mode == ExecutionMode::PreAnalysis)
            .then(|| interpreter.snapshot_globals());
        interpreter.execute_program(&program, ctx);

        let entry_result = self.call_entry(relative_path, entry, ctx);
        if let Some(snapshot) = snapshot {
            self.interpreters
                .get_mut(relative_path)
                .expect("cached interpreter checked by caller")
                .restore_globals(snapshot);
        }
        let (return_value, execution_time) = entry_result?;

        let mut complexity = self
            .complexity_cache
            .get(relative_path)
            .cloned()
            .unwrap_or_default();

        let interpreter = self
            .interpreters
            .get_mut(relative_path)
            .expect("cached interpreter checked by caller");
        complexity.dynamic_execution_count = interpreter.execution_count();
        complexity.expression_evaluation_count = interpreter.expression_evaluation_count();
        complexity.function_call_count = interpreter.function_call_count();
        complexity.execution_time_seconds = execution_time;
        let peak_space_bytes = interpreter.peak_space_bytes();
        let aborted = interpreter.aborted();
        interpreter.reset_space_tracking();

        self.complexity_cache
            .insert(relative_path.to_string(), complexity.clone());
        self.peak_space_cache
            .insert(relative_path.to_string(), peak_space_bytes);

        tracing::info!(
            target: "magicscript",
            "{relative_path} (cached): {entry}() finished. Return: {}, PeakSpace: {peak_space_bytes} bytes, {complexity}",
            return_value.to_debug_string()
        );

        Ok(RunReport {
            return_value,
            complexity,
            peak_space_bytes,
            aborted,
        })
    }

    fn call_entry(
        &mut self,
        relative_path: &str,
        entry: &str,
        ctx: &ExecutionContext,
    ) -> Result<(Value, f64), ScriptError> {
        let interpreter = self
            .interpreters
            .get_mut(relative_path)
            .expect("interpreter must exist before entry invocation");

        match Environment::lookup(interpreter.global_env(), entry) {
            Some(Value::Function(_)) => {}
            Some(_) => {
                self.logs.error(format!(
                    "Runtime error: '{entry}' in {relative_path} is not a function"
                ));
                return Err(ScriptError::EntryNotCallable {
                    name: entry.to_string(),
                    path: relative_path.to_string(),
                });
            }
            None => {
                self.logs.error(format!(
                    "Runtime error: entry function '{entry}' is not defined in {relative_path}"
                ));
                return Err(ScriptError::MissingEntry {
                    name: entry.to_string(),
                    path: relative_path.to_string(),
                });
            }
        }

        let start = Instant::now();
        let return_value = interpreter.call_function_by_name(entry, Vec::new(), ctx);
        Ok((return_value, start.elapsed().as_secs_f64()))
    }

    fn load_source_cached(&mut self, relative_path: &str) -> Result<String, ScriptError> {
        if let Some(source) = self.source_cache.get(relative_path) {
            return Ok(source.clone());
        }
        let source = self.loader.load_source(relative_path).inspect_err(|error| {
            self.logs.warning(format!("Script load failed: {error}"));
        })?;
        self.source_cache
            .insert(relative_path.to_string(), source.clone());
        Ok(source)
    }

    fn lex_source(
        &mut self,
        relative_path: &str,
        source: &str,
    ) -> Result<Vec<Token>, ScriptError> {
        let tokens = lexer::tokenize(source);
        let mut had_error = false;
        for token in &tokens {
            if token.kind == TokenKind::Error {
                had_error = true;
                self.logs.error(format!(
                    "Lex error {relative_path}({}:{}): {}",
                    token.location.line, token.location.column, token.lexeme
                ));
            }
        }
        if had_error {
            return Err(ScriptError::Lex {
                path: relative_path.to_string(),
            });
        }
        Ok(tokens)
    }

    fn parse_source(
        &mut self,
        relative_path: &str,
        tokens: Vec<Token>,
    ) -> Result<Rc<Program>, ScriptError> {
        match parser::parse_tokens(tokens) {
            Ok(program) => {
                let program = Rc::new(program);
                self.program_cache
                    .insert(relative_path.to_string(), Rc::clone(&program));
                Ok(program)
            }
            Err(errors) => {
                for error in errors {
                    self.logs.error(format!("{relative_path}: {error}"));
                }
                Err(ScriptError::Parse {
                    path: relative_path.to_string(),
                })
            }
        }
    }

    fn ensure_interpreter(&mut self, relative_path: &str) {
        if self.interpreters.contains_key(relative_path) {
            return;
        }
        let interpreter = Interpreter::with_limits(self.logs.clone(), self.limits);
        register_builtins(interpreter.global_env(), &self.logs);
        for registrar in &self.registrars {
            registrar(interpreter.global_env(), &self.logs);
        }
        self.interpreters
            .insert(relative_path.to_string(), interpreter);
    }

    /// Depth-first resolution of the import DAG. `visiting` is a stack of
    /// paths currently being resolved: re-entering one is a cycle. A path is
    /// popped once its subtree completes, so diamond-shaped imports are legal
    /// and execute once per encounter. Each imported program executes against
    /// its own interpreter's global environment; its declarations do not flow
    /// into the importer.
    fn resolve_imports(
        &mut self,
        program: &Rc<Program>,
        ctx: &ExecutionContext,
    ) -> Result<(), ScriptError> {
        let mut visiting = HashSet::new();
        self.process_imports(program, &mut visiting, ctx)
    }

    fn process_imports(
        &mut self,
        program: &Rc<Program>,
        visiting: &mut HashSet<String>,
        ctx: &ExecutionContext,
    ) -> Result<(), ScriptError> {
        for statement in &program.statements {
            let Statement::Import { path } = statement else {
                continue;
            };

            if visiting.contains(path) {
                self.logs
                    .error(format!("Cyclic import detected: {path}"));
                return Err(ScriptError::CyclicImport { path: path.clone() });
            }
            visiting.insert(path.clone());

            if !self.program_cache.contains_key(path) {
                let source = self.load_source_cached(path)?;
                let tokens = self.lex_source(path, &source)?;
                self.parse_source(path, tokens)?;
            }
            self.ensure_interpreter(path);

            let imported = self
                .program_cache
                .get(path)
                .cloned()
                .expect("import was parsed above");
            self.process_imports(&imported, visiting, ctx)?;

            self.interpreters
                .get_mut(path)
                .expect("interpreter was just ensured")
                .execute_program(&imported, ctx);

            visiting.remove(path);
        }
        Ok(())
    }
}
