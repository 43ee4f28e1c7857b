//! Script log stream shared by the host, interpreters, and native functions.
//!
//! Scripts never see Rust errors: `console.*` output, runtime error reports
//! and load warnings all land here as ordered entries. Every push is mirrored
//! to `tracing` so hosts that only care about diagnostics get them for free,
//! and listeners can subscribe for broadcast-style delivery.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSeverity::Info => write!(f, "info"),
            LogSeverity::Warning => write!(f, "warning"),
            LogSeverity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLog {
    pub severity: LogSeverity,
    pub message: String,
}

type Listener = Box<dyn Fn(&ScriptLog)>;

#[derive(Default)]
struct LogBuffer {
    entries: Vec<ScriptLog>,
    listeners: Vec<Listener>,
}

/// Cheaply cloneable handle to a shared log buffer.
#[derive(Clone, Default)]
pub struct LogSink {
    inner: Rc<RefCell<LogBuffer>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, severity: LogSeverity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            LogSeverity::Info => tracing::info!(target: "magicscript", "{message}"),
            LogSeverity::Warning => tracing::warn!(target: "magicscript", "{message}"),
            LogSeverity::Error => tracing::error!(target: "magicscript", "{message}"),
        }

        let entry = ScriptLog { severity, message };
        let mut inner = self.inner.borrow_mut();
        for listener in &inner.listeners {
            listener(&entry);
        }
        inner.entries.push(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogSeverity::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(LogSeverity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogSeverity::Error, message);
    }

    /// Registers a broadcast listener invoked for every future entry.
    /// Listeners must not push into the sink themselves.
    pub fn subscribe(&self, listener: impl Fn(&ScriptLog) + 'static) {
        self.inner.borrow_mut().listeners.push(Box::new(listener));
    }

    pub fn entries(&self) -> Vec<ScriptLog> {
        self.inner.borrow().entries.clone()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().entries.clear();
    }

    pub fn has_errors(&self) -> bool {
        self.inner
            .borrow()
            .entries
            .iter()
            .any(|entry| entry.severity == LogSeverity::Error)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.inner
            .borrow()
            .entries
            .iter()
            .any(|entry| entry.message.contains(needle))
    }
}
