//! Runtime value model: a tagged union with reference-counted shared interiors
//! for arrays, objects and functions. Cloning a `Value` is cheap; aliases of
//! the same array or object observe each other's mutations.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::ast::Statement;

use super::env::EnvRef;
use super::ExecutionContext;

pub type NativeFn = Rc<dyn Fn(&[Value], &ExecutionContext) -> Value>;

/// Insertion-ordered string-keyed map backing `Value::Object`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMap {
    entries: Vec<(String, Value)>,
}

impl ObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value)
    }

    /// Inserts or overwrites; an existing key keeps its insertion position.
    pub fn set(&mut self, key: String, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(candidate, _)| *candidate == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.entries.iter()
    }
}

/// A callable: either a script function carrying its body and closure, or a
/// host-provided native implementation.
pub enum FunctionBody {
    Script { body: Rc<Statement>, closure: EnvRef },
    Native(NativeFn),
}

pub struct FunctionValue {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: FunctionBody,
    /// Estimated bytes charged to the space accountant for the duration of a
    /// call into this function.
    pub space_cost_bytes: i64,
    /// Static-complexity score contributed per call, declared by natives.
    pub time_complexity_additional_score: i64,
}

impl FunctionValue {
    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValue")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("native", &self.is_native())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Number(f64),
    Bool(bool),
    String(String),
    Function(Rc<FunctionValue>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectMap>>),
    /// Weak host handle: script retention never extends host-object lifetime.
    NativeObject(Weak<dyn Any>),
}

/// Language equality: structural for primitives, reference identity for
/// functions, arrays, objects and native handles.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            (Value::Array(left), Value::Array(right)) => Rc::ptr_eq(left, right),
            (Value::Object(left), Value::Object(right)) => Rc::ptr_eq(left, right),
            (Value::NativeObject(left), Value::NativeObject(right)) => left.ptr_eq(right),
            _ => false,
        }
    }
}

impl Value {
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn object(map: ObjectMap) -> Self {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn from_native_object(handle: &Rc<dyn Any>) -> Self {
        Value::NativeObject(Rc::downgrade(handle))
    }

    /// Numeric coercion used by arithmetic and relational operators:
    /// non-numbers coerce to 0.0.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(value) => *value,
            _ => 0.0,
        }
    }

    /// Bool cast used by conditions and logical operators: only `Bool(true)`
    /// is true, every other value (including numbers) is false.
    pub fn as_bool(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Number(_) => "Number",
            Value::Bool(_) => "Bool",
            Value::String(_) => "String",
            Value::Function(_) => "Function",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::NativeObject(_) => "NativeObject",
        }
    }

    /// Debug rendering used by `console.*` and run summaries: strings keep
    /// their quotes, arrays render as `[a, b]`, objects as `{ k: v }` in
    /// insertion order.
    pub fn to_debug_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Number(value) => format_number(*value),
            Value::Bool(true) => "true".to_string(),
            Value::Bool(false) => "false".to_string(),
            Value::String(value) => format!("\"{value}\""),
            Value::Function(function) => format!("<spell {}>", function.name),
            Value::Array(values) => {
                let rendered = values
                    .borrow()
                    .iter()
                    .map(Value::to_debug_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{rendered}]")
            }
            Value::Object(map) => {
                let map = map.borrow();
                if map.is_empty() {
                    return "{}".to_string();
                }
                let rendered = map
                    .iter()
                    .map(|(key, value)| format!("{key}: {}", value.to_debug_string()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{ {rendered} }}")
            }
            Value::NativeObject(handle) => {
                if handle.strong_count() > 0 {
                    "<native object>".to_string()
                } else {
                    "<released native object>".to_string()
                }
            }
        }
    }

    /// Per-value size estimate in bytes for the space accountant.
    pub fn estimated_size_bytes(&self) -> i64 {
        match self {
            Value::Null | Value::NativeObject(_) => 0,
            Value::Number(_) => 8,
            Value::Bool(_) => 4,
            Value::String(value) => 24 + 2 * value.chars().count() as i64,
            Value::Function(_) => 64,
            Value::Array(values) => {
                let mut total = 24;
                for element in values.borrow().iter() {
                    total += element.estimated_size_bytes();
                }
                total
            }
            Value::Object(map) => {
                let mut total = 24;
                for (key, value) in map.borrow().iter() {
                    total += 24 + 2 * key.chars().count() as i64;
                    total += value.estimated_size_bytes();
                }
                total
            }
        }
    }
}

/// Renders a number without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
