//! Lexical scope chain: each frame maps names to bindings and points at its
//! enclosing frame, forming a cactus stack shared by closures.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::Value;

pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub is_const: bool,
}

#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<EnvRef>,
    table: HashMap<String, Binding>,
}

impl Environment {
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            table: HashMap::new(),
        }))
    }

    /// Inserts into the current frame. Fails (returns false) when the name is
    /// already bound in this frame; there is no shadowing at the same level.
    pub fn define(&mut self, name: impl Into<String>, value: Value, is_const: bool) -> bool {
        let name = name.into();
        if self.table.contains_key(&name) {
            return false;
        }
        self.table.insert(name, Binding { value, is_const });
        true
    }

    /// Walks the chain and overwrites the nearest binding. Fails on a const
    /// binding or when the name is unbound anywhere in the chain.
    pub fn assign(env: &EnvRef, name: &str, value: Value) -> bool {
        let mut current = Some(Rc::clone(env));
        while let Some(frame) = current {
            let mut frame = frame.borrow_mut();
            if let Some(binding) = frame.table.get_mut(name) {
                if binding.is_const {
                    return false;
                }
                binding.value = value;
                return true;
            }
            current = frame.parent.clone();
        }
        false
    }

    /// Walks the chain and returns a clone of the nearest binding's value.
    /// Shared-interior values (arrays, objects, functions) stay aliased.
    pub fn lookup(env: &EnvRef, name: &str) -> Option<Value> {
        let mut current = Some(Rc::clone(env));
        while let Some(frame) = current {
            let frame = frame.borrow();
            if let Some(binding) = frame.table.get(name) {
                return Some(binding.value.clone());
            }
            current = frame.parent.clone();
        }
        None
    }

    /// Snapshot for PreAnalysis restore: frames are copied recursively up the
    /// chain, but values keep sharing their interiors, so in-place Array and
    /// Object mutations are not undone by restoring a snapshot.
    pub fn deep_clone(env: &EnvRef) -> EnvRef {
        let frame = env.borrow();
        let parent = frame.parent.as_ref().map(Environment::deep_clone);
        Rc::new(RefCell::new(Self {
            parent,
            table: frame.table.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_rejects_duplicates_in_the_same_frame() {
        let env = Environment::new();
        assert!(env.borrow_mut().define("x", Value::Number(1.0), false));
        assert!(!env.borrow_mut().define("x", Value::Number(2.0), false));
        assert_eq!(Environment::lookup(&env, "x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn child_frames_may_shadow_parent_bindings() {
        let parent = Environment::new();
        parent.borrow_mut().define("x", Value::Number(1.0), false);
        let child = Environment::with_parent(Rc::clone(&parent));
        assert!(child.borrow_mut().define("x", Value::Number(2.0), false));
        assert_eq!(Environment::lookup(&child, "x"), Some(Value::Number(2.0)));
        assert_eq!(Environment::lookup(&parent, "x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn assign_walks_the_chain() {
        let parent = Environment::new();
        parent.borrow_mut().define("x", Value::Number(1.0), false);
        let child = Environment::with_parent(Rc::clone(&parent));

        assert!(Environment::assign(&child, "x", Value::Number(5.0)));
        assert_eq!(Environment::lookup(&parent, "x"), Some(Value::Number(5.0)));
    }

    #[test]
    fn assign_fails_on_const_or_unbound() {
        let env = Environment::new();
        env.borrow_mut().define("k", Value::Number(1.0), true);

        assert!(!Environment::assign(&env, "k", Value::Number(2.0)));
        assert!(!Environment::assign(&env, "missing", Value::Number(2.0)));
        assert_eq!(Environment::lookup(&env, "k"), Some(Value::Number(1.0)));
    }

    #[test]
    fn deep_clone_snapshots_primitive_bindings() {
        let parent = Environment::new();
        parent.borrow_mut().define("x", Value::Number(1.0), false);
        let child = Environment::with_parent(Rc::clone(&parent));
        child.borrow_mut().define("y", Value::Number(2.0), false);

        let snapshot = Environment::deep_clone(&child);
        Environment::assign(&child, "x", Value::Number(9.0));
        Environment::assign(&child, "y", Value::Number(9.0));

        assert_eq!(Environment::lookup(&snapshot, "x"), Some(Value::Number(1.0)));
        assert_eq!(Environment::lookup(&snapshot, "y"), Some(Value::Number(2.0)));
    }

    #[test]
    fn deep_clone_shares_container_interiors() {
        let env = Environment::new();
        let array = Value::array(vec![Value::Number(1.0)]);
        env.borrow_mut().define("a", array.clone(), false);

        let snapshot = Environment::deep_clone(&env);
        if let Value::Array(values) = &array {
            values.borrow_mut().push(Value::Number(2.0));
        }

        // The snapshot sees the in-place mutation: only the frame tables are
        // copied, the array interior is shared.
        let snapshot_value = Environment::lookup(&snapshot, "a").expect("binding");
        assert_eq!(snapshot_value.to_debug_string(), "[1, 2]");
    }
}
