use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ClouError, Result};
use crate::value::Value;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    is_const: bool,
}

/// One frame in the lexical scope chain.  The chain root is the
/// interpreter's globals frame; every other frame has exactly one parent.
///
/// Frames created by `require` carry the `module_scope` flag, which the
/// evaluator consults for its module re-entry guard.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Binding>,
    enclosing: Option<Rc<RefCell<Environment>>>,
    module_scope: bool,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
            module_scope: false,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
            module_scope: false,
        }
    }

    pub fn module_scope(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
            module_scope: true,
        }
    }

    pub fn is_module_scope(&self) -> bool {
        self.module_scope
    }

    /// Introduce (or shadow) a binding in this frame.
    pub fn define(&mut self, name: &str, value: Value, is_const: bool) {
        self.values.insert(name.to_string(), Binding { value, is_const });
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(binding) = self.values.get(name) {
            Ok(binding.value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(ClouError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }

    /// Quiet lookup used where a missing name is not an error
    /// (`this`/`super` resolution picks its own message).
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.values.get(name) {
            Some(binding.value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().lookup(name)
        } else {
            None
        }
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if let Some(binding) = self.values.get_mut(name) {
            if binding.is_const {
                return Err(ClouError::runtime(
                    line,
                    format!("Cannot reassign const variable '{}'", name),
                ));
            }

            binding.value = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(ClouError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(env: Environment) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(env))
    }

    #[test]
    fn get_walks_parent_chain() {
        let root = wrap(Environment::new());
        root.borrow_mut().define("x", Value::Number(1.0), false);

        let child = Environment::with_enclosing(root);
        assert_eq!(child.get("x", 1).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_updates_nearest_binding() {
        let root = wrap(Environment::new());
        root.borrow_mut().define("x", Value::Number(1.0), false);

        let child = wrap(Environment::with_enclosing(root.clone()));
        child
            .borrow_mut()
            .assign("x", Value::Number(2.0), 1)
            .unwrap();

        assert_eq!(root.borrow().get("x", 1).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn assign_to_unknown_name_fails() {
        let mut env = Environment::new();
        let err = env.assign("missing", Value::Null, 3).unwrap_err();

        assert!(err.to_string().contains("Undefined variable 'missing'"));
    }

    #[test]
    fn const_binding_rejects_reassignment() {
        let mut env = Environment::new();
        env.define("pi", Value::Number(3.14), true);

        let err = env.assign("pi", Value::Number(3.0), 2).unwrap_err();
        assert!(err
            .to_string()
            .contains("Cannot reassign const variable 'pi'"));
    }

    #[test]
    fn shadowing_in_child_leaves_parent_untouched() {
        let root = wrap(Environment::new());
        root.borrow_mut().define("x", Value::Number(1.0), false);

        let child = wrap(Environment::with_enclosing(root.clone()));
        child.borrow_mut().define("x", Value::Number(9.0), false);

        assert_eq!(child.borrow().get("x", 1).unwrap(), Value::Number(9.0));
        assert_eq!(root.borrow().get("x", 1).unwrap(), Value::Number(1.0));
    }
}
