use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::exception::{Eval, Exception};
use crate::types::Type;
use crate::value::Value;

/// One lexical scope. Only the global scope, function calls and class
/// bodies create environments; loop and `if` bodies reuse the current one.
///
/// Names listed in `globals_declared` always resolve against the root scope,
/// names in `nonlocals_declared` against the nearest enclosing non‑root
/// scope that already binds them. Everything else reads through the chain
/// and writes to this scope.
pub struct Environment {
    values: HashMap<String, Value>,
    types: HashMap<String, Type>,
    enclosing: Option<Rc<RefCell<Environment>>>,
    globals_declared: HashSet<String>,
    nonlocals_declared: HashSet<String>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            types: HashMap::new(),
            enclosing: None,
            globals_declared: HashSet::new(),
            nonlocals_declared: HashSet::new(),
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            enclosing: Some(enclosing),
            ..Environment::new()
        }
    }

    pub fn into_shared(self) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(self))
    }

    pub fn is_root(&self) -> bool {
        self.enclosing.is_none()
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Binds `name` in this scope, ignoring any `global`/`nonlocal` routing.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn declare_global(&mut self, name: &str) {
        debug!("Declaring '{}' global", name);
        self.nonlocals_declared.remove(name);
        self.globals_declared.insert(name.to_string());
    }

    /// Fails with `NameError` when no enclosing function scope binds `name`.
    pub fn declare_nonlocal(&mut self, name: &str) -> Eval<()> {
        let bound = self
            .enclosing
            .as_ref()
            .is_some_and(|enclosing| enclosing.borrow().binds_nonlocally(name));

        if !bound {
            return Err(Exception::name_error(format!(
                "no binding for nonlocal '{}' found",
                name
            )));
        }

        debug!("Declaring '{}' nonlocal", name);
        self.globals_declared.remove(name);
        self.nonlocals_declared.insert(name.to_string());
        Ok(())
    }

    fn binds_nonlocally(&self, name: &str) -> bool {
        if self.is_root() {
            return false;
        }

        self.has_local(name)
            || self
                .enclosing
                .as_ref()
                .is_some_and(|enclosing| enclosing.borrow().binds_nonlocally(name))
    }

    /// Reads a name, honouring `global`/`nonlocal` declarations.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if self.globals_declared.contains(name) {
            return self.lookup_global(name);
        }

        if !self.nonlocals_declared.contains(name) {
            if let Some(value) = self.values.get(name) {
                return Some(value.clone());
            }
        }

        self.enclosing
            .as_ref()
            .and_then(|enclosing| enclosing.borrow().lookup(name))
    }

    pub fn get(&self, name: &str) -> Eval<Value> {
        self.lookup(name)
            .ok_or_else(|| Exception::name_error(format!("name '{}' is not defined", name)))
    }

    fn lookup_global(&self, name: &str) -> Option<Value> {
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().lookup_global(name),
            None => self.values.get(name).cloned(),
        }
    }

    /// Assignment: routes declared names to their owning scope, otherwise
    /// defines or overwrites in this scope.
    pub fn assign(&mut self, name: &str, value: Value) -> Eval<()> {
        if self.globals_declared.contains(name) {
            self.assign_global(name, value);
            return Ok(());
        }

        if self.nonlocals_declared.contains(name) {
            let assigned = match &self.enclosing {
                Some(enclosing) => enclosing.borrow_mut().assign_nonlocal(name, value),
                None => false,
            };

            if !assigned {
                return Err(Exception::name_error(format!(
                    "no binding for nonlocal '{}' found",
                    name
                )));
            }

            return Ok(());
        }

        self.define(name, value);
        Ok(())
    }

    fn assign_global(&mut self, name: &str, value: Value) {
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign_global(name, value),
            None => self.define(name, value),
        }
    }

    fn assign_nonlocal(&mut self, name: &str, value: Value) -> bool {
        if self.is_root() {
            return false;
        }

        if self.has_local(name) && !self.nonlocals_declared.contains(name) {
            self.define(name, value);
            return true;
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign_nonlocal(name, value),
            None => false,
        }
    }

    /// Records an annotation for `name` in the scope that owns it.
    pub fn declare_type(&mut self, name: &str, ty: Type) {
        if self.globals_declared.contains(name) {
            if let Some(enclosing) = &self.enclosing {
                return enclosing.borrow_mut().declare_type_global(name, ty);
            }
        }

        self.types.insert(name.to_string(), ty);
    }

    fn declare_type_global(&mut self, name: &str, ty: Type) {
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().declare_type_global(name, ty),
            None => {
                self.types.insert(name.to_string(), ty);
            }
        }
    }

    /// The annotation governing writes to `name` from this scope, if any.
    pub fn declared_type(&self, name: &str) -> Option<Type> {
        if self.globals_declared.contains(name) {
            return match &self.enclosing {
                Some(enclosing) => enclosing.borrow().root_type(name),
                None => self.types.get(name).cloned(),
            };
        }

        if self.nonlocals_declared.contains(name) {
            return self
                .enclosing
                .as_ref()
                .and_then(|enclosing| enclosing.borrow().nonlocal_type(name));
        }

        self.types.get(name).cloned()
    }

    fn root_type(&self, name: &str) -> Option<Type> {
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().root_type(name),
            None => self.types.get(name).cloned(),
        }
    }

    fn nonlocal_type(&self, name: &str) -> Option<Type> {
        if self.has_local(name) {
            return self.types.get(name).cloned();
        }

        self.enclosing
            .as_ref()
            .and_then(|enclosing| enclosing.borrow().nonlocal_type(name))
    }

    /// Local bindings, sorted by name.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut bindings: Vec<(String, Value)> = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();

        f.debug_struct("Environment")
            .field("names", &names)
            .field("globals_declared", &self.globals_declared)
            .field("nonlocals_declared", &self.nonlocals_declared)
            .field("is_root", &self.is_root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (Rc<RefCell<Environment>>, Rc<RefCell<Environment>>, Rc<RefCell<Environment>>) {
        let root = Environment::new().into_shared();
        let outer = Environment::with_enclosing(root.clone()).into_shared();
        let inner = Environment::with_enclosing(outer.clone()).into_shared();
        (root, outer, inner)
    }

    #[test]
    fn plain_assignment_shadows() {
        let (root, _outer, inner) = chain();
        root.borrow_mut().define("x", Value::Number(1.0));

        inner.borrow_mut().assign("x", Value::Number(2.0)).unwrap();

        assert_eq!(root.borrow().get("x").unwrap(), Value::Number(1.0));
        assert_eq!(inner.borrow().get("x").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn global_assignment_reaches_root() {
        let (root, _outer, inner) = chain();
        root.borrow_mut().define("x", Value::Number(1.0));

        inner.borrow_mut().declare_global("x");
        inner.borrow_mut().assign("x", Value::Number(2.0)).unwrap();

        assert_eq!(root.borrow().get("x").unwrap(), Value::Number(2.0));
        assert!(!inner.borrow().has_local("x"));
    }

    #[test]
    fn nonlocal_assignment_reaches_enclosing_function() {
        let (root, outer, inner) = chain();
        root.borrow_mut().define("n", Value::Number(0.0));
        outer.borrow_mut().define("n", Value::Number(1.0));

        inner.borrow_mut().declare_nonlocal("n").unwrap();
        inner.borrow_mut().assign("n", Value::Number(5.0)).unwrap();

        assert_eq!(outer.borrow().get("n").unwrap(), Value::Number(5.0));
        assert_eq!(root.borrow().get("n").unwrap(), Value::Number(0.0));
    }

    #[test]
    fn nonlocal_skips_the_global_scope() {
        let (root, _outer, inner) = chain();
        root.borrow_mut().define("g", Value::Number(0.0));

        let err = inner.borrow_mut().declare_nonlocal("g").unwrap_err();
        assert_eq!(err.kind, "NameError");
    }

    #[test]
    fn undefined_name_is_name_error() {
        let (_root, _outer, inner) = chain();
        let err = inner.borrow().get("missing").unwrap_err();
        assert_eq!(err.kind, "NameError");
        assert!(err.message.contains("missing"));
    }
}
