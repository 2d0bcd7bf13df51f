use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    error::InterpreterError,
    value::{Label, Value},
};

/// A lexically nested name-to-value map (spec §4.2).
///
/// Backed by an `IndexMap` rather than a `HashMap` so that a scope's bindings
/// iterate in declaration order — useful for deterministic `labelPrint`
/// output and for snapshotting a scope in tests. Scopes form a tree rooted at
/// the global scope; a child only ever holds a strong reference to its
/// parent, so no cycle can arise (spec §9, "cyclic scope references").
#[derive(Debug)]
pub struct Scope {
    names: IndexMap<String, Value>,
    parent: Option<Rc<RefCell<Scope>>>,
    next_var: u64,
}

impl Scope {
    #[must_use]
    pub fn root() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            names: IndexMap::new(),
            parent: None,
            next_var: 0,
        }))
    }

    #[must_use]
    pub fn child(parent: Rc<RefCell<Self>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            names: IndexMap::new(),
            parent: Some(parent),
            next_var: 0,
        }))
    }

    /// `declare(name, value=Undefined, extra_label=∅)`: always creates in the
    /// current scope, joining `extra_label` into the value's label.
    pub fn declare(&mut self, name: impl Into<String>, value: Value, extra_label: &Label) {
        let mut value = value;
        value.label = crate::value::join(&value.label, extra_label);
        self.names.insert(name.into(), value);
    }

    /// `get(name) -> Value`, recursing to the parent; fails with `RefError`
    /// if the name is not bound anywhere in the chain.
    pub fn get(&self, name: &str) -> Result<Value, InterpreterError> {
        if let Some(v) = self.names.get(name) {
            return Ok(v.clone());
        }
        match &self.parent {
            Some(parent) => parent.borrow().get(name),
            None => Err(InterpreterError::RefError(format!("name '{name}' is not defined"))),
        }
    }

    /// `set(name, value, local=false)`: writes to the nearest scope
    /// containing `name`, or to the current scope if `local` or there is no
    /// parent (i.e. this is the global scope, which creates bindings on
    /// write, matching the original source's `__setitem__`).
    pub fn set(&mut self, name: &str, value: Value, local: bool) {
        if local || self.names.contains_key(name) || self.parent.is_none() {
            self.names.insert(name.to_owned(), value);
        } else {
            let parent = self.parent.clone().expect("checked above");
            parent.borrow_mut().set(name, value, false);
        }
    }

    /// `contains(name)`: transitive through parents.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name) || self.parent.as_ref().is_some_and(|p| p.borrow().contains(name))
    }

    /// Label of an existing binding, used by `AssignRule`'s no-sensitive-
    /// upgrade check. Returns `None` if the name isn't bound anywhere.
    #[must_use]
    pub fn label_of(&self, name: &str) -> Option<Label> {
        self.get(name).ok().map(|v| v.label)
    }

    /// `fresh_var()`: a monotonically increasing id, always minted by the
    /// root scope.
    pub fn fresh_var(&mut self) -> u64 {
        match &self.parent {
            None => {
                self.next_var += 1;
                self.next_var
            }
            Some(parent) => parent.borrow_mut().fresh_var(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    #[test]
    fn lookup_recurses_to_parent() {
        let root = Scope::root();
        root.borrow_mut().declare("x", Value::number(1.0), &Label::new());
        let child = Scope::child(root.clone());
        assert_eq!(child.borrow().get("x").unwrap().to_number(), 1.0);
        assert!(child.borrow().contains("x"));
    }

    #[test]
    fn set_without_local_updates_enclosing_binding() {
        let root = Scope::root();
        root.borrow_mut().declare("x", Value::number(1.0), &Label::new());
        let child = Scope::child(root.clone());
        child.borrow_mut().set("x", Value::number(2.0), false);
        assert_eq!(root.borrow().get("x").unwrap().to_number(), 2.0);
        assert!(!child.borrow().contains_locally("x"));
    }

    #[test]
    fn set_local_shadows_parent() {
        let root = Scope::root();
        root.borrow_mut().declare("x", Value::number(1.0), &Label::new());
        let child = Scope::child(root.clone());
        child.borrow_mut().set("x", Value::number(2.0), true);
        assert_eq!(root.borrow().get("x").unwrap().to_number(), 1.0);
        assert_eq!(child.borrow().get("x").unwrap().to_number(), 2.0);
    }

    #[test]
    fn missing_name_is_ref_error() {
        let root = Scope::root();
        assert!(matches!(root.borrow().get("missing"), Err(InterpreterError::RefError(_))));
    }

    #[test]
    fn undeclared_write_on_global_creates_binding() {
        let root = Scope::root();
        root.borrow_mut().set("y", Value::undefined(), false);
        assert!(matches!(root.borrow().get("y").unwrap().kind, ValueKind::Undefined));
    }

    impl Scope {
        fn contains_locally(&self, name: &str) -> bool {
            self.names.contains_key(name)
        }
    }
}
