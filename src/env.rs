// ABOUTME: Environment module for managing variable bindings and scopes

use crate::object::Object;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Object>>,
    outer: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new top-level environment with no outer scope
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            outer: None,
        })
    }

    /// Creates a new environment enclosed by `outer`, as happens on every
    /// function call and macro expansion
    pub fn new_enclosed(outer: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            outer: Some(outer),
        })
    }

    /// Binds a name in THIS scope (never walks the outer chain)
    pub fn define(&self, name: String, value: Object) {
        self.bindings.borrow_mut().insert(name, value);
    }

    /// Looks up a name in this scope and then outward through the chain
    pub fn get(&self, name: &str) -> Option<Object> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }

        if let Some(ref outer) = self.outer {
            return outer.get(name);
        }

        None
    }
}
