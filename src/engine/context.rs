// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared mutable state handed to every step of one run.
//!
//! A [`Context`] plays two roles: the execution context of a dependency graph
//! run (a side channel tasks use to stash results the caller reads afterwards)
//! and the accumulator of a sequence or fold loop (named fields written by the
//! renaming facility on [`crate::engine::sequence::Next`]).
//!
//! Runs are single-threaded, so the handle is an `Rc<RefCell<..>>`. Every
//! accessor borrows only for the duration of the call; never hold a value
//! returned by [`Context::with`] across a continuation.

use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Clonable handle to a name → value map scoped to one run.
#[derive(Clone, Default)]
pub struct Context {
    fields: Rc<RefCell<HashMap<String, Value>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    /// Reads `name` as an `i64`, if present and numeric.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.fields.borrow().get(name).and_then(Value::as_i64)
    }

    /// Stores `value` under `name`, returning the previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.borrow_mut().insert(name.into(), value.into())
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.fields.borrow_mut().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }

    /// Runs `f` with mutable access to the value under `name`, inserting
    /// `Value::Null` first if absent.
    pub fn with<R>(&self, name: &str, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut fields = self.fields.borrow_mut();
        let slot = fields.entry(name.to_string()).or_insert(Value::Null);
        f(slot)
    }

    /// Copies the current contents out of the handle.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.fields.borrow().clone()
    }

    pub(crate) fn clear(&self) {
        self.fields.borrow_mut().clear();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.borrow().iter()).finish()
    }
}
