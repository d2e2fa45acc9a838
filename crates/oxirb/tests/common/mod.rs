// Common test utilities for integration tests
//
// Shared fixtures for booting a runtime, declaring classes and modules at
// top level and recording which method bodies ran.

#![allow(dead_code)]

use oxirb::{Arity, CaptureSink, ModuleId, Runtime, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Boots a runtime with output captured instead of printed.
pub fn boot() -> (Runtime, CaptureSink) {
    let mut rt = Runtime::new().expect("Failed to boot runtime");
    let sink = CaptureSink::new();
    rt.set_output(Box::new(sink.clone()));
    (rt, sink)
}

/// `class Name < superclass` at top level.
pub fn class(rt: &mut Runtime, name: &str, superclass: Option<ModuleId>) -> ModuleId {
    rt.define_or_reopen_class(&Value::Nil, superclass, name)
        .expect("Failed to define test class")
}

/// `module Name` at top level.
pub fn module(rt: &mut Runtime, name: &str) -> ModuleId {
    rt.define_or_reopen_module(&Value::Nil, name)
        .expect("Failed to define test module")
}

/// Defines a zero-argument method returning a constant string.
pub fn define_returning(rt: &mut Runtime, owner: ModuleId, name: &str, reply: &'static str) {
    rt.define_method(owner, name, Arity::exact(0), move |_rt, _frame| {
        Ok(Value::str(reply))
    })
    .expect("Failed to define test method");
}

/// Ordered record of events shared between test closures.
#[derive(Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Host string of a value that must be a string.
pub fn text(value: &Value) -> String {
    value
        .as_str()
        .expect("Expected a string value")
        .to_string()
}

/// Display names of `ids`, for readable ancestor assertions.
pub fn names(rt: &Runtime, ids: &[ModuleId]) -> Vec<String> {
    ids.iter().map(|id| rt.display_name(*id)).collect()
}
