//! `oxirb`: a Ruby-style object model for Rust hosts
//!
//! `oxirb` implements the object machinery a compiled dynamic language needs
//! on top of a host that has none of it:
//!
//! - **Classes and modules** with single inheritance, `include`, `prepend`
//!   and `extend`, linearized into a cached ancestor list
//! - **Dynamic dispatch** with a versioned per-class method cache,
//!   `method_missing`, `super`, aliases, `undef_method` and stubs
//! - **Singleton classes** for objects, modules and the special constants
//! - **Constants** with lexical nesting, autoload and `const_missing`
//! - **Native values** (integers, floats, strings, arrays, hashes, ranges,
//!   regexps, procs) bridged onto core classes instead of wrapped
//! - **Blocks** whose `break` and `return` unwind to the right frame
//!
//! Method bodies are host closures; nothing here parses source text.
//!
//! # Example
//!
//! ```rust
//! use oxirb::{Arity, Runtime, Value};
//!
//! let mut rt = Runtime::new().unwrap();
//! let greeting = rt.define_or_reopen_module(&Value::Nil, "Greeting").unwrap();
//! rt.define_method(greeting, "hello", Arity::exact(0), |_rt, _frame| {
//!     Ok(Value::str("hi"))
//! })
//! .unwrap();
//!
//! let person = rt.define_or_reopen_class(&Value::Nil, None, "Person").unwrap();
//! rt.include(person, greeting).unwrap();
//!
//! let bob = rt.new_instance(person, vec![], None).unwrap();
//! assert_eq!(rt.call(bob, "hello", vec![]).unwrap(), Value::str("hi"));
//! ```

pub mod config;
pub mod error;
pub mod runtime;

// Re-export commonly used types
pub use config::{MissingRequire, RuntimeConfig};
pub use error::{Error, ErrorKind, Result};
pub use runtime::{
    Arity, BlockCall, CaptureSink, CoreClasses, DefaultPolicy, Frame, HashTable, Lookup,
    Method, ModuleId, ModuleKind, NativeKind, Nesting, OutputSink, Proc, Runtime,
    RuntimeStats, Tag, Value,
};
