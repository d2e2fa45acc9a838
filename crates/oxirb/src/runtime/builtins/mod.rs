//! Core library methods registered at boot.
//!
//! Every method here is an ordinary native method installed through
//! [`Runtime::define_native`], so user code can override, alias, undefine
//! or `super` into any of them.

mod array;
mod hash;
mod kernel;
mod misc;
mod module;
mod numeric;
mod range;
mod string;

use crate::error::{Error, Result};
use crate::runtime::class::ModuleId;
use crate::runtime::frame::Frame;
use crate::runtime::method::Arity;
use crate::runtime::value::Value;
use crate::runtime::Runtime;
use std::rc::Rc;

/// Signature of a core library method.
pub(crate) type Builtin = fn(&mut Runtime, &Frame) -> Result<Value>;

/// Installs the core library.
pub(crate) fn install(rt: &mut Runtime) -> Result<()> {
    kernel::install(rt)?;
    module::install(rt)?;
    numeric::install(rt)?;
    string::install(rt)?;
    array::install(rt)?;
    hash::install(rt)?;
    range::install(rt)?;
    misc::install(rt)?;
    oxirb_log::debug!("core library installed");
    Ok(())
}

fn define_all(rt: &mut Runtime, owner: ModuleId, methods: &[(&str, Arity, Builtin)]) -> Result<()> {
    for (name, arity, body) in methods {
        let sym = rt.intern(name);
        rt.define_native(owner, sym, *arity, Rc::new(*body))?;
    }
    Ok(())
}

/// Method or constant name passed as an argument (symbols are strings).
fn name_arg(rt: &Runtime, value: &Value) -> Result<Rc<str>> {
    match value.unwrap_native() {
        Value::String(s) => Ok(s.shared()),
        other => Err(Error::type_error(format!(
            "{} is not a symbol nor a string",
            rt.describe(other)
        ))),
    }
}

fn module_arg(rt: &Runtime, value: &Value) -> Result<ModuleId> {
    value.as_module().ok_or_else(|| {
        Error::type_error(format!(
            "wrong argument type {} (expected Module)",
            rt.class_label(value)
        ))
    })
}

/// The receiver of a `Module`/`Class` method.
fn receiver_module(rt: &Runtime, frame: &Frame) -> Result<ModuleId> {
    module_arg(rt, &frame.receiver)
}

/// Optional boolean argument, `true` when absent.
fn flag_arg(frame: &Frame, index: usize) -> bool {
    frame.args.get(index).is_none_or(Value::truthy)
}

fn join_inspected(rt: &mut Runtime, items: &[Value]) -> Result<String> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(rt.inspect(item)?);
    }
    Ok(parts.join(", "))
}
