//! `Hash`, backed by [`HashTable`](crate::runtime::hash::HashTable).

use super::{define_all, Builtin};
use crate::error::{Error, Result};
use crate::runtime::frame::Frame;
use crate::runtime::hash::DefaultPolicy;
use crate::runtime::method::Arity;
use crate::runtime::value::{RHash, Value};
use crate::runtime::Runtime;
use std::rc::Rc;

pub(super) fn install(rt: &mut Runtime) -> Result<()> {
    let hash = rt.core().hash;
    let methods: &[(&str, Arity, Builtin)] = &[
        ("[]", Arity::exact(1), get),
        ("[]=", Arity::exact(2), put),
        ("store", Arity::exact(2), put),
        ("fetch", Arity::range(1, 1), fetch),
        ("delete", Arity::exact(1), delete),
        ("key?", Arity::exact(1), has_key),
        ("has_key?", Arity::exact(1), has_key),
        ("include?", Arity::exact(1), has_key),
        ("keys", Arity::exact(0), keys),
        ("values", Arity::exact(0), values),
        ("size", Arity::exact(0), size),
        ("length", Arity::exact(0), size),
        ("empty?", Arity::exact(0), is_empty),
        ("default", Arity::exact(0), default),
        ("default=", Arity::exact(1), set_default),
        ("compare_by_identity", Arity::exact(0), compare_by_identity),
        ("compare_by_identity?", Arity::exact(0), is_compare_by_identity),
        ("rehash", Arity::exact(0), rehash),
        ("inspect", Arity::exact(0), inspect),
        ("to_s", Arity::exact(0), inspect),
    ];
    define_all(rt, hash, methods)
}

fn hash_ref(rt: &Runtime, value: &Value) -> Result<Rc<RHash>> {
    match value.unwrap_native() {
        Value::Hash(h) => Ok(Rc::clone(h)),
        other => Err(rt.conversion_error(other, "Hash")),
    }
}

fn busy() -> Error {
    Error::Reentrant { what: "hash" }
}

fn get(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    rt.hash_get(&frame.receiver, &frame.arg(0))
}

fn put(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let value = frame.arg(1);
    rt.hash_put(&frame.receiver, frame.arg(0), value.clone())?;
    Ok(value)
}

/// `fetch(key)` raises `KeyError` when absent; `fetch(key, fallback)`
/// returns the fallback instead.
fn fetch(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    if frame.args.len() == 1 {
        return rt.hash_fetch(&frame.receiver, &frame.arg(0));
    }
    Ok(rt
        .hash_lookup(&frame.receiver, &frame.arg(0))?
        .unwrap_or_else(|| frame.arg(1)))
}

fn delete(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(rt.hash_delete(&frame.receiver, &frame.arg(0))?.unwrap_or_default())
}

fn has_key(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(rt.hash_lookup(&frame.receiver, &frame.arg(0))?.is_some()))
}

fn keys(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let h = hash_ref(rt, &frame.receiver)?;
    let keys = h.table.try_borrow().map_err(|_| busy())?.keys();
    Ok(Value::array(keys))
}

fn values(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let h = hash_ref(rt, &frame.receiver)?;
    let values = h.table.try_borrow().map_err(|_| busy())?.values();
    Ok(Value::array(values))
}

fn size(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let h = hash_ref(rt, &frame.receiver)?;
    let len = h.table.try_borrow().map_err(|_| busy())?.len();
    Ok(Value::Integer(len as i64))
}

fn is_empty(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let h = hash_ref(rt, &frame.receiver)?;
    let empty = h.table.try_borrow().map_err(|_| busy())?.is_empty();
    Ok(Value::bool(empty))
}

/// The static default; `nil` when a default proc is set.
fn default(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let h = hash_ref(rt, &frame.receiver)?;
    let table = h.table.try_borrow().map_err(|_| busy())?;
    Ok(match table.default_policy() {
        DefaultPolicy::Value(value) => value.clone(),
        DefaultPolicy::Proc(_) => Value::Nil,
    })
}

fn set_default(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let h = hash_ref(rt, &frame.receiver)?;
    let value = frame.arg(0);
    h.table.try_borrow_mut().map_err(|_| busy())?.set_default(value.clone());
    Ok(value)
}

fn compare_by_identity(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    rt.hash_compare_by_identity(&frame.receiver)?;
    Ok(frame.receiver.clone())
}

fn is_compare_by_identity(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let h = hash_ref(rt, &frame.receiver)?;
    let identity = h.table.try_borrow().map_err(|_| busy())?.is_identity();
    Ok(Value::bool(identity))
}

fn rehash(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    rt.hash_rehash(&frame.receiver)?;
    Ok(frame.receiver.clone())
}

fn inspect(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let h = hash_ref(rt, &frame.receiver)?;
    let entries = h.table.try_borrow().map_err(|_| busy())?.entries();
    if entries.is_empty() {
        return Ok(Value::str("{}"));
    }
    let mut parts = Vec::with_capacity(entries.len());
    for (key, value) in &entries {
        parts.push(format!("{} => {}", rt.inspect(key)?, rt.inspect(value)?));
    }
    Ok(Value::str(&format!("{{{}}}", parts.join(", "))))
}
