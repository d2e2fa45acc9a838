//! `Array`.

use super::kernel::inspect_list;
use super::{define_all, Builtin};
use crate::error::{Error, Result};
use crate::runtime::frame::Frame;
use crate::runtime::method::Arity;
use crate::runtime::value::{RArray, Value};
use crate::runtime::Runtime;
use std::hash::Hasher;
use std::rc::Rc;

pub(super) fn install(rt: &mut Runtime) -> Result<()> {
    let array = rt.core().array;
    let methods: &[(&str, Arity, Builtin)] = &[
        ("==", Arity::exact(1), eq),
        ("eql?", Arity::exact(1), eql),
        ("hash", Arity::exact(0), hash),
        ("[]", Arity::exact(1), index),
        ("<<", Arity::exact(1), push),
        ("push", Arity::ANY, push_all),
        ("length", Arity::exact(0), length),
        ("size", Arity::exact(0), length),
        ("empty?", Arity::exact(0), is_empty),
        ("first", Arity::exact(0), first),
        ("last", Arity::exact(0), last),
        ("include?", Arity::exact(1), include),
        ("inspect", Arity::exact(0), inspect),
        ("to_s", Arity::exact(0), inspect),
        ("each", Arity::exact(0), each),
        ("map", Arity::exact(0), map),
    ];
    define_all(rt, array, methods)
}

fn array_ref(rt: &Runtime, value: &Value) -> Result<Rc<RArray>> {
    match value.unwrap_native() {
        Value::Array(a) => Ok(Rc::clone(a)),
        other => Err(rt.conversion_error(other, "Array")),
    }
}

/// Copy of the receiver's elements. Callbacks may mutate the array, so
/// element-wise work never holds a borrow across dispatch.
fn snapshot(rt: &Runtime, frame: &Frame) -> Result<Vec<Value>> {
    Ok(array_ref(rt, &frame.receiver)?.items().clone())
}

fn other_items(value: &Value) -> Option<Vec<Value>> {
    match value.unwrap_native() {
        Value::Array(a) => Some(a.items().clone()),
        _ => None,
    }
}

fn eq(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let mine = snapshot(rt, frame)?;
    let Some(theirs) = other_items(&frame.arg(0)) else {
        return Ok(Value::False);
    };
    if mine.len() != theirs.len() {
        return Ok(Value::False);
    }
    for (a, b) in mine.iter().zip(&theirs) {
        if !rt.equals(a, b)? {
            return Ok(Value::False);
        }
    }
    Ok(Value::True)
}

fn eql(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let mine = snapshot(rt, frame)?;
    let Some(theirs) = other_items(&frame.arg(0)) else {
        return Ok(Value::False);
    };
    if mine.len() != theirs.len() {
        return Ok(Value::False);
    }
    for (a, b) in mine.iter().zip(&theirs) {
        if !rt.eql(a, b)? {
            return Ok(Value::False);
        }
    }
    Ok(Value::True)
}

/// Combines element hashes, so arrays with `eql?` elements hash alike.
fn hash(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let items = snapshot(rt, frame)?;
    let mut hasher = fxhash::FxHasher64::default();
    hasher.write_usize(items.len());
    for item in &items {
        hasher.write_u64(rt.hash_of(item)?);
    }
    Ok(Value::Integer(hasher.finish() as i64))
}

fn index(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let array = array_ref(rt, &frame.receiver)?;
    let arg = frame.arg(0);
    let Some(i) = arg.unwrap_native().as_int() else {
        return Err(rt.conversion_error(&arg, "Integer"));
    };
    let items = array.items();
    let len = items.len() as i64;
    let at = if i < 0 { len + i } else { i };
    if at < 0 || at >= len {
        return Ok(Value::Nil);
    }
    Ok(items[at as usize].clone())
}

fn push(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    array_ref(rt, &frame.receiver)?.push(frame.arg(0));
    Ok(frame.receiver.clone())
}

fn push_all(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let array = array_ref(rt, &frame.receiver)?;
    for arg in &frame.args {
        array.push(arg.clone());
    }
    Ok(frame.receiver.clone())
}

fn length(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::Integer(array_ref(rt, &frame.receiver)?.len() as i64))
}

fn is_empty(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(array_ref(rt, &frame.receiver)?.is_empty()))
}

fn first(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(array_ref(rt, &frame.receiver)?.items().first().cloned().unwrap_or_default())
}

fn last(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(array_ref(rt, &frame.receiver)?.items().last().cloned().unwrap_or_default())
}

fn include(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let needle = frame.arg(0);
    for item in snapshot(rt, frame)? {
        if rt.equals(&item, &needle)? {
            return Ok(Value::True);
        }
    }
    Ok(Value::False)
}

fn inspect(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let items = snapshot(rt, frame)?;
    Ok(Value::str(&inspect_list(rt, &items)?))
}

fn each(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    if frame.block.is_none() {
        return Err(Error::runtime("no block given (yield)"));
    }
    for item in snapshot(rt, frame)? {
        rt.yield_block(frame, vec![item])?;
    }
    Ok(frame.receiver.clone())
}

fn map(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let items = snapshot(rt, frame)?;
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        mapped.push(rt.yield_block(frame, vec![item])?);
    }
    Ok(Value::array(mapped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::frame::BlockCall;

    #[test]
    fn test_index_push_and_length() {
        let mut rt = Runtime::new().unwrap();
        let list = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
        rt.call(list.clone(), "<<", vec![Value::str("three")]).unwrap();
        assert_eq!(rt.call(list.clone(), "length", vec![]).unwrap(), Value::Integer(3));
        assert_eq!(rt.call(list.clone(), "[]", vec![Value::Integer(-1)]).unwrap(), Value::str("three"));
        assert_eq!(rt.call(list.clone(), "[]", vec![Value::Integer(7)]).unwrap(), Value::Nil);
        assert_eq!(rt.inspect(&list).unwrap(), "[1, 2, \"three\"]");
    }

    #[test]
    fn test_structural_equality_and_hash() {
        let mut rt = Runtime::new().unwrap();
        let a = Value::array(vec![Value::Integer(1), Value::str("x")]);
        let b = Value::array(vec![Value::Integer(1), Value::str("x")]);
        assert_eq!(rt.call(a.clone(), "==", vec![b.clone()]).unwrap(), Value::True);
        assert_eq!(rt.call(a.clone(), "eql?", vec![b.clone()]).unwrap(), Value::True);
        let ha = rt.call(a.clone(), "hash", vec![]).unwrap();
        let hb = rt.call(b, "hash", vec![]).unwrap();
        assert_eq!(ha, hb);

        let c = Value::array(vec![Value::Float(1.0), Value::str("x")]);
        assert_eq!(rt.call(a.clone(), "==", vec![c.clone()]).unwrap(), Value::True);
        assert_eq!(rt.call(a, "eql?", vec![c]).unwrap(), Value::False);
    }

    #[test]
    fn test_map_yields_each_element() {
        let mut rt = Runtime::new().unwrap();
        let list = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
        let doubled = rt
            .call_with_block(list, "map", vec![], Arity::exact(1), |rt, call: &BlockCall| {
                rt.call(call.arg(0), "*", vec![Value::Integer(2)])
            })
            .unwrap();
        assert_eq!(rt.inspect(&doubled).unwrap(), "[2, 4]");
    }
}
