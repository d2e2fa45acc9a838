//! `String`. Strings are immutable and double as symbols.

use super::numeric::ordering_value;
use super::{define_all, Builtin};
use crate::error::Result;
use crate::runtime::frame::Frame;
use crate::runtime::method::Arity;
use crate::runtime::value::Value;
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) -> Result<()> {
    let string = rt.core().string;
    let methods: &[(&str, Arity, Builtin)] = &[
        ("==", Arity::exact(1), eq),
        ("eql?", Arity::exact(1), eq),
        ("hash", Arity::exact(0), hash),
        ("+", Arity::exact(1), concat),
        ("length", Arity::exact(0), length),
        ("size", Arity::exact(0), length),
        ("to_s", Arity::exact(0), to_s),
        ("to_sym", Arity::exact(0), to_s),
        ("inspect", Arity::exact(0), inspect),
        ("<=>", Arity::exact(1), cmp),
    ];
    define_all(rt, string, methods)
}

fn text(value: &Value) -> Option<&str> {
    value.unwrap_native().as_str()
}

fn receiver_text(frame: &Frame) -> &str {
    text(&frame.receiver).unwrap_or_default()
}

fn eq(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let other = frame.arg(0);
    Ok(Value::bool(text(&other) == Some(receiver_text(frame))))
}

fn hash(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let code = rt.hash_of(&Value::str(receiver_text(frame)))?;
    Ok(Value::Integer(code as i64))
}

fn concat(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let other = frame.arg(0);
    let Some(rhs) = text(&other) else {
        return Err(rt.conversion_error(&other, "String"));
    };
    Ok(Value::str(&format!("{}{rhs}", receiver_text(frame))))
}

fn length(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::Integer(receiver_text(frame).chars().count() as i64))
}

/// Plain strings return themselves; subclass instances unwrap to their text.
fn to_s(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    match frame.receiver.unwrap_native() {
        s @ Value::String(_) => Ok(s.clone()),
        _ => Ok(Value::str("")),
    }
}

fn inspect(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::str(&format!("{:?}", receiver_text(frame))))
}

fn cmp(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let other = frame.arg(0);
    Ok(ordering_value(
        text(&other).map(|rhs| receiver_text(frame).cmp(rhs)),
    ))
}
