//! `Integer`, `Float` and `Comparable`.
//!
//! Arithmetic with a non-numeric right operand goes through its `coerce`:
//! `a + b` becomes `x + y` where `[x, y] = b.coerce(a)`.

use super::{define_all, Builtin};
use crate::error::{Error, Result};
use crate::runtime::frame::Frame;
use crate::runtime::method::Arity;
use crate::runtime::names;
use crate::runtime::value::Value;
use crate::runtime::Runtime;
use std::cmp::Ordering;

pub(super) fn install(rt: &mut Runtime) -> Result<()> {
    let core = rt.core();
    let integer: &[(&str, Arity, Builtin)] = &[
        ("==", Arity::exact(1), num_eq),
        ("eql?", Arity::exact(1), num_eql),
        ("hash", Arity::exact(0), num_hash),
        ("+", Arity::exact(1), int_add),
        ("-", Arity::exact(1), int_sub),
        ("*", Arity::exact(1), int_mul),
        ("<=>", Arity::exact(1), num_cmp),
        ("coerce", Arity::exact(1), int_coerce),
        ("to_s", Arity::exact(0), int_to_s),
        ("inspect", Arity::exact(0), int_to_s),
    ];
    define_all(rt, core.integer, integer)?;

    let float: &[(&str, Arity, Builtin)] = &[
        ("==", Arity::exact(1), num_eq),
        ("eql?", Arity::exact(1), num_eql),
        ("hash", Arity::exact(0), num_hash),
        ("+", Arity::exact(1), float_add),
        ("-", Arity::exact(1), float_sub),
        ("*", Arity::exact(1), float_mul),
        ("<=>", Arity::exact(1), num_cmp),
        ("coerce", Arity::exact(1), float_coerce),
        ("to_s", Arity::exact(0), float_to_s),
        ("inspect", Arity::exact(0), float_to_s),
    ];
    define_all(rt, core.float, float)?;

    let comparable: &[(&str, Arity, Builtin)] = &[
        ("<", Arity::exact(1), lt),
        ("<=", Arity::exact(1), le),
        (">", Arity::exact(1), gt),
        (">=", Arity::exact(1), ge),
        ("between?", Arity::exact(2), between),
    ];
    define_all(rt, core.comparable, comparable)
}

/// Ruby's float formatting: `1.0`, `0.5`, `1.0e+20`, `Infinity`, `NaN`.
#[must_use]
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = x.abs();
    if magnitude >= 1e16 || (magnitude < 1e-4 && x != 0.0) {
        let raw = format!("{x:e}");
        let (mantissa, exponent) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let mantissa = if mantissa.contains('.') {
            mantissa.to_string()
        } else {
            format!("{mantissa}.0")
        };
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }
    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value.unwrap_native() {
        Value::Integer(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn self_int(frame: &Frame) -> i64 {
    frame.receiver.unwrap_native().as_int().unwrap_or(0)
}

fn self_float(frame: &Frame) -> f64 {
    as_f64(&frame.receiver).unwrap_or(0.0)
}

/// `other.coerce(receiver)`, then `x.op(y)` on the pair.
fn coerce_and_send(rt: &mut Runtime, frame: &Frame, op: &str) -> Result<Value> {
    let other = frame.arg(0);
    if !rt.respond_to(&other, "coerce") {
        let target = rt.display_name(rt.real_class_of(&frame.receiver));
        return Err(Error::type_error(format!(
            "{} can't be coerced into {target}",
            rt.class_label(&other)
        )));
    }
    let pair = rt.send(other, names::COERCE, vec![frame.receiver.clone()])?;
    let items = match pair.unwrap_native() {
        Value::Array(items) if items.len() == 2 => items.items().clone(),
        _ => return Err(Error::type_error("coerce must return [x, y]")),
    };
    rt.call(items[0].clone(), op, vec![items[1].clone()])
}

fn int_arith(
    rt: &mut Runtime,
    frame: &Frame,
    op: &str,
    checked: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Value> {
    let lhs = self_int(frame);
    match frame.arg(0).unwrap_native() {
        Value::Integer(rhs) => checked(lhs, *rhs)
            .map(Value::Integer)
            .ok_or_else(|| Error::runtime(format!("integer overflow in {lhs} {op} {rhs}"))),
        Value::Float(rhs) => Ok(Value::Float(float(lhs as f64, *rhs))),
        _ => coerce_and_send(rt, frame, op),
    }
}

fn float_arith(rt: &mut Runtime, frame: &Frame, op: &str, float: fn(f64, f64) -> f64) -> Result<Value> {
    let lhs = self_float(frame);
    match as_f64(&frame.arg(0)) {
        Some(rhs) => Ok(Value::Float(float(lhs, rhs))),
        None => coerce_and_send(rt, frame, op),
    }
}

fn int_add(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    int_arith(rt, frame, "+", i64::checked_add, |a, b| a + b)
}

fn int_sub(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    int_arith(rt, frame, "-", i64::checked_sub, |a, b| a - b)
}

fn int_mul(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    int_arith(rt, frame, "*", i64::checked_mul, |a, b| a * b)
}

fn float_add(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    float_arith(rt, frame, "+", |a, b| a + b)
}

fn float_sub(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    float_arith(rt, frame, "-", |a, b| a - b)
}

fn float_mul(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    float_arith(rt, frame, "*", |a, b| a * b)
}

fn num_eq(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let other = frame.arg(0);
    match (frame.receiver.unwrap_native(), other.unwrap_native()) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::bool(a == b)),
        (a, b) => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => Ok(Value::bool(x == y)),
            // Unknown right operands decide for themselves.
            _ if matches!(other, Value::Object(_)) => {
                let reversed = rt.send(other.clone(), names::EQ, vec![frame.receiver.clone()])?;
                Ok(Value::bool(reversed.truthy()))
            }
            _ => Ok(Value::False),
        },
    }
}

/// Same class and same value: `1.eql?(1.0)` is false.
fn num_eql(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let same = match (frame.receiver.unwrap_native(), frame.arg(0).unwrap_native()) {
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits() || a == b,
        _ => false,
    };
    Ok(Value::bool(same))
}

fn num_hash(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let code = rt.hash_of(frame.receiver.unwrap_native())?;
    Ok(Value::Integer(code as i64))
}

fn num_cmp(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let ordering = match (frame.receiver.unwrap_native(), frame.arg(0).unwrap_native()) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (a, b) => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    Ok(ordering_value(ordering))
}

pub(super) fn ordering_value(ordering: Option<Ordering>) -> Value {
    match ordering {
        Some(Ordering::Less) => Value::Integer(-1),
        Some(Ordering::Equal) => Value::Integer(0),
        Some(Ordering::Greater) => Value::Integer(1),
        None => Value::Nil,
    }
}

fn int_coerce(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let lhs = self_int(frame);
    match frame.arg(0).unwrap_native() {
        Value::Integer(n) => Ok(Value::array(vec![Value::Integer(*n), Value::Integer(lhs)])),
        Value::Float(x) => Ok(Value::array(vec![Value::Float(*x), Value::Float(lhs as f64)])),
        other => Err(Error::type_error(format!(
            "{} can't be coerced into Integer",
            rt.class_label(other)
        ))),
    }
}

fn float_coerce(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let lhs = self_float(frame);
    match as_f64(&frame.arg(0)) {
        Some(x) => Ok(Value::array(vec![Value::Float(x), Value::Float(lhs)])),
        None => Err(Error::type_error(format!(
            "{} can't be coerced into Float",
            rt.class_label(&frame.arg(0))
        ))),
    }
}

fn int_to_s(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::str(&self_int(frame).to_string()))
}

fn float_to_s(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::str(&format_float(self_float(frame))))
}

/// `self <=> other` as an ordering, failing like Ruby when incomparable.
fn compare(rt: &mut Runtime, frame: &Frame) -> Result<Ordering> {
    let other = frame.arg(0);
    let result = rt.send(frame.receiver.clone(), names::CMP, vec![other.clone()])?;
    match result.as_int() {
        Some(n) => Ok(n.cmp(&0)),
        None => Err(Error::runtime(format!(
            "comparison of {} with {} failed",
            rt.class_label(&frame.receiver),
            rt.inspect(&other)?
        ))),
    }
}

fn lt(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(compare(rt, frame)? == Ordering::Less))
}

fn le(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(compare(rt, frame)? != Ordering::Greater))
}

fn gt(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(compare(rt, frame)? == Ordering::Greater))
}

fn ge(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(compare(rt, frame)? != Ordering::Less))
}

fn between(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let low = rt.call(frame.receiver.clone(), ">=", vec![frame.arg(0)])?;
    if !low.truthy() {
        return Ok(Value::False);
    }
    rt.call(frame.receiver.clone(), "<=", vec![frame.arg(1)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(1e20), "1.0e+20");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(f64::INFINITY), "Infinity");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_mixed_arithmetic() {
        let mut rt = Runtime::new().unwrap();
        let sum = rt.call(Value::Integer(1), "+", vec![Value::Float(0.5)]).unwrap();
        assert_eq!(sum, Value::Float(1.5));
        let diff = rt.call(Value::Float(2.0), "-", vec![Value::Integer(1)]).unwrap();
        assert_eq!(diff, Value::Float(1.0));
        assert!(rt.call(Value::Integer(i64::MAX), "+", vec![Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_coerce_protocol() {
        let mut rt = Runtime::new().unwrap();
        let money = rt.define_or_reopen_class(&Value::Nil, None, "Money").unwrap();
        rt.define_method(money, "coerce", Arity::exact(1), |_rt, f| {
            Ok(Value::array(vec![f.arg(0), Value::Integer(100)]))
        })
        .unwrap();
        let m = rt.new_instance(money, vec![], None).unwrap();

        let total = rt.call(Value::Integer(5), "+", vec![m]).unwrap();
        assert_eq!(total, Value::Integer(105));

        let err = rt.call(Value::Integer(5), "+", vec![Value::str("x")]).unwrap_err();
        assert_eq!(err.to_string(), "String can't be coerced into Integer");
        let err = rt.call(Value::Integer(5), "*", vec![Value::Nil]).unwrap_err();
        assert_eq!(err.to_string(), "nil can't be coerced into Integer");
    }

    #[test]
    fn test_eql_distinguishes_integer_and_float() {
        let mut rt = Runtime::new().unwrap();
        assert_eq!(rt.call(Value::Integer(1), "==", vec![Value::Float(1.0)]).unwrap(), Value::True);
        assert_eq!(rt.call(Value::Integer(1), "eql?", vec![Value::Float(1.0)]).unwrap(), Value::False);
    }

    #[test]
    fn test_comparable() {
        let mut rt = Runtime::new().unwrap();
        assert_eq!(rt.call(Value::Integer(1), "<", vec![Value::Integer(2)]).unwrap(), Value::True);
        assert_eq!(
            rt.call(Value::Float(2.0), "between?", vec![Value::Integer(1), Value::Integer(3)])
                .unwrap(),
            Value::True
        );
        let err = rt.call(Value::Integer(1), "<", vec![Value::Nil]).unwrap_err();
        assert_eq!(err.to_string(), "comparison of Integer with nil failed");
    }
}
