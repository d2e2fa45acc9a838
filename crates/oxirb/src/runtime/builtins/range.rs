//! `Range` and `Regexp`.

use super::{define_all, Builtin};
use crate::error::{Error, Result};
use crate::runtime::frame::Frame;
use crate::runtime::method::Arity;
use crate::runtime::names;
use crate::runtime::value::{RRange, RRegexp, Value};
use crate::runtime::Runtime;
use std::cmp::Ordering;
use std::hash::Hasher;
use std::rc::Rc;

pub(super) fn install(rt: &mut Runtime) -> Result<()> {
    let core = rt.core();
    let range: &[(&str, Arity, Builtin)] = &[
        ("first", Arity::exact(0), first),
        ("begin", Arity::exact(0), first),
        ("last", Arity::exact(0), last),
        ("end", Arity::exact(0), last),
        ("exclude_end?", Arity::exact(0), exclude_end),
        ("include?", Arity::exact(1), include),
        ("===", Arity::exact(1), include),
        ("==", Arity::exact(1), range_eq),
        ("eql?", Arity::exact(1), range_eql),
        ("hash", Arity::exact(0), range_hash),
        ("inspect", Arity::exact(0), range_inspect),
        ("to_s", Arity::exact(0), range_to_s),
        ("each", Arity::exact(0), each),
        ("to_a", Arity::exact(0), to_a),
    ];
    define_all(rt, core.range, range)?;

    let regexp: &[(&str, Arity, Builtin)] = &[
        ("source", Arity::exact(0), source),
        ("options", Arity::exact(0), options),
        ("==", Arity::exact(1), regexp_eq),
        ("eql?", Arity::exact(1), regexp_eq),
        ("hash", Arity::exact(0), regexp_hash),
        ("inspect", Arity::exact(0), regexp_inspect),
        ("to_s", Arity::exact(0), regexp_inspect),
    ];
    define_all(rt, core.regexp, regexp)
}

fn range_ref(rt: &Runtime, value: &Value) -> Result<Rc<RRange>> {
    match value.unwrap_native() {
        Value::Range(r) => Ok(Rc::clone(r)),
        other => Err(rt.conversion_error(other, "Range")),
    }
}

fn first(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(range_ref(rt, &frame.receiver)?.start.clone())
}

fn last(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(range_ref(rt, &frame.receiver)?.end.clone())
}

fn exclude_end(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(range_ref(rt, &frame.receiver)?.exclusive))
}

/// `a <=> b` as an ordering; `None` when the pair is incomparable.
fn spaceship(rt: &mut Runtime, a: &Value, b: &Value) -> Result<Option<Ordering>> {
    let result = rt.send(a.clone(), names::CMP, vec![b.clone()])?;
    Ok(result.as_int().map(|n| n.cmp(&0)))
}

/// Endpoint comparison through `<=>`; a `nil` end is unbounded.
fn include(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let range = range_ref(rt, &frame.receiver)?;
    let probe = frame.arg(0);
    if !range.start.is_nil() {
        match spaceship(rt, &range.start, &probe)? {
            Some(Ordering::Less | Ordering::Equal) => {}
            _ => return Ok(Value::False),
        }
    }
    if range.end.is_nil() {
        return Ok(Value::True);
    }
    let inside = match spaceship(rt, &probe, &range.end)? {
        Some(Ordering::Less) => true,
        Some(Ordering::Equal) => !range.exclusive,
        _ => false,
    };
    Ok(Value::bool(inside))
}

fn other_range(value: &Value) -> Option<Rc<RRange>> {
    match value.unwrap_native() {
        Value::Range(r) => Some(Rc::clone(r)),
        _ => None,
    }
}

fn range_eq(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let mine = range_ref(rt, &frame.receiver)?;
    let Some(theirs) = other_range(&frame.arg(0)) else {
        return Ok(Value::False);
    };
    let same = mine.exclusive == theirs.exclusive
        && rt.equals(&mine.start, &theirs.start)?
        && rt.equals(&mine.end, &theirs.end)?;
    Ok(Value::bool(same))
}

fn range_eql(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let mine = range_ref(rt, &frame.receiver)?;
    let Some(theirs) = other_range(&frame.arg(0)) else {
        return Ok(Value::False);
    };
    let same = mine.exclusive == theirs.exclusive
        && rt.eql(&mine.start, &theirs.start)?
        && rt.eql(&mine.end, &theirs.end)?;
    Ok(Value::bool(same))
}

fn range_hash(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let range = range_ref(rt, &frame.receiver)?;
    let mut hasher = fxhash::FxHasher64::default();
    hasher.write_u64(rt.hash_of(&range.start)?);
    hasher.write_u64(rt.hash_of(&range.end)?);
    hasher.write_u8(u8::from(range.exclusive));
    Ok(Value::Integer(hasher.finish() as i64))
}

fn dots(range: &RRange) -> &'static str {
    if range.exclusive { "..." } else { ".." }
}

fn range_inspect(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let range = range_ref(rt, &frame.receiver)?;
    let start = if range.start.is_nil() { String::new() } else { rt.inspect(&range.start)? };
    let end = if range.end.is_nil() { String::new() } else { rt.inspect(&range.end)? };
    Ok(Value::str(&format!("{start}{}{end}", dots(&range))))
}

fn range_to_s(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let range = range_ref(rt, &frame.receiver)?;
    let start = rt.to_s(&range.start)?;
    let end = rt.to_s(&range.end)?;
    Ok(Value::str(&format!("{start}{}{end}", dots(&range))))
}

/// Integer bounds of an iterable range, end inclusive.
fn integer_bounds(rt: &Runtime, range: &RRange) -> Result<(i64, i64)> {
    let Some(start) = range.start.unwrap_native().as_int() else {
        return Err(Error::type_error(format!(
            "can't iterate from {}",
            rt.class_label(&range.start)
        )));
    };
    let Some(end) = range.end.unwrap_native().as_int() else {
        return Err(rt.conversion_error(&range.end, "Integer"));
    };
    Ok((start, if range.exclusive { end - 1 } else { end }))
}

fn each(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let range = range_ref(rt, &frame.receiver)?;
    let (start, end) = integer_bounds(rt, &range)?;
    if frame.block.is_none() {
        return Err(Error::runtime("no block given (yield)"));
    }
    for i in start..=end {
        rt.yield_block(frame, vec![Value::Integer(i)])?;
    }
    Ok(frame.receiver.clone())
}

fn to_a(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let range = range_ref(rt, &frame.receiver)?;
    let (start, end) = integer_bounds(rt, &range)?;
    Ok(Value::array((start..=end).map(Value::Integer).collect()))
}

fn regexp_ref(rt: &Runtime, value: &Value) -> Result<Rc<RRegexp>> {
    match value.unwrap_native() {
        Value::Regexp(r) => Ok(Rc::clone(r)),
        other => Err(rt.conversion_error(other, "Regexp")),
    }
}

fn source(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::str(&regexp_ref(rt, &frame.receiver)?.source))
}

fn options(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::Integer(i64::from(regexp_ref(rt, &frame.receiver)?.options)))
}

/// Same source and options.
fn regexp_eq(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let mine = regexp_ref(rt, &frame.receiver)?;
    let same = match frame.arg(0).unwrap_native() {
        Value::Regexp(theirs) => mine.source == theirs.source && mine.options == theirs.options,
        _ => false,
    };
    Ok(Value::bool(same))
}

fn regexp_hash(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let regexp = regexp_ref(rt, &frame.receiver)?;
    let code = fxhash::hash64(&(&*regexp.source, regexp.options));
    Ok(Value::Integer(code as i64))
}

fn regexp_inspect(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::str(&format!("/{}/", regexp_ref(rt, &frame.receiver)?.source)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::frame::BlockCall;
    use std::cell::RefCell;

    #[test]
    fn test_include_respects_exclusive_end() {
        let mut rt = Runtime::new().unwrap();
        let inclusive = Value::range(Value::Integer(1), Value::Integer(5), false);
        let exclusive = Value::range(Value::Integer(1), Value::Integer(5), true);
        let five = vec![Value::Integer(5)];
        assert_eq!(rt.call(inclusive.clone(), "include?", five.clone()).unwrap(), Value::True);
        assert_eq!(rt.call(exclusive.clone(), "include?", five).unwrap(), Value::False);
        assert_eq!(
            rt.call(inclusive, "include?", vec![Value::Float(2.5)]).unwrap(),
            Value::True
        );
        assert_eq!(rt.inspect(&exclusive).unwrap(), "1...5");
    }

    #[test]
    fn test_equal_ranges_hash_alike() {
        let mut rt = Runtime::new().unwrap();
        let a = Value::range(Value::str("a"), Value::str("z"), false);
        let b = Value::range(Value::str("a"), Value::str("z"), false);
        let c = Value::range(Value::str("a"), Value::str("z"), true);
        assert_eq!(rt.call(a.clone(), "eql?", vec![b.clone()]).unwrap(), Value::True);
        assert_eq!(rt.call(a.clone(), "==", vec![c]).unwrap(), Value::False);
        assert_eq!(rt.hash_of(&a).unwrap(), rt.hash_of(&b).unwrap());
    }

    #[test]
    fn test_each_yields_integers() {
        let mut rt = Runtime::new().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let range = Value::range(Value::Integer(1), Value::Integer(4), true);
        rt.call_with_block(range, "each", vec![], Arity::exact(1), move |_rt, call: &BlockCall| {
            sink.borrow_mut().push(call.arg(0));
            Ok(Value::Nil)
        })
        .unwrap();
        assert_eq!(*seen.borrow(), vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);

        let floats = Value::range(Value::Float(1.0), Value::Integer(2), false);
        let err = rt.call(floats, "to_a", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "can't iterate from Float");
    }

    #[test]
    fn test_regexp_equality_by_source_and_options() {
        let mut rt = Runtime::new().unwrap();
        let a = Value::regexp("a+", 0);
        let b = Value::regexp("a+", 0);
        let c = Value::regexp("a+", 1);
        assert_eq!(rt.call(a.clone(), "==", vec![b.clone()]).unwrap(), Value::True);
        assert_eq!(rt.call(a.clone(), "==", vec![c]).unwrap(), Value::False);
        assert_eq!(rt.hash_of(&a).unwrap(), rt.hash_of(&b).unwrap());
        assert_eq!(rt.inspect(&a).unwrap(), "/a+/");
    }
}
