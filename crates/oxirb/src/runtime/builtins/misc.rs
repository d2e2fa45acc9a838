//! `NilClass`, `TrueClass`, `FalseClass` and `Proc`.

use super::{define_all, Builtin};
use crate::error::Result;
use crate::runtime::frame::{Frame, Proc};
use crate::runtime::method::Arity;
use crate::runtime::value::Value;
use crate::runtime::Runtime;
use std::rc::Rc;

pub(super) fn install(rt: &mut Runtime) -> Result<()> {
    let core = rt.core();
    let nil: &[(&str, Arity, Builtin)] = &[
        ("to_s", Arity::exact(0), nil_to_s),
        ("inspect", Arity::exact(0), nil_inspect),
        ("nil?", Arity::exact(0), always_true),
        ("to_a", Arity::exact(0), nil_to_a),
        ("&", Arity::exact(1), always_false),
        ("|", Arity::exact(1), arg_truthy),
    ];
    define_all(rt, core.nil_class, nil)?;

    let truth: &[(&str, Arity, Builtin)] = &[
        ("to_s", Arity::exact(0), true_to_s),
        ("inspect", Arity::exact(0), true_to_s),
        ("&", Arity::exact(1), arg_truthy),
        ("|", Arity::exact(1), always_true),
        ("^", Arity::exact(1), arg_falsy),
    ];
    define_all(rt, core.true_class, truth)?;

    let falsity: &[(&str, Arity, Builtin)] = &[
        ("to_s", Arity::exact(0), false_to_s),
        ("inspect", Arity::exact(0), false_to_s),
        ("&", Arity::exact(1), always_false),
        ("|", Arity::exact(1), arg_truthy),
        ("^", Arity::exact(1), arg_truthy),
    ];
    define_all(rt, core.false_class, falsity)?;

    let procs: &[(&str, Arity, Builtin)] = &[
        ("call", Arity::ANY, call),
        ("()", Arity::ANY, call),
        ("yield", Arity::ANY, call),
        ("[]", Arity::ANY, call),
        ("===", Arity::ANY, call),
        ("arity", Arity::exact(0), arity),
        ("lambda?", Arity::exact(0), is_lambda),
        ("to_proc", Arity::exact(0), to_proc),
    ];
    define_all(rt, core.proc_class, procs)
}

fn nil_to_s(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::str(""))
}

fn nil_inspect(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::str("nil"))
}

fn nil_to_a(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::array(Vec::new()))
}

fn true_to_s(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::str("true"))
}

fn false_to_s(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::str("false"))
}

fn always_true(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::True)
}

fn always_false(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::False)
}

fn arg_truthy(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(frame.arg(0).truthy()))
}

fn arg_falsy(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(!frame.arg(0).truthy()))
}

fn proc_ref(rt: &Runtime, value: &Value) -> Result<Rc<Proc>> {
    match value.unwrap_native() {
        Value::Proc(p) => Ok(Rc::clone(p)),
        other => Err(rt.conversion_error(other, "Proc")),
    }
}

/// Forwards the arguments, and any block given to `call`, to the proc.
fn call(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let block = proc_ref(rt, &frame.receiver)?;
    rt.call_proc_with_block(&block, frame.args.clone(), frame.block.clone())
}

fn arity(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::Integer(proc_ref(rt, &frame.receiver)?.arity().value()))
}

fn is_lambda(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(proc_ref(rt, &frame.receiver)?.is_lambda()))
}

fn to_proc(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(frame.receiver.clone())
}
