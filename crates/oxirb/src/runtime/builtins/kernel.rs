//! `BasicObject` and `Kernel`.

use super::{define_all, join_inspected, module_arg, name_arg, Builtin};
use crate::error::{Error, Result};
use crate::runtime::frame::Frame;
use crate::runtime::method::Arity;
use crate::runtime::names;
use crate::runtime::value::Value;
use crate::runtime::Runtime;
use std::rc::Rc;

pub(super) fn install(rt: &mut Runtime) -> Result<()> {
    let core = rt.core();
    let basic: &[(&str, Arity, Builtin)] = &[
        ("initialize", Arity::ANY, initialize),
        ("==", Arity::exact(1), equal),
        ("equal?", Arity::exact(1), equal),
        ("!", Arity::exact(0), not),
        ("!=", Arity::exact(1), not_equal),
        ("__send__", Arity::rest(1), send),
        ("singleton_method_added", Arity::ANY, hook),
    ];
    define_all(rt, core.basic_object, basic)?;

    let missing_name = rt.intern("method_missing");
    let missing = rt.define_native(
        core.basic_object,
        missing_name,
        Arity::rest(1),
        Rc::new(method_missing as Builtin),
    )?;
    rt.default_method_missing = Some(missing);

    let kernel: &[(&str, Arity, Builtin)] = &[
        ("eql?", Arity::exact(1), equal),
        ("hash", Arity::exact(0), hash),
        ("object_id", Arity::exact(0), object_id),
        ("class", Arity::exact(0), class),
        ("singleton_class", Arity::exact(0), singleton_class),
        ("respond_to?", Arity::range(1, 1), respond_to),
        ("send", Arity::rest(1), send),
        ("public_send", Arity::rest(1), send),
        ("is_a?", Arity::exact(1), is_a),
        ("kind_of?", Arity::exact(1), is_a),
        ("instance_of?", Arity::exact(1), instance_of),
        ("nil?", Arity::exact(0), is_nil),
        ("inspect", Arity::exact(0), inspect),
        ("to_s", Arity::exact(0), to_s),
        ("instance_variable_get", Arity::exact(1), ivar_get),
        ("instance_variable_set", Arity::exact(2), ivar_set),
        ("instance_variables", Arity::exact(0), ivars),
        ("extend", Arity::rest(1), extend),
        ("puts", Arity::ANY, puts),
        ("print", Arity::ANY, print),
        ("warn", Arity::ANY, warn),
        ("require", Arity::exact(1), require),
        ("load", Arity::exact(1), load),
    ];
    define_all(rt, core.kernel, kernel)
}

fn initialize(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::Nil)
}

fn hook(_rt: &mut Runtime, _frame: &Frame) -> Result<Value> {
    Ok(Value::Nil)
}

fn equal(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(frame.receiver.identical(&frame.arg(0))))
}

fn not(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(!frame.receiver.truthy()))
}

fn not_equal(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(!rt.equals(&frame.receiver, &frame.arg(0))?))
}

fn send(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let name = name_arg(rt, &frame.arg(0))?;
    let sym = rt.intern(&name);
    rt.send_with_block(
        frame.receiver.clone(),
        sym,
        frame.args[1..].to_vec(),
        frame.block.clone(),
    )
}

fn method_missing(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let name = name_arg(rt, &frame.arg(0))?;
    Err(Error::NoMethodError {
        name: name.to_string(),
        receiver: rt.describe(&frame.receiver),
        args: frame.args[1..].to_vec(),
    })
}

fn hash(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let code = fxhash::hash64(&frame.receiver.object_id());
    Ok(Value::Integer(code as i64))
}

fn object_id(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::Integer(frame.receiver.object_id()))
}

fn class(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::Module(rt.real_class_of(&frame.receiver)))
}

fn singleton_class(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::Module(rt.singleton_class(&frame.receiver)?))
}

fn respond_to(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let name = name_arg(rt, &frame.arg(0))?;
    Ok(Value::bool(rt.respond_to(&frame.receiver, &name)))
}

fn is_a(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = module_arg(rt, &frame.arg(0))?;
    Ok(Value::bool(rt.is_a(&frame.receiver, module)))
}

fn instance_of(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let module = module_arg(rt, &frame.arg(0))?;
    Ok(Value::bool(rt.real_class_of(&frame.receiver) == module))
}

fn is_nil(_rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    Ok(Value::bool(frame.receiver.is_nil()))
}

fn inspect(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let class = rt.display_name(rt.real_class_of(&frame.receiver));
    let names = rt.instance_variables(&frame.receiver);
    if names.is_empty() {
        return Ok(Value::str(&format!("#<{class}>")));
    }
    let mut parts = Vec::with_capacity(names.len());
    for name in names {
        let value = rt.ivar_get(&frame.receiver, &name)?;
        parts.push(format!("{name}={}", rt.inspect(&value)?));
    }
    Ok(Value::str(&format!("#<{class} {}>", parts.join(", "))))
}

fn to_s(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let class = rt.display_name(rt.real_class_of(&frame.receiver));
    Ok(Value::str(&format!(
        "#<{class}:0x{:016x}>",
        frame.receiver.object_id().unsigned_abs()
    )))
}

fn ivar_get(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let name = name_arg(rt, &frame.arg(0))?;
    rt.ivar_get(&frame.receiver, &name)
}

fn ivar_set(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let name = name_arg(rt, &frame.arg(0))?;
    rt.ivar_set(&frame.receiver, &name, frame.arg(1))
}

fn ivars(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let names = rt.instance_variables(&frame.receiver);
    Ok(Value::array(names.iter().map(|n| Value::str(n)).collect()))
}

fn extend(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    for arg in frame.args.iter().rev() {
        let module = module_arg(rt, arg)?;
        rt.extend(&frame.receiver, module)?;
    }
    Ok(frame.receiver.clone())
}

/// Lines `puts` writes for one argument; arrays print one element per line.
fn puts_lines(rt: &mut Runtime, value: &Value, out: &mut String) -> Result<()> {
    if let Value::Array(items) = value.unwrap_native() {
        let items = items.items().clone();
        if items.is_empty() {
            out.push('\n');
        }
        for item in &items {
            puts_lines(rt, item, out)?;
        }
        return Ok(());
    }
    let text = if value.is_nil() { String::new() } else { rt.to_s(value)? };
    out.push_str(&text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
    Ok(())
}

fn puts(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let mut out = String::new();
    if frame.args.is_empty() {
        out.push('\n');
    }
    for arg in &frame.args {
        puts_lines(rt, arg, &mut out)?;
    }
    rt.output.write_out(&out);
    Ok(Value::Nil)
}

fn print(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let mut out = String::new();
    for arg in &frame.args {
        out.push_str(&rt.to_s(arg)?);
    }
    rt.output.write_out(&out);
    Ok(Value::Nil)
}

fn warn(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let mut out = String::new();
    for arg in &frame.args {
        puts_lines(rt, arg, &mut out)?;
    }
    rt.output.write_err(&out);
    Ok(Value::Nil)
}

fn require(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let path = name_arg(rt, &frame.arg(0))?;
    Ok(Value::bool(rt.require(&path)?))
}

fn load(rt: &mut Runtime, frame: &Frame) -> Result<Value> {
    let path = name_arg(rt, &frame.arg(0))?;
    Ok(Value::bool(rt.load(&path)?))
}

/// `[a, b]` style inspection shared by containers.
pub(super) fn inspect_list(rt: &mut Runtime, items: &[Value]) -> Result<String> {
    Ok(format!("[{}]", join_inspected(rt, items)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::io::CaptureSink;

    #[test]
    fn test_puts_flattens_and_handles_nil() {
        let mut rt = Runtime::new().unwrap();
        let sink = CaptureSink::new();
        rt.set_output(Box::new(sink.clone()));
        let main = rt.main();

        let list = Value::array(vec![Value::Integer(1), Value::Nil, Value::str("x\n")]);
        rt.call(main.clone(), "puts", vec![list, Value::str("done")]).unwrap();
        rt.call(main.clone(), "print", vec![Value::str("a"), Value::Integer(2)]).unwrap();
        rt.call(main, "warn", vec![Value::str("careful")]).unwrap();

        assert_eq!(sink.stdout(), "1\n\nx\ndone\na2");
        assert_eq!(sink.stderr(), "careful\n");
    }

    #[test]
    fn test_identity_and_negation() {
        let mut rt = Runtime::new().unwrap();
        let main = rt.main();
        let same = rt.call(main.clone(), "equal?", vec![main.clone()]).unwrap();
        assert_eq!(same, Value::True);
        let differs = rt.call(main.clone(), "!=", vec![Value::Nil]).unwrap();
        assert_eq!(differs, Value::True);
        assert_eq!(rt.call(Value::Nil, "!", vec![]).unwrap(), Value::True);
    }

    #[test]
    fn test_send_and_class() {
        let mut rt = Runtime::new().unwrap();
        let integer = rt.core().integer;
        let class = rt
            .call(Value::Integer(3), "send", vec![Value::str("class")])
            .unwrap();
        assert_eq!(class, Value::Module(integer));
        let is_int = rt
            .call(Value::Integer(3), "is_a?", vec![Value::Module(integer)])
            .unwrap();
        assert_eq!(is_int, Value::True);
    }

    #[test]
    fn test_default_inspect_lists_ivars() {
        let mut rt = Runtime::new().unwrap();
        let c = rt.define_or_reopen_class(&Value::Nil, None, "Pair").unwrap();
        let obj = rt.new_instance(c, vec![], None).unwrap();
        assert_eq!(rt.inspect(&obj).unwrap(), "#<Pair>");
        rt.ivar_set(&obj, "@a", Value::Integer(1)).unwrap();
        assert_eq!(rt.inspect(&obj).unwrap(), "#<Pair @a=1>");
    }
}
